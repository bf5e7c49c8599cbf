// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Cube-coordinate hex geometry.
//!
//! Every cell satisfies `q + r + s = 0`. The spiral order produced here is the
//! canonical trigger-resolution order used by the simulator, so it must never
//! change: center first, then each ring starting from its north cell and
//! walking the six sides clockwise.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HexError {
    #[error("invalid cube coordinate ({q}, {r}, {s}): components must sum to zero")]
    InvalidCoordinate { q: i32, r: i32, s: i32 },
}

// ---------------------------------------------------------------------------
// Directions
// ---------------------------------------------------------------------------

/// Neighbor offsets, clockwise from "top".
const NEIGHBOR_DIRECTIONS: [(i32, i32, i32); 6] = [
    (0, -1, 1),
    (1, -1, 0),
    (1, 0, -1),
    (0, 1, -1),
    (-1, 1, 0),
    (-1, 0, 1),
];

/// Side directions walked when tracing a ring from its north cell.
const RING_WALK: [(i32, i32, i32); 6] = [
    (1, 0, -1),
    (0, 1, -1),
    (-1, 1, 0),
    (-1, 0, 1),
    (0, -1, 1),
    (1, -1, 0),
];

// ---------------------------------------------------------------------------
// HexCell
// ---------------------------------------------------------------------------

/// A cell on the hex grid. Serialized as `[q, r, s]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "[i32; 3]", into = "[i32; 3]")]
pub struct HexCell {
    pub q: i32,
    pub r: i32,
    pub s: i32,
}

impl HexCell {
    pub const ORIGIN: HexCell = HexCell { q: 0, r: 0, s: 0 };

    pub fn new(q: i32, r: i32, s: i32) -> Result<Self, HexError> {
        if q + r + s != 0 {
            return Err(HexError::InvalidCoordinate { q, r, s });
        }
        Ok(Self { q, r, s })
    }

    /// Build from axial coordinates; `s` is derived.
    pub fn axial(q: i32, r: i32) -> Self {
        Self { q, r, s: -q - r }
    }

    /// Distance from the origin.
    pub fn ring(&self) -> u32 {
        self.q.unsigned_abs().max(self.r.unsigned_abs()).max(self.s.unsigned_abs())
    }

    pub fn distance(&self, other: &HexCell) -> u32 {
        (*self - *other).ring()
    }

    pub fn is_adjacent(&self, other: &HexCell) -> bool {
        self.distance(other) == 1
    }

    /// The six adjacent cells, clockwise starting at "top".
    pub fn neighbors(&self) -> [HexCell; 6] {
        NEIGHBOR_DIRECTIONS.map(|(dq, dr, ds)| HexCell {
            q: self.q + dq,
            r: self.r + dr,
            s: self.s + ds,
        })
    }

    /// Rotate about `center` by 60 degrees per step. Negative steps rotate
    /// the other way; `steps` is taken mod 6.
    pub fn rotate(&self, center: &HexCell, steps: i32) -> HexCell {
        let mut rel = *self - *center;
        for _ in 0..steps.rem_euclid(6) {
            rel = HexCell { q: -rel.s, r: -rel.q, s: -rel.r };
        }
        rel + *center
    }
}

impl std::ops::Add for HexCell {
    type Output = HexCell;

    fn add(self, rhs: HexCell) -> HexCell {
        HexCell { q: self.q + rhs.q, r: self.r + rhs.r, s: self.s + rhs.s }
    }
}

impl std::ops::Sub for HexCell {
    type Output = HexCell;

    fn sub(self, rhs: HexCell) -> HexCell {
        HexCell { q: self.q - rhs.q, r: self.r - rhs.r, s: self.s - rhs.s }
    }
}

impl TryFrom<[i32; 3]> for HexCell {
    type Error = HexError;

    fn try_from(v: [i32; 3]) -> Result<Self, Self::Error> {
        HexCell::new(v[0], v[1], v[2])
    }
}

impl From<HexCell> for [i32; 3] {
    fn from(c: HexCell) -> Self {
        [c.q, c.r, c.s]
    }
}

impl std::fmt::Display for HexCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.q, self.r, self.s)
    }
}

// ---------------------------------------------------------------------------
// Enumeration
// ---------------------------------------------------------------------------

/// Cells of a single ring in spiral order. Ring 0 is the origin alone.
pub fn ring_cells(ring: u32) -> Vec<HexCell> {
    if ring == 0 {
        return vec![HexCell::ORIGIN];
    }
    let k = ring as i32;
    let mut cells = Vec::with_capacity(6 * ring as usize);
    let mut cur = HexCell { q: 0, r: -k, s: k };
    for (dq, dr, ds) in RING_WALK {
        for _ in 0..ring {
            cells.push(cur);
            cur = HexCell { q: cur.q + dq, r: cur.r + dr, s: cur.s + ds };
        }
    }
    cells
}

/// Every cell with ring <= `radius`, in canonical trigger order.
pub fn spiral(radius: u32) -> Vec<HexCell> {
    let mut cells = Vec::with_capacity(spiral_len(radius));
    for ring in 0..=radius {
        cells.extend(ring_cells(ring));
    }
    cells
}

/// `1 + 3r(r+1)`
pub fn spiral_len(radius: u32) -> usize {
    let r = radius as usize;
    1 + 3 * r * (r + 1)
}
