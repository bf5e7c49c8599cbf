// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Layout submissions: where relocatable nodes sit, and which upgrades are bought.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalogue::Catalogue;
use crate::hex::HexCell;

/// Relocatable node name -> cell.
pub type Placement = BTreeMap<String, HexCell>;

/// Node name -> purchased level per upgrade path.
pub type UpgradeConfig = BTreeMap<String, Vec<u8>>;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("'{first}' and '{second}' both occupy {cell}")]
    CellConflict { cell: HexCell, first: String, second: String },
    #[error("unknown node '{0}'")]
    UnknownNode(String),
    #[error("'{0}' is a fixed node and cannot be placed")]
    NotRelocatable(String),
    #[error("'{node}' at {cell} lies outside grid radius {radius}")]
    OutOfBounds { node: String, cell: HexCell, radius: u32 },
    #[error("'{node}' has {given} upgrade paths configured but only {available} exist")]
    TooManyPaths { node: String, given: usize, available: usize },
    #[error("'{node}' path {path} level {level} exceeds its {max} steps")]
    LevelOutOfRange { node: String, path: usize, level: u8, max: usize },
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Layout {
    pub placement: Placement,
    #[serde(default)]
    pub upgrades: UpgradeConfig,
}

impl Layout {
    pub fn new(placement: Placement, upgrades: UpgradeConfig) -> Self {
        Self { placement, upgrades }
    }

    /// Every occupied cell, fixed nodes included. Fails on the first overlap.
    pub fn occupancy(&self, catalogue: &Catalogue) -> Result<BTreeMap<HexCell, String>, LayoutError> {
        let mut occupied: BTreeMap<HexCell, String> =
            catalogue.fixed().map(|n| (n.cell, n.name.clone())).collect();
        for (name, cell) in &self.placement {
            if let Some(first) = occupied.get(cell) {
                return Err(LayoutError::CellConflict {
                    cell: *cell,
                    first: first.clone(),
                    second: name.clone(),
                });
            }
            occupied.insert(*cell, name.clone());
        }
        Ok(occupied)
    }

    /// Reject anything that would make the simulation ambiguous.
    pub fn validate(&self, catalogue: &Catalogue, radius: u32) -> Result<(), LayoutError> {
        for (name, cell) in &self.placement {
            let def = catalogue.get(name).ok_or_else(|| LayoutError::UnknownNode(name.clone()))?;
            if def.fixed {
                return Err(LayoutError::NotRelocatable(name.clone()));
            }
            if cell.ring() > radius {
                return Err(LayoutError::OutOfBounds { node: name.clone(), cell: *cell, radius });
            }
        }
        for def in catalogue.fixed() {
            if def.cell.ring() > radius {
                return Err(LayoutError::OutOfBounds { node: def.name.clone(), cell: def.cell, radius });
            }
        }
        self.occupancy(catalogue)?;

        for (name, levels) in &self.upgrades {
            let def = catalogue.get(name).ok_or_else(|| LayoutError::UnknownNode(name.clone()))?;
            let paths = &def.upgrade_paths;
            // trailing zero levels past the last path are harmless
            let used = levels.iter().rposition(|&l| l > 0).map_or(0, |i| i + 1);
            if used > paths.len() {
                return Err(LayoutError::TooManyPaths { node: name.clone(), given: used, available: paths.len() });
            }
            for (path, (&level, steps)) in levels.iter().zip(paths).enumerate() {
                if level as usize > steps.len() {
                    return Err(LayoutError::LevelOutOfRange { node: name.clone(), path, level, max: steps.len() });
                }
            }
        }
        Ok(())
    }

    /// Total purchased upgrade levels.
    pub fn upgrade_points(&self) -> u32 {
        self.upgrades.values().flatten().map(|&l| u32::from(l)).sum()
    }

    /// Equivalent layouts compare equal: trailing zero levels and all-zero
    /// entries are dropped.
    pub fn canonical(&self) -> Layout {
        let upgrades = self
            .upgrades
            .iter()
            .filter_map(|(name, levels)| {
                let used = levels.iter().rposition(|&l| l > 0)? + 1;
                Some((name.clone(), levels[..used].to_vec()))
            })
            .collect();
        Layout { placement: self.placement.clone(), upgrades }
    }

    /// Swap the cells of two placed nodes.
    pub fn swapped(&self, a: &str, b: &str) -> Option<Layout> {
        let ca = *self.placement.get(a)?;
        let cb = *self.placement.get(b)?;
        let mut next = self.clone();
        next.placement.insert(a.to_string(), cb);
        next.placement.insert(b.to_string(), ca);
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placement(entries: &[(&str, (i32, i32))]) -> Placement {
        entries.iter().map(|(n, (q, r))| (n.to_string(), HexCell::axial(*q, *r))).collect()
    }

    #[test]
    fn valid_layout_passes() {
        let c = Catalogue::standard();
        let layout = Layout::new(
            placement(&[("Angel", (0, 0)), ("Focus", (-2, 1))]),
            UpgradeConfig::from([("EMT".to_string(), vec![3, 3]), ("Panic".to_string(), vec![3])]),
        );
        layout.validate(&c, 8).expect("test: valid");
        assert_eq!(layout.upgrade_points(), 9);
    }

    #[test]
    fn overlap_with_fixed_node_is_rejected() {
        let c = Catalogue::standard();
        let layout = Layout::new(placement(&[("Angel", (1, -1))]), UpgradeConfig::new());
        let err = layout.validate(&c, 8).unwrap_err();
        assert_eq!(
            err,
            LayoutError::CellConflict {
                cell: HexCell::axial(1, -1),
                first: "Battle Medic".into(),
                second: "Angel".into()
            }
        );
    }

    #[test]
    fn overlap_between_relocatable_nodes_is_rejected() {
        let c = Catalogue::standard();
        let layout = Layout::new(placement(&[("Angel", (0, 0)), ("Focus", (0, 0))]), UpgradeConfig::new());
        assert!(matches!(layout.validate(&c, 8), Err(LayoutError::CellConflict { .. })));
    }

    #[test]
    fn unknown_fixed_and_out_of_bounds_are_rejected() {
        let c = Catalogue::standard();
        let unknown = Layout::new(placement(&[("Ghost", (0, 0))]), UpgradeConfig::new());
        assert_eq!(unknown.validate(&c, 8), Err(LayoutError::UnknownNode("Ghost".into())));

        let fixed = Layout::new(placement(&[("EMT", (0, 0))]), UpgradeConfig::new());
        assert_eq!(fixed.validate(&c, 8), Err(LayoutError::NotRelocatable("EMT".into())));

        let far = Layout::new(placement(&[("Angel", (9, 0))]), UpgradeConfig::new());
        assert!(matches!(far.validate(&c, 8), Err(LayoutError::OutOfBounds { .. })));
    }

    #[test]
    fn upgrade_levels_are_bounded() {
        let c = Catalogue::standard();
        let over = Layout::new(Placement::new(), UpgradeConfig::from([("EMT".to_string(), vec![4, 0])]));
        assert!(matches!(over.validate(&c, 8), Err(LayoutError::LevelOutOfRange { path: 0, level: 4, .. })));

        let extra = Layout::new(Placement::new(), UpgradeConfig::from([("Panic".to_string(), vec![1, 1])]));
        assert!(matches!(extra.validate(&c, 8), Err(LayoutError::TooManyPaths { .. })));

        let padded = Layout::new(Placement::new(), UpgradeConfig::from([("Panic".to_string(), vec![1, 0, 0])]));
        padded.validate(&c, 8).expect("test: trailing zeros allowed");
    }

    #[test]
    fn canonical_drops_zero_levels() {
        let a = Layout::new(
            placement(&[("Angel", (0, 0))]),
            UpgradeConfig::from([("EMT".to_string(), vec![2, 0]), ("Triage".to_string(), vec![0, 0])]),
        );
        let b = Layout::new(placement(&[("Angel", (0, 0))]), UpgradeConfig::from([("EMT".to_string(), vec![2])]));
        assert_eq!(a.canonical(), b.canonical());
    }

    #[test]
    fn swapped_exchanges_cells() {
        let l = Layout::new(placement(&[("Angel", (0, 0)), ("Focus", (-2, 1))]), UpgradeConfig::new());
        let s = l.swapped("Angel", "Focus").expect("test: both placed");
        assert_eq!(s.placement["Angel"], HexCell::axial(-2, 1));
        assert_eq!(s.placement["Focus"], HexCell::ORIGIN);
        assert!(l.swapped("Angel", "Ghost").is_none());
    }
}
