// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Trigger-cascade simulator.
//!
//! Node instances live in an arena indexed by integer id; cell and name
//! lookups resolve to ids. A flip resets every instance, applies the base
//! currency delta, runs the `flip` pass and then the outcome pass in spiral
//! order, and finally folds pending currency through the multiplier.
//!
//! Cascades are resolved depth-first on an explicit stack, which gives the
//! same order as inline recursion while bounding depth and per-flip work.

use std::collections::HashMap;
use std::sync::Arc;

use rand::seq::index;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::catalogue::Catalogue;
use crate::effects::Cascade;
use crate::hex::{self, HexCell};
use crate::layout::{Layout, LayoutError};
use crate::node::NodeInstance;
use crate::ranks::RankTable;
use crate::state::MatchState;
use crate::types::{FlipOutcome, Trigger};

pub const DEFAULT_GRID_RADIUS: u32 = 8;
pub const DEFAULT_MAX_CASCADE_DEPTH: u32 = 32;
pub const DEFAULT_MAX_TRIGGERS_PER_FLIP: u32 = 10_000;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationOptions {
    pub grid_radius: u32,
    pub max_cascade_depth: u32,
    /// Trigger attempts (wasted ones included) allowed per flip.
    pub max_triggers_per_flip: u32,
    pub teammate_count: u32,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            grid_radius: DEFAULT_GRID_RADIUS,
            max_cascade_depth: DEFAULT_MAX_CASCADE_DEPTH,
            max_triggers_per_flip: DEFAULT_MAX_TRIGGERS_PER_FLIP,
            teammate_count: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Trace
// ---------------------------------------------------------------------------

/// One trigger attempt, recorded when tracing is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerEvent {
    pub node: usize,
    /// 0 for pass triggers, +1 per cascade hop.
    pub depth: u32,
    /// False when the node was already exhausted.
    pub fired: bool,
}

enum Frame {
    Trigger { id: usize, depth: u32 },
    /// Remaining random-neighbor draws, taken one at a time so each draw
    /// happens after the previous cascade has resolved.
    NeighborDraws { from: usize, remaining: u32, depth: u32 },
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

pub struct Simulator<'a> {
    ranks: &'a RankTable,
    options: SimulationOptions,
    nodes: Vec<NodeInstance>,
    by_cell: HashMap<HexCell, usize>,
    by_name: HashMap<String, usize>,
    /// Occupied neighbors per node, in neighbor-direction order.
    neighbors: Vec<Vec<usize>>,
    /// Node ids in spiral order.
    spiral_order: Vec<usize>,
    flip_attempts: u32,
    trace: Option<Vec<TriggerEvent>>,
}

impl<'a> Simulator<'a> {
    /// Validate `layout` and build the node arena for it.
    pub fn new(
        catalogue: &Catalogue,
        layout: &Layout,
        ranks: &'a RankTable,
        options: SimulationOptions,
    ) -> Result<Self, LayoutError> {
        layout.validate(catalogue, options.grid_radius)?;

        let mut defs: Vec<_> = catalogue.fixed().cloned().collect();
        for (name, cell) in &layout.placement {
            let def = catalogue.get(name).ok_or_else(|| LayoutError::UnknownNode(name.clone()))?;
            defs.push(Arc::new(def.relocated(*cell)));
        }
        defs.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.name.cmp(&b.name)));

        let nodes: Vec<NodeInstance> = defs
            .into_iter()
            .map(|def| {
                let levels = layout.upgrades.get(&def.name).cloned().unwrap_or_default();
                NodeInstance::new(def, levels)
            })
            .collect();

        let by_cell: HashMap<HexCell, usize> =
            nodes.iter().enumerate().map(|(i, n)| (n.definition.cell, i)).collect();
        let by_name: HashMap<String, usize> =
            nodes.iter().enumerate().map(|(i, n)| (n.name().to_string(), i)).collect();
        let neighbors = nodes
            .iter()
            .map(|n| n.definition.cell.neighbors().iter().filter_map(|c| by_cell.get(c).copied()).collect())
            .collect();
        let spiral_order = hex::spiral(options.grid_radius)
            .iter()
            .filter_map(|c| by_cell.get(c).copied())
            .collect();

        Ok(Self {
            ranks,
            options,
            nodes,
            by_cell,
            by_name,
            neighbors,
            spiral_order,
            flip_attempts: 0,
            trace: None,
        })
    }

    pub fn options(&self) -> &SimulationOptions {
        &self.options
    }

    pub fn nodes(&self) -> &[NodeInstance] {
        &self.nodes
    }

    pub fn node_id(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn node_at(&self, cell: &HexCell) -> Option<usize> {
        self.by_cell.get(cell).copied()
    }

    pub fn neighbors_of(&self, id: usize) -> &[usize] {
        &self.neighbors[id]
    }

    /// Start recording every trigger attempt.
    pub fn enable_trace(&mut self) {
        self.trace = Some(Vec::new());
    }

    pub fn take_trace(&mut self) -> Vec<TriggerEvent> {
        self.trace.as_mut().map(std::mem::take).unwrap_or_default()
    }

    /// Node ids visited by the pass for `trigger`, in spiral order.
    pub fn pass(&self, trigger: Trigger) -> impl Iterator<Item = usize> + '_ {
        self.spiral_order.iter().copied().filter(move |&id| self.nodes[id].definition.has_trigger(trigger))
    }

    pub fn depleted_count(&self) -> u32 {
        self.nodes.iter().filter(|n| n.is_depleted()).count() as u32
    }

    // -----------------------------------------------------------------------
    // Flip / match
    // -----------------------------------------------------------------------

    pub fn simulate_flip(&mut self, state: &mut MatchState, outcome: FlipOutcome, rng: &mut ChaCha8Rng) {
        for node in &mut self.nodes {
            node.reset();
        }
        self.flip_attempts = 0;
        let truncated_before = state.cascades_truncated;

        state.begin_flip(outcome, self.ranks.rewards(state.rank));

        for trigger in outcome.passes() {
            let pass: Vec<usize> = self.pass(trigger).collect();
            for id in pass {
                self.trigger(id, state, rng);
            }
        }

        state.settle_flip();

        if state.cascades_truncated > truncated_before {
            tracing::warn!(
                target: "skilltree::simulation",
                dropped = state.cascades_truncated - truncated_before,
                flip = state.flips.len(),
                "simulation.cascade.truncated"
            );
        }
    }

    /// Run `flips` from a fresh state and apply the round multiplier.
    pub fn simulate_match(&mut self, flips: &[FlipOutcome], rank: u32, rng: &mut ChaCha8Rng) -> MatchState {
        let mut state = MatchState::new(rank, self.options.teammate_count);
        for &outcome in flips {
            self.simulate_flip(&mut state, outcome, rng);
        }
        state.apply_round_multiplier();
        state
    }

    /// Attempt to trigger `root` and resolve every cascade it causes.
    pub fn trigger(&mut self, root: usize, state: &mut MatchState, rng: &mut ChaCha8Rng) {
        let mut stack = vec![Frame::Trigger { id: root, depth: 0 }];

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Trigger { id, depth } => {
                    if self.flip_attempts >= self.options.max_triggers_per_flip {
                        state.cascades_truncated += 1;
                        continue;
                    }
                    self.flip_attempts += 1;
                    if let Some(cascade) = self.fire(id, depth, state) {
                        self.push_cascade(cascade, id, depth + 1, state, rng, &mut stack);
                    }
                }
                Frame::NeighborDraws { from, remaining, depth } => {
                    let options = &self.neighbors[from];
                    if options.is_empty() {
                        continue;
                    }
                    let target = options[rng.gen_range(0..options.len())];
                    if remaining > 1 {
                        stack.push(Frame::NeighborDraws { from, remaining: remaining - 1, depth });
                    }
                    stack.push(Frame::Trigger { id: target, depth });
                }
            }
        }
    }

    /// Run one node's base transition. Returns its cascade if it fired.
    fn fire(&mut self, id: usize, depth: u32, state: &mut MatchState) -> Option<Cascade> {
        let fired = self.nodes[id].can_trigger();
        if let Some(trace) = self.trace.as_mut() {
            trace.push(TriggerEvent { node: id, depth, fired });
        }

        if !fired {
            state.wasted_triggers += 1;
            let node = &mut self.nodes[id];
            if !node.depleted_applied && node.effect.apply_depleted_bonus(state) {
                node.depleted_applied = true;
            }
            return None;
        }

        self.nodes[id].trigger_count += 1;
        state.total_triggers += 1;

        let node = &self.nodes[id];
        let depleted = if node.effect.reads_depleted_count() { self.depleted_count() } else { 0 };
        node.effect.apply(state, depleted);
        node.effect.cascade()
    }

    fn push_cascade(
        &self,
        cascade: Cascade,
        from: usize,
        depth: u32,
        state: &mut MatchState,
        rng: &mut ChaCha8Rng,
        stack: &mut Vec<Frame>,
    ) {
        if depth > self.options.max_cascade_depth {
            state.cascades_truncated += 1;
            return;
        }
        let neighbors = &self.neighbors[from];

        match cascade {
            Cascade::AllNeighbors => {
                for &id in neighbors.iter().rev() {
                    stack.push(Frame::Trigger { id, depth });
                }
            }
            Cascade::MostStocked { times } => {
                let candidates: Vec<usize> = (0..self.nodes.len()).filter(|&i| i != from).collect();
                if let Some(target) = self.most_stocked(&candidates, rng) {
                    for _ in 0..times {
                        stack.push(Frame::Trigger { id: target, depth });
                    }
                }
            }
            Cascade::MostStockedNeighbor { times } => {
                if let Some(target) = self.most_stocked(neighbors, rng) {
                    for _ in 0..times {
                        stack.push(Frame::Trigger { id: target, depth });
                    }
                }
            }
            Cascade::RandomNeighbor => {
                if !neighbors.is_empty() {
                    let id = neighbors[rng.gen_range(0..neighbors.len())];
                    stack.push(Frame::Trigger { id, depth });
                }
            }
            Cascade::RandomNeighborsByBonus { low, high } => {
                let wanted = if state.battle_bonus > high {
                    2
                } else if state.battle_bonus > low {
                    1
                } else {
                    0
                };
                let k = wanted.min(neighbors.len());
                if k > 0 {
                    let picked: Vec<usize> = index::sample(rng, neighbors.len(), k).into_iter().collect();
                    for &i in picked.iter().rev() {
                        stack.push(Frame::Trigger { id: neighbors[i], depth });
                    }
                }
            }
            Cascade::RandomNeighborPerLoss { per_loss } => {
                let draws = per_loss.saturating_mul(state.losses());
                if draws > 0 && !neighbors.is_empty() {
                    stack.push(Frame::NeighborDraws { from, remaining: draws, depth });
                }
            }
        }
    }

    /// Candidate with the most remaining stock; unlimited beats any count.
    /// Ties with stock left are broken uniformly at random; if nothing has
    /// stock left, the first candidate wins.
    fn most_stocked(&self, candidates: &[usize], rng: &mut ChaCha8Rng) -> Option<usize> {
        let stock = |id: usize| self.nodes[id].remaining().map_or(u64::MAX, u64::from);
        let best = candidates.iter().map(|&id| stock(id)).max()?;
        if best == 0 {
            return candidates.first().copied();
        }
        let tied: Vec<usize> = candidates.iter().copied().filter(|&id| stock(id) == best).collect();
        if tied.len() == 1 {
            return Some(tied[0]);
        }
        Some(tied[rng.gen_range(0..tied.len())])
    }
}
