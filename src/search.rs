// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Greedy local search over layouts.
//!
//! Each iteration scans swap moves in priority order and takes the first
//! strictly better neighbor. Only when no swap improves are rotations of the
//! chain cluster about the hub tried. The search stops at the iteration cap
//! or after `patience` iterations without improvement.

use std::collections::BTreeSet;
use std::sync::Arc;

use rand::seq::index;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::evaluator::{EvaluationResult, LayoutEvaluator};
use crate::generator::NodeRoles;
use crate::hex::HexCell;
use crate::layout::{Layout, LayoutError};

pub const DEFAULT_MAX_ITERATIONS: u32 = 50;
pub const DEFAULT_PATIENCE: u32 = 10;
pub const DEFAULT_RANDOM_SWAPS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSettings {
    pub max_iterations: u32,
    pub patience: u32,
    /// Exploratory swaps per iteration, drawn from up to three times as many tries.
    pub random_swaps: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            patience: DEFAULT_PATIENCE,
            random_swaps: DEFAULT_RANDOM_SWAPS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveKind {
    Swap,
    Rotation,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub initial: Arc<EvaluationResult>,
    pub best: Arc<EvaluationResult>,
    pub iterations: u32,
    pub improvements: u32,
    pub neighbors_evaluated: usize,
}

impl SearchOutcome {
    pub fn min_gain(&self) -> i64 {
        self.best.min - self.initial.min
    }
}

// ---------------------------------------------------------------------------
// LocalSearch
// ---------------------------------------------------------------------------

pub struct LocalSearch<'e, 'a> {
    evaluator: &'e LayoutEvaluator<'a>,
    roles: NodeRoles,
    settings: SearchSettings,
}

impl<'e, 'a> LocalSearch<'e, 'a> {
    pub fn new(evaluator: &'e LayoutEvaluator<'a>, roles: NodeRoles, settings: SearchSettings) -> Self {
        Self { evaluator, roles, settings }
    }

    /// Hill-climb from `initial`. The returned best is never worse than the
    /// starting layout.
    pub fn refine(&self, initial: &Layout, rng: &mut ChaCha8Rng) -> Result<SearchOutcome, LayoutError> {
        let start = self.evaluator.evaluate(initial)?;
        let mut current = initial.clone();
        let mut best = start.clone();
        let mut stale = 0;
        let mut iterations = 0;
        let mut improvements = 0;
        let mut neighbors_evaluated = 0;

        while iterations < self.settings.max_iterations {
            iterations += 1;
            let mut improved = None;

            for kind in [MoveKind::Swap, MoveKind::Rotation] {
                let candidates = match kind {
                    MoveKind::Swap => self.swap_neighbors(&current, rng),
                    MoveKind::Rotation => self.rotation_neighbors(&current),
                };
                for candidate in candidates {
                    neighbors_evaluated += 1;
                    let result = self.evaluator.evaluate(&candidate)?;
                    if result.is_better(&best) {
                        improved = Some((kind, candidate, result));
                        break;
                    }
                }
                if improved.is_some() {
                    break;
                }
            }

            match improved {
                Some((kind, layout, result)) => {
                    tracing::info!(
                        target: "skilltree::search",
                        iteration = iterations,
                        kind = ?kind,
                        min = result.min,
                        mean = result.mean,
                        adjacency = result.adjacency_score,
                        "search.improved"
                    );
                    current = layout;
                    best = result;
                    improvements += 1;
                    stale = 0;
                }
                None => {
                    stale += 1;
                    if stale >= self.settings.patience {
                        tracing::debug!(target: "skilltree::search", iteration = iterations, "search.stalled");
                        break;
                    }
                }
            }
        }

        tracing::info!(
            target: "skilltree::search",
            iterations,
            improvements,
            neighbors_evaluated,
            initial_min = start.min,
            best_min = best.min,
            "search.done"
        );
        Ok(SearchOutcome { initial: start, best, iterations, improvements, neighbors_evaluated })
    }

    // -----------------------------------------------------------------------
    // Neighborhoods
    // -----------------------------------------------------------------------

    /// Swap neighbors in priority order: the delayed node toward the hub,
    /// chain with flexible nodes, chain with chain, then random pairs.
    pub fn swap_neighbors(&self, layout: &Layout, rng: &mut ChaCha8Rng) -> Vec<Layout> {
        let names: Vec<&String> = layout.placement.keys().collect();
        let chain: Vec<&String> = self.roles.chain.iter().filter(|n| layout.placement.contains_key(*n)).collect();
        let flexible: Vec<&String> = names
            .iter()
            .copied()
            .filter(|n| !self.roles.is_chain(n) && !self.roles.is_delayed(n) && !self.roles.high_value.contains(n))
            .collect();

        let mut pairs: Vec<(&str, &str)> = Vec::new();

        if let Some(delayed) = self.roles.delayed.as_ref().filter(|d| layout.placement.contains_key(*d)) {
            if let Some(hub) = self.hub_cell(layout) {
                for name in &names {
                    if *name != delayed && layout.placement[*name].is_adjacent(&hub) {
                        pairs.push((delayed.as_str(), name.as_str()));
                    }
                }
            }
            for name in &names {
                if *name != delayed && (2..=4).contains(&layout.placement[*name].ring()) {
                    pairs.push((delayed.as_str(), name.as_str()));
                }
            }
        }
        for a in &chain {
            for b in &flexible {
                pairs.push((a.as_str(), b.as_str()));
            }
        }
        for (i, a) in chain.iter().enumerate() {
            for b in &chain[i + 1..] {
                pairs.push((a.as_str(), b.as_str()));
            }
        }

        let mut out: Vec<Layout> = pairs.into_iter().filter_map(|(a, b)| self.checked(layout.swapped(a, b))).collect();

        if names.len() >= 2 && self.settings.random_swaps > 0 {
            let mut tried = BTreeSet::new();
            let mut taken = 0;
            for _ in 0..self.settings.random_swaps * 3 {
                if taken >= self.settings.random_swaps {
                    break;
                }
                let picked = index::sample(rng, names.len(), 2);
                let (i, j) = (picked.index(0).min(picked.index(1)), picked.index(0).max(picked.index(1)));
                if !tried.insert((i, j)) {
                    continue;
                }
                if let Some(next) = self.checked(layout.swapped(names[i], names[j])) {
                    out.push(next);
                    taken += 1;
                }
            }
        }
        out
    }

    /// One-step rotations about the hub, both directions, of the chain nodes
    /// touching the hub and then of the whole cluster.
    pub fn rotation_neighbors(&self, layout: &Layout) -> Vec<Layout> {
        let Some(hub) = self.hub_cell(layout) else {
            return Vec::new();
        };
        let cluster: Vec<String> =
            self.roles.cluster().into_iter().filter(|n| layout.placement.contains_key(n)).collect();
        let touching: Vec<String> =
            cluster.iter().filter(|n| layout.placement[*n].is_adjacent(&hub)).cloned().collect();

        let mut out = Vec::new();
        for group in [&touching, &cluster] {
            if group.len() < 2 {
                continue;
            }
            for steps in [1, -1] {
                if let Some(next) = self.checked(rotate_group(layout, group, &hub, steps)) {
                    out.push(next);
                }
            }
        }
        out
    }

    fn hub_cell(&self, layout: &Layout) -> Option<HexCell> {
        self.roles.hub_cell(self.evaluator.catalogue(), layout)
    }

    /// Drop neighbors that conflict or leave the grid.
    fn checked(&self, layout: Option<Layout>) -> Option<Layout> {
        let layout = layout?;
        let radius = self.evaluator.settings().simulation.grid_radius;
        layout.validate(self.evaluator.catalogue(), radius).ok()?;
        Some(layout)
    }
}

/// Rotate `group` about `center`. `None` if a rotated node would land on a
/// cell held by a node outside the group.
pub fn rotate_group(layout: &Layout, group: &[String], center: &HexCell, steps: i32) -> Option<Layout> {
    let members: BTreeSet<&str> = group.iter().map(String::as_str).collect();
    let others: BTreeSet<HexCell> = layout
        .placement
        .iter()
        .filter(|(name, _)| !members.contains(name.as_str()))
        .map(|(_, cell)| *cell)
        .collect();

    let mut next = layout.clone();
    for name in group {
        let cell = layout.placement.get(name)?.rotate(center, steps);
        if others.contains(&cell) {
            return None;
        }
        next.placement.insert(name.clone(), cell);
    }
    Some(next)
}

// ---------------------------------------------------------------------------
// Diverse selection
// ---------------------------------------------------------------------------

/// Pick up to `count` results for refinement: a quarter each of the best by
/// worst case, mean, adjacency and efficiency, then fill by worst case.
pub fn select_diverse(results: &[Arc<EvaluationResult>], count: usize) -> Vec<Arc<EvaluationResult>> {
    let by_min = ranked_by(results, |r| r.min as f64);
    let by_mean = ranked_by(results, |r| r.mean);
    let by_adjacency = ranked_by(results, |r| r.adjacency_score);
    let by_efficiency = ranked_by(results, |r| r.efficiency);

    let mut taken = BTreeSet::new();
    let mut selected = Vec::with_capacity(count.min(results.len()));
    let mut add = |order: &[usize], quota: usize, selected: &mut Vec<Arc<EvaluationResult>>| {
        let mut added = 0;
        for &i in order {
            if added >= quota || selected.len() >= count {
                break;
            }
            if taken.insert(i) {
                selected.push(results[i].clone());
                added += 1;
            }
        }
    };

    let quarter = count / 4;
    for order in [&by_min, &by_mean, &by_adjacency, &by_efficiency] {
        add(order, quarter, &mut selected);
    }
    let rest = count.saturating_sub(selected.len());
    add(&by_min, rest, &mut selected);
    selected
}

/// Indices of `results`, highest `key` first; ties keep input order.
fn ranked_by(results: &[Arc<EvaluationResult>], key: impl Fn(&EvaluationResult) -> f64) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..results.len()).collect();
    idx.sort_by(|&a, &b| key(&results[b]).total_cmp(&key(&results[a])));
    idx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::{reference_layout, Catalogue};
    use crate::evaluator::EvaluatorSettings;
    use crate::generator::{GeneratorKind, LayoutGenerator, PlacementPlan};
    use crate::ranks::RankTable;
    use rand::SeedableRng;

    fn quick() -> SearchSettings {
        SearchSettings { max_iterations: 8, patience: 3, random_swaps: 4 }
    }

    fn fixture() -> (Catalogue, RankTable) {
        (Catalogue::standard(), RankTable::standard())
    }

    #[test]
    fn refine_never_returns_a_worse_layout() {
        let (catalogue, ranks) = fixture();
        let roles = NodeRoles::standard();
        let evaluator = LayoutEvaluator::new(&catalogue, &ranks, &roles, EvaluatorSettings { rank: 15, ..Default::default() });
        let gen = LayoutGenerator::new(&catalogue, &PlacementPlan::for_kind(GeneratorKind::RingPriority, &roles), &roles, 8);
        let search = LocalSearch::new(&evaluator, roles, quick());

        for start in gen.generate_many(3, 21) {
            let outcome = search.refine(&start, &mut ChaCha8Rng::seed_from_u64(5)).expect("test: refine");
            assert_ne!(outcome.best.compare(&outcome.initial), std::cmp::Ordering::Less);
            assert!(outcome.min_gain() >= 0);
            outcome.best.layout.validate(&catalogue, 8).expect("test: refined layout is valid");
        }
    }

    #[test]
    fn refining_a_local_optimum_is_idempotent() {
        let (catalogue, ranks) = fixture();
        let roles = NodeRoles::standard();
        let evaluator = LayoutEvaluator::new(&catalogue, &ranks, &roles, EvaluatorSettings::default());
        let settings = SearchSettings { max_iterations: 500, patience: 1, random_swaps: 0 };
        let search = LocalSearch::new(&evaluator, roles, settings);

        let first = search.refine(&reference_layout(), &mut ChaCha8Rng::seed_from_u64(1)).expect("test: first");
        let second = search.refine(&first.best.layout, &mut ChaCha8Rng::seed_from_u64(1)).expect("test: second");
        assert_eq!(second.improvements, 0);
        assert_eq!(second.best.layout, first.best.layout);
    }

    #[test]
    fn swap_neighbors_follow_priority_order() {
        let (catalogue, ranks) = fixture();
        let roles = NodeRoles::standard();
        let evaluator = LayoutEvaluator::new(&catalogue, &ranks, &roles, EvaluatorSettings::default());
        let search = LocalSearch::new(&evaluator, roles, SearchSettings { random_swaps: 0, ..Default::default() });
        let layout = reference_layout();

        let swaps = search.swap_neighbors(&layout, &mut ChaCha8Rng::seed_from_u64(0));
        // first neighbor moves Angel onto another hub-adjacent cell
        let first = &swaps[0];
        assert_ne!(first.placement["Angel"], layout.placement["Angel"]);
        // 5 hub-adjacent, 11 on rings 2-4, 5 chain x 6 flexible, 10 chain pairs
        assert_eq!(swaps.len(), 5 + 11 + 30 + 10);
    }

    #[test]
    fn random_swaps_are_seeded() {
        let (catalogue, ranks) = fixture();
        let roles = NodeRoles::standard();
        let evaluator = LayoutEvaluator::new(&catalogue, &ranks, &roles, EvaluatorSettings::default());
        let search = LocalSearch::new(&evaluator, roles, SearchSettings::default());
        let layout = reference_layout();
        let a = search.swap_neighbors(&layout, &mut ChaCha8Rng::seed_from_u64(3));
        let b = search.swap_neighbors(&layout, &mut ChaCha8Rng::seed_from_u64(3));
        assert_eq!(a, b);
        assert!(a.len() > 56);
    }

    #[test]
    fn rotations_turn_the_hub_ring() {
        let (catalogue, ranks) = fixture();
        let roles = NodeRoles::standard();
        let evaluator = LayoutEvaluator::new(&catalogue, &ranks, &roles, EvaluatorSettings::default());
        let search = LocalSearch::new(&evaluator, roles.clone(), SearchSettings::default());
        let layout = reference_layout();
        let hub = catalogue.get(&roles.hub).expect("test: hub").cell;

        let rotations = search.rotation_neighbors(&layout);
        // the whole cluster rings the hub, so both groups coincide
        assert_eq!(rotations.len(), 4);
        for r in &rotations {
            for name in roles.cluster() {
                assert!(r.placement[&name].is_adjacent(&hub));
            }
            let cells: BTreeSet<HexCell> = roles.cluster().iter().map(|n| r.placement[n]).collect();
            assert_eq!(cells.len(), 6);
        }
        assert_ne!(rotations[0], rotations[1]);
    }

    #[test]
    fn rotation_onto_an_outside_node_is_rejected() {
        let layout = Layout::new(
            [("A", (1, 0)), ("B", (1, -1)), ("C", (-1, 1))]
                .iter()
                .map(|(n, (q, r))| (n.to_string(), HexCell::axial(*q, *r)))
                .collect(),
            Default::default(),
        );
        // rotating A one step lands where B sits
        assert_eq!(HexCell::axial(1, 0).rotate(&HexCell::ORIGIN, 1), HexCell::axial(1, -1));
        assert!(rotate_group(&layout, &["A".to_string()], &HexCell::ORIGIN, 1).is_none());
        // rotating A and B together is fine as long as C is not hit
        let both = rotate_group(&layout, &["A".to_string(), "B".to_string()], &HexCell::ORIGIN, 1)
            .expect("test: rotation");
        assert_eq!(both.placement["A"], HexCell::axial(1, -1));
        assert_eq!(both.placement["B"], HexCell::axial(0, -1));
        assert_eq!(both.placement["C"], HexCell::axial(-1, 1));
    }

    #[test]
    fn diverse_selection_draws_from_each_ranking() {
        let mk = |min: i64, mean: f64, adjacency: f64, efficiency: f64| {
            Arc::new(EvaluationResult {
                layout: Layout::default(),
                outcomes: Vec::new(),
                min,
                max: min,
                mean,
                positive: 0,
                total_outcomes: 0,
                adjacency_score: adjacency,
                efficiency,
                max_triggers_per_flip: 0,
            })
        };
        let results = vec![
            mk(10, 0.0, 0.0, 0.0),
            mk(0, 99.0, 0.0, 0.0),
            mk(0, 0.0, 99.0, 0.0),
            mk(0, 0.0, 0.0, 0.9),
            mk(5, 0.0, 0.0, 0.0),
            mk(1, 0.0, 0.0, 0.0),
        ];
        let picked = select_diverse(&results, 5);
        let mins: Vec<i64> = picked.iter().map(|r| r.min).collect();
        assert_eq!(picked.len(), 5);
        assert_eq!(picked[0].min, 10);
        assert_eq!(picked[1].mean, 99.0);
        assert_eq!(picked[2].adjacency_score, 99.0);
        assert_eq!(picked[3].efficiency, 0.9);
        assert_eq!(mins[4], 5);

        assert!(select_diverse(&results[..2], 10).len() == 2);
        assert!(select_diverse(&results, 0).is_empty());
    }
}
