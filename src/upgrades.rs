// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Upgrade budget allocation.
//!
//! Two strategies produce [`UpgradeConfig`]s for a point budget: an
//! exhaustive backtracking enumeration over every upgradeable node, and a
//! tiered plan that walks hand-ranked options for the nodes that matter
//! most and stops once enough samples are collected. Levels whose last
//! purchased step is a no-op are never produced; they cost a point and
//! change nothing.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalogue::{Catalogue, HUB_NODE};
use crate::layout::UpgradeConfig;
use crate::node::NodeDefinition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeStrategy {
    #[default]
    Tiered,
    Exhaustive,
}

/// Points spent by a level vector.
pub fn cost(levels: &[u8]) -> u32 {
    levels.iter().map(|&l| u32::from(l)).sum()
}

/// Points spent by a whole config.
pub fn config_cost(config: &UpgradeConfig) -> u32 {
    config.values().map(|l| cost(l)).sum()
}

// ---------------------------------------------------------------------------
// UpgradeSpace
// ---------------------------------------------------------------------------

/// The upgradeable nodes of a catalogue, in catalogue order.
#[derive(Debug, Clone)]
pub struct UpgradeSpace {
    nodes: Vec<Arc<NodeDefinition>>,
}

impl UpgradeSpace {
    pub fn new(catalogue: &Catalogue) -> Self {
        Self { nodes: catalogue.iter().filter(|d| d.is_upgradeable()).cloned().collect() }
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Arc<NodeDefinition>> {
        self.nodes.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<NodeDefinition>> {
        self.nodes.iter().find(|d| d.name == name)
    }

    /// Total levels purchasable across every node.
    pub fn max_points(&self) -> u32 {
        self.nodes.iter().flat_map(|d| d.upgrade_paths.iter()).map(|p| p.len() as u32).sum()
    }

    /// True if some path's last purchased step is empty.
    pub fn ends_on_noop(def: &NodeDefinition, levels: &[u8]) -> bool {
        def.upgrade_paths.iter().zip(levels).any(|(path, &level)| {
            level > 0 && path.get(level as usize - 1).is_some_and(|step| step.is_empty())
        })
    }

    /// Every admissible level vector for `def` costing at most `budget`,
    /// earlier paths varying slowest.
    fn level_vectors(def: &NodeDefinition, budget: u32) -> Vec<Vec<u8>> {
        let caps: Vec<u8> = def.upgrade_paths.iter().map(|p| p.len().min(u8::MAX as usize) as u8).collect();
        let mut out = Vec::new();
        let mut current = Vec::with_capacity(caps.len());
        splits_within(&caps, budget, &mut current, &mut out);
        out.retain(|levels| !Self::ends_on_noop(def, levels));
        out
    }

    // -----------------------------------------------------------------------
    // Exhaustive
    // -----------------------------------------------------------------------

    /// Backtracking enumeration of configs costing at most `options.budget`.
    pub fn exhaustive(&self, options: &ExhaustiveOptions) -> Vec<UpgradeConfig> {
        let mut out = Vec::new();
        let mut partial = UpgradeConfig::new();
        self.enumerate(0, options.budget, options, &mut partial, &mut out);
        tracing::info!(
            target: "skilltree::upgrades",
            strategy = "exhaustive",
            budget = options.budget,
            configs = out.len(),
            truncated = out.len() >= options.limit,
            "upgrades.enumerated"
        );
        out
    }

    fn enumerate(
        &self,
        index: usize,
        remaining: u32,
        options: &ExhaustiveOptions,
        partial: &mut UpgradeConfig,
        out: &mut Vec<UpgradeConfig>,
    ) {
        if out.len() >= options.limit {
            return;
        }
        let Some(def) = self.nodes.get(index) else {
            if !options.exact || remaining == 0 {
                out.push(partial.clone());
            }
            return;
        };
        let floor = options.min_capacity.get(&def.name).copied();

        for levels in Self::level_vectors(def, remaining) {
            if let Some(floor) = floor {
                if def.capacity_at(&levels).map_or(false, |c| c < floor) {
                    continue;
                }
            }
            let spent = cost(&levels);
            if spent > 0 {
                partial.insert(def.name.clone(), levels);
            }
            self.enumerate(index + 1, remaining - spent, options, partial, out);
            partial.remove(&def.name);
            if out.len() >= options.limit {
                return;
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExhaustiveOptions {
    pub budget: u32,
    /// Minimum activation stock per node after upgrades.
    pub min_capacity: BTreeMap<String, u32>,
    /// Only keep configs that spend the whole budget.
    pub exact: bool,
    pub limit: usize,
}

impl ExhaustiveOptions {
    /// The hub keeps at least four activations.
    pub fn standard(budget: u32) -> Self {
        Self {
            budget,
            min_capacity: BTreeMap::from([(HUB_NODE.to_string(), 4)]),
            exact: false,
            limit: 100_000,
        }
    }
}

/// Push every split of at most `budget` points over `caps` into `out`.
fn splits_within(caps: &[u8], budget: u32, current: &mut Vec<u8>, out: &mut Vec<Vec<u8>>) {
    let Some((&cap, rest)) = caps.split_first() else {
        out.push(current.clone());
        return;
    };
    for level in 0..=cap.min(budget.min(u8::MAX as u32) as u8) {
        current.push(level);
        splits_within(rest, budget - u32::from(level), current, out);
        current.pop();
    }
}

/// Every split of exactly `total` points over `caps`, earlier paths ascending.
fn splits_exact(caps: &[u8], total: u32) -> Vec<Vec<u8>> {
    let mut all = Vec::new();
    splits_within(caps, total, &mut Vec::with_capacity(caps.len()), &mut all);
    all.retain(|levels| cost(levels) == total);
    all
}

// ---------------------------------------------------------------------------
// Tiered plan
// ---------------------------------------------------------------------------

/// Hand-ranked level vectors for one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    pub node: String,
    pub options: Vec<Vec<u8>>,
}

/// Spend up to `max_total` leftover points on one node, split across its
/// paths within `caps`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fill {
    pub node: String,
    pub max_total: u32,
    pub caps: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TieredPlan {
    pub tiers: Vec<Tier>,
    pub fills: Vec<Fill>,
}

impl TieredPlan {
    /// Max the hub first, invest heavily in loss reduction, then spread
    /// what is left over the multiplier and percentage nodes.
    pub fn standard() -> Self {
        let tier = |node: &str, options: &[&[u8]]| Tier {
            node: node.to_string(),
            options: options.iter().map(|o| o.to_vec()).collect(),
        };
        Self {
            tiers: vec![
                tier(HUB_NODE, &[&[6], &[5], &[4]]),
                tier("EMT", &[&[3, 3], &[3, 2], &[2, 3], &[3, 1], &[1, 3]]),
                tier("Stop the Bleeding", &[&[2, 1], &[0, 3], &[3, 0], &[1, 2]]),
                tier("Self Diagnosis", &[&[2, 0], &[0, 2], &[1, 1], &[0, 0]]),
            ],
            fills: vec![
                Fill { node: "Battle Medic".to_string(), max_total: 5, caps: vec![3, 3] },
                Fill { node: "Triage".to_string(), max_total: 6, caps: vec![2, 4] },
            ],
        }
    }

    /// Configs spending exactly `budget`, in plan order, at most `samples`.
    /// Tiers and fills naming nodes outside `space` are skipped.
    pub fn generate(&self, space: &UpgradeSpace, budget: u32, samples: usize) -> Vec<UpgradeConfig> {
        let tiers: Vec<(&Arc<NodeDefinition>, &Tier)> =
            self.tiers.iter().filter_map(|t| space.get(&t.node).map(|d| (d, t))).collect();
        let fills: Vec<(&Arc<NodeDefinition>, &Fill)> =
            self.fills.iter().filter_map(|f| space.get(&f.node).map(|d| (d, f))).collect();

        let mut walk = TieredWalk { tiers, fills, budget, samples, out: Vec::new() };
        walk.tier(0, budget, &mut UpgradeConfig::new());
        tracing::info!(
            target: "skilltree::upgrades",
            strategy = "tiered",
            budget,
            configs = walk.out.len(),
            "upgrades.enumerated"
        );
        walk.out
    }
}

impl Default for TieredPlan {
    fn default() -> Self {
        Self::standard()
    }
}

struct TieredWalk<'p> {
    tiers: Vec<(&'p Arc<NodeDefinition>, &'p Tier)>,
    fills: Vec<(&'p Arc<NodeDefinition>, &'p Fill)>,
    budget: u32,
    samples: usize,
    out: Vec<UpgradeConfig>,
}

impl TieredWalk<'_> {
    fn full(&self) -> bool {
        self.out.len() >= self.samples
    }

    fn tier(&mut self, index: usize, remaining: u32, partial: &mut UpgradeConfig) {
        let Some(&(def, tier)) = self.tiers.get(index) else {
            self.fill(0, remaining, partial);
            return;
        };
        for levels in &tier.options {
            let spent = cost(levels);
            if spent > remaining || levels.len() > def.upgrade_paths.len() {
                continue;
            }
            if UpgradeSpace::ends_on_noop(def, levels) {
                continue;
            }
            insert_nonzero(partial, &def.name, levels);
            self.tier(index + 1, remaining - spent, partial);
            partial.remove(&def.name);
            if self.full() {
                return;
            }
        }
    }

    fn fill(&mut self, index: usize, remaining: u32, partial: &mut UpgradeConfig) {
        if self.full() {
            return;
        }
        let Some(&(def, fill)) = self.fills.get(index) else {
            if config_cost(partial) == self.budget {
                self.out.push(partial.clone());
            }
            return;
        };
        let caps: Vec<u8> = fill
            .caps
            .iter()
            .zip(&def.upgrade_paths)
            .map(|(&cap, path)| cap.min(path.len().min(u8::MAX as usize) as u8))
            .collect();
        for total in 0..=remaining.min(fill.max_total) {
            for levels in splits_exact(&caps, total) {
                if UpgradeSpace::ends_on_noop(def, &levels) {
                    continue;
                }
                insert_nonzero(partial, &def.name, &levels);
                self.fill(index + 1, remaining - total, partial);
                partial.remove(&def.name);
                if self.full() {
                    return;
                }
            }
        }
    }
}

fn insert_nonzero(config: &mut UpgradeConfig, name: &str, levels: &[u8]) {
    if cost(levels) > 0 {
        config.insert(name.to_string(), levels.to_vec());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Layout;

    fn space() -> UpgradeSpace {
        UpgradeSpace::new(&Catalogue::standard())
    }

    fn unbounded(budget: u32) -> ExhaustiveOptions {
        ExhaustiveOptions { budget, min_capacity: BTreeMap::new(), exact: false, limit: usize::MAX }
    }

    #[test]
    fn every_fixed_node_is_upgradeable() {
        let s = space();
        assert_eq!(s.nodes().count(), 8);
        assert!(s.get("Angel").is_none());
        // 6+6+6+6+6+6+6+5
        assert_eq!(s.max_points(), 47);
    }

    #[test]
    fn single_point_budget_skips_the_noop_step() {
        let configs = space().exhaustive(&unbounded(1));
        // the empty config plus one first step per path, minus the no-op path
        assert_eq!(configs.len(), 1 + (8 * 2 - 1) - 1);
        assert!(configs.iter().all(|c| config_cost(c) <= 1));
        assert!(!configs.iter().any(|c| c.get("Battle Medic") == Some(&vec![0, 1])));
        assert!(configs.iter().any(|c| c.get("Battle Medic") == Some(&vec![1, 0])));
    }

    #[test]
    fn hub_floor_is_enforced() {
        let s = space();
        let configs = s.exhaustive(&ExhaustiveOptions::standard(3));
        assert_eq!(configs, vec![UpgradeConfig::from([(HUB_NODE.to_string(), vec![3])])]);

        let configs = s.exhaustive(&ExhaustiveOptions::standard(4));
        assert!(configs.iter().all(|c| c.get(HUB_NODE).is_some_and(|l| l[0] >= 3)));
        // hub at 4 alone, hub at 3 alone, hub at 3 plus one first step elsewhere
        assert_eq!(configs.len(), 1 + 1 + 13);
    }

    #[test]
    fn exact_and_limit_options() {
        let s = space();
        let exact = s.exhaustive(&ExhaustiveOptions { exact: true, ..unbounded(2) });
        assert!(!exact.is_empty());
        assert!(exact.iter().all(|c| config_cost(c) == 2));

        let capped = s.exhaustive(&ExhaustiveOptions { limit: 7, ..unbounded(5) });
        assert_eq!(capped.len(), 7);
    }

    #[test]
    fn exhaustive_configs_validate() {
        let catalogue = Catalogue::standard();
        for config in space().exhaustive(&ExhaustiveOptions { limit: 500, ..ExhaustiveOptions::standard(8) }) {
            let layout = Layout::new(Default::default(), config);
            layout.validate(&catalogue, 8).expect("test: enumerated config is valid");
        }
    }

    #[test]
    fn tiered_plan_spends_the_whole_budget() {
        let catalogue = Catalogue::standard();
        let configs = TieredPlan::standard().generate(&space(), 18, 100);
        assert!(!configs.is_empty() && configs.len() <= 100);
        for config in &configs {
            assert_eq!(config_cost(config), 18);
            assert!(config[HUB_NODE][0] >= 4);
            assert!(config.get("Battle Medic").map_or(true, |l| l[1] != 1));
            Layout::new(Default::default(), config.clone()).validate(&catalogue, 8).expect("test: tiered config");
        }
        let first = &configs[0];
        assert_eq!(first[HUB_NODE], vec![6]);
        assert_eq!(first["EMT"], vec![3, 3]);
        assert_eq!(first["Stop the Bleeding"], vec![2, 1]);
        assert_eq!(first["Self Diagnosis"], vec![2, 0]);
        assert_eq!(first["Triage"], vec![0, 1]);
        assert!(!first.contains_key("Battle Medic"));
    }

    #[test]
    fn tiered_plan_stops_at_the_sample_target() {
        let configs = TieredPlan::standard().generate(&space(), 18, 3);
        assert_eq!(configs.len(), 3);
        // a budget too small for any hub option produces nothing
        assert!(TieredPlan::standard().generate(&space(), 3, 10).is_empty());
    }
}
