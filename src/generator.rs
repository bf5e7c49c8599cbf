// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Candidate layout generation and the cheap adjacency score.
//!
//! A [`PlacementPlan`] lists relocatable nodes with a zone and a priority.
//! Nodes are placed in priority order; each draws a random free cell from
//! its zone, widening the zone one step at a time when it is full, and
//! finally taking any free cell. A draw that cannot place every node yields
//! no candidate.

use std::collections::BTreeSet;

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::catalogue::{Catalogue, HUB_NODE};
use crate::hex::{self, HexCell};
use crate::layout::{Layout, Placement, UpgradeConfig};
use crate::outcomes::stream_rng;

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

/// Which relocatable nodes play which part in a cascade build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRoles {
    /// Fixed node the chain clusters around.
    pub hub: String,
    /// Nodes whose effects trigger other nodes.
    pub chain: Vec<String>,
    /// Benefits from resolving late in a flip.
    pub delayed: Option<String>,
    /// Scored for sitting next to chain nodes.
    pub support: Vec<String>,
    /// Placed near the cluster but not in it.
    pub secondary: Vec<String>,
    /// Never swapped with chain nodes by the refiner.
    pub high_value: Vec<String>,
}

impl NodeRoles {
    pub fn standard() -> Self {
        let names = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            hub: HUB_NODE.to_string(),
            chain: names(&["Low Point", "Adrenaline", "Focus", "Stimulant", "Extra Dose"]),
            delayed: Some("Angel".to_string()),
            support: names(&["Surgeon"]),
            secondary: names(&["Surgeon", "Exhilaration"]),
            high_value: names(&["Surgeon", "Angel of Death"]),
        }
    }

    /// Chain nodes followed by the delayed node.
    pub fn cluster(&self) -> Vec<String> {
        self.chain.iter().chain(self.delayed.iter()).cloned().collect()
    }

    pub fn is_chain(&self, name: &str) -> bool {
        self.chain.iter().any(|n| n == name)
    }

    pub fn is_delayed(&self, name: &str) -> bool {
        self.delayed.as_deref() == Some(name)
    }

    /// Relocatable nodes with no positional role.
    pub fn flexible(&self, catalogue: &Catalogue) -> Vec<String> {
        catalogue
            .relocatable()
            .map(|n| n.name.clone())
            .filter(|n| !self.is_chain(n) && !self.is_delayed(n) && !self.high_value.contains(n))
            .collect()
    }

    /// The hub's cell, whether it is fixed or placed by `layout`.
    pub fn hub_cell(&self, catalogue: &Catalogue, layout: &Layout) -> Option<HexCell> {
        if let Some(cell) = layout.placement.get(&self.hub) {
            return Some(*cell);
        }
        catalogue.get(&self.hub).filter(|d| d.fixed).map(|d| d.cell)
    }
}

impl Default for NodeRoles {
    fn default() -> Self {
        Self::standard()
    }
}

// ---------------------------------------------------------------------------
// Adjacency score
// ---------------------------------------------------------------------------

/// Simulation-free ranking signal for cascade potential.
#[derive(Debug, Clone)]
pub struct AdjacencyScorer {
    hub: Option<HexCell>,
    cluster: Vec<String>,
    delayed: Option<String>,
    support: Vec<String>,
}

impl AdjacencyScorer {
    pub const HUB_ADJACENT: f64 = 10.0;
    pub const CLUSTER_PAIR: f64 = 5.0;
    pub const DELAY_CAP: f64 = 5.0;
    pub const SUPPORT_ADJACENT: f64 = 2.0;

    pub fn new(catalogue: &Catalogue, roles: &NodeRoles) -> Self {
        Self {
            hub: catalogue.get(&roles.hub).filter(|d| d.fixed).map(|d| d.cell),
            cluster: roles.cluster(),
            delayed: roles.delayed.clone(),
            support: roles.support.clone(),
        }
    }

    pub fn score(&self, layout: &Layout) -> f64 {
        let Some(hub) = self.hub else {
            return 0.0;
        };
        let cells: Vec<HexCell> = self.cluster.iter().filter_map(|n| layout.placement.get(n).copied()).collect();

        let mut score = 0.0;
        score += cells.iter().filter(|c| c.is_adjacent(&hub)).count() as f64 * Self::HUB_ADJACENT;
        for (i, a) in cells.iter().enumerate() {
            score += cells[i + 1..].iter().filter(|b| a.is_adjacent(b)).count() as f64 * Self::CLUSTER_PAIR;
        }
        if let Some(cell) = self.delayed.as_ref().and_then(|n| layout.placement.get(n)) {
            let spread = f64::from(cell.ring()) - f64::from(hub.ring());
            score += spread.min(Self::DELAY_CAP);
        }
        for support in self.support.iter().filter_map(|n| layout.placement.get(n)) {
            score += cells.iter().filter(|c| c.is_adjacent(support)).count() as f64 * Self::SUPPORT_ADJACENT;
        }
        score
    }
}

// ---------------------------------------------------------------------------
// Placement plans
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    /// Cells adjacent to the hub; widens by hub distance.
    HubAdjacent,
    /// Rings `min..=max`; widens by one ring each side.
    Rings { min: u32, max: u32 },
    Anywhere,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementRule {
    pub node: String,
    pub zone: Zone,
    /// Lower places first.
    pub priority: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorKind {
    RingPriority,
    HubCluster,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementPlan {
    pub rules: Vec<PlacementRule>,
}

impl PlacementPlan {
    pub fn for_kind(kind: GeneratorKind, roles: &NodeRoles) -> Self {
        match kind {
            GeneratorKind::RingPriority => Self::standard_rings(),
            GeneratorKind::HubCluster => Self::hub_cluster(roles),
        }
    }

    /// Delayed node far out, chain and high-value nodes in the middle rings,
    /// utility nodes close in.
    pub fn standard_rings() -> Self {
        let table: [(&str, u32, u32, u32); 14] = [
            ("Angel", 5, 8, 1),
            ("Low Point", 3, 5, 2),
            ("Focus", 2, 4, 2),
            ("Stimulant", 2, 4, 2),
            ("Extra Dose", 2, 4, 2),
            ("Surgeon", 3, 5, 3),
            ("Angel of Death", 2, 5, 3),
            ("Adrenaline", 2, 4, 3),
            ("Funeral Rites", 1, 5, 4),
            ("Exhilaration", 1, 5, 4),
            ("Battle Hardened", 1, 5, 4),
            ("Heroine", 1, 6, 5),
            ("Deployment", 1, 6, 5),
            ("Insurance Scam", 1, 6, 5),
        ];
        let rules = table
            .iter()
            .map(|&(node, min, max, priority)| PlacementRule {
                node: node.to_string(),
                zone: Zone::Rings { min, max },
                priority,
            })
            .collect();
        Self { rules }
    }

    /// Chain nodes in the hub's ring, the delayed node in rings 5-8,
    /// secondary nodes in rings 2-4, everything else anywhere.
    pub fn hub_cluster(roles: &NodeRoles) -> Self {
        let mut rules: Vec<PlacementRule> = roles
            .chain
            .iter()
            .map(|node| PlacementRule { node: node.clone(), zone: Zone::HubAdjacent, priority: 1 })
            .collect();
        if let Some(delayed) = &roles.delayed {
            rules.push(PlacementRule { node: delayed.clone(), zone: Zone::Rings { min: 5, max: 8 }, priority: 1 });
        }
        for node in &roles.secondary {
            if !rules.iter().any(|r| &r.node == node) {
                rules.push(PlacementRule { node: node.clone(), zone: Zone::Rings { min: 2, max: 4 }, priority: 2 });
            }
        }
        Self { rules }
    }

    /// Catalogue relocatables in placement order. Nodes without a rule go
    /// last, anywhere; rules for unknown or fixed nodes are ignored.
    fn resolve(&self, catalogue: &Catalogue) -> Vec<(String, Zone)> {
        let mut ruled: Vec<&PlacementRule> = self
            .rules
            .iter()
            .filter(|r| catalogue.get(&r.node).is_some_and(|d| !d.fixed))
            .collect();
        ruled.sort_by_key(|r| r.priority);

        let mut seen = BTreeSet::new();
        let mut order = Vec::new();
        for rule in ruled {
            if seen.insert(rule.node.clone()) {
                order.push((rule.node.clone(), rule.zone));
            }
        }
        for name in catalogue.relocatable_names() {
            if seen.insert(name.clone()) {
                order.push((name, Zone::Anywhere));
            }
        }
        order
    }
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

pub struct LayoutGenerator<'a> {
    catalogue: &'a Catalogue,
    order: Vec<(String, Zone)>,
    radius: u32,
    hub: Option<HexCell>,
    /// Cells not held by fixed nodes, in spiral order.
    free: Vec<HexCell>,
}

impl<'a> LayoutGenerator<'a> {
    pub fn new(catalogue: &'a Catalogue, plan: &PlacementPlan, roles: &NodeRoles, radius: u32) -> Self {
        let fixed: BTreeSet<HexCell> = catalogue.fixed().map(|d| d.cell).collect();
        let free = hex::spiral(radius).into_iter().filter(|c| !fixed.contains(c)).collect();
        Self {
            catalogue,
            order: plan.resolve(catalogue),
            radius,
            hub: catalogue.get(&roles.hub).filter(|d| d.fixed).map(|d| d.cell),
            free,
        }
    }

    /// One candidate, or `None` when the grid runs out of free cells.
    pub fn generate(&self, rng: &mut ChaCha8Rng) -> Option<Layout> {
        let mut used = BTreeSet::new();
        let mut placement = Placement::new();

        for (name, zone) in &self.order {
            let cell = self.draw(*zone, &used, rng)?;
            used.insert(cell);
            placement.insert(name.clone(), cell);
        }
        Some(Layout::new(placement, UpgradeConfig::new()))
    }

    /// Up to `count` candidates. Draw `i` uses its own stream derived from
    /// `seed`, so the result does not depend on how draws are scheduled.
    pub fn generate_many(&self, count: usize, seed: u64) -> Vec<Layout> {
        let mut out = Vec::with_capacity(count);
        for i in 0..count {
            match self.generate(&mut stream_rng(seed, i as u64)) {
                Some(layout) => out.push(layout),
                None => tracing::debug!(target: "skilltree::generator", draw = i, "generator.candidate.discarded"),
            }
        }
        tracing::info!(
            target: "skilltree::generator",
            requested = count,
            produced = out.len(),
            relocatable = self.order.len(),
            "generator.batch.done"
        );
        out
    }

    pub fn catalogue(&self) -> &Catalogue {
        self.catalogue
    }

    fn draw(&self, zone: Zone, used: &BTreeSet<HexCell>, rng: &mut ChaCha8Rng) -> Option<HexCell> {
        let mut widen = 0;
        loop {
            let Some(accepts) = self.widened(zone, widen) else {
                return self.pick(|_| true, used, rng);
            };
            if let Some(cell) = self.pick(accepts, used, rng) {
                return Some(cell);
            }
            widen += 1;
        }
    }

    /// Membership test for `zone` widened `widen` steps, or `None` once the
    /// zone has grown past the whole grid.
    fn widened(&self, zone: Zone, widen: u32) -> Option<Box<dyn Fn(&HexCell) -> bool + '_>> {
        match zone {
            Zone::Anywhere => None,
            Zone::HubAdjacent => {
                let hub = self.hub?;
                let reach = 1 + widen;
                if reach > 2 * self.radius + 1 {
                    return None;
                }
                Some(Box::new(move |c: &HexCell| c.distance(&hub) <= reach))
            }
            Zone::Rings { min, max } => {
                let lo = min.saturating_sub(widen).max(1);
                let hi = max.saturating_add(widen);
                if widen > 0 && lo <= 1 && hi >= self.radius {
                    return None;
                }
                Some(Box::new(move |c: &HexCell| (lo..=hi).contains(&c.ring())))
            }
        }
    }

    fn pick(
        &self,
        accepts: impl Fn(&HexCell) -> bool,
        used: &BTreeSet<HexCell>,
        rng: &mut ChaCha8Rng,
    ) -> Option<HexCell> {
        let options: Vec<HexCell> = self.free.iter().copied().filter(|c| !used.contains(c) && accepts(c)).collect();
        if options.is_empty() {
            return None;
        }
        Some(options[rng.gen_range(0..options.len())])
    }
}
