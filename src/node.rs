// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Node definitions and per-match node instances.

use std::collections::BTreeMap;
use std::sync::Arc;

use num_traits::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::effects::Effect;
use crate::hex::HexCell;
use crate::types::{Modifier, Trigger};

/// One purchasable step of an upgrade path. An empty step is a no-op.
pub type UpgradeStep = BTreeMap<Modifier, Decimal>;

/// An ordered sequence of steps; buying level `n` buys steps `0..n`.
pub type UpgradePath = Vec<UpgradeStep>;

// ---------------------------------------------------------------------------
// NodeDefinition
// ---------------------------------------------------------------------------

/// Immutable description of a node. Relocatable nodes get a fresh
/// definition per layout via [`NodeDefinition::relocated`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeDefinition {
    pub name: String,
    pub cell: HexCell,
    pub triggers: Vec<Trigger>,
    /// `None` is unlimited.
    pub capacity: Option<u32>,
    pub effect: Effect,
    pub upgrade_paths: Vec<UpgradePath>,
    /// Tie-break order; lower sorts first.
    pub order: i32,
    pub fixed: bool,
}

impl NodeDefinition {
    pub fn has_trigger(&self, trigger: Trigger) -> bool {
        self.triggers.contains(&trigger)
    }

    pub fn relocated(&self, cell: HexCell) -> NodeDefinition {
        NodeDefinition { cell, ..self.clone() }
    }

    pub fn is_upgradeable(&self) -> bool {
        self.upgrade_paths.iter().any(|p| !p.is_empty())
    }

    /// Purchased steps for `levels`, in path order then step order.
    /// Levels beyond a path's length are clamped.
    pub fn purchased_steps<'a>(&'a self, levels: &'a [u8]) -> impl Iterator<Item = &'a UpgradeStep> + 'a {
        self.upgrade_paths.iter().enumerate().flat_map(move |(i, path)| {
            let level = levels.get(i).copied().unwrap_or(0) as usize;
            path.iter().take(level)
        })
    }

    /// Value of a replacing modifier: the last purchased step carrying it.
    pub fn modifier(&self, levels: &[u8], kind: Modifier) -> Option<Decimal> {
        self.purchased_steps(levels).filter_map(|step| step.get(&kind).copied()).last()
    }

    /// Base capacity plus every purchased capacity increase, saturating at
    /// `u32::MAX`. Increases are whole and non-negative once the catalogue
    /// has loaded.
    pub fn capacity_at(&self, levels: &[u8]) -> Option<u32> {
        let base = self.capacity?;
        Some(
            self.purchased_steps(levels)
                .filter_map(|step| step.get(&Modifier::AvsIncrease))
                .map(|d| d.to_u32().unwrap_or(u32::MAX))
                .fold(base, u32::saturating_add),
        )
    }

    /// First capacity increase that is negative, fractional or too large.
    pub fn invalid_capacity_increase(&self) -> Option<Decimal> {
        self.upgrade_paths
            .iter()
            .flatten()
            .filter_map(|step| step.get(&Modifier::AvsIncrease).copied())
            .find(|d| d.is_sign_negative() || !d.fract().is_zero() || d.to_u32().is_none())
    }
}

// ---------------------------------------------------------------------------
// NodeInstance
// ---------------------------------------------------------------------------

/// Per-match node state. Upgrades are resolved once at construction.
#[derive(Debug, Clone)]
pub struct NodeInstance {
    pub definition: Arc<NodeDefinition>,
    pub levels: Vec<u8>,
    /// The definition's effect with purchased upgrades applied.
    pub effect: Effect,
    pub capacity: Option<u32>,
    pub trigger_count: u32,
    pub depleted_applied: bool,
}

impl NodeInstance {
    pub fn new(definition: Arc<NodeDefinition>, levels: Vec<u8>) -> Self {
        let effect = definition.effect.upgraded(|kind| definition.modifier(&levels, kind));
        let capacity = definition.capacity_at(&levels);
        Self { definition, levels, effect, capacity, trigger_count: 0, depleted_applied: false }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn can_trigger(&self) -> bool {
        self.capacity.map_or(true, |cap| self.trigger_count < cap)
    }

    pub fn is_depleted(&self) -> bool {
        !self.can_trigger()
    }

    /// Remaining stock; `None` is unlimited.
    pub fn remaining(&self) -> Option<u32> {
        self.capacity.map(|cap| cap.saturating_sub(self.trigger_count))
    }

    pub fn reset(&mut self) {
        self.trigger_count = 0;
        self.depleted_applied = false;
    }
}
