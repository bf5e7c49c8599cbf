// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Node catalogue: the read-only set of node definitions a layout draws from.
//!
//! Catalogues are built from [`NodeRecord`]s, either the built-in standard
//! set or JSON supplied by the caller. Every record is validated up front;
//! an unknown effect or malformed parameter is a construction error.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::effects::{Effect, EffectError, EffectParams};
use crate::hex::HexCell;
use crate::layout::{Layout, Placement, UpgradeConfig};
use crate::node::{NodeDefinition, UpgradePath, UpgradeStep};
use crate::types::{Modifier, Trigger};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CatalogueError {
    #[error("catalogue JSON is malformed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("node '{node}': {source}")]
    Effect {
        node: String,
        #[source]
        source: EffectError,
    },
    #[error("node '{0}' is defined more than once")]
    DuplicateName(String),
    #[error("fixed node '{0}' has no cell")]
    MissingCell(String),
    #[error("fixed nodes '{first}' and '{second}' share cell {cell}")]
    FixedCellConflict { first: String, second: String, cell: HexCell },
    #[error("node '{0}' has no trigger categories")]
    NoTriggers(String),
    #[error("node '{node}' has capacity increase {value}; increases must be whole and non-negative")]
    InvalidCapacityIncrease { node: String, value: Decimal },
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Serialized form of a catalogue entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    pub name: String,
    /// Required for fixed nodes, ignored for relocatable ones.
    #[serde(default)]
    pub cell: Option<HexCell>,
    pub triggers: Vec<Trigger>,
    #[serde(default)]
    pub capacity: Option<u32>,
    pub effect: String,
    #[serde(default)]
    pub params: EffectParams,
    #[serde(default)]
    pub upgrade_paths: Vec<UpgradePath>,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub fixed: bool,
}

impl NodeRecord {
    fn into_definition(self) -> Result<NodeDefinition, CatalogueError> {
        let effect = Effect::from_parts(&self.effect, &self.params)
            .map_err(|source| CatalogueError::Effect { node: self.name.clone(), source })?;
        if self.triggers.is_empty() {
            return Err(CatalogueError::NoTriggers(self.name));
        }
        let cell = match (self.fixed, self.cell) {
            (true, Some(c)) => c,
            (true, None) => return Err(CatalogueError::MissingCell(self.name)),
            (false, _) => HexCell::ORIGIN,
        };
        Ok(NodeDefinition {
            name: self.name,
            cell,
            triggers: self.triggers,
            capacity: self.capacity,
            effect,
            upgrade_paths: self.upgrade_paths,
            order: self.order,
            fixed: self.fixed,
        })
    }
}

// ---------------------------------------------------------------------------
// Catalogue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Catalogue {
    nodes: Vec<Arc<NodeDefinition>>,
    by_name: HashMap<String, usize>,
}

impl Catalogue {
    pub fn from_records(records: Vec<NodeRecord>) -> Result<Self, CatalogueError> {
        let mut nodes = Vec::with_capacity(records.len());
        let mut by_name = HashMap::new();
        let mut fixed_cells: BTreeMap<HexCell, String> = BTreeMap::new();

        for record in records {
            let def = record.into_definition()?;
            if let Some(value) = def.invalid_capacity_increase() {
                return Err(CatalogueError::InvalidCapacityIncrease { node: def.name, value });
            }
            if by_name.contains_key(&def.name) {
                return Err(CatalogueError::DuplicateName(def.name));
            }
            if def.fixed {
                if let Some(first) = fixed_cells.get(&def.cell) {
                    return Err(CatalogueError::FixedCellConflict {
                        first: first.clone(),
                        second: def.name,
                        cell: def.cell,
                    });
                }
                fixed_cells.insert(def.cell, def.name.clone());
            }
            by_name.insert(def.name.clone(), nodes.len());
            nodes.push(Arc::new(def));
        }

        Ok(Self { nodes, by_name })
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogueError> {
        let records: Vec<NodeRecord> = serde_json::from_str(json)?;
        Self::from_records(records)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<NodeDefinition>> {
        self.by_name.get(name).map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<NodeDefinition>> {
        self.nodes.iter()
    }

    pub fn fixed(&self) -> impl Iterator<Item = &Arc<NodeDefinition>> {
        self.nodes.iter().filter(|n| n.fixed)
    }

    pub fn relocatable(&self) -> impl Iterator<Item = &Arc<NodeDefinition>> {
        self.nodes.iter().filter(|n| !n.fixed)
    }

    pub fn relocatable_names(&self) -> Vec<String> {
        self.relocatable().map(|n| n.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Eight fixed nodes around a trigger hub and fourteen relocatable nodes.
    pub fn standard() -> Self {
        Self::from_records(standard_records()).expect("standard catalogue records are valid")
    }
}

impl Default for Catalogue {
    fn default() -> Self {
        Self::standard()
    }
}

// ---------------------------------------------------------------------------
// Standard data
// ---------------------------------------------------------------------------

pub const HUB_NODE: &str = "Panic";

fn steps(kind: Modifier, values: &[Decimal]) -> UpgradePath {
    values.iter().map(|v| UpgradeStep::from([(kind, *v)])).collect()
}

fn params(v: Value) -> EffectParams {
    match v {
        Value::Object(map) => map.into_iter().collect(),
        _ => EffectParams::new(),
    }
}

#[allow(clippy::too_many_arguments)]
fn fixed(
    name: &str,
    cell: (i32, i32),
    trigger: Trigger,
    capacity: u32,
    effect: &str,
    effect_params: Value,
    upgrade_paths: Vec<UpgradePath>,
    order: i32,
) -> NodeRecord {
    NodeRecord {
        name: name.to_string(),
        cell: Some(HexCell::axial(cell.0, cell.1)),
        triggers: vec![trigger],
        capacity: Some(capacity),
        effect: effect.to_string(),
        params: params(effect_params),
        upgrade_paths,
        order,
        fixed: true,
    }
}

fn relocatable(name: &str, trigger: Trigger, capacity: u32, effect: &str, effect_params: Value, order: i32) -> NodeRecord {
    NodeRecord {
        name: name.to_string(),
        cell: None,
        triggers: vec![trigger],
        capacity: Some(capacity),
        effect: effect.to_string(),
        params: params(effect_params),
        upgrade_paths: Vec::new(),
        order,
        fixed: false,
    }
}

/// A hand-built layout for the standard catalogue: the chain nodes ring the
/// hub and everything else sits close to the center.
pub fn reference_layout() -> Layout {
    let cells: [(&str, (i32, i32)); 14] = [
        ("Low Point", (-3, 1)),
        ("Adrenaline", (-2, 1)),
        ("Focus", (-2, 2)),
        ("Stimulant", (-3, 3)),
        ("Extra Dose", (-4, 3)),
        ("Angel", (-4, 2)),
        ("Surgeon", (-1, 2)),
        ("Exhilaration", (0, 1)),
        ("Heroine", (-2, 3)),
        ("Deployment", (-5, 3)),
        ("Insurance Scam", (2, 0)),
        ("Funeral Rites", (0, 2)),
        ("Battle Hardened", (1, 1)),
        ("Angel of Death", (-2, 0)),
    ];
    let placement: Placement = cells.iter().map(|(n, (q, r))| (n.to_string(), HexCell::axial(*q, *r))).collect();
    Layout::new(placement, UpgradeConfig::new())
}

pub fn standard_records() -> Vec<NodeRecord> {
    use Modifier::*;
    use Trigger::*;

    let avs = |v: &[Decimal]| steps(AvsIncrease, v);
    let one = dec!(1);
    let two = dec!(2);

    vec![
        fixed(
            "Battle Medic", (1, -1), Win, 2, "add_to_qmult",
            json!({"multiplier_source": "battle_bonus"}),
            vec![
                avs(&[one, one, two]),
                vec![UpgradeStep::new(), UpgradeStep::from([(EffectMult, two)]), UpgradeStep::from([(EffectMult, dec!(3))])],
            ],
            2,
        ),
        fixed(
            "EMT", (-1, 1), Loss, 2, "reduce_qdown",
            json!({"base_reduction": 350, "bb_multiplier": 50}),
            vec![
                avs(&[one, two, dec!(3)]),
                vec![
                    UpgradeStep::from([(BbMultiplierIncrease, dec!(100))]),
                    UpgradeStep::from([(BbMultiplierIncrease, dec!(200))]),
                    UpgradeStep::from([(DepletedReductionPercent, dec!(0.03))]),
                ],
            ],
            5,
        ),
        fixed(
            "Stop the Bleeding", (0, -3), Loss, 2, "reduce_qdown_per_loss",
            json!({"base_per_loss": 6000}),
            vec![steps(PerLossIncrease, &[dec!(8500), dec!(11500), dec!(15000)]), avs(&[one, two, dec!(3)])],
            19,
        ),
        fixed(
            "Self Diagnosis", (3, -2), Win, 3, "flat_q",
            json!({"base_amount": 4500}),
            vec![steps(QIncrease, &[dec!(7000), dec!(12000)]), avs(&[one, one, two, two])],
            23,
        ),
        fixed(HUB_NODE, (-3, 2), Loss, 1, "trigger_adjacent", json!({}), vec![avs(&[one; 6])], 32),
        fixed(
            "Precision Cut", (3, -4), Loss, 1, "teammate_qdown_reduction_per_depleted",
            json!({"base_per_depleted": 500}),
            vec![steps(PerDepletedIncrease, &[dec!(750), dec!(1000), dec!(1250)]), avs(&[one, one, two])],
            40,
        ),
        fixed(
            "Triage", (4, -1), Loss, 2, "reduce_qdown_percent",
            json!({"base_percent": 0.03}),
            vec![steps(PercentIncrease, &[dec!(0.04), dec!(0.05)]), avs(&[one; 4])],
            44,
        ),
        fixed(
            "Big Sister", (-4, 1), Win, 3, "flat_q_per_teammate_class",
            json!({"base_per_teammate": 300, "teammate_class": "Gambler"}),
            vec![steps(PerTeammateIncrease, &[dec!(500), dec!(800)]), avs(&[one, one, two])],
            56,
        ),
        relocatable("Angel", Loss, 3, "q_per_qdown_prevented", json!({}), 100),
        relocatable("Exhilaration", Flip, 3, "flat_q_per_bb", json!({"q_per_bb": 100}), 101),
        relocatable("Surgeon", Flip, 3, "trigger_most_avs", json!({"num_triggers": 2}), 102),
        relocatable("Adrenaline", Loss, 3, "add_bb_and_trigger", json!({"bb_threshold_1": 5, "bb_threshold_2": 10}), 103),
        relocatable("Focus", Loss, 3, "trigger_random_adjacent", json!({}), 104),
        relocatable("Stimulant", Flip, 4, "trigger_adjacent_most_avs", json!({"num_triggers": 2}), 105),
        relocatable("Heroine", Manual, 3, "add_to_qmult", json!({"multiplier_source": "battle_bonus"}), 106),
        relocatable("Funeral Rites", Flip, 3, "xp_per_depleted", json!({"xp_per_depleted": 500}), 107),
        relocatable("Extra Dose", Loss, 2, "trigger_adjacent_most_avs", json!({"num_triggers": 3}), 108),
        relocatable("Angel of Death", Loss, 1, "multiply_qmult", json!({"multiplier": 3}), 109),
        relocatable("Low Point", Loss, 5, "trigger_adjacent_per_loss", json!({"nodes_per_loss": 2}), 110),
        relocatable("Deployment", Manual, 7, "add_bb", json!({"bb_increase": 1}), 111),
        relocatable("Insurance Scam", Manual, 2, "gold_per_qdown_prevented", json!({"qdown_per_gold": 33}), 112),
        relocatable("Battle Hardened", Loss, 3, "defence_per_bb", json!({"defence_per_bb": 2}), 113),
    ]
}
