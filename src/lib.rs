// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Skill Tree Engine ("The Grid")

pub mod hex;
pub mod types;
pub mod effects;
pub mod node;
pub mod state;
pub mod ranks;
pub mod catalogue;
pub mod layout;
pub mod simulation;
pub mod outcomes;

// Optimizer
pub mod cache;
pub mod evaluator;
pub mod generator;
pub mod search;
pub mod upgrades;
pub mod config;

pub use catalogue::{Catalogue, CatalogueError, NodeRecord, HUB_NODE};
pub use config::{OptimizerParams, ParamsError};
pub use evaluator::{EvaluationResult, EvaluatorSettings, LayoutEvaluator};
pub use hex::HexCell;
pub use layout::{Layout, LayoutError, Placement, UpgradeConfig};
pub use ranks::RankTable;
pub use simulation::{SimulationOptions, Simulator};
pub use state::MatchState;
pub use types::{FlipOutcome, Modifier, Trigger};

use std::sync::Arc;

use generator::{LayoutGenerator, NodeRoles, PlacementPlan};
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = console)]
    fn log(s: &str);
}

// ─── WASM Interface ──────────────────────────────────────────────────────────

/// Browser-facing optimizer over one catalogue and rank table.
#[wasm_bindgen]
pub struct WasmOptimizer {
    catalogue: Catalogue,
    ranks: RankTable,
    roles: NodeRoles,
    params: OptimizerParams,
}

#[wasm_bindgen]
impl WasmOptimizer {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        #[cfg(target_arch = "wasm32")]
        std::panic::set_hook(Box::new(console_error_panic_hook::hook));

        Self {
            catalogue: Catalogue::standard(),
            ranks: RankTable::standard(),
            roles: NodeRoles::standard(),
            params: OptimizerParams { parallel: false, ..Default::default() },
        }
    }

    /// Replace the node catalogue with caller-supplied JSON records.
    pub fn load_catalogue(&mut self, json: &str) -> Result<(), JsValue> {
        self.catalogue = Catalogue::from_json(json).map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(())
    }

    /// `placement` is `{name: [q, r, s]}`, `upgrades` is `{name: [level, ...]}`.
    pub fn evaluate(&self, placement: JsValue, upgrades: JsValue, rank: u32) -> Result<JsValue, JsValue> {
        let placement: Placement = serde_wasm_bindgen::from_value(placement)?;
        let upgrades: UpgradeConfig = if upgrades.is_undefined() || upgrades.is_null() {
            UpgradeConfig::new()
        } else {
            serde_wasm_bindgen::from_value(upgrades)?
        };
        let result = self
            .evaluate_layout(&Layout::new(placement, upgrades), rank)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        #[cfg(target_arch = "wasm32")]
        log(&format!("evaluated layout: min {} mean {:.0}", result.min, result.mean));
        Ok(serde_wasm_bindgen::to_value(result.as_ref())?)
    }

    /// Generate `count` layouts and return them with their evaluations,
    /// best first.
    pub fn generate_layouts(&self, count: u32, seed: u32, rank: u32) -> Result<JsValue, JsValue> {
        let results = self.generate_and_rank(count, u64::from(seed), rank).map_err(|e| JsValue::from_str(&e))?;
        let out: Vec<&EvaluationResult> = results.iter().map(Arc::as_ref).collect();
        Ok(serde_wasm_bindgen::to_value(&out)?)
    }

    pub fn outcome_labels(&self) -> Result<JsValue, JsValue> {
        Ok(serde_wasm_bindgen::to_value(&self.labels())?)
    }
}

impl Default for WasmOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

impl WasmOptimizer {
    fn checked_params(&self, rank: u32) -> Result<OptimizerParams, ParamsError> {
        let params = OptimizerParams { rank, ..self.params.clone() };
        params.validate()?;
        Ok(params)
    }

    pub fn evaluate_layout(&self, layout: &Layout, rank: u32) -> Result<Arc<EvaluationResult>, String> {
        let params = self.checked_params(rank).map_err(|e| e.to_string())?;
        let evaluator = LayoutEvaluator::new(&self.catalogue, &self.ranks, &self.roles, params.evaluator_settings());
        evaluator.evaluate(layout).map_err(|e| e.to_string())
    }

    pub fn generate_and_rank(&self, count: u32, seed: u64, rank: u32) -> Result<Vec<Arc<EvaluationResult>>, String> {
        let params = OptimizerParams { candidates: count, seed, ..self.checked_params(rank).map_err(|e| e.to_string())? };
        params.validate().map_err(|e| e.to_string())?;

        let plan = PlacementPlan::for_kind(params.generator, &self.roles);
        let generator = LayoutGenerator::new(&self.catalogue, &plan, &self.roles, params.grid_radius);
        let evaluator = LayoutEvaluator::new(&self.catalogue, &self.ranks, &self.roles, params.evaluator_settings());

        let layouts = generator.generate_many(params.candidates as usize, params.seed);
        let mut results: Vec<Arc<EvaluationResult>> =
            evaluator.evaluate_batch(&layouts).into_iter().filter_map(Result::ok).collect();
        evaluator::sort_results(&mut results);
        Ok(results)
    }

    pub fn labels(&self) -> Vec<String> {
        outcomes::enumerate(self.params.rounds_to_win, self.params.max_flips).into_iter().map(|s| s.label).collect()
    }
}
