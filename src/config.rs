// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Optimizer parameters.
//!
//! Every bound is checked by [`OptimizerParams::validate`] before any
//! simulation work starts.

use serde::{Deserialize, Serialize};

use crate::evaluator::EvaluatorSettings;
use crate::generator::GeneratorKind;
use crate::search::SearchSettings;
use crate::simulation::SimulationOptions;
use crate::upgrades::UpgradeStrategy;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ParamsError {
    #[error("{name} = {value} is outside {min}..={max}")]
    OutOfRange { name: &'static str, value: i64, min: i64, max: i64 },
    #[error("optimizer config JSON is malformed: {0}")]
    Json(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// OptimizerParams
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerParams {
    pub rank: u32,
    /// Layouts generated per run, or per upgrade config.
    pub candidates: u32,
    pub seed: u64,
    pub max_iterations: u32,
    /// Consecutive non-improving iterations before the search stops.
    pub patience: u32,
    /// Upgrade points to spend.
    pub budget: u32,
    /// Candidates handed to local search.
    pub refine_top: u32,
    /// Layouts evaluated per upgrade config.
    pub layouts_per_config: u32,
    pub upgrade_strategy: UpgradeStrategy,
    /// Cap on upgrade configs produced by either strategy.
    pub upgrade_samples: u32,
    pub generator: GeneratorKind,
    pub rounds_to_win: u32,
    pub max_flips: u32,
    pub grid_radius: u32,
    pub teammate_count: u32,
    pub parallel: bool,
}

impl Default for OptimizerParams {
    fn default() -> Self {
        Self {
            rank: 31,
            candidates: 100,
            seed: 42,
            max_iterations: 50,
            patience: 10,
            budget: 18,
            refine_top: 10,
            layouts_per_config: 20,
            upgrade_strategy: UpgradeStrategy::Tiered,
            upgrade_samples: 100,
            generator: GeneratorKind::HubCluster,
            rounds_to_win: 3,
            max_flips: 5,
            grid_radius: 8,
            teammate_count: 0,
            parallel: true,
        }
    }
}

fn check(name: &'static str, value: u32, min: u32, max: u32) -> Result<(), ParamsError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ParamsError::OutOfRange { name, value: value.into(), min: min.into(), max: max.into() })
    }
}

impl OptimizerParams {
    pub fn from_json(json: &str) -> Result<Self, ParamsError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        check("rank", self.rank, 1, 40)?;
        check("candidates", self.candidates, 1, 1000)?;
        check("max_iterations", self.max_iterations, 1, 500)?;
        check("patience", self.patience, 1, 100)?;
        check("budget", self.budget, 0, 100)?;
        check("refine_top", self.refine_top, 1, 50)?;
        check("layouts_per_config", self.layouts_per_config, 1, 100)?;
        check("upgrade_samples", self.upgrade_samples, 1, 10_000)?;
        check("rounds_to_win", self.rounds_to_win, 1, 5)?;
        // a first-to-N round always ends within 2N-1 flips
        check("max_flips", self.max_flips, self.rounds_to_win, 2 * self.rounds_to_win - 1)?;
        check("grid_radius", self.grid_radius, 1, 12)?;
        check("teammate_count", self.teammate_count, 0, 5)?;
        Ok(())
    }

    pub fn simulation_options(&self) -> SimulationOptions {
        SimulationOptions { grid_radius: self.grid_radius, teammate_count: self.teammate_count, ..Default::default() }
    }

    pub fn evaluator_settings(&self) -> EvaluatorSettings {
        EvaluatorSettings {
            rank: self.rank,
            seed: self.seed,
            rounds_to_win: self.rounds_to_win,
            max_flips: self.max_flips,
            simulation: self.simulation_options(),
            parallel: self.parallel,
        }
    }

    pub fn search_settings(&self) -> SearchSettings {
        SearchSettings { max_iterations: self.max_iterations, patience: self.patience, ..Default::default() }
    }
}
