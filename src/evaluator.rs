// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Full evaluation of a layout over every round outcome.

use std::cmp::Ordering;
use std::sync::Arc;

#[cfg(not(target_arch = "wasm32"))]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cache::{CacheStats, EvaluationCache};
use crate::catalogue::Catalogue;
use crate::generator::{AdjacencyScorer, NodeRoles};
use crate::layout::{Layout, LayoutError};
use crate::outcomes::{self, OutcomeRecord, OutcomeSequence, DEFAULT_MAX_FLIPS, DEFAULT_ROUNDS_TO_WIN};
use crate::ranks::RankTable;
use crate::simulation::{SimulationOptions, Simulator};

/// Resolution at which efficiency and adjacency are compared.
const SCORE_QUANTUM: f64 = 1000.0;

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Final numbers for one outcome sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeSummary {
    pub label: String,
    pub banked: i64,
    pub triggers: u32,
    pub wasted: u32,
    pub gold: i64,
    pub xp: i64,
    pub defence: i64,
    pub truncated: u32,
}

impl OutcomeSummary {
    /// Share of trigger attempts that fired; 1.0 when nothing was attempted.
    pub fn efficiency(&self) -> f64 {
        let attempts = self.triggers + self.wasted;
        if attempts == 0 {
            1.0
        } else {
            f64::from(self.triggers) / f64::from(attempts)
        }
    }
}

impl From<&OutcomeRecord> for OutcomeSummary {
    fn from(record: &OutcomeRecord) -> Self {
        let s = &record.state;
        Self {
            label: record.label.clone(),
            banked: s.banked,
            triggers: s.total_triggers,
            wasted: s.wasted_triggers,
            gold: s.gold,
            xp: s.xp,
            defence: s.defence,
            truncated: s.cascades_truncated,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub layout: Layout,
    pub outcomes: Vec<OutcomeSummary>,
    /// Worst-case banked currency.
    pub min: i64,
    pub max: i64,
    pub mean: f64,
    /// Outcomes that ended with positive currency.
    pub positive: usize,
    pub total_outcomes: usize,
    pub adjacency_score: f64,
    /// Mean per-outcome trigger efficiency.
    pub efficiency: f64,
    /// Highest per-outcome average of triggers per flip.
    pub max_triggers_per_flip: u32,
}

impl EvaluationResult {
    pub fn from_records(layout: Layout, records: &[OutcomeRecord], adjacency_score: f64) -> Self {
        let outcomes: Vec<OutcomeSummary> = records.iter().map(OutcomeSummary::from).collect();
        let n = outcomes.len();
        let banked = outcomes.iter().map(|o| o.banked);
        let (min, max) = (banked.clone().min().unwrap_or(0), banked.clone().max().unwrap_or(0));
        let (mean, efficiency) = if n == 0 {
            (0.0, 0.0)
        } else {
            (
                banked.map(|b| b as f64).sum::<f64>() / n as f64,
                outcomes.iter().map(OutcomeSummary::efficiency).sum::<f64>() / n as f64,
            )
        };
        let max_triggers_per_flip = records
            .iter()
            .filter(|r| !r.state.flips.is_empty())
            .map(|r| r.state.total_triggers / r.state.flips.len() as u32)
            .max()
            .unwrap_or(0);

        Self {
            layout,
            positive: outcomes.iter().filter(|o| o.banked > 0).count(),
            total_outcomes: n,
            outcomes,
            min,
            max,
            mean,
            adjacency_score,
            efficiency,
            max_triggers_per_flip,
        }
    }

    /// Ranking order: worst case, then efficiency, then adjacency, then mean.
    /// Efficiency and adjacency differences under 0.001 count as ties.
    /// `Greater` is better.
    pub fn compare(&self, other: &Self) -> Ordering {
        self.min
            .cmp(&other.min)
            .then_with(|| quantize(self.efficiency).cmp(&quantize(other.efficiency)))
            .then_with(|| quantize(self.adjacency_score).cmp(&quantize(other.adjacency_score)))
            .then_with(|| self.mean.total_cmp(&other.mean))
    }

    pub fn is_better(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Greater
    }

    pub fn outcome(&self, label: &str) -> Option<&OutcomeSummary> {
        self.outcomes.iter().find(|o| o.label == label)
    }
}

fn quantize(x: f64) -> i64 {
    (x * SCORE_QUANTUM).round() as i64
}

/// Best first.
pub fn sort_results(results: &mut [Arc<EvaluationResult>]) {
    results.sort_by(|a, b| b.compare(a));
}

// ---------------------------------------------------------------------------
// Evaluator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluatorSettings {
    pub rank: u32,
    pub seed: u64,
    pub rounds_to_win: u32,
    pub max_flips: u32,
    pub simulation: SimulationOptions,
    /// Fan batches out across threads on native targets.
    pub parallel: bool,
}

impl Default for EvaluatorSettings {
    fn default() -> Self {
        Self {
            rank: 1,
            seed: 42,
            rounds_to_win: DEFAULT_ROUNDS_TO_WIN,
            max_flips: DEFAULT_MAX_FLIPS,
            simulation: SimulationOptions::default(),
            parallel: true,
        }
    }
}

/// Simulates layouts over every outcome sequence and caches the results.
///
/// Each sequence draws from its own stream derived from the seed, so a
/// layout's result is the same whether it is evaluated alone, in a batch,
/// or on another thread.
pub struct LayoutEvaluator<'a> {
    catalogue: &'a Catalogue,
    ranks: &'a RankTable,
    scorer: AdjacencyScorer,
    sequences: Vec<OutcomeSequence>,
    settings: EvaluatorSettings,
    cache: EvaluationCache,
}

impl<'a> LayoutEvaluator<'a> {
    pub fn new(catalogue: &'a Catalogue, ranks: &'a RankTable, roles: &NodeRoles, settings: EvaluatorSettings) -> Self {
        Self {
            catalogue,
            ranks,
            scorer: AdjacencyScorer::new(catalogue, roles),
            sequences: outcomes::enumerate(settings.rounds_to_win, settings.max_flips),
            settings,
            cache: EvaluationCache::new(),
        }
    }

    pub fn settings(&self) -> &EvaluatorSettings {
        &self.settings
    }

    pub fn sequences(&self) -> &[OutcomeSequence] {
        &self.sequences
    }

    pub fn catalogue(&self) -> &Catalogue {
        self.catalogue
    }

    pub fn adjacency_score(&self, layout: &Layout) -> f64 {
        self.scorer.score(layout)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn evaluate(&self, layout: &Layout) -> Result<Arc<EvaluationResult>, LayoutError> {
        self.cache.get_or_try_insert_with(layout, || self.simulate(layout))
    }

    /// Evaluate every layout, preserving input order.
    pub fn evaluate_batch(&self, layouts: &[Layout]) -> Vec<Result<Arc<EvaluationResult>, LayoutError>> {
        let results: Vec<_> = self.map_layouts(layouts);
        let failed = results.iter().filter(|r| r.is_err()).count();
        let stats = self.cache.stats();
        tracing::info!(
            target: "skilltree::evaluator",
            layouts = layouts.len(),
            failed,
            cache_hits = stats.hits,
            cache_entries = stats.entries,
            "evaluator.batch.done"
        );
        results
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn map_layouts(&self, layouts: &[Layout]) -> Vec<Result<Arc<EvaluationResult>, LayoutError>> {
        if self.settings.parallel {
            layouts.par_iter().map(|l| self.evaluate(l)).collect()
        } else {
            layouts.iter().map(|l| self.evaluate(l)).collect()
        }
    }

    #[cfg(target_arch = "wasm32")]
    fn map_layouts(&self, layouts: &[Layout]) -> Vec<Result<Arc<EvaluationResult>, LayoutError>> {
        layouts.iter().map(|l| self.evaluate(l)).collect()
    }

    fn simulate(&self, layout: &Layout) -> Result<EvaluationResult, LayoutError> {
        let mut sim = Simulator::new(self.catalogue, layout, self.ranks, self.settings.simulation)?;
        let records = outcomes::run_all(&mut sim, &self.sequences, self.settings.rank, self.settings.seed);
        let result = EvaluationResult::from_records(layout.canonical(), &records, self.scorer.score(layout));
        tracing::debug!(
            target: "skilltree::evaluator",
            min = result.min,
            mean = result.mean,
            efficiency = result.efficiency,
            adjacency = result.adjacency_score,
            "evaluator.layout.done"
        );
        Ok(result)
    }
}
