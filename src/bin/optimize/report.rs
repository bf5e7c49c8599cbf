// Skill Tree Optimizer Report Types
// Structured output for offline comparison of optimizer runs

use serde::Serialize;
use skilltree_engine::cache::CacheStats;
use skilltree_engine::{EvaluationResult, OptimizerParams, UpgradeConfig};

// ─── Statistics (per-metric aggregation over candidates) ────────────────────

/// z-score of a two-sided 95% normal interval.
const Z_95: f64 = 1.96;

/// Spread of one currency metric across a batch: each sample is a single
/// candidate's worst-case or mean banked currency over every outcome
/// sequence. The interval brackets the batch mean, not any one layout.
#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub mean: f64,
    pub std_dev: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub min: f64,
    pub max: f64,
    pub n: usize,
}

impl Stats {
    pub fn from_samples(samples: &[f64]) -> Self {
        let n = samples.len();
        if n == 0 {
            return Self { mean: 0.0, std_dev: 0.0, ci_lower: 0.0, ci_upper: 0.0, min: 0.0, max: 0.0, n: 0 };
        }
        let mean = samples.iter().sum::<f64>() / n as f64;
        let variance = if n > 1 {
            samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
        } else {
            0.0
        };
        let std_dev = variance.sqrt();
        let half_width = Z_95 * std_dev / (n as f64).sqrt();
        Self {
            mean,
            std_dev,
            ci_lower: mean - half_width,
            ci_upper: mean + half_width,
            min: samples.iter().copied().fold(f64::INFINITY, f64::min),
            max: samples.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            n,
        }
    }
}

// ─── Layout Mode ────────────────────────────────────────────────────────────

/// One refined candidate.
#[derive(Debug, Clone, Serialize)]
pub struct RefinedLayout {
    pub initial_min: i64,
    pub iterations: u32,
    pub improvements: u32,
    pub neighbors_evaluated: usize,
    pub result: EvaluationResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct LayoutRun {
    pub generated: usize,
    pub evaluated: usize,
    pub rejected: usize,
    /// Worst-case currency across the generated batch, before refinement.
    pub batch_min: Stats,
    pub batch_mean: Stats,
    pub refined: Vec<RefinedLayout>,
    pub cache: CacheStats,
}

// ─── Upgrade Mode ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct UpgradeCandidate {
    pub upgrades: UpgradeConfig,
    pub points: u32,
    pub layouts_evaluated: usize,
    pub best: EvaluationResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpgradeRun {
    pub configs: usize,
    pub best_min: Stats,
    pub ranked: Vec<UpgradeCandidate>,
    pub cache: CacheStats,
}

// ─── Outcome Mode ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct OutcomeLine {
    pub label: String,
    pub wins: u32,
    pub losses: u32,
    pub round_won: bool,
}

// ─── Top-Level Report ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ModeReport {
    Layouts(LayoutRun),
    Upgrades(UpgradeRun),
    Outcomes { sequences: Vec<OutcomeLine> },
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub timestamp: String,
    pub version: &'static str,
    pub prng: &'static str,
    pub rank_name: String,
    pub params: OptimizerParams,
    pub elapsed_ms: u128,
    #[serde(flatten)]
    pub run: ModeReport,
}
