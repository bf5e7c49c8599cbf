// Optimizer pipelines: layout search, upgrade allocation, outcome listing

use std::cmp::Ordering;
use std::sync::Arc;

use skilltree_engine::evaluator::EvaluationResult;
use skilltree_engine::generator::{LayoutGenerator, NodeRoles, PlacementPlan};
use skilltree_engine::outcomes::{self, stream_rng};
use skilltree_engine::search::{select_diverse, LocalSearch};
use skilltree_engine::upgrades::{self, ExhaustiveOptions, TieredPlan, UpgradeSpace, UpgradeStrategy};
use skilltree_engine::{Catalogue, Layout, LayoutEvaluator, OptimizerParams, RankTable};

use crate::report::*;

pub struct Context {
    pub catalogue: Catalogue,
    pub ranks: RankTable,
    pub roles: NodeRoles,
    pub params: OptimizerParams,
}

impl Context {
    fn evaluator(&self) -> LayoutEvaluator<'_> {
        LayoutEvaluator::new(&self.catalogue, &self.ranks, &self.roles, self.params.evaluator_settings())
    }

    fn generator(&self) -> LayoutGenerator<'_> {
        let plan = PlacementPlan::for_kind(self.params.generator, &self.roles);
        LayoutGenerator::new(&self.catalogue, &plan, &self.roles, self.params.grid_radius)
    }
}

/// Split batch results into accepted evaluations and a rejection count.
fn accepted(results: Vec<Result<Arc<EvaluationResult>, skilltree_engine::LayoutError>>) -> (Vec<Arc<EvaluationResult>>, usize) {
    let mut ok = Vec::with_capacity(results.len());
    let mut rejected = 0;
    for r in results {
        match r {
            Ok(result) => ok.push(result),
            Err(e) => {
                rejected += 1;
                tracing::debug!(target: "skilltree::optimize", error = %e, "optimize.layout.rejected");
            }
        }
    }
    (ok, rejected)
}

// ─── Layout Mode ────────────────────────────────────────────────────────────

pub fn run_layouts(ctx: &Context) -> Result<LayoutRun, String> {
    let params = &ctx.params;
    let evaluator = ctx.evaluator();

    let layouts = ctx.generator().generate_many(params.candidates as usize, params.seed);
    let generated = layouts.len();
    if generated == 0 {
        return Err("the generator could not place any candidate layout".to_string());
    }

    let (results, rejected) = accepted(evaluator.evaluate_batch(&layouts));
    let mins: Vec<f64> = results.iter().map(|r| r.min as f64).collect();
    let means: Vec<f64> = results.iter().map(|r| r.mean).collect();

    let seeds = select_diverse(&results, params.refine_top as usize);
    tracing::info!(
        target: "skilltree::optimize",
        generated,
        evaluated = results.len(),
        refining = seeds.len(),
        "optimize.batch.evaluated"
    );

    let search = LocalSearch::new(&evaluator, ctx.roles.clone(), params.search_settings());
    let mut refined = Vec::with_capacity(seeds.len());
    for (i, seed) in seeds.iter().enumerate() {
        let mut rng = stream_rng(params.seed, i as u64);
        let outcome = search.refine(&seed.layout, &mut rng).map_err(|e| e.to_string())?;
        refined.push(outcome);
    }
    refined.sort_by(|a, b| b.best.compare(&a.best));

    Ok(LayoutRun {
        generated,
        evaluated: results.len(),
        rejected,
        batch_min: Stats::from_samples(&mins),
        batch_mean: Stats::from_samples(&means),
        refined: refined
            .into_iter()
            .map(|o| RefinedLayout {
                initial_min: o.initial.min,
                iterations: o.iterations,
                improvements: o.improvements,
                neighbors_evaluated: o.neighbors_evaluated,
                result: EvaluationResult::clone(&o.best),
            })
            .collect(),
        cache: evaluator.cache_stats(),
    })
}

// ─── Upgrade Mode ───────────────────────────────────────────────────────────

/// Upgrade ranking: worst case, then efficiency, then peak triggers per
/// flip, then mean.
fn compare_upgrades(a: &EvaluationResult, b: &EvaluationResult) -> Ordering {
    a.min
        .cmp(&b.min)
        .then_with(|| a.efficiency.total_cmp(&b.efficiency))
        .then_with(|| a.max_triggers_per_flip.cmp(&b.max_triggers_per_flip))
        .then_with(|| a.mean.total_cmp(&b.mean))
}

pub fn run_upgrades(ctx: &Context) -> Result<UpgradeRun, String> {
    let params = &ctx.params;
    let space = UpgradeSpace::new(&ctx.catalogue);
    let samples = params.upgrade_samples as usize;
    let configs = match params.upgrade_strategy {
        UpgradeStrategy::Tiered => TieredPlan::standard().generate(&space, params.budget, samples),
        UpgradeStrategy::Exhaustive => {
            space.exhaustive(&ExhaustiveOptions { limit: samples, ..ExhaustiveOptions::standard(params.budget) })
        }
    };
    if configs.is_empty() {
        return Err(format!("no upgrade configuration fits a budget of {}", params.budget));
    }

    let evaluator = ctx.evaluator();
    let generator = ctx.generator();
    let mut ranked = Vec::with_capacity(configs.len());

    for (i, config) in configs.iter().enumerate() {
        let layouts: Vec<Layout> = generator
            .generate_many(params.layouts_per_config as usize, params.seed.wrapping_add(i as u64))
            .into_iter()
            .map(|l| Layout::new(l.placement, config.clone()))
            .collect();
        let (results, _) = accepted(evaluator.evaluate_batch(&layouts));
        let Some(best) = results.iter().max_by(|a, b| a.compare(b)) else {
            continue;
        };
        tracing::debug!(
            target: "skilltree::optimize",
            config = i,
            points = upgrades::config_cost(config),
            min = best.min,
            "optimize.upgrade.scored"
        );
        ranked.push(UpgradeCandidate {
            upgrades: config.clone(),
            points: upgrades::config_cost(config),
            layouts_evaluated: results.len(),
            best: EvaluationResult::clone(best),
        });
    }

    ranked.sort_by(|a, b| compare_upgrades(&b.best, &a.best));
    let mins: Vec<f64> = ranked.iter().map(|c| c.best.min as f64).collect();
    tracing::info!(target: "skilltree::optimize", configs = configs.len(), scored = ranked.len(), "optimize.upgrades.done");

    Ok(UpgradeRun { configs: configs.len(), best_min: Stats::from_samples(&mins), ranked, cache: evaluator.cache_stats() })
}

// ─── Outcome Mode ───────────────────────────────────────────────────────────

pub fn list_outcomes(params: &OptimizerParams) -> Vec<OutcomeLine> {
    outcomes::enumerate(params.rounds_to_win, params.max_flips)
        .into_iter()
        .map(|s| OutcomeLine { wins: s.wins(), losses: s.losses(), round_won: s.is_round_win(), label: s.label })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_context() -> Context {
        Context {
            catalogue: Catalogue::standard(),
            ranks: RankTable::standard(),
            roles: NodeRoles::standard(),
            params: OptimizerParams {
                rank: 12,
                candidates: 6,
                refine_top: 2,
                max_iterations: 2,
                patience: 1,
                layouts_per_config: 2,
                upgrade_samples: 3,
                parallel: false,
                ..Default::default()
            },
        }
    }

    #[test]
    fn layout_mode_refines_best_first() {
        let run = run_layouts(&small_context()).expect("test: layouts");
        assert_eq!(run.generated, 6);
        assert_eq!(run.refined.len(), 2);
        assert!(run.refined[0].result.min >= run.refined[1].result.min);
        for r in &run.refined {
            assert!(r.result.min >= r.initial_min, "refinement never loses ground");
        }
    }

    #[test]
    fn upgrade_mode_ranks_every_config() {
        let run = run_upgrades(&small_context()).expect("test: upgrades");
        assert_eq!(run.configs, 3);
        assert_eq!(run.ranked.len(), 3);
        for pair in run.ranked.windows(2) {
            assert_ne!(compare_upgrades(&pair[0].best, &pair[1].best), Ordering::Less);
        }
        assert!(run.ranked.iter().all(|c| c.points == 18));
    }

    #[test]
    fn outcome_mode_lists_first_to_three() {
        let lines = list_outcomes(&OptimizerParams::default());
        assert_eq!(lines.len(), 20);
        assert_eq!(lines.iter().filter(|l| l.round_won).count(), 10);
    }
}
