#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use skilltree_engine::catalogue::reference_layout;
    use skilltree_engine::evaluator::{sort_results, EvaluationResult};
    use skilltree_engine::generator::{GeneratorKind, LayoutGenerator, NodeRoles, PlacementPlan};
    use skilltree_engine::search::{select_diverse, LocalSearch, SearchSettings};
    use skilltree_engine::upgrades::{config_cost, ExhaustiveOptions, TieredPlan, UpgradeSpace};
    use skilltree_engine::{Catalogue, Layout, LayoutEvaluator, OptimizerParams, RankTable, HUB_NODE};

    fn params(parallel: bool) -> OptimizerParams {
        OptimizerParams { rank: 25, parallel, ..Default::default() }
    }

    fn batch(catalogue: &Catalogue, kind: GeneratorKind, count: usize, seed: u64) -> Vec<Layout> {
        let roles = NodeRoles::standard();
        let plan = PlacementPlan::for_kind(kind, &roles);
        LayoutGenerator::new(catalogue, &plan, &roles, 8).generate_many(count, seed)
    }

    // ========== Generation ==========

    #[test]
    fn test_generated_layouts_are_valid() {
        let catalogue = Catalogue::standard();
        for kind in [GeneratorKind::RingPriority, GeneratorKind::HubCluster] {
            let layouts = batch(&catalogue, kind, 12, 5);
            assert_eq!(layouts.len(), 12, "{:?} placed every candidate", kind);
            for layout in &layouts {
                layout.validate(&catalogue, 8).expect("test: generated layout validates");
                assert_eq!(layout.placement.len(), catalogue.relocatable_names().len());
            }
        }
    }

    #[test]
    fn test_generation_is_seed_stable() {
        let catalogue = Catalogue::standard();
        let a = batch(&catalogue, GeneratorKind::HubCluster, 8, 77);
        let b = batch(&catalogue, GeneratorKind::HubCluster, 8, 77);
        let c = batch(&catalogue, GeneratorKind::HubCluster, 8, 78);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    // ========== Evaluation ==========

    #[test]
    fn test_parallel_and_sequential_batches_agree() {
        let catalogue = Catalogue::standard();
        let ranks = RankTable::standard();
        let roles = NodeRoles::standard();
        let layouts = batch(&catalogue, GeneratorKind::HubCluster, 10, 3);

        let par = LayoutEvaluator::new(&catalogue, &ranks, &roles, params(true).evaluator_settings());
        let seq = LayoutEvaluator::new(&catalogue, &ranks, &roles, params(false).evaluator_settings());
        let a = par.evaluate_batch(&layouts);
        let b = seq.evaluate_batch(&layouts);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            let (x, y) = (x.as_ref().expect("test: par"), y.as_ref().expect("test: seq"));
            assert_eq!(**x, **y, "thread count must not change results");
        }
    }

    #[test]
    fn test_repeat_evaluation_hits_cache() {
        let catalogue = Catalogue::standard();
        let ranks = RankTable::standard();
        let roles = NodeRoles::standard();
        let evaluator = LayoutEvaluator::new(&catalogue, &ranks, &roles, params(false).evaluator_settings());

        let first = evaluator.evaluate(&reference_layout()).expect("test: evaluate");
        let second = evaluator.evaluate(&reference_layout()).expect("test: evaluate");
        assert!(Arc::ptr_eq(&first, &second));
        let stats = evaluator.cache_stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 1);
        assert!(first.min <= first.mean as i64 && first.mean as i64 <= first.max);
        assert_eq!(first.total_outcomes, 20);
    }

    #[test]
    fn test_higher_rank_is_never_cheaper() {
        let catalogue = Catalogue::standard();
        let ranks = RankTable::standard();
        let roles = NodeRoles::standard();
        let low = LayoutEvaluator::new(&catalogue, &ranks, &roles, OptimizerParams { rank: 5, ..params(false) }.evaluator_settings());
        let high = LayoutEvaluator::new(&catalogue, &ranks, &roles, OptimizerParams { rank: 35, ..params(false) }.evaluator_settings());
        let a = low.evaluate(&reference_layout()).expect("test: low");
        let b = high.evaluate(&reference_layout()).expect("test: high");
        let lll = |r: &EvaluationResult| r.outcome("LLL").map(|o| o.banked).expect("test: LLL");
        assert!(lll(&b) < lll(&a), "loss penalties grow with rank");
    }

    // ========== Search ==========

    #[test]
    fn test_pipeline_refines_diverse_seeds() {
        let catalogue = Catalogue::standard();
        let ranks = RankTable::standard();
        let roles = NodeRoles::standard();
        let evaluator = LayoutEvaluator::new(&catalogue, &ranks, &roles, params(true).evaluator_settings());

        let layouts = batch(&catalogue, GeneratorKind::HubCluster, 16, 11);
        let mut results: Vec<Arc<EvaluationResult>> =
            evaluator.evaluate_batch(&layouts).into_iter().filter_map(Result::ok).collect();
        sort_results(&mut results);
        let seeds = select_diverse(&results, 4);
        assert_eq!(seeds.len(), 4);
        let unique: BTreeSet<String> = seeds.iter().map(|s| format!("{:?}", s.layout)).collect();
        assert_eq!(unique.len(), 4, "no layout selected twice");

        let search = LocalSearch::new(&evaluator, roles.clone(), SearchSettings { max_iterations: 4, patience: 2, random_swaps: 3 });
        for (i, seed) in seeds.iter().enumerate() {
            let outcome = search.refine(&seed.layout, &mut ChaCha8Rng::seed_from_u64(i as u64)).expect("test: refine");
            assert!(!outcome.initial.is_better(&outcome.best));
            assert!(outcome.min_gain() >= 0);
            outcome.best.layout.validate(&catalogue, 8).expect("test: refined layout validates");
        }
    }

    // ========== Upgrades ==========

    #[test]
    fn test_tiered_configs_spend_the_budget_and_validate() {
        let catalogue = Catalogue::standard();
        let space = UpgradeSpace::new(&catalogue);
        let configs = TieredPlan::standard().generate(&space, 18, 25);
        assert!(!configs.is_empty() && configs.len() <= 25);
        let layout = reference_layout();
        for config in &configs {
            assert_eq!(config_cost(config), 18);
            Layout::new(layout.placement.clone(), config.clone())
                .validate(&catalogue, 8)
                .expect("test: upgraded layout validates");
        }
    }

    #[test]
    fn test_exhaustive_configs_keep_hub_floor() {
        let catalogue = Catalogue::standard();
        let space = UpgradeSpace::new(&catalogue);
        let options = ExhaustiveOptions { limit: 500, ..ExhaustiveOptions::standard(3) };
        let configs = space.exhaustive(&options);
        assert!(!configs.is_empty() && configs.len() <= 500);
        let hub = catalogue.get(HUB_NODE).expect("test: hub");
        for config in &configs {
            assert!(config_cost(config) <= 3);
            let levels = config.get(HUB_NODE).cloned().unwrap_or_default();
            assert!(hub.capacity_at(&levels).unwrap_or(u32::MAX) >= 4);
        }
    }

    // ========== Configuration ==========

    #[test]
    fn test_params_round_trip_through_json() {
        let params = OptimizerParams { rank: 17, budget: 9, generator: GeneratorKind::RingPriority, ..Default::default() };
        let json = serde_json::to_string(&params).expect("test: serialize");
        assert_eq!(OptimizerParams::from_json(&json).expect("test: parse"), params);
        assert!(OptimizerParams { max_flips: 9, ..params }.validate().is_err());
    }
}
