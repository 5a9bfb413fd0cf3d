//! 进化循环集成测试：失败隔离、整批超时、端到端运行

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use heurist::evolution::{
        EvolutionConfig, EvolutionEngine, EvolutionLoop, Evaluator, GenerationRequest, Generated,
        Generator, Individual, InitialPopulation, JsonSnapshotSink, LlmGenerator, MutationKind,
        NullSink, Operator, RankParentSelector, TruncationSelector,
    };
    use heurist::llm::MockLlmClient;
    use heurist::problem::ProblemPrompts;
    use heurist::EvolutionError;

    struct CountingGenerator(AtomicUsize);

    #[async_trait]
    impl Generator for CountingGenerator {
        async fn synthesize(&self, request: GenerationRequest<'_>) -> Result<Generated, EvolutionError> {
            let i = self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Generated {
                code: format!("def score(item, bins):\n    return bins - {i}"),
                algorithm: format!("{} candidate {i}", request.operator),
            })
        }
    }

    struct CrashingEvaluator;

    #[async_trait]
    impl Evaluator for CrashingEvaluator {
        async fn evaluate(&self, _code: &str) -> Result<f64, EvolutionError> {
            Err(EvolutionError::Evaluation("segfault in candidate".into()))
        }
    }

    struct HangingEvaluator;

    #[async_trait]
    impl Evaluator for HangingEvaluator {
        async fn evaluate(&self, _code: &str) -> Result<f64, EvolutionError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(0.0)
        }
    }

    /// 目标值取自 Mock 代码中的编号 n（`+ n * 1e-6`），越晚生成的代码越好
    struct MockIndexEvaluator;

    #[async_trait]
    impl Evaluator for MockIndexEvaluator {
        async fn evaluate(&self, code: &str) -> Result<f64, EvolutionError> {
            let n: f64 = code
                .split("+ ")
                .nth(1)
                .and_then(|rest| rest.split_whitespace().next())
                .and_then(|token| token.parse().ok())
                .ok_or_else(|| EvolutionError::Evaluation("no index in code".into()))?;
            Ok(1.0 / (n + 1.0))
        }
    }

    fn population(n: usize) -> Vec<Individual> {
        (0..n)
            .map(|i| Individual {
                algorithm: Some(format!("seed {i}")),
                code: Some(format!("def score(item, bins):\n    return bins * {i}")),
                objective: Some(10.0 + i as f64),
                ..Default::default()
            })
            .collect()
    }

    fn base_config() -> EvolutionConfig {
        EvolutionConfig {
            pop_size: 4,
            n_pop: 3,
            n_workers: 2,
            operators: vec![(Operator::Mutate(MutationKind::M1), 1.0)],
            eval_timeout: Duration::from_secs(2),
            batch_headroom: Duration::from_secs(2),
            extraction_probability: 0.0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_failing_evaluator_yields_null_offspring() {
        let config = base_config();
        let mut engine = EvolutionEngine::new(
            &config,
            Arc::new(CountingGenerator(AtomicUsize::new(0))),
            Arc::new(CrashingEvaluator),
            Arc::new(RankParentSelector),
        );
        let pop = population(4);
        let offspring = engine
            .offspring(&pop, Operator::Mutate(MutationKind::M2), 4, 0)
            .await;

        assert_eq!(offspring.len(), 4);
        assert!(offspring.iter().all(|o| o.is_null()));

        // 每次失败都给用到的 tip 施加 −0.8 的负反馈
        let pool = engine.insight_pool();
        assert!(pool
            .tips()
            .filter_map(|t| pool.stats(t))
            .filter(|s| s.used_count > 0)
            .all(|s| s.effectiveness < 0.0));
    }

    #[tokio::test]
    async fn test_stalled_batch_is_discarded() {
        let config = EvolutionConfig {
            pop_size: 3,
            n_pop: 1,
            n_workers: 1,
            eval_timeout: Duration::from_millis(200),
            batch_headroom: Duration::ZERO,
            ..base_config()
        };
        let mut evolution = EvolutionLoop::new(
            config,
            Arc::new(CountingGenerator(AtomicUsize::new(0))),
            Arc::new(HangingEvaluator),
            Arc::new(RankParentSelector),
            Arc::new(TruncationSelector),
            Arc::new(NullSink),
        );
        let before = population(3);
        let after = evolution
            .run(InitialPopulation::Continue {
                population: before.clone(),
                generation: 0,
            })
            .await
            .unwrap();

        assert_eq!(after, before);
        // 整批被丢弃，没有任何反馈写回
        let summary = evolution.insight_summary();
        assert_eq!(summary.avg_effectiveness, 0.0);
    }

    #[tokio::test]
    async fn test_end_to_end_with_mock_llm() {
        let dir = tempfile::tempdir().unwrap();
        let config = EvolutionConfig {
            operators: vec![
                (Operator::Crossover(heurist::evolution::CrossoverKind::E1), 1.0),
                (Operator::Mutate(MutationKind::M1), 1.0),
            ],
            extraction_probability: 1.0,
            guidance_log_every: 2,
            ..base_config()
        };
        let mut evolution = EvolutionLoop::new(
            config,
            Arc::new(LlmGenerator::new(Arc::new(MockLlmClient::new()), ProblemPrompts::default())),
            Arc::new(MockIndexEvaluator),
            Arc::new(RankParentSelector),
            Arc::new(TruncationSelector),
            Arc::new(JsonSnapshotSink::new(dir.path())),
        );
        let population = evolution.run(InitialPopulation::Generate).await.unwrap();

        assert!(!population.is_empty() && population.len() <= 4);
        let objectives: Vec<f64> = population.iter().filter_map(|i| i.objective).collect();
        assert!(objectives.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(evolution.best_objective(), Some(objectives[0]));

        let results = dir.path().join("results");
        for g in 0..=3 {
            assert!(results
                .join(format!("pops/population_generation_{g}.json"))
                .exists());
        }
        assert!(results.join("pops_best/population_generation_3.json").exists());
        assert!(results.join("guidance_log.json").exists());
        assert_eq!(evolution.guidance_log().len(), 3);

        // 提炼出的原则进入了洞察池
        assert!(evolution
            .recent_insights(2)
            .iter()
            .any(|t| t.contains("remaining capacity")));
        assert_eq!(evolution.history().best().len(), 4);
    }
}
