//! 进化编排者：单写者持有洞察池、导航器、历史序列与随机源，并行调度子代生产
//!
//! 一次算子应用 = 一个批次：每个槽位在 JoinSet 中独立运行流水线（受 n_workers 许可限制），
//! 编排任务在 select! 循环中一边响应计划申请一边回收结果。整批超过 eval_timeout + headroom 时
//! 丢弃所有结果（跳过而非挂起）。

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::timeout;

use crate::config::AppConfig;
use crate::core::{EvolutionError, TaskScheduler};
use crate::evolution::collaborators::{Evaluator, Generator, ParentSelector};
use crate::evolution::feedback::round_objective;
use crate::evolution::history::History;
use crate::evolution::insight::{InsightPool, PoolSummary};
use crate::evolution::navigator::Navigator;
use crate::evolution::pipeline::{OffspringPipeline, PipelineSettings, Plan, PlanClient, PlanRequest, SlotOutcome};
use crate::evolution::types::{DuplicateObjectivePolicy, Guidance, Individual, Operator, TipStrategy};

/// 运行时进化配置（由 AppConfig 转换，算子在此解析一次）
#[derive(Debug, Clone)]
pub struct EvolutionConfig {
    pub pop_size: usize,
    pub n_pop: usize,
    /// (算子, 触发概率)
    pub operators: Vec<(Operator, f64)>,
    pub m: usize,
    pub n_workers: usize,
    pub eval_timeout: Duration,
    pub batch_headroom: Duration,
    pub use_jit: bool,
    pub debug: bool,
    pub seed: u64,
    pub dedup_retry_budget: usize,
    pub duplicate_policy: DuplicateObjectivePolicy,
    pub history_max_len: usize,
    pub initial_batches: usize,
    pub insight_capacity: usize,
    pub tips_per_request: usize,
    pub tip_strategy: TipStrategy,
    pub extraction_probability: f64,
    pub initial_tips: Vec<String>,
    pub guidance_log: bool,
    pub guidance_log_every: usize,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for EvolutionConfig {
    fn from(cfg: &AppConfig) -> Self {
        let evo = &cfg.evolution;
        let tip_strategy = parse_strategy(&cfg.insights.strategy, "insights.strategy");
        let duplicate_policy = parse_policy(&evo.duplicate_objective_policy);

        let config = Self {
            pop_size: evo.pop_size.max(1),
            n_pop: evo.n_pop,
            operators: parse_operators(&evo.operators, &evo.operator_weights),
            m: evo.m,
            n_workers: evo.n_workers.max(1),
            eval_timeout: Duration::from_secs(evo.eval_timeout_secs),
            batch_headroom: Duration::from_secs(evo.batch_headroom_secs),
            use_jit: evo.use_jit,
            debug: evo.debug,
            seed: evo.seed,
            dedup_retry_budget: evo.dedup_retry_budget,
            duplicate_policy,
            history_max_len: evo.history_max_len,
            initial_batches: evo.initial_batches,
            insight_capacity: cfg.insights.max_size,
            tips_per_request: cfg.insights.tips_per_request,
            tip_strategy,
            extraction_probability: cfg.insights.extraction_probability.clamp(0.0, 1.0),
            initial_tips: cfg.insights.initial_tips.clone(),
            guidance_log: cfg.output.guidance_log,
            guidance_log_every: cfg.output.guidance_log_every.max(1),
        };
        config.normalized()
    }
}

fn parse_strategy(raw: &str, key: &str) -> TipStrategy {
    raw.parse().unwrap_or_else(|e| {
        tracing::error!("{}: {}, falling back to adaptive", key, e);
        TipStrategy::Adaptive
    })
}

fn parse_policy(raw: &str) -> DuplicateObjectivePolicy {
    match raw.trim().to_lowercase().as_str() {
        "reject" => DuplicateObjectivePolicy::Reject,
        "warn" => DuplicateObjectivePolicy::Warn,
        other => {
            tracing::error!("unknown duplicate_objective_policy '{}', using warn", other);
            DuplicateObjectivePolicy::Warn
        }
    }
}

/// 解析算子名；未知算子报告后跳过，缺少的权重按 1.0
pub fn parse_operators(names: &[String], weights: &[f64]) -> Vec<(Operator, f64)> {
    names
        .iter()
        .enumerate()
        .filter_map(|(i, name)| match name.parse::<Operator>() {
            Ok(op) => Some((op, weights.get(i).copied().unwrap_or(1.0).clamp(0.0, 1.0))),
            Err(e) => {
                tracing::error!("{}, operator skipped", e);
                None
            }
        })
        .collect()
}

impl EvolutionConfig {
    /// 校正 m：不能大于种群规模也不能小于 2
    pub fn normalized(mut self) -> Self {
        if self.m > self.pop_size || self.m < 2 {
            tracing::warn!("m should not be larger than pop size or smaller than 2, adjust it to m=2");
            self.m = 2;
        }
        self
    }

    pub fn batch_timeout(&self) -> Duration {
        self.eval_timeout + self.batch_headroom
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            eval_timeout: self.eval_timeout,
            use_jit: self.use_jit,
            dedup_retry_budget: self.dedup_retry_budget,
            m: self.m,
            debug: self.debug,
        }
    }
}

/// 种子算法（JSON 中的 {algorithm, code}）
#[derive(Debug, Clone, Deserialize)]
pub struct SeedAlgorithm {
    pub algorithm: String,
    pub code: String,
}

pub struct EvolutionEngine {
    pool: InsightPool,
    navigator: Navigator,
    history: History,
    rng: StdRng,
    pipeline: Arc<OffspringPipeline>,
    generator: Arc<dyn Generator>,
    scheduler: TaskScheduler,
    tips_per_request: usize,
    tip_strategy: TipStrategy,
    batch_timeout: Duration,
    extraction_probability: f64,
    debug: bool,
}

impl EvolutionEngine {
    pub fn new(
        config: &EvolutionConfig,
        generator: Arc<dyn Generator>,
        evaluator: Arc<dyn Evaluator>,
        parents: Arc<dyn ParentSelector>,
    ) -> Self {
        let pipeline = OffspringPipeline::new(
            Arc::clone(&generator),
            evaluator,
            parents,
            config.pipeline_settings(),
        );
        Self {
            pool: InsightPool::new(
                config.insight_capacity,
                &config.initial_tips,
                StdRng::seed_from_u64(config.seed.wrapping_add(2)),
            ),
            navigator: Navigator::new(StdRng::seed_from_u64(config.seed.wrapping_add(1))),
            history: History::new(config.history_max_len),
            rng: StdRng::seed_from_u64(config.seed),
            pipeline: Arc::new(pipeline),
            generator,
            scheduler: TaskScheduler::new(config.n_workers),
            tips_per_request: config.tips_per_request,
            tip_strategy: config.tip_strategy,
            batch_timeout: config.batch_timeout(),
            extraction_probability: config.extraction_probability,
            debug: config.debug,
        }
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn insight_pool(&self) -> &InsightPool {
        &self.pool
    }

    pub fn insight_summary(&self) -> PoolSummary {
        self.pool.summary()
    }

    pub fn last_guidance(&self) -> Option<&Guidance> {
        self.navigator.last_guidance()
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// 一代结束后追加历史样本
    pub fn record_generation(&mut self, population: &[Individual]) {
        self.history.record_population(population);
    }

    fn plan(&mut self) -> Plan {
        let guidance = self.navigator.guidance(&self.history);
        let insights = self.pool.get_tips(self.tips_per_request, self.tip_strategy);
        Plan { guidance, insights }
    }

    /// 对种群应用一次算子，返回 count 个子代（失败槽位为空个体）；整批超时时返回空
    pub async fn offspring(
        &mut self,
        population: &[Individual],
        operator: Operator,
        count: usize,
        generation: usize,
    ) -> Vec<Individual> {
        self.pool.set_generation(generation as u64);

        let outcomes = match self.run_batch(population, operator, count).await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                tracing::warn!(operator = %operator, "Parallel time out: {}", e);
                Vec::new()
            }
        };

        let mut offspring = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            if let Some(feedback) = outcome.feedback {
                for tip in &feedback.insights {
                    self.pool.update_tip_stats(tip, feedback.effectiveness);
                }
                if self.debug {
                    tracing::debug!(
                        effectiveness = feedback.effectiveness,
                        insights = feedback.insights.len(),
                        "updated insight feedback"
                    );
                }
            }
            offspring.push(outcome.individual);
        }

        if population.len() >= 3 && self.rng.gen::<f64>() < self.extraction_probability {
            self.extract_insights(population).await;
        }

        offspring
    }

    /// 并行批次：槽位任务 + 计划服务循环，整体受 batch_timeout 约束
    pub async fn run_batch(
        &mut self,
        population: &[Individual],
        operator: Operator,
        count: usize,
    ) -> Result<Vec<SlotOutcome>, EvolutionError> {
        let shared = Arc::new(population.to_vec());
        let (tx, mut rx) = mpsc::channel::<PlanRequest>(self.scheduler.capacity());
        let mut tasks = JoinSet::new();

        for _ in 0..count {
            let pipeline = Arc::clone(&self.pipeline);
            let population = Arc::clone(&shared);
            let planner = PlanClient::new(tx.clone());
            let scheduler = self.scheduler.clone();
            let mut rng = StdRng::seed_from_u64(self.rng.gen());
            tasks.spawn(async move {
                let _permit = scheduler.acquire().await;
                pipeline.produce(&population, operator, &planner, &mut rng).await
            });
        }
        drop(tx);

        let batch_timeout = self.batch_timeout;
        let mut outcomes = Vec::with_capacity(count);
        let serve = async {
            loop {
                tokio::select! {
                    Some(request) = rx.recv() => {
                        let plan = self.plan();
                        let _ = request.reply.send(plan);
                    }
                    joined = tasks.join_next() => match joined {
                        Some(Ok(outcome)) => outcomes.push(outcome),
                        Some(Err(e)) => {
                            tracing::warn!("offspring task aborted: {}", e);
                            outcomes.push(SlotOutcome::null());
                        }
                        None => break,
                    },
                }
            }
        };

        let finished = timeout(batch_timeout, serve).await;
        match finished {
            Ok(()) => Ok(outcomes),
            Err(_) => {
                tasks.abort_all();
                Err(EvolutionError::BatchStall(batch_timeout))
            }
        }
    }

    /// 并行评估种子算法；评估失败的种子保留但目标值为空
    pub async fn evaluate_seeds(&self, seeds: Vec<SeedAlgorithm>) -> Vec<Individual> {
        let mut tasks = JoinSet::new();
        for (idx, seed) in seeds.into_iter().enumerate() {
            let pipeline = Arc::clone(&self.pipeline);
            let scheduler = self.scheduler.clone();
            tasks.spawn(async move {
                let _permit = scheduler.acquire().await;
                let objective = match pipeline.evaluate(&seed.code).await {
                    Ok(value) => Some(round_objective(value)),
                    Err(e) => {
                        tracing::warn!("seed algorithm {} failed to evaluate: {}", idx, e);
                        None
                    }
                };
                (
                    idx,
                    Individual {
                        algorithm: Some(seed.algorithm),
                        code: Some(seed.code),
                        objective,
                        ..Default::default()
                    },
                )
            });
        }

        let mut evaluated = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(pair) => evaluated.push(pair),
                Err(e) => tracing::warn!("seed evaluation task aborted: {}", e),
            }
        }
        evaluated.sort_by_key(|(idx, _)| *idx);
        evaluated.into_iter().map(|(_, ind)| ind).collect()
    }

    /// 取前 30% 的有效个体交给生成器提炼设计原则，逐条尝试加入洞察池
    async fn extract_insights(&mut self, population: &[Individual]) {
        let mut ranked: Vec<&Individual> = population.iter().filter(|i| i.objective.is_some()).collect();
        if ranked.is_empty() {
            return;
        }
        ranked.sort_by(|a, b| {
            let (a, b) = (a.objective.unwrap_or(f64::INFINITY), b.objective.unwrap_or(f64::INFINITY));
            a.total_cmp(&b)
        });
        let top = ((ranked.len() as f64 * 0.3) as usize).max(1);
        let elites: Vec<Individual> = ranked.into_iter().take(top).cloned().collect();

        match self.generator.extract_principles(&elites).await {
            Ok(items) => {
                let mut admitted = 0;
                for item in items.iter().filter(|i| i.trim().len() > 10) {
                    if self
                        .pool
                        .add_tip(item, vec!["extracted".to_string(), "high_performance".to_string()])
                    {
                        admitted += 1;
                    }
                }
                if self.debug {
                    tracing::debug!(extracted = items.len(), admitted, "extracted insight items");
                }
            }
            Err(e) => {
                if self.debug {
                    tracing::debug!("failed to extract insights: {}", e);
                }
            }
        }
    }
}
