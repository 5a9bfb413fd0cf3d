//! 子代流水线：为一个种群槽位生产一个个体
//!
//! 步骤：向编排者申请 (guidance, insights) → 选父代 → 调用生成器 → 可选 JIT 标注 →
//! 代码查重（有限次重试）→ 带超时评估 → 计算洞察效果。
//! 任何一步失败都在 produce() 边界被吸收为空个体，并对已知 tip 给出 −0.8 的负反馈。
//!
//! 流水线运行在工作任务中，不直接修改洞察池 / 导航器：计划通过 PlanClient 向编排任务申请，
//! 反馈随 SlotOutcome 返回，由编排任务在批次结束后统一写回。

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;

use crate::core::EvolutionError;
use crate::evolution::collaborators::{Evaluator, GenerationRequest, Generator, ParentSelector};
use crate::evolution::feedback::{insight_effectiveness, round_objective, FAILURE_EFFECTIVENESS};
use crate::evolution::jit;
use crate::evolution::types::{Guidance, Individual, Metadata, Operator};

/// 编排者为一次生成分配的上下文
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub guidance: Guidance,
    pub insights: Vec<String>,
}

/// 工作任务发给编排者的计划申请
#[derive(Debug)]
pub struct PlanRequest {
    pub reply: oneshot::Sender<Plan>,
}

/// 工作任务侧的计划申请句柄
#[derive(Clone, Debug)]
pub struct PlanClient {
    tx: mpsc::Sender<PlanRequest>,
}

impl PlanClient {
    pub fn new(tx: mpsc::Sender<PlanRequest>) -> Self {
        Self { tx }
    }

    pub async fn request(&self) -> Result<Plan, EvolutionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(PlanRequest { reply })
            .await
            .map_err(|_| EvolutionError::Generation("planner channel closed".to_string()))?;
        rx.await
            .map_err(|_| EvolutionError::Generation("planner dropped the request".to_string()))
    }
}

/// 一次使用的 tip 及其效果样本
#[derive(Debug, Clone, PartialEq)]
pub struct Feedback {
    pub insights: Vec<String>,
    pub effectiveness: f64,
}

/// 一个槽位的产出
#[derive(Debug, Clone, PartialEq)]
pub struct SlotOutcome {
    pub individual: Individual,
    pub feedback: Option<Feedback>,
}

impl SlotOutcome {
    pub fn null() -> Self {
        Self {
            individual: Individual::null(),
            feedback: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub eval_timeout: Duration,
    pub use_jit: bool,
    /// 代码重复时最多重新生成的次数
    pub dedup_retry_budget: usize,
    /// 交叉算子的父代数量
    pub m: usize,
    pub debug: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            eval_timeout: Duration::from_secs(30),
            use_jit: false,
            dedup_retry_budget: 1,
            m: 2,
            debug: false,
        }
    }
}

pub struct OffspringPipeline {
    generator: Arc<dyn Generator>,
    evaluator: Arc<dyn Evaluator>,
    parents: Arc<dyn ParentSelector>,
    settings: PipelineSettings,
}

impl OffspringPipeline {
    pub fn new(
        generator: Arc<dyn Generator>,
        evaluator: Arc<dyn Evaluator>,
        parents: Arc<dyn ParentSelector>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            generator,
            evaluator,
            parents,
            settings,
        }
    }

    /// 生产一个个体；永不返回错误
    pub async fn produce(
        &self,
        population: &[Individual],
        operator: Operator,
        planner: &PlanClient,
        rng: &mut StdRng,
    ) -> SlotOutcome {
        let mut used_insights = None;
        match self
            .try_produce(population, operator, planner, rng, &mut used_insights)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                if !e.is_candidate_failure() {
                    tracing::warn!(operator = %operator, error = %e, "offspring failed outside generation/evaluation");
                } else if self.settings.debug {
                    tracing::debug!(operator = %operator, error = %e, "offspring failed");
                }
                SlotOutcome {
                    individual: Individual::null(),
                    feedback: used_insights
                        .filter(|insights: &Vec<String>| !insights.is_empty())
                        .map(|insights| Feedback {
                            insights,
                            effectiveness: FAILURE_EFFECTIVENESS,
                        }),
                }
            }
        }
    }

    async fn try_produce(
        &self,
        population: &[Individual],
        operator: Operator,
        planner: &PlanClient,
        rng: &mut StdRng,
        used_insights: &mut Option<Vec<String>>,
    ) -> Result<SlotOutcome, EvolutionError> {
        let (mut offspring, mut runnable) = self
            .generate(population, operator, planner, rng, used_insights)
            .await?;

        let mut retries = 0;
        while retries < self.settings.dedup_retry_budget && is_duplicate(population, &offspring) {
            retries += 1;
            if self.settings.debug {
                tracing::debug!(operator = %operator, retry = retries, "duplicated code, regenerating");
            }
            (offspring, runnable) = self
                .generate(population, operator, planner, rng, used_insights)
                .await?;
        }

        let objective = self.evaluate(&runnable).await?;
        offspring.objective = Some(round_objective(objective));

        let effectiveness = insight_effectiveness(offspring.objective, population);
        let insights = offspring
            .metadata
            .as_ref()
            .map(|m| m.insights.clone())
            .unwrap_or_default();
        if self.settings.debug {
            tracing::debug!(
                operator = %operator,
                objective = objective,
                effectiveness = effectiveness,
                insights = insights.len(),
                "offspring evaluated"
            );
        }

        Ok(SlotOutcome {
            individual: offspring,
            feedback: (!insights.is_empty()).then_some(Feedback {
                insights,
                effectiveness,
            }),
        })
    }

    /// 申请计划并生成一次；返回 (个体, 实际送评的代码)
    async fn generate(
        &self,
        population: &[Individual],
        operator: Operator,
        planner: &PlanClient,
        rng: &mut StdRng,
        used_insights: &mut Option<Vec<String>>,
    ) -> Result<(Individual, String), EvolutionError> {
        let plan = planner.request().await?;
        *used_insights = Some(plan.insights.clone());

        let arity = operator.arity(self.settings.m);
        let parents = if arity == 0 {
            Vec::new()
        } else {
            self.parents.select_parents(population, arity, rng)?
        };

        let generated = self
            .generator
            .synthesize(GenerationRequest {
                operator,
                parents: &parents,
                insights: &plan.insights,
                directive: &plan.guidance.directive,
                regime: plan.guidance.regime,
            })
            .await?;

        let runnable = if self.settings.use_jit {
            jit::annotate(&generated.code)?
        } else {
            generated.code.clone()
        };

        let individual = Individual {
            algorithm: Some(generated.algorithm),
            code: Some(generated.code),
            objective: None,
            other_inf: None,
            metadata: Some(Metadata {
                operator: operator.name().to_string(),
                insights: plan.insights,
                design_directive: plan.guidance.directive,
                regime: plan.guidance.regime,
                timestamp: chrono::Utc::now().timestamp_millis(),
            }),
        };
        Ok((individual, runnable))
    }

    /// 带超时评估；超时时评估 future 被丢弃（即取消）
    pub async fn evaluate(&self, code: &str) -> Result<f64, EvolutionError> {
        let value = timeout(self.settings.eval_timeout, self.evaluator.evaluate(code))
            .await
            .map_err(|_| EvolutionError::EvaluationTimeout(self.settings.eval_timeout))??;
        if !value.is_finite() {
            return Err(EvolutionError::Evaluation(format!("non-finite objective {}", value)));
        }
        Ok(value)
    }
}

fn is_duplicate(population: &[Individual], offspring: &Individual) -> bool {
    match offspring.code.as_deref() {
        Some(code) => population.iter().any(|ind| ind.code.as_deref() == Some(code)),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use rand::SeedableRng;

    use super::*;
    use crate::evolution::collaborators::Generated;
    use crate::evolution::selection::RankParentSelector;
    use crate::evolution::types::{MutationKind, Regime};

    struct FixedGenerator {
        codes: Vec<&'static str>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Generator for FixedGenerator {
        async fn synthesize(&self, _request: GenerationRequest<'_>) -> Result<Generated, EvolutionError> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst);
            let code = self.codes[i.min(self.codes.len() - 1)];
            Ok(Generated {
                code: code.to_string(),
                algorithm: format!("algorithm #{i}"),
            })
        }
    }

    struct ConstEvaluator(f64);

    #[async_trait]
    impl Evaluator for ConstEvaluator {
        async fn evaluate(&self, _code: &str) -> Result<f64, EvolutionError> {
            Ok(self.0)
        }
    }

    struct FailingEvaluator;

    #[async_trait]
    impl Evaluator for FailingEvaluator {
        async fn evaluate(&self, _code: &str) -> Result<f64, EvolutionError> {
            Err(EvolutionError::Evaluation("crashed".into()))
        }
    }

    struct SlowEvaluator;

    #[async_trait]
    impl Evaluator for SlowEvaluator {
        async fn evaluate(&self, _code: &str) -> Result<f64, EvolutionError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(1.0)
        }
    }

    /// 模拟编排者：每次申请都回复同一个计划，并统计申请次数
    fn spawn_planner(plan: Plan) -> (PlanClient, Arc<AtomicUsize>) {
        let (tx, mut rx) = mpsc::channel::<PlanRequest>(4);
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        tokio::spawn(async move {
            while let Some(req) = rx.recv().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = req.reply.send(plan.clone());
            }
        });
        (PlanClient::new(tx), count)
    }

    fn plan() -> Plan {
        Plan {
            guidance: Guidance {
                regime: Regime::Balanced,
                directive: "managing computational complexity and time efficiency".into(),
            },
            insights: vec!["tip one".into(), "tip two".into()],
        }
    }

    fn population() -> Vec<Individual> {
        [1.0, 2.0, 3.0]
            .iter()
            .enumerate()
            .map(|(i, o)| Individual {
                algorithm: Some(format!("parent {i}")),
                code: Some(format!("def score(x):\n    return {i}")),
                objective: Some(*o),
                ..Default::default()
            })
            .collect()
    }

    fn pipeline(codes: Vec<&'static str>, evaluator: Arc<dyn Evaluator>, settings: PipelineSettings) -> OffspringPipeline {
        OffspringPipeline::new(
            Arc::new(FixedGenerator {
                codes,
                calls: AtomicUsize::new(0),
            }),
            evaluator,
            Arc::new(RankParentSelector),
            settings,
        )
    }

    #[tokio::test]
    async fn test_successful_offspring_carries_feedback() {
        let p = pipeline(vec!["def score(x):\n    return 42"], Arc::new(ConstEvaluator(1.0)), PipelineSettings::default());
        let (planner, _) = spawn_planner(plan());
        let mut rng = StdRng::seed_from_u64(1);
        let out = p
            .produce(&population(), Operator::Mutate(MutationKind::M1), &planner, &mut rng)
            .await;
        assert_eq!(out.individual.objective, Some(1.0));
        let meta = out.individual.metadata.unwrap();
        assert_eq!(meta.operator, "m1");
        assert_eq!(meta.insights.len(), 2);
        let fb = out.feedback.unwrap();
        assert!((fb.effectiveness - 1.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_evaluator_failure_becomes_null_individual() {
        let p = pipeline(vec!["def score(x):\n    return 42"], Arc::new(FailingEvaluator), PipelineSettings::default());
        let (planner, _) = spawn_planner(plan());
        let mut rng = StdRng::seed_from_u64(1);
        let out = p.produce(&population(), Operator::Initialize, &planner, &mut rng).await;
        assert!(out.individual.is_null());
        assert!(out.individual.metadata.is_none());
        let fb = out.feedback.unwrap();
        assert_eq!(fb.effectiveness, FAILURE_EFFECTIVENESS);
        assert_eq!(fb.insights, plan().insights);
    }

    #[tokio::test]
    async fn test_evaluation_timeout_is_absorbed() {
        let settings = PipelineSettings {
            eval_timeout: Duration::from_millis(50),
            ..Default::default()
        };
        let p = pipeline(vec!["def score(x):\n    return 42"], Arc::new(SlowEvaluator), settings);
        let (planner, _) = spawn_planner(plan());
        let mut rng = StdRng::seed_from_u64(1);
        let out = p.produce(&population(), Operator::Initialize, &planner, &mut rng).await;
        assert!(out.individual.objective.is_none());
        assert_eq!(out.feedback.unwrap().effectiveness, FAILURE_EFFECTIVENESS);
    }

    #[tokio::test]
    async fn test_duplicate_code_retried_once_then_accepted() {
        let dup = "def score(x):\n    return 0";
        let p = pipeline(vec![dup, dup, dup], Arc::new(ConstEvaluator(2.0)), PipelineSettings::default());
        let (planner, requests) = spawn_planner(plan());
        let mut rng = StdRng::seed_from_u64(1);
        let out = p.produce(&population(), Operator::Initialize, &planner, &mut rng).await;
        assert_eq!(out.individual.code.as_deref(), Some(dup));
        assert_eq!(out.individual.objective, Some(2.0));
        assert_eq!(requests.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_duplicate_resolved_by_retry() {
        let p = pipeline(
            vec!["def score(x):\n    return 0", "def score(x):\n    return 99"],
            Arc::new(ConstEvaluator(2.0)),
            PipelineSettings::default(),
        );
        let (planner, _) = spawn_planner(plan());
        let mut rng = StdRng::seed_from_u64(1);
        let out = p.produce(&population(), Operator::Initialize, &planner, &mut rng).await;
        assert_eq!(out.individual.code.as_deref(), Some("def score(x):\n    return 99"));
    }

    #[tokio::test]
    async fn test_jit_without_function_fails_candidate() {
        let settings = PipelineSettings {
            use_jit: true,
            ..Default::default()
        };
        let p = pipeline(vec!["scores = bins * 2"], Arc::new(ConstEvaluator(1.0)), settings);
        let (planner, _) = spawn_planner(plan());
        let mut rng = StdRng::seed_from_u64(1);
        let out = p.produce(&population(), Operator::Initialize, &planner, &mut rng).await;
        assert!(out.individual.is_null());
    }

    #[tokio::test]
    async fn test_crossover_without_enough_parents_fails_candidate() {
        let settings = PipelineSettings {
            m: 5,
            ..Default::default()
        };
        let p = pipeline(vec!["def score(x):\n    return 7"], Arc::new(ConstEvaluator(1.0)), settings);
        let (planner, _) = spawn_planner(plan());
        let mut rng = StdRng::seed_from_u64(1);
        let op = Operator::Crossover(crate::evolution::types::CrossoverKind::E1);
        let out = p.produce(&population(), op, &planner, &mut rng).await;
        assert!(out.individual.is_null());
    }

    #[tokio::test]
    async fn test_closed_planner_yields_null_without_feedback() {
        let (tx, rx) = mpsc::channel::<PlanRequest>(1);
        drop(rx);
        let planner = PlanClient::new(tx);
        let p = pipeline(vec!["def score(x):\n    return 7"], Arc::new(ConstEvaluator(1.0)), PipelineSettings::default());
        let mut rng = StdRng::seed_from_u64(1);
        let out = p.produce(&population(), Operator::Initialize, &planner, &mut rng).await;
        assert_eq!(out, SlotOutcome::null());
    }
}
