//! 代际循环：逐代按概率应用算子、合并子代、生存者选择、记录历史并落盘快照

use std::path::Path;
use std::sync::Arc;

use rand::Rng;
use serde::Serialize;

use crate::core::EvolutionError;
use crate::evolution::collaborators::{Evaluator, Generator, ParentSelector, SnapshotSink, SurvivorSelector};
use crate::evolution::engine::{EvolutionConfig, EvolutionEngine, SeedAlgorithm};
use crate::evolution::history::{self, History};
use crate::evolution::insight::PoolSummary;
use crate::evolution::types::{DuplicateObjectivePolicy, Guidance, Individual, Operator};

/// 初始种群来源
#[derive(Debug, Clone)]
pub enum InitialPopulation {
    /// 种子算法，逐个评估后作为第 0 代
    Seeds(Vec<SeedAlgorithm>),
    /// 从已有种群快照继续，generation 为起始代
    Continue {
        population: Vec<Individual>,
        generation: usize,
    },
    /// 用 Initialize 算子从零生成
    Generate,
}

impl InitialPopulation {
    /// 按优先级选择来源：种子文件 > 续跑文件 > 从零生成
    pub fn load(
        seed_path: Option<&Path>,
        continue_path: Option<&Path>,
        continue_generation: usize,
    ) -> Result<Self, EvolutionError> {
        if let Some(path) = seed_path {
            let raw = std::fs::read_to_string(path)?;
            let seeds: Vec<SeedAlgorithm> = serde_json::from_str(&raw)?;
            tracing::info!("load initial population from {}", path.display());
            return Ok(Self::Seeds(seeds));
        }
        if let Some(path) = continue_path {
            let raw = std::fs::read_to_string(path)?;
            let population: Vec<Individual> = serde_json::from_str(&raw)?;
            tracing::info!(
                "continue from {} at generation {}",
                path.display(),
                continue_generation
            );
            return Ok(Self::Continue {
                population,
                generation: continue_generation,
            });
        }
        Ok(Self::Generate)
    }
}

/// 每代一条的诊断记录
#[derive(Debug, Clone, Serialize)]
pub struct GuidanceRecord {
    pub generation: usize,
    pub timestamp: String,
    pub best_fitness: Option<f64>,
    pub diversity: Option<f64>,
    pub insight_count: usize,
    pub recent_insights: Vec<String>,
    pub navigator_guidance: Option<Guidance>,
}

pub struct EvolutionLoop {
    config: EvolutionConfig,
    engine: EvolutionEngine,
    survivors: Arc<dyn SurvivorSelector>,
    sink: Arc<dyn SnapshotSink>,
    population: Vec<Individual>,
    guidance_log: Vec<GuidanceRecord>,
}

impl EvolutionLoop {
    pub fn new(
        config: EvolutionConfig,
        generator: Arc<dyn Generator>,
        evaluator: Arc<dyn Evaluator>,
        parents: Arc<dyn ParentSelector>,
        survivors: Arc<dyn SurvivorSelector>,
        sink: Arc<dyn SnapshotSink>,
    ) -> Self {
        let engine = EvolutionEngine::new(&config, generator, evaluator, parents);
        Self {
            config,
            engine,
            survivors,
            sink,
            population: Vec::new(),
            guidance_log: Vec::new(),
        }
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    pub fn population(&self) -> &[Individual] {
        &self.population
    }

    pub fn best_objective(&self) -> Option<f64> {
        history::objective_summary(&self.population).map(|(best, _)| best)
    }

    pub fn diversity(&self) -> Option<f64> {
        history::diversity(&self.population)
    }

    pub fn last_guidance(&self) -> Option<&Guidance> {
        self.engine.last_guidance()
    }

    pub fn insight_summary(&self) -> PoolSummary {
        self.engine.insight_summary()
    }

    pub fn recent_insights(&self, n: usize) -> Vec<String> {
        self.engine.insight_pool().recent(n)
    }

    pub fn history(&self) -> &History {
        self.engine.history()
    }

    pub fn guidance_log(&self) -> &[GuidanceRecord] {
        &self.guidance_log
    }

    /// 运行完整的进化；只有初始化阶段的错误会返回，之后的失败都被吸收
    pub async fn run(&mut self, initial: InitialPopulation) -> Result<Vec<Individual>, EvolutionError> {
        let n_start = self.initialize(initial).await?;
        tracing::info!(
            pop_size = self.config.pop_size,
            n_start,
            n_pop = self.config.n_pop,
            "evolution started"
        );

        for generation in n_start..self.config.n_pop {
            self.run_generation(generation).await;
        }

        tracing::info!(best = ?self.best_objective(), "evolution finished");
        Ok(self.population.clone())
    }

    async fn initialize(&mut self, initial: InitialPopulation) -> Result<usize, EvolutionError> {
        let n_start = match initial {
            InitialPopulation::Seeds(seeds) => {
                if seeds.is_empty() {
                    return Err(EvolutionError::Config("seed file contains no algorithms".to_string()));
                }
                self.population = self.engine.evaluate_seeds(seeds).await;
                self.save_snapshot(0);
                0
            }
            InitialPopulation::Continue { population, generation } => {
                self.population = population;
                generation
            }
            InitialPopulation::Generate => {
                let pop_size = self.config.pop_size;
                for _ in 0..self.config.initial_batches {
                    let offspring = self
                        .engine
                        .offspring(&self.population, Operator::Initialize, pop_size, 0)
                        .await;
                    self.add_to_population(offspring);
                }
                let merged = std::mem::take(&mut self.population);
                self.population = self.survivors.select_survivors(merged, pop_size);
                self.save_snapshot(0);
                0
            }
        };

        let valid = self.population.iter().filter(|i| i.has_objective()).count();
        if valid == 0 {
            tracing::warn!("initial population has no evaluated individual");
        }
        self.engine.record_generation(&self.population);
        Ok(n_start)
    }

    /// 一代：按权重依次尝试每个算子，最后记录历史、落盘与诊断
    pub async fn run_generation(&mut self, generation: usize) {
        let pop_size = self.config.pop_size;
        let operators = self.config.operators.clone();

        for (operator, weight) in operators {
            let roll: f64 = self.engine.rng().gen();
            if roll >= weight {
                continue;
            }

            let offspring = self
                .engine
                .offspring(&self.population, operator, pop_size, generation)
                .await;
            if self.config.debug {
                let produced = offspring.iter().filter(|o| o.has_objective()).count();
                tracing::debug!(
                    generation = generation + 1,
                    operator = %operator,
                    produced,
                    requested = pop_size,
                    "operator applied"
                );
            }
            self.add_to_population(offspring);

            let merged = std::mem::take(&mut self.population);
            self.population = self.survivors.select_survivors(merged, pop_size);
        }

        self.engine.record_generation(&self.population);
        self.save_snapshot(generation + 1);
        self.log_guidance(generation);

        tracing::info!(
            generation = generation + 1,
            best = ?self.best_objective(),
            diversity = ?self.diversity(),
            regime = ?self.last_guidance().map(|g| g.regime),
            insights = self.engine.insight_pool().len(),
            "generation finished"
        );
    }

    /// 合并子代；目标值与已有个体相同时按策略告警或拒绝
    pub fn add_to_population(&mut self, offspring: Vec<Individual>) {
        for off in offspring {
            let collides = off.objective.is_some()
                && self.population.iter().any(|ind| ind.objective == off.objective);
            if collides {
                match self.config.duplicate_policy {
                    DuplicateObjectivePolicy::Warn => {
                        if self.config.debug {
                            tracing::warn!(objective = ?off.objective, "duplicated result, keeping it");
                        }
                    }
                    DuplicateObjectivePolicy::Reject => {
                        if self.config.debug {
                            tracing::warn!(objective = ?off.objective, "duplicated result, rejected");
                        }
                        continue;
                    }
                }
            }
            self.population.push(off);
        }
    }

    fn save_snapshot(&self, generation: usize) {
        if let Err(e) = self.sink.save_population(&self.population, generation) {
            tracing::warn!("failed to save population of generation {}: {}", generation, e);
        }
        if let Some(best) = self.population.first() {
            if let Err(e) = self.sink.save_best(best, generation) {
                tracing::warn!("failed to save best individual of generation {}: {}", generation, e);
            }
        }
    }

    fn log_guidance(&mut self, generation: usize) {
        if !self.config.guidance_log {
            return;
        }

        let pool = self.engine.insight_pool();
        let record = GuidanceRecord {
            generation: generation + 1,
            timestamp: chrono::Utc::now().to_rfc3339(),
            best_fitness: self.best_objective(),
            diversity: self.diversity(),
            insight_count: pool.len(),
            recent_insights: pool.recent(3),
            navigator_guidance: self.engine.last_guidance().cloned(),
        };
        self.guidance_log.push(record);

        let last = generation + 1 == self.config.n_pop;
        if (generation + 1) % self.config.guidance_log_every == 0 || last {
            match serde_json::to_value(&self.guidance_log) {
                Ok(records) => {
                    if let Err(e) = self.sink.save_guidance_log(&records) {
                        tracing::warn!("failed to save guidance log: {}", e);
                    }
                }
                Err(e) => tracing::warn!("failed to serialize guidance log: {}", e),
            }
        }
    }
}
