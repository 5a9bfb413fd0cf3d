//! 外部协作者接口：代码生成、适应度评估、生存者选择、父代选择、快照持久化

use async_trait::async_trait;
use rand::rngs::StdRng;

use crate::core::EvolutionError;
use crate::evolution::types::{Individual, Operator, Regime};

/// 一次生成请求的全部上下文
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub operator: Operator,
    pub parents: &'a [Individual],
    pub insights: &'a [String],
    pub directive: &'a str,
    pub regime: Regime,
}

/// 生成结果：代码 + 算法描述
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub code: String,
    pub algorithm: String,
}

/// 代码生成器（通常由 LLM 驱动）
#[async_trait]
pub trait Generator: Send + Sync {
    async fn synthesize(&self, request: GenerationRequest<'_>) -> Result<Generated, EvolutionError>;

    /// 从优秀个体中提炼通用设计原则；默认不提炼
    async fn extract_principles(&self, _elites: &[Individual]) -> Result<Vec<String>, EvolutionError> {
        Ok(Vec::new())
    }
}

/// 适应度评估器；返回的 future 被丢弃时必须能安全中止
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, code: &str) -> Result<f64, EvolutionError>;
}

/// 生存者选择：把合并后的种群截断到 target_size 以内
pub trait SurvivorSelector: Send + Sync {
    fn select_survivors(&self, population: Vec<Individual>, target_size: usize) -> Vec<Individual>;
}

/// 父代选择
pub trait ParentSelector: Send + Sync {
    fn select_parents(
        &self,
        population: &[Individual],
        arity: usize,
        rng: &mut StdRng,
    ) -> Result<Vec<Individual>, EvolutionError>;
}

/// 快照持久化
pub trait SnapshotSink: Send + Sync {
    fn save_population(&self, population: &[Individual], generation: usize) -> Result<(), EvolutionError>;

    fn save_best(&self, best: &Individual, generation: usize) -> Result<(), EvolutionError>;

    /// 导航 / 洞察池诊断日志
    fn save_guidance_log(&self, _records: &serde_json::Value) -> Result<(), EvolutionError> {
        Ok(())
    }
}

/// 不落盘的快照（测试与 dry-run 用）
#[derive(Debug, Default)]
pub struct NullSink;

impl SnapshotSink for NullSink {
    fn save_population(&self, _population: &[Individual], _generation: usize) -> Result<(), EvolutionError> {
        Ok(())
    }

    fn save_best(&self, _best: &Individual, _generation: usize) -> Result<(), EvolutionError> {
        Ok(())
    }
}
