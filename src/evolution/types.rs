use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::EvolutionError;

/// 一个进化候选：算法描述 + 代码 + 目标值（越小越好）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    pub algorithm: Option<String>,
    pub code: Option<String>,
    pub objective: Option<f64>,
    #[serde(default)]
    pub other_inf: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl Individual {
    /// 失败槽位的占位个体：全部字段为空
    pub fn null() -> Self {
        Self::default()
    }

    pub fn is_null(&self) -> bool {
        self.code.is_none() && self.objective.is_none()
    }

    pub fn has_objective(&self) -> bool {
        self.objective.is_some()
    }
}

/// 子代生成时的上下文，写入个体供日志回溯
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub operator: String,
    pub insights: Vec<String>,
    pub design_directive: String,
    pub regime: Regime,
    /// 创建时间（毫秒时间戳）
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Regime {
    Exploration,
    Exploitation,
    Balanced,
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Regime::Exploration => write!(f, "exploration"),
            Regime::Exploitation => write!(f, "exploitation"),
            Regime::Balanced => write!(f, "balanced"),
        }
    }
}

/// 导航器的一次输出：搜索模式 + 设计指令
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guidance {
    pub regime: Regime,
    pub directive: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrossoverKind {
    /// 与父代完全不同的新算法
    E1,
    /// 提炼父代共同骨架后的新算法
    E2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationKind {
    /// 结构性改写
    M1,
    /// 调整评分函数参数
    M2,
    /// 简化，去除冗余
    M3,
}

/// 变异算子：配置时解析一次，携带所需父代数量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    Initialize,
    Crossover(CrossoverKind),
    Mutate(MutationKind),
}

impl Operator {
    /// 需要的父代数量；交叉算子使用配置的 m
    pub fn arity(&self, m: usize) -> usize {
        match self {
            Operator::Initialize => 0,
            Operator::Mutate(_) => 1,
            Operator::Crossover(_) => m,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operator::Initialize => "i1",
            Operator::Crossover(CrossoverKind::E1) => "e1",
            Operator::Crossover(CrossoverKind::E2) => "e2",
            Operator::Mutate(MutationKind::M1) => "m1",
            Operator::Mutate(MutationKind::M2) => "m2",
            Operator::Mutate(MutationKind::M3) => "m3",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operator {
    type Err = EvolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "i1" => Ok(Operator::Initialize),
            "e1" => Ok(Operator::Crossover(CrossoverKind::E1)),
            "e2" => Ok(Operator::Crossover(CrossoverKind::E2)),
            "m1" => Ok(Operator::Mutate(MutationKind::M1)),
            "m2" => Ok(Operator::Mutate(MutationKind::M2)),
            "m3" => Ok(Operator::Mutate(MutationKind::M3)),
            other => Err(EvolutionError::UnknownOperator(other.to_string())),
        }
    }
}

/// 洞察检索策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TipStrategy {
    Random,
    Recent,
    Effective,
    Balanced,
    #[default]
    Adaptive,
}

impl FromStr for TipStrategy {
    type Err = EvolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "random" => Ok(TipStrategy::Random),
            "recent" => Ok(TipStrategy::Recent),
            "effective" => Ok(TipStrategy::Effective),
            "balanced" => Ok(TipStrategy::Balanced),
            "adaptive" => Ok(TipStrategy::Adaptive),
            other => Err(EvolutionError::Config(format!("unknown tip strategy: {}", other))),
        }
    }
}

/// 合并子代时遇到相同目标值的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateObjectivePolicy {
    /// 仅在调试模式下警告，照常加入
    #[default]
    Warn,
    /// 丢弃与现有个体目标值相同的子代
    Reject,
}
