//! 进化引擎错误类型
//!
//! 四类错误：生成失败、评估失败、批次停滞、配置错误。前两类在子代流水线边界被吸收为空个体，
//! 批次停滞降级为本轮零子代，配置错误只报告不终止。

use std::time::Duration;

use thiserror::Error;

/// 进化过程中可能出现的错误
#[derive(Error, Debug)]
pub enum EvolutionError {
    /// 生成器（LLM）失败或返回无法解析的内容
    #[error("Generation failed: {0}")]
    Generation(String),

    /// 开启 JIT 标注时，生成代码中找不到函数定义
    #[error("No function definition found in generated code")]
    FunctionNameNotFound,

    #[error("Evaluation failed: {0}")]
    Evaluation(String),

    #[error("Evaluation timed out after {0:?}")]
    EvaluationTimeout(Duration),

    /// 整批并行生产超时，本批结果全部丢弃
    #[error("Offspring batch stalled for more than {0:?}")]
    BatchStall(Duration),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    #[error("Operator {operator} needs {needed} parents, population has {available}")]
    InvalidArity {
        operator: String,
        needed: usize,
        available: usize,
    },

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EvolutionError {
    /// 是否属于「单个候选失败」（生成 / 评估），由流水线吸收而非向上传播
    pub fn is_candidate_failure(&self) -> bool {
        matches!(
            self,
            EvolutionError::Generation(_)
                | EvolutionError::FunctionNameNotFound
                | EvolutionError::Evaluation(_)
                | EvolutionError::EvaluationTimeout(_)
                | EvolutionError::InvalidArity { .. }
                | EvolutionError::Llm(_)
        )
    }
}
