//! Heurist - LLM 驱动的启发式算法进化引擎
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、并行许可调度
//! - **evolution**: 洞察池、导航器、子代流水线、代际循环与默认协作者
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）
//! - **observability**: tracing 初始化
//! - **problem**: 问题描述（prompt）与外部评估器

pub mod config;
pub mod core;
pub mod evolution;
pub mod llm;
pub mod observability;
pub mod problem;

pub use config::{load_config, AppConfig};
pub use core::EvolutionError;
pub use evolution::{EvolutionConfig, EvolutionLoop, InitialPopulation};
