//! 核心层：错误类型与并行许可调度

pub mod error;
pub mod task_scheduler;

pub use error::EvolutionError;
pub use task_scheduler::TaskScheduler;
