//! 问题层：目标函数描述（拼入生成 prompt）与外部评估器

pub mod evaluator;
pub mod prompts;

pub use evaluator::CommandEvaluator;
pub use prompts::ProblemPrompts;
