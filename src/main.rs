//! Heurist 入口：加载配置、组装协作者并运行代际循环
//!
//! 用法：`heurist [config.toml]`，未指定时只读取 config/default.toml 与 HEURIST__* 环境变量。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use heurist::evolution::{
    EvolutionConfig, EvolutionLoop, InitialPopulation, JsonSnapshotSink, LlmGenerator,
    RankParentSelector, TruncationSelector,
};
use heurist::llm::create_llm_from_config;
use heurist::problem::{CommandEvaluator, ProblemPrompts};
use heurist::{load_config, observability};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).context("Failed to load config")?;
    observability::init(cfg.evolution.debug);

    let llm = create_llm_from_config(&cfg);
    let generator = Arc::new(LlmGenerator::new(Arc::clone(&llm), ProblemPrompts::from(&cfg.problem)));
    let evaluator = Arc::new(
        CommandEvaluator::from_command(&cfg.problem.evaluator_command)
            .context("Invalid evaluator command")?,
    );
    let sink = Arc::new(JsonSnapshotSink::new(&cfg.output.path));

    let initial = InitialPopulation::load(
        cfg.evolution.seed_path.as_deref(),
        cfg.evolution.continue_path.as_deref(),
        cfg.evolution.continue_generation,
    )
    .context("Failed to load initial population")?;

    let mut evolution = EvolutionLoop::new(
        EvolutionConfig::from(&cfg),
        generator,
        evaluator,
        Arc::new(RankParentSelector),
        Arc::new(TruncationSelector),
        sink,
    );
    let population = evolution.run(initial).await.context("Evolution failed")?;

    if let Some(best) = population.first() {
        tracing::info!(
            objective = ?best.objective,
            algorithm = best.algorithm.as_deref().unwrap_or(""),
            "best heuristic"
        );
    }
    let summary = evolution.insight_summary();
    tracing::info!(
        total = summary.total_tips,
        mature = summary.mature_tips,
        avg_effectiveness = summary.avg_effectiveness,
        best_tip = summary.best_tip.as_deref().unwrap_or(""),
        "insight pool"
    );
    let (prompt_tokens, completion_tokens, total_tokens) = llm.token_usage();
    tracing::info!(prompt_tokens, completion_tokens, total_tokens, "llm token usage");
    Ok(())
}
