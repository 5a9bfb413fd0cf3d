//! 快照持久化：每代种群、每代最优个体与诊断日志写入 JSON 文件
//!
//! 目录布局（root 为配置中的 output.path）：
//! - results/pops/population_generation_{g}.json
//! - results/pops_best/population_generation_{g}.json
//! - results/guidance_log.json

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::EvolutionError;
use crate::evolution::collaborators::SnapshotSink;
use crate::evolution::types::Individual;

#[derive(Debug, Clone)]
pub struct JsonSnapshotSink {
    root: PathBuf,
}

impl JsonSnapshotSink {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().join("results"),
        }
    }

    pub fn population_path(&self, generation: usize) -> PathBuf {
        self.root
            .join("pops")
            .join(format!("population_generation_{}.json", generation))
    }

    pub fn best_path(&self, generation: usize) -> PathBuf {
        self.root
            .join("pops_best")
            .join(format!("population_generation_{}.json", generation))
    }

    pub fn guidance_log_path(&self) -> PathBuf {
        self.root.join("guidance_log.json")
    }

    /// 写入 JSON；父目录不存在时自动创建
    fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), EvolutionError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(value)?)?;
        Ok(())
    }
}

impl SnapshotSink for JsonSnapshotSink {
    fn save_population(&self, population: &[Individual], generation: usize) -> Result<(), EvolutionError> {
        Self::write_json(&self.population_path(generation), population)
    }

    fn save_best(&self, best: &Individual, generation: usize) -> Result<(), EvolutionError> {
        Self::write_json(&self.best_path(generation), best)
    }

    fn save_guidance_log(&self, records: &serde_json::Value) -> Result<(), EvolutionError> {
        Self::write_json(&self.guidance_log_path(), records)
    }
}
