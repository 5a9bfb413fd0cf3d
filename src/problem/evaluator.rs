//! 外部命令评估器
//!
//! 把候选代码写入临时文件，运行配置的命令（文件路径作为最后一个参数），
//! 以 stdout 最后一个非空行解析出的浮点数作为目标值（越小越好）。
//! 子进程设置了 kill_on_drop：评估 future 被超时丢弃时子进程随之被杀死。

use std::io::Write;

use async_trait::async_trait;
use tokio::process::Command;

use crate::core::EvolutionError;
use crate::evolution::collaborators::Evaluator;

#[derive(Debug, Clone)]
pub struct CommandEvaluator {
    program: String,
    args: Vec<String>,
}

impl CommandEvaluator {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// 由 `[program, args...]` 构造；空命令为配置错误
    pub fn from_command(command: &[String]) -> Result<Self, EvolutionError> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| EvolutionError::Config("problem.evaluator_command is empty".to_string()))?;
        Ok(Self::new(program.clone(), args.to_vec()))
    }
}

/// stdout 最后一个非空行解析为 f64
pub fn parse_objective(stdout: &str) -> Result<f64, EvolutionError> {
    let line = stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| EvolutionError::Evaluation("evaluator printed nothing".to_string()))?;
    line.parse::<f64>()
        .map_err(|_| EvolutionError::Evaluation(format!("cannot parse objective from '{}'", line)))
}

#[async_trait]
impl Evaluator for CommandEvaluator {
    async fn evaluate(&self, code: &str) -> Result<f64, EvolutionError> {
        let mut file = tempfile::Builder::new()
            .prefix("candidate_")
            .suffix(".py")
            .tempfile()?;
        file.write_all(code.as_bytes())?;
        file.flush()?;

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(file.path())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EvolutionError::Evaluation(format!(
                "evaluator exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        parse_objective(&String::from_utf8_lossy(&output.stdout))
    }
}
