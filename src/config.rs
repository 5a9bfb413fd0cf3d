//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `HEURIST__*` 覆盖（双下划线表示嵌套，如 `HEURIST__EVOLUTION__POP_SIZE=16`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmSection,
    pub evolution: EvolutionSection,
    pub insights: InsightsSection,
    pub problem: ProblemSection,
    pub output: OutputSection,
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：deepseek / openai / mock；是否真正启用还取决于 API Key
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    /// 单次请求超时（秒）。生成请求与评估共用整批超时（eval_timeout_secs + batch_headroom_secs），
    /// 超过 batch_headroom_secs 时一次慢回复就可能让整批被丢弃
    pub timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "deepseek".to_string(),
            model: "deepseek-chat".to_string(),
            base_url: None,
            timeout_secs: 15,
        }
    }
}

/// [evolution] 段：种群规模、算子、并行度与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EvolutionSection {
    pub pop_size: usize,
    /// 总代数
    pub n_pop: usize,
    pub operators: Vec<String>,
    /// 与 operators 一一对应的触发概率，缺省为 1.0
    pub operator_weights: Vec<f64>,
    /// 交叉算子的父代数
    pub m: usize,
    pub n_workers: usize,
    pub eval_timeout_secs: u64,
    /// 整批超时 = eval_timeout_secs + batch_headroom_secs
    pub batch_headroom_secs: u64,
    pub use_jit: bool,
    pub debug: bool,
    pub seed: u64,
    pub dedup_retry_budget: usize,
    /// warn / reject
    pub duplicate_objective_policy: String,
    pub history_max_len: usize,
    /// 从零开始时 Initialize 算子的批次数
    pub initial_batches: usize,
    /// 种子算法 JSON（[{algorithm, code}]）
    pub seed_path: Option<PathBuf>,
    /// 断点续跑的种群 JSON
    pub continue_path: Option<PathBuf>,
    pub continue_generation: usize,
}

impl Default for EvolutionSection {
    fn default() -> Self {
        Self {
            pop_size: 8,
            n_pop: 8,
            operators: vec!["e1".into(), "e2".into(), "m1".into(), "m2".into()],
            operator_weights: Vec::new(),
            m: 2,
            n_workers: 4,
            eval_timeout_secs: 30,
            batch_headroom_secs: 15,
            use_jit: false,
            debug: false,
            seed: 2024,
            dedup_retry_budget: 1,
            duplicate_objective_policy: "warn".to_string(),
            history_max_len: 50,
            initial_batches: 2,
            seed_path: None,
            continue_path: None,
            continue_generation: 0,
        }
    }
}

/// [insights] 段：洞察池容量、检索数量与策略
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InsightsSection {
    pub max_size: usize,
    pub tips_per_request: usize,
    pub strategy: String,
    /// 每批之后从优秀个体中提炼洞察的概率
    pub extraction_probability: f64,
    /// 为空时使用内置的默认洞察
    pub initial_tips: Vec<String>,
}

impl Default for InsightsSection {
    fn default() -> Self {
        Self {
            max_size: 30,
            tips_per_request: 3,
            strategy: "adaptive".to_string(),
            extraction_probability: 0.8,
            initial_tips: Vec::new(),
        }
    }
}

/// [problem] 段：目标函数的描述（拼入生成 prompt）与外部评估命令
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProblemSection {
    pub task: String,
    pub func_name: String,
    pub func_inputs: Vec<String>,
    pub func_outputs: Vec<String>,
    pub inout_inf: String,
    pub other_inf: String,
    /// 评估命令（程序 + 参数），候选代码文件路径追加为最后一个参数
    pub evaluator_command: Vec<String>,
}

impl Default for ProblemSection {
    fn default() -> Self {
        Self {
            task: "Given a sequence of items and a set of identical bins with a fixed capacity, \
                   you need to assign each item to a bin to minimize the total number of bins used. \
                   The task can be solved step-by-step by taking the next item and deciding which bin \
                   to place it in based on a score."
                .to_string(),
            func_name: "score".to_string(),
            func_inputs: vec!["item".into(), "bins".into()],
            func_outputs: vec!["scores".into()],
            inout_inf: "'item' and 'bins' are the size of current item and the rest capacities of \
                        feasible bins, which are larger than the item size. The output named 'scores' \
                        is the scores for the bins for assignment."
                .to_string(),
            other_inf: "Note that 'item' is of type int, while 'bins' and 'scores' are both Numpy arrays. \
                        The novel function should be sufficiently complex in order to achieve better \
                        performance. It is important to ensure self-consistency."
                .to_string(),
            evaluator_command: vec!["python3".into(), "demos/bp_online/evaluate.py".into()],
        }
    }
}

/// [output] 段：快照目录与诊断日志
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    pub path: PathBuf,
    pub guidance_log: bool,
    /// 每隔多少代落盘一次诊断日志（最后一代总会落盘）
    pub guidance_log_every: usize,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./output"),
            guidance_log: true,
            guidance_log_every: 5,
        }
    }
}

/// 从 config 目录加载配置，环境变量 HEURIST__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 HEURIST__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("HEURIST")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("evolution.operators")
            .with_list_parse_key("evolution.operator_weights")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
