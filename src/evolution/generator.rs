//! LLM 驱动的代码生成器
//!
//! 回复格式约定：花括号内是一句话的算法描述，随后是 Python 代码（```python 代码块，
//! 或从 import / def 开始的裸代码）。解析失败时重新请求，最多 max_attempts 次。

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;

use crate::core::EvolutionError;
use crate::evolution::collaborators::{GenerationRequest, Generated, Generator};
use crate::evolution::types::Individual;
use crate::llm::{LlmClient, Message};
use crate::problem::ProblemPrompts;

const DEFAULT_MAX_ATTEMPTS: usize = 3;

fn fenced_code() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)```(?:python|py)?[ \t]*\n(.*?)```").expect("static regex"))
}

fn braced_description() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)\{(.*?)\}").expect("static regex"))
}

/// 从回复中取出 (算法描述, 代码)
pub fn parse_reply(reply: &str) -> Option<(String, String)> {
    let (code, rest) = match fenced_code().captures(reply) {
        Some(caps) => {
            let whole = caps.get(0)?;
            let code = caps.get(1)?.as_str().trim().to_string();
            let rest = format!("{}{}", &reply[..whole.start()], &reply[whole.end()..]);
            (code, rest)
        }
        None => {
            let start = ["import ", "from ", "def "]
                .iter()
                .filter_map(|kw| reply.find(kw))
                .min()?;
            (reply[start..].trim().to_string(), reply[..start].to_string())
        }
    };
    if code.is_empty() {
        return None;
    }

    let algorithm = braced_description()
        .captures(&rest)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|a| !a.is_empty())?;
    Some((algorithm, code))
}

/// 取出以 "-" 开头的条目
pub fn parse_principles(reply: &str) -> Vec<String> {
    reply
        .lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix('-'))
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

pub struct LlmGenerator {
    llm: Arc<dyn LlmClient>,
    prompts: ProblemPrompts,
    max_attempts: usize,
}

impl LlmGenerator {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: ProblemPrompts) -> Self {
        Self {
            llm,
            prompts,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    async fn ask(&self, prompt: String) -> Result<String, EvolutionError> {
        self.llm
            .complete(&[Message::user(prompt)])
            .await
            .map_err(EvolutionError::Llm)
    }
}

#[async_trait]
impl Generator for LlmGenerator {
    async fn synthesize(&self, request: GenerationRequest<'_>) -> Result<Generated, EvolutionError> {
        let prompt = self.prompts.operator_prompt(&request);
        for attempt in 1..=self.max_attempts {
            let reply = self.ask(prompt.clone()).await?;
            if let Some((algorithm, code)) = parse_reply(&reply) {
                return Ok(Generated { code, algorithm });
            }
            tracing::debug!(
                operator = %request.operator,
                attempt,
                "reply has no algorithm description or code, asking again"
            );
        }
        Err(EvolutionError::Generation(format!(
            "no parsable reply after {} attempts",
            self.max_attempts
        )))
    }

    async fn extract_principles(&self, elites: &[Individual]) -> Result<Vec<String>, EvolutionError> {
        let reply = self.ask(ProblemPrompts::principles_prompt(elites)).await?;
        Ok(parse_principles(&reply))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::evolution::types::{Operator, Regime};
    use crate::llm::MockLlmClient;

    /// 依次返回预设回复
    struct ScriptedLlm(Mutex<Vec<String>>);

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, _messages: &[Message]) -> Result<String, String> {
            let mut replies = self.0.lock().unwrap();
            if replies.is_empty() {
                return Err("script exhausted".to_string());
            }
            Ok(replies.remove(0))
        }
    }

    fn request() -> GenerationRequest<'static> {
        GenerationRequest {
            operator: Operator::Initialize,
            parents: &[],
            insights: &[],
            directive: "",
            regime: Regime::Balanced,
        }
    }

    #[test]
    fn test_parse_fenced_reply() {
        let reply = "{Pick the bin with the least slack.}\n```python\nimport numpy as np\ndef score(item, bins):\n    return -(bins - item)\n```";
        let (algorithm, code) = parse_reply(reply).unwrap();
        assert_eq!(algorithm, "Pick the bin with the least slack.");
        assert!(code.starts_with("import numpy as np"));
        assert!(code.ends_with("return -(bins - item)"));
    }

    #[test]
    fn test_parse_bare_code_reply() {
        let reply = "Here it is. {Greedy best fit.}\ndef score(item, bins):\n    return {'x': 1}['x'] - bins";
        let (algorithm, code) = parse_reply(reply).unwrap();
        assert_eq!(algorithm, "Greedy best fit.");
        assert!(code.starts_with("def score"));
    }

    #[test]
    fn test_parse_reply_without_description() {
        assert!(parse_reply("```python\ndef score(item, bins):\n    return bins\n```").is_none());
        assert!(parse_reply("{only words}").is_none());
    }

    #[test]
    fn test_parse_principles() {
        let items = parse_principles("Principles:\n- First idea here\n  - Second idea\nnot an item\n-\n");
        assert_eq!(items, vec!["First idea here", "Second idea"]);
    }

    #[tokio::test]
    async fn test_synthesize_retries_unparsable_reply() {
        let llm = ScriptedLlm(Mutex::new(vec![
            "sorry, I cannot".to_string(),
            "{Worst fit.}\n```python\ndef score(item, bins):\n    return bins\n```".to_string(),
        ]));
        let generator = LlmGenerator::new(Arc::new(llm), ProblemPrompts::default());
        let generated = generator.synthesize(request()).await.unwrap();
        assert_eq!(generated.algorithm, "Worst fit.");
    }

    #[tokio::test]
    async fn test_synthesize_gives_up() {
        let llm = ScriptedLlm(Mutex::new(vec!["no".into(), "still no".into()]));
        let generator = LlmGenerator::new(Arc::new(llm), ProblemPrompts::default()).with_max_attempts(2);
        assert!(matches!(
            generator.synthesize(request()).await,
            Err(EvolutionError::Generation(_))
        ));
    }

    #[tokio::test]
    async fn test_llm_error_is_generation_failure() {
        let generator = LlmGenerator::new(Arc::new(ScriptedLlm(Mutex::new(Vec::new()))), ProblemPrompts::default());
        let err = generator.synthesize(request()).await.unwrap_err();
        assert!(err.is_candidate_failure());
    }

    #[tokio::test]
    async fn test_mock_backend_round_trip() {
        let generator = LlmGenerator::new(Arc::new(MockLlmClient::new()), ProblemPrompts::default());
        let generated = generator.synthesize(request()).await.unwrap();
        assert!(generated.code.contains("def score(item, bins):"));
        let principles = generator.extract_principles(&[]).await.unwrap();
        assert_eq!(principles.len(), 2);
    }
}
