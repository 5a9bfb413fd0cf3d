//! Mock LLM 客户端（用于测试与无 API Key 的本地试跑）
//!
//! 生成请求返回 `{算法描述}` + python 代码块，代码中带递增编号以免全部重复；
//! 提炼原则的请求（prompt 含 "[design principles]"）返回以 "- " 开头的条目。

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::llm::{LlmClient, Message, Role};

#[derive(Debug, Default)]
pub struct MockLlmClient {
    calls: AtomicUsize,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        let n = self.calls.fetch_add(1, Ordering::Relaxed);
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("");

        if last_user.contains("[design principles]") {
            return Ok("- Prefer bins whose remaining capacity closely matches the item size\n\
                       - Penalize leaving tiny unusable gaps after placement"
                .to_string());
        }

        Ok(format!(
            "{{The mock heuristic #{n} scores each bin by its residual capacity after placing the item.}}\n\
             ```python\n\
             import numpy as np\n\n\
             def score(item, bins):\n    \
             scores = -(bins - item) + {n} * 1e-6\n    \
             return scores\n\
             ```"
        ))
    }
}
