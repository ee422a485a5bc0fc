//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按顺序返回预设回复；脚本用完后把最后一条 User 文本作为最终回答回显。
//! 每次调用收到的消息都会被记录，便于断言记忆注入与工具结果回写。

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::llm::LlmClient;
use crate::memory::{Message, Role};

#[derive(Debug, Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预设回复，依次消费
    pub fn scripted<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Mutex::new(responses.into_iter().map(Into::into).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// 每次 complete 收到的完整消息列表
    pub async fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        self.calls.lock().await.push(messages.to_vec());
        if let Some(next) = self.script.lock().await.pop_front() {
            return Ok(next);
        }
        let last_user = messages
            .iter()
            .rev()
            .filter(|m| m.role == Role::User)
            .find_map(|m| m.text())
            .unwrap_or("(no input)");
        Ok(format!("Echo from Mock: {last_user}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_then_echo() {
        let llm = MockLlmClient::scripted(["first"]);
        let messages = vec![Message::user("hello")];
        assert_eq!(llm.complete(&messages).await.unwrap(), "first");
        assert_eq!(llm.complete(&messages).await.unwrap(), "Echo from Mock: hello");
        assert_eq!(llm.calls().await.len(), 2);
    }
}
