//! 错误恢复引擎
//!
//! 根据 AgentError 类型返回 RecoveryAction，供 Agent 主循环决定是重试、回写观察还是终止。

use crate::core::{AgentError, RecoveryAction};

/// 语义化错误恢复：将错误映射为可执行动作（重试提示 / 回写观察 / 终止）
#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, err: &AgentError) -> RecoveryAction {
        match err {
            AgentError::JsonParseError(raw) => RecoveryAction::RetryWithPrompt(format!(
                "Your previous tool call was not valid JSON: {raw}. \
                When calling a tool, output exactly one JSON object and nothing else, \
                formatted as {{\"tool\": \"tool_name\", \"args\": {{...}}}}."
            )),
            AgentError::HallucinatedTool(name) => RecoveryAction::Observe(format!(
                "Tool '{name}' does not exist. Use one of the available tools or answer directly."
            )),
            AgentError::ToolTimeout(name) => {
                RecoveryAction::Observe(format!("Tool '{name}' timed out."))
            }
            AgentError::ToolExecutionFailed(msg) => {
                RecoveryAction::Observe(format!("Tool failed: {msg}"))
            }
            _ => RecoveryAction::Abort,
        }
    }
}
