//! Agent 生命周期钩子
//!
//! 由 Agent 主循环在固定时机同步调用：构建完成后 on_initialize，每追加一条消息后 on_message_added。
//! 钩子可以改写 AgentState（system prompt 与消息列表）。

use async_trait::async_trait;

use crate::core::AgentError;
use crate::memory::Message;

/// 钩子可见、可改写的 Agent 状态
#[derive(Debug, Clone, Default)]
pub struct AgentState {
    pub system_prompt: String,
    pub messages: Vec<Message>,
}

impl AgentState {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            messages: Vec::new(),
        }
    }
}

#[async_trait]
pub trait AgentHook: Send + Sync {
    /// Agent 构建完成后调用一次；不允许失败
    async fn on_initialize(&self, _state: &mut AgentState) {}

    /// 每次向 messages 追加消息后调用；返回 Err 会中止本次对话
    async fn on_message_added(&self, _state: &mut AgentState) -> Result<(), AgentError> {
        Ok(())
    }
}
