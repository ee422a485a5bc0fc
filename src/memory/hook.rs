//! 记忆钩子：让 Agent 的上下文与托管记忆服务保持同步
//!
//! - on_initialize：拉取最近 k 轮对话替换消息列表，并在 system prompt 末尾追加「被动使用记忆」指令；
//!   任何失败只记日志，不影响 Agent 现有状态。
//! - on_message_added：最后一条带文本的 user/assistant 消息写入记忆服务；
//!   若为 user 消息，先按 preferences、facts 两个命名空间检索，把结果追加到该消息文本后再交给模型。
//!
//! 检索与写入是两个独立的失败域：检索失败只告警，写入照常进行；写入失败返回 AgentError::MemorySave。

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::MemorySection;
use crate::core::AgentError;
use crate::memory::client::MemoryClient;
use crate::memory::{Message, Role};
use crate::react::{AgentHook, AgentState};

/// 追加到 system prompt 的固定指令
pub const PASSIVE_MEMORY_INSTRUCTION: &str = "\nDo not respond to user preferences or user facts.\n\
Strictly use user preferences and user facts to know more about the user.\n";

pub const PREFERENCES_LABEL: &str = "These are user preferences:";
pub const FACTS_LABEL: &str = "These are user facts:";

/// 钩子参数：读取轮数、检索条数、命名空间前缀
#[derive(Debug, Clone)]
pub struct MemoryHookSettings {
    pub last_k_turns: usize,
    pub top_k: usize,
    pub namespace_prefix: String,
}

impl Default for MemoryHookSettings {
    fn default() -> Self {
        Self {
            last_k_turns: 5,
            top_k: 3,
            namespace_prefix: "support/user".to_string(),
        }
    }
}

impl From<&MemorySection> for MemoryHookSettings {
    fn from(section: &MemorySection) -> Self {
        Self {
            last_k_turns: section.last_k_turns,
            top_k: section.top_k,
            namespace_prefix: section.namespace_prefix.clone(),
        }
    }
}

pub struct MemoryHook {
    client: Arc<dyn MemoryClient>,
    /// None 表示记忆资源创建失败（降级模式），钩子不做任何事
    memory_id: Option<String>,
    actor_id: String,
    session_id: String,
    settings: MemoryHookSettings,
}

impl MemoryHook {
    pub fn new(
        client: Arc<dyn MemoryClient>,
        memory_id: Option<String>,
        actor_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            memory_id,
            actor_id: actor_id.into(),
            session_id: session_id.into(),
            settings: MemoryHookSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: MemoryHookSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn memory_id(&self) -> Option<&str> {
        self.memory_id.as_deref()
    }

    pub fn actor_id(&self) -> &str {
        &self.actor_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn namespace(&self, kind: &str) -> String {
        format!("{}/{}/{}", self.settings.namespace_prefix, self.actor_id, kind)
    }

    /// 检索一个命名空间，有结果时返回带标签的追加段落
    async fn retrieve_section(
        &self,
        memory_id: &str,
        kind: &str,
        label: &str,
        query: &str,
    ) -> Result<Option<String>, AgentError> {
        let namespace = self.namespace(kind);
        let records = self
            .client
            .retrieve_memories(memory_id, &namespace, query, self.settings.top_k)
            .await?;
        if records.is_empty() {
            return Ok(None);
        }
        let body = records
            .iter()
            .map(|r| r.content.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        Ok(Some(format!("\n\n{label}\n\n{body}\n\n")))
    }

    /// preferences 在前、facts 在后；单个命名空间失败不影响另一个
    async fn retrieved_context(&self, memory_id: &str, query: &str) -> String {
        let mut context = String::new();
        for (kind, label) in [("preferences", PREFERENCES_LABEL), ("facts", FACTS_LABEL)] {
            match self.retrieve_section(memory_id, kind, label, query).await {
                Ok(Some(section)) => context.push_str(&section),
                Ok(None) => {}
                Err(e) => tracing::warn!(namespace = %self.namespace(kind), "Memory retrieve error: {e}"),
            }
        }
        context
    }
}

/// 把记忆服务中的轮次展开为 Agent 消息（保持原顺序）
pub fn turns_to_messages(turns: &[crate::memory::Turn]) -> Vec<Message> {
    turns
        .iter()
        .flatten()
        .map(|m| match Role::from(m.role) {
            Role::Assistant => Message::assistant(m.text.clone()),
            _ => Message::user(m.text.clone()),
        })
        .collect()
}

#[async_trait]
impl AgentHook for MemoryHook {
    async fn on_initialize(&self, state: &mut AgentState) {
        let Some(memory_id) = self.memory_id.as_deref() else {
            return;
        };
        let turns = match self
            .client
            .get_last_k_turns(
                memory_id,
                &self.actor_id,
                &self.session_id,
                self.settings.last_k_turns,
            )
            .await
        {
            Ok(turns) => turns,
            Err(e) => {
                tracing::warn!("Memory load error: {e}");
                return;
            }
        };
        if turns.is_empty() {
            return;
        }
        state.messages = turns_to_messages(&turns);
        state.system_prompt.push_str(PASSIVE_MEMORY_INSTRUCTION);
        tracing::info!(
            session = %self.session_id,
            messages = state.messages.len(),
            "Loaded conversation history from memory"
        );
    }

    async fn on_message_added(&self, state: &mut AgentState) -> Result<(), AgentError> {
        let Some(memory_id) = self.memory_id.as_deref() else {
            return Ok(());
        };
        let Some(last) = state.messages.last() else {
            return Ok(());
        };
        let role = last.role;
        if !matches!(role, Role::User | Role::Assistant) {
            return Ok(());
        }
        let Some(text) = last.text().map(str::to_string) else {
            return Ok(());
        };

        if role == Role::User {
            let context = self.retrieved_context(memory_id, &text).await;
            if !context.is_empty() {
                if let Some(current) = state.messages.last_mut().and_then(Message::text_mut) {
                    current.push_str(&context);
                }
            }
        }

        self.client
            .save_conversation(memory_id, &self.actor_id, &self.session_id, &[(text, role)])
            .await
            .map_err(|e| {
                tracing::error!(session = %self.session_id, "Memory save error: {e}");
                AgentError::MemorySave(e)
            })
    }
}
