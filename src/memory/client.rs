//! 托管记忆服务契约
//!
//! MemoryClient 描述外部记忆服务提供的全部能力：按会话读取最近 k 轮对话、
//! 按命名空间语义检索、追加对话事件，以及记忆资源本身的创建 / 查询 / 删除。
//! 实现见 InMemoryMemoryClient（进程内）与 HttpMemoryClient（REST）。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::memory::Role;

/// 记忆服务错误
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Memory resource not found: {0}")]
    NotFound(String),

    #[error("Memory service returned {status}: {message}")]
    Service { status: u16, message: String },

    #[error("Memory transport error: {0}")]
    Transport(String),

    #[error("Memory response decode error: {0}")]
    Decode(String),
}

/// 记忆服务中的对话角色（线上格式为大写）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TurnRole {
    User,
    Assistant,
}

impl From<Role> for TurnRole {
    fn from(role: Role) -> Self {
        match role {
            Role::Assistant => TurnRole::Assistant,
            _ => TurnRole::User,
        }
    }
}

impl From<TurnRole> for Role {
    fn from(role: TurnRole) -> Self {
        match role {
            TurnRole::Assistant => Role::Assistant,
            TurnRole::User => Role::User,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TurnMessage {
    pub role: TurnRole,
    pub text: String,
}

impl TurnMessage {
    pub fn new(role: TurnRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }
}

/// 一轮对话：通常为 user 提问 + assistant 回答
pub type Turn = Vec<TurnMessage>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordContent {
    pub text: String,
}

/// 语义检索结果
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub content: RecordContent,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub score: f32,
}

/// 记忆提取策略（目前只用语义策略）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SemanticStrategy {
    pub name: String,
    pub description: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateMemoryRequest {
    pub name: String,
    pub description: String,
    /// 对话事件保留天数
    pub event_expiry_days: u32,
    pub strategies: Vec<SemanticStrategy>,
}

/// 记忆资源
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemoryResource {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: String,
}

#[async_trait]
pub trait MemoryClient: Send + Sync {
    /// 最近 k 轮对话，旧的在前
    async fn get_last_k_turns(
        &self,
        memory_id: &str,
        actor_id: &str,
        session_id: &str,
        k: usize,
    ) -> Result<Vec<Turn>, MemoryError>;

    async fn retrieve_memories(
        &self,
        memory_id: &str,
        namespace: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<MemoryRecord>, MemoryError>;

    /// 按顺序追加 (text, role) 列表
    async fn save_conversation(
        &self,
        memory_id: &str,
        actor_id: &str,
        session_id: &str,
        messages: &[(String, Role)],
    ) -> Result<(), MemoryError>;

    async fn get_memory(&self, memory_id: &str) -> Result<MemoryResource, MemoryError>;

    async fn create_memory(
        &self,
        request: CreateMemoryRequest,
    ) -> Result<MemoryResource, MemoryError>;

    async fn delete_memory(&self, memory_id: &str) -> Result<(), MemoryError>;
}
