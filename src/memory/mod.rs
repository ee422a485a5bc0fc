//! 记忆层：对话消息模型、托管记忆服务契约与实现、记忆钩子、记忆资源生命周期

pub mod client;
pub mod conversation;
pub mod hook;
pub mod http;
pub mod in_memory;
pub mod setup;

pub use client::{
    CreateMemoryRequest, MemoryClient, MemoryError, MemoryRecord, MemoryResource, RecordContent,
    SemanticStrategy, Turn, TurnMessage, TurnRole,
};
pub use conversation::{ContentBlock, Message, Role};
pub use hook::{MemoryHook, MemoryHookSettings};
pub use http::HttpMemoryClient;
pub use in_memory::InMemoryMemoryClient;
pub use setup::{create_memory_resource, delete_memory, setup_memory, MEMORY_ID_PARAM};
