//! Bee Support - 客服智能体
//!
//! 模块划分：
//! - **agent**: 客服 Agent（工具调用循环、生命周期钩子、流式回答）
//! - **auth**: OAuth 客户端凭据、托管身份服务、访问令牌来源
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型与恢复策略
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **memory**: 对话消息模型、托管记忆服务、记忆钩子
//! - **observability**: 日志初始化
//! - **params**: 参数存储（记忆 ID、provider 名等）
//! - **react**: Planner 与单步推理
//! - **task**: 任务入口（响应队列、请求上下文、会话缓存）
//! - **tools**: 客服 Mock 工具、Google Calendar 工具与执行器

pub mod agent;
pub mod auth;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod params;
pub mod react;
pub mod task;
pub mod tools;

pub use agent::{SupportAgent, SupportAgentBuilder};
pub use task::{agent_task, ResponseQueue, SessionAgents, TaskContext, TaskDeps};
