//! Agent 错误类型与恢复动作
//!
//! 各层（记忆、鉴权、日历、参数存储）有独立的错误枚举，在 Agent 边界统一汇聚为 AgentError；
//! 与 RecoveryEngine 配合：根据 AgentError 决定 RetryWithPrompt / Observe / Abort。

use thiserror::Error;

use crate::auth::AuthError;
use crate::memory::MemoryError;
use crate::params::ParamError;
use crate::tools::CalendarError;

/// Agent 运行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("JSON parse error: {0}")]
    JsonParseError(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("Hallucinated tool: {0}")]
    HallucinatedTool(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    /// 网关访问令牌为空：任何需鉴权的调用之前都必须检查
    #[error("Gateway Access token is none")]
    MissingGatewayToken,

    /// 记忆写入失败：唯一向调用方传播的记忆错误
    #[error("Memory save error: {0}")]
    MemorySave(#[source] MemoryError),

    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Parameter store error: {0}")]
    Param(#[from] ParamError),

    #[error("Calendar error: {0}")]
    Calendar(#[from] CalendarError),

    /// 单次对话超出最大推理步数
    #[error("Max steps exceeded: {0}")]
    MaxStepsExceeded(usize),

    #[error("Cancelled")]
    Cancelled,
}

/// 恢复引擎根据错误类型给出的建议动作
#[derive(Debug, Clone)]
pub enum RecoveryAction {
    /// 将提示注入下一轮，让 LLM 重试（如 JSON 格式错误）
    RetryWithPrompt(String),
    /// 把错误当作工具观察结果写回对话，让 LLM 自行调整
    Observe(String),
    /// 终止当前任务
    Abort,
}
