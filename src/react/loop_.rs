//! 单轮推理步骤
//!
//! Plan -> Act (Tool) -> Observe，由 SupportAgent::stream 逐步驱动：
//! plan_step 规划一次并解析输出，observe 执行工具并把失败转为观察文本，chunk_text 切分最终回复。

use crate::core::{AgentError, RecoveryAction, RecoveryEngine};
use crate::memory::Message;
use crate::react::{parse_llm_output, AgentState, Planner, PlannerOutput, ToolCall};
use crate::tools::ToolExecutor;

/// 单次对话内最大推理步数，防止死循环
pub const MAX_REACT_STEPS: usize = 10;
/// 流式回复时每段字符数
pub const CHUNK_CHARS: usize = 6;

/// 一次规划的结果
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// 最终回答
    Final(String),
    ToolCall(ToolCall),
    /// 输出无法解析，带纠正提示重试
    Retry(String),
}

/// 以当前状态规划一步；hint 为上一步的纠正提示，只对本次规划可见，不写入对话
pub async fn plan_step(
    planner: &Planner,
    recovery: &RecoveryEngine,
    state: &AgentState,
    hint: Option<&str>,
) -> Result<StepOutcome, AgentError> {
    let output = match hint {
        Some(hint) => {
            let mut messages = state.messages.clone();
            messages.push(Message::user(hint));
            planner.plan(&messages, &state.system_prompt).await?
        }
        None => planner.plan(&state.messages, &state.system_prompt).await?,
    };

    match parse_llm_output(&output) {
        Ok(PlannerOutput::Response(text)) => Ok(StepOutcome::Final(text)),
        Ok(PlannerOutput::ToolCall(call)) => Ok(StepOutcome::ToolCall(call)),
        Err(e) => match recovery.handle(&e) {
            RecoveryAction::RetryWithPrompt(prompt) => {
                tracing::warn!("Unparseable planner output, retrying: {e}");
                Ok(StepOutcome::Retry(prompt))
            }
            _ => Err(e),
        },
    }
}

/// 执行工具；未注册 / 超时 / 失败转为观察文本交给模型，其余错误向上返回
pub async fn observe(
    executor: &ToolExecutor,
    recovery: &RecoveryEngine,
    call: &ToolCall,
) -> Result<String, AgentError> {
    match executor.execute(&call.tool, call.args.clone()).await {
        Ok(output) => Ok(output),
        Err(e) => match recovery.handle(&e) {
            RecoveryAction::Observe(observation) => {
                tracing::warn!(tool = %call.tool, "Tool failed: {e}");
                Ok(observation)
            }
            _ => Err(e),
        },
    }
}

/// 按字符切分（不会切断多字节字符）
pub fn chunk_text(text: &str, size: usize) -> Vec<String> {
    let size = size.max(1);
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(size).map(|c| c.iter().collect()).collect()
}
