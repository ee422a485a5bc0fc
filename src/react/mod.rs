//! 认知层：生命周期钩子、Planner、单步推理

pub mod hooks;
pub mod loop_;
pub mod planner;

pub use hooks::{AgentHook, AgentState};
pub use loop_::{chunk_text, observe, plan_step, StepOutcome, CHUNK_CHARS, MAX_REACT_STEPS};
pub use planner::{parse_llm_output, Planner, PlannerOutput, ToolCall};
