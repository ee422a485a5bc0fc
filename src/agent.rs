//! 客服 Agent 运行时
//!
//! SupportAgent 持有 Planner / ToolExecutor / Recovery、生命周期钩子与对话状态。
//! 构建时校验网关令牌并触发 on_initialize；stream 对单条用户输入逐步推理，
//! 以固定长度的文本片段流式产出最终回答。每追加一条消息都会同步调用 on_message_added。

use std::sync::Arc;

use futures_util::Stream;
use tokio_util::sync::CancellationToken;

use crate::core::{AgentError, RecoveryEngine};
use crate::llm::LlmClient;
use crate::memory::Message;
use crate::react::{
    chunk_text, observe, plan_step, AgentHook, AgentState, Planner, StepOutcome, CHUNK_CHARS,
    MAX_REACT_STEPS,
};
use crate::tools::{ToolExecutor, ToolRegistry};

/// 在基础 prompt 后附加工具 schema（无工具时原样返回）
pub fn full_system_prompt(base: &str, tools: &ToolRegistry) -> String {
    let tool_schema = tools.to_schema_json();
    if tool_schema.is_empty() || tool_schema == "[]" {
        base.to_string()
    } else {
        format!(
            "{}\n\n## Tool call JSON Schema (you must output valid JSON matching this)\n```json\n{}\n```\n\nAvailable tools:\n{}",
            base,
            crate::tools::tool_call_schema_json(),
            tool_schema
        )
    }
}

pub struct SupportAgentBuilder {
    llm: Option<Arc<dyn LlmClient>>,
    tools: ToolRegistry,
    hooks: Vec<Arc<dyn AgentHook>>,
    system_prompt: String,
    bearer_token: String,
    max_steps: usize,
    tool_timeout_secs: u64,
    cancel_token: CancellationToken,
}

impl Default for SupportAgentBuilder {
    fn default() -> Self {
        Self {
            llm: None,
            tools: ToolRegistry::new(),
            hooks: Vec::new(),
            system_prompt: crate::config::DEFAULT_SYSTEM_PROMPT.to_string(),
            bearer_token: String::new(),
            max_steps: MAX_REACT_STEPS,
            tool_timeout_secs: 30,
            cancel_token: CancellationToken::new(),
        }
    }
}

impl SupportAgentBuilder {
    pub fn llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn hook(mut self, hook: Arc<dyn AgentHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// 网关访问令牌（bearer）
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = token.into();
        self
    }

    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn tool_timeout_secs(mut self, secs: u64) -> Self {
        self.tool_timeout_secs = secs;
        self
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    pub async fn build(self) -> Result<SupportAgent, AgentError> {
        if self.bearer_token.is_empty() {
            return Err(AgentError::MissingGatewayToken);
        }
        let llm = self
            .llm
            .ok_or_else(|| AgentError::ConfigError("no LLM client configured".to_string()))?;

        let prompt = full_system_prompt(&self.system_prompt, &self.tools);
        let mut state = AgentState::new(prompt);
        for hook in &self.hooks {
            hook.on_initialize(&mut state).await;
        }
        tracing::info!(
            tools = ?self.tools.tool_names(),
            history = state.messages.len(),
            "Support agent ready"
        );

        Ok(SupportAgent {
            planner: Planner::new(llm),
            executor: ToolExecutor::new(self.tools, self.tool_timeout_secs),
            recovery: RecoveryEngine::new(),
            hooks: self.hooks,
            state,
            max_steps: self.max_steps,
            cancel_token: self.cancel_token,
        })
    }
}

pub struct SupportAgent {
    planner: Planner,
    executor: ToolExecutor,
    recovery: RecoveryEngine,
    hooks: Vec<Arc<dyn AgentHook>>,
    state: AgentState,
    max_steps: usize,
    cancel_token: CancellationToken,
}

impl SupportAgent {
    pub fn builder() -> SupportAgentBuilder {
        SupportAgentBuilder::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.state.messages
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.executor.tool_names()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// 追加消息并依次调用 on_message_added；任一钩子失败即返回
    async fn push_message(&mut self, message: Message) -> Result<(), AgentError> {
        self.state.messages.push(message);
        for hook in &self.hooks {
            hook.on_message_added(&mut self.state).await?;
        }
        Ok(())
    }

    /// 处理一条用户输入，流式产出最终回答的片段；出错时产出 Err 并结束
    pub fn stream<'a>(
        &'a mut self,
        user_query: &'a str,
    ) -> impl Stream<Item = Result<String, AgentError>> + Send + 'a {
        async_stream::try_stream! {
            self.push_message(Message::user(user_query)).await?;

            let mut hint: Option<String> = None;
            let mut step = 0;
            loop {
                if self.cancel_token.is_cancelled() {
                    Err::<(), AgentError>(AgentError::Cancelled)?;
                }
                if step >= self.max_steps {
                    Err::<(), AgentError>(AgentError::MaxStepsExceeded(self.max_steps))?;
                }
                step += 1;

                let outcome =
                    plan_step(&self.planner, &self.recovery, &self.state, hint.as_deref()).await?;
                hint = None;
                match outcome {
                    StepOutcome::Retry(prompt) => hint = Some(prompt),
                    StepOutcome::ToolCall(call) => {
                        tracing::info!(tool = %call.tool, step, "Tool call");
                        self.push_message(Message::tool_use(call.tool.clone(), call.args.clone()))
                            .await?;
                        let observation = observe(&self.executor, &self.recovery, &call).await?;
                        self.push_message(Message::tool_result(call.tool, observation)).await?;
                    }
                    StepOutcome::Final(text) => {
                        for chunk in chunk_text(&text, CHUNK_CHARS) {
                            yield chunk;
                        }
                        self.push_message(Message::assistant(text)).await?;
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures_util::StreamExt;

    use crate::llm::MockLlmClient;
    use crate::memory::{ContentBlock, InMemoryMemoryClient, MemoryHook, Role};
    use crate::tools::support_tools;

    async fn collect(agent: &mut SupportAgent, query: &str) -> (String, Option<AgentError>) {
        let mut out = String::new();
        let stream = agent.stream(query);
        futures_util::pin_mut!(stream);
        while let Some(item) = stream.next().await {
            match item {
                Ok(chunk) => out.push_str(&chunk),
                Err(e) => return (out, Some(e)),
            }
        }
        (out, None)
    }

    #[tokio::test]
    async fn test_build_rejects_empty_token() {
        let result = SupportAgent::builder()
            .llm(Arc::new(MockLlmClient::new()))
            .build()
            .await;
        assert!(matches!(result, Err(AgentError::MissingGatewayToken)));
    }

    #[tokio::test]
    async fn test_tool_call_then_answer() {
        let llm = Arc::new(MockLlmClient::scripted([
            r#"{"tool": "get_order_status", "args": {"order_id": "12345"}}"#,
            "Your order 12345 has shipped.",
        ]));
        let mut agent = SupportAgent::builder()
            .llm(llm.clone())
            .tools(support_tools())
            .bearer_token("gw-token")
            .build()
            .await
            .unwrap();

        let (answer, err) = collect(&mut agent, "Where is order 12345?").await;
        assert!(err.is_none());
        assert_eq!(answer, "Your order 12345 has shipped.");

        let roles: Vec<Role> = agent.messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
        assert!(matches!(agent.messages()[1].content[0], ContentBlock::ToolUse { .. }));
        assert!(matches!(agent.messages()[2].content[0], ContentBlock::ToolResult { .. }));
        // 第二次规划能看到工具结果
        let calls = llm.calls().await;
        assert!(calls[1].last().unwrap().render().starts_with("Observation from get_order_status"));
        assert!(calls[0][0].text().unwrap().contains("get_order_status"));
    }

    #[tokio::test]
    async fn test_step_cap() {
        let call = r#"{"tool": "get_product_info", "args": {"product_type": "laptop"}}"#;
        let llm = Arc::new(MockLlmClient::scripted(vec![call; 5]));
        let mut agent = SupportAgent::builder()
            .llm(llm)
            .tools(support_tools())
            .bearer_token("t")
            .max_steps(2)
            .build()
            .await
            .unwrap();
        let (answer, err) = collect(&mut agent, "tell me about laptops").await;
        assert!(answer.is_empty());
        assert!(matches!(err, Some(AgentError::MaxStepsExceeded(2))));
    }

    #[tokio::test]
    async fn test_cancelled_before_planning() {
        let mut agent = SupportAgent::builder()
            .llm(Arc::new(MockLlmClient::new()))
            .bearer_token("t")
            .build()
            .await
            .unwrap();
        agent.cancel_token().cancel();
        let (_, err) = collect(&mut agent, "hi").await;
        assert!(matches!(err, Some(AgentError::Cancelled)));
    }

    struct FailingHook;

    #[async_trait]
    impl AgentHook for FailingHook {
        async fn on_message_added(&self, _state: &mut AgentState) -> Result<(), AgentError> {
            Err(AgentError::ConfigError("hook down".to_string()))
        }
    }

    #[tokio::test]
    async fn test_hook_error_aborts_stream() {
        let llm = Arc::new(MockLlmClient::new());
        let mut agent = SupportAgent::builder()
            .llm(llm.clone())
            .hook(Arc::new(FailingHook))
            .bearer_token("t")
            .build()
            .await
            .unwrap();
        let (answer, err) = collect(&mut agent, "hi").await;
        assert!(answer.is_empty());
        assert!(matches!(err, Some(AgentError::ConfigError(_))));
        assert!(llm.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_memory_hook_records_text_turns_only() {
        let memory = Arc::new(InMemoryMemoryClient::new().with_resource("mem-1").await);
        let hook = MemoryHook::new(memory.clone(), Some("mem-1".to_string()), "customer_001", "s1");
        let llm = Arc::new(MockLlmClient::scripted([
            r#"{"tool": "get_return_policy", "args": {"product_category": "smartphones"}}"#,
            "Smartphones can be returned within 30 days.",
        ]));
        let mut agent = SupportAgent::builder()
            .llm(llm)
            .tools(support_tools())
            .hook(Arc::new(hook))
            .bearer_token("t")
            .build()
            .await
            .unwrap();
        let (answer, err) = collect(&mut agent, "What is the return policy for phones?").await;
        assert!(err.is_none(), "{err:?}");
        assert!(!answer.is_empty());

        let events = memory.events("mem-1", "customer_001", "s1").await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].text, "What is the return policy for phones?");
        assert_eq!(events[1].text, "Smartphones can be returned within 30 days.");
    }
}
