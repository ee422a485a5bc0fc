//! 任务入口：把一次用户请求的回答流式写入响应队列
//!
//! 每次调用都在显式的 TaskContext（Agent、响应队列、网关令牌）上运行；
//! Agent 在首次调用时惰性构建（记忆钩子 + 工具），之后同一上下文复用。
//! 无论成功失败，调用结束时都会 finish 队列，消费者不会永久阻塞。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::time::Instant;

use crate::agent::SupportAgent;
use crate::config::{load_system_prompt, AppConfig};
use crate::core::AgentError;
use crate::llm::{LlmClient, MockLlmClient, OpenAiClient};
use crate::memory::{MemoryClient, MemoryHook, MemoryHookSettings, MEMORY_ID_PARAM};
use crate::params::ParameterStore;
use crate::tools::{support_tools, CalendarToolset};

/// 队列中的一项：回答片段或结束标记
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueItem {
    Chunk(String),
    Finished,
}

/// 响应队列（生产端）；clone 后共享同一结束状态
#[derive(Debug, Clone)]
pub struct ResponseQueue {
    tx: mpsc::UnboundedSender<QueueItem>,
    finished: Arc<AtomicBool>,
}

/// 响应队列（消费端）
#[derive(Debug)]
pub struct ResponseReceiver {
    rx: mpsc::UnboundedReceiver<QueueItem>,
    done: bool,
}

impl ResponseQueue {
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (ResponseQueue, ResponseReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            ResponseQueue {
                tx,
                finished: Arc::new(AtomicBool::new(false)),
            },
            ResponseReceiver { rx, done: false },
        )
    }

    /// 写入一个片段；finish 之后的写入被丢弃
    pub fn put(&self, chunk: impl Into<String>) {
        if self.is_finished() {
            tracing::debug!("Dropping chunk written after finish");
            return;
        }
        let _ = self.tx.send(QueueItem::Chunk(chunk.into()));
    }

    /// 标记结束；重复调用无副作用
    pub fn finish(&self) {
        if !self.finished.swap(true, Ordering::SeqCst) {
            let _ = self.tx.send(QueueItem::Finished);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

impl ResponseReceiver {
    /// 下一个片段；收到结束标记或所有生产端都已释放后返回 None
    pub async fn recv(&mut self) -> Option<String> {
        if self.done {
            return None;
        }
        match self.rx.recv().await {
            Some(QueueItem::Chunk(chunk)) => Some(chunk),
            Some(QueueItem::Finished) | None => {
                self.done = true;
                None
            }
        }
    }

    pub async fn collect(mut self) -> Vec<String> {
        let mut chunks = Vec::new();
        while let Some(chunk) = self.recv().await {
            chunks.push(chunk);
        }
        chunks
    }
}

/// 单个会话的请求上下文
pub struct TaskContext {
    pub agent: Option<SupportAgent>,
    pub response_queue: ResponseQueue,
    pub gateway_token: Option<String>,
}

impl TaskContext {
    pub fn new(response_queue: ResponseQueue, gateway_token: Option<String>) -> Self {
        Self {
            agent: None,
            response_queue,
            gateway_token,
        }
    }
}

/// 由网关令牌与记忆钩子构建 Agent
#[async_trait]
pub trait AgentFactory: Send + Sync {
    async fn create(&self, gateway_token: &str, memory_hook: MemoryHook) -> Result<SupportAgent, AgentError>;
}

/// 按配置构建 LLM，注册四个客服工具与（可选的）日历工具；网关令牌作为 LLM 的 bearer
pub struct DefaultAgentFactory {
    cfg: AppConfig,
    system_prompt: String,
    calendar: Option<CalendarToolset>,
}

impl DefaultAgentFactory {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            cfg: cfg.clone(),
            system_prompt: load_system_prompt(cfg),
            calendar: None,
        }
    }

    pub fn with_calendar(mut self, calendar: CalendarToolset) -> Self {
        self.calendar = Some(calendar);
        self
    }

    fn create_llm(&self, gateway_token: &str) -> Arc<dyn LlmClient> {
        match self.cfg.llm.provider.to_lowercase().as_str() {
            "mock" => {
                tracing::warn!("Using Mock LLM");
                Arc::new(MockLlmClient::new())
            }
            _ => {
                tracing::info!("Using OpenAI-compatible LLM ({})", self.cfg.llm.model);
                Arc::new(
                    OpenAiClient::new(
                        self.cfg.llm.base_url.as_deref(),
                        &self.cfg.llm.model,
                        Some(gateway_token),
                    )
                    .with_request_timeout(self.cfg.llm.request_timeout_secs),
                )
            }
        }
    }
}

#[async_trait]
impl AgentFactory for DefaultAgentFactory {
    async fn create(&self, gateway_token: &str, memory_hook: MemoryHook) -> Result<SupportAgent, AgentError> {
        let mut tools = support_tools();
        if let Some(calendar) = &self.calendar {
            calendar.register(&mut tools);
        }
        SupportAgent::builder()
            .llm(self.create_llm(gateway_token))
            .tools(tools)
            .hook(Arc::new(memory_hook))
            .system_prompt(self.system_prompt.clone())
            .bearer_token(gateway_token)
            .tool_timeout_secs(self.cfg.tools.tool_timeout_secs)
            .build()
            .await
    }
}

/// agent_task 的共享依赖
#[derive(Clone)]
pub struct TaskDeps {
    pub memory: Arc<dyn MemoryClient>,
    pub params: Arc<dyn ParameterStore>,
    pub factory: Arc<dyn AgentFactory>,
    pub memory_settings: MemoryHookSettings,
}

/// 处理一条用户消息：回答片段按序写入 ctx.response_queue，结束时 finish。
/// 出错时写入 "Error: ..." 片段并返回该错误。
pub async fn agent_task(
    ctx: &mut TaskContext,
    deps: &TaskDeps,
    user_message: &str,
    session_id: &str,
    actor_id: &str,
) -> Result<(), AgentError> {
    let queue = ctx.response_queue.clone();

    let Some(token) = ctx.gateway_token.clone().filter(|t| !t.is_empty()) else {
        let err = AgentError::MissingGatewayToken;
        tracing::error!(session = %session_id, "{err}");
        queue.put(format!("Error: {err}"));
        queue.finish();
        return Err(err);
    };

    let result = run_task(ctx, deps, &queue, &token, user_message, session_id, actor_id).await;
    if let Err(e) = &result {
        tracing::error!(session = %session_id, "Agent task failed: {e}");
        queue.put(format!("Error: {e}"));
    }
    queue.finish();
    result
}

async fn run_task(
    ctx: &mut TaskContext,
    deps: &TaskDeps,
    queue: &ResponseQueue,
    token: &str,
    user_message: &str,
    session_id: &str,
    actor_id: &str,
) -> Result<(), AgentError> {
    if ctx.agent.is_none() {
        let memory_id = match deps.params.get(MEMORY_ID_PARAM).await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!("Reading memory id failed, continuing without memory: {e}");
                None
            }
        };
        let hook = MemoryHook::new(deps.memory.clone(), memory_id, actor_id, session_id)
            .with_settings(deps.memory_settings.clone());
        let agent = deps.factory.create(token, hook).await?;
        tracing::info!(session = %session_id, actor = %actor_id, "Agent created");
        ctx.agent = Some(agent);
    }
    let Some(agent) = ctx.agent.as_mut() else {
        return Err(AgentError::ConfigError("agent not initialised".to_string()));
    };

    let stream = agent.stream(user_message);
    futures_util::pin_mut!(stream);
    while let Some(chunk) = stream.next().await {
        queue.put(chunk?);
    }
    Ok(())
}

struct SessionEntry {
    ctx: Arc<Mutex<TaskContext>>,
    last_used: Instant,
}

/// 按会话缓存 TaskContext；同一会话的调用在 Mutex 上串行执行。
///
/// 会话不会自动过期，除非设置了 with_idle_timeout（每次 invoke 前清理空闲会话）；
/// 否则调用方需要在会话结束时 remove，或定期调用 evict_idle。
#[derive(Default)]
pub struct SessionAgents {
    sessions: RwLock<HashMap<String, SessionEntry>>,
    idle_timeout: Option<Duration>,
}

impl SessionAgents {
    pub fn new() -> Self {
        Self::default()
    }

    /// 空闲超过 idle 的会话在下一次 invoke 时被移除
    pub fn with_idle_timeout(mut self, idle: Duration) -> Self {
        self.idle_timeout = Some(idle);
        self
    }

    /// 取会话上下文，不存在时新建（尚无 Agent）；同时刷新最近使用时间
    pub async fn context(&self, session_id: &str) -> Arc<Mutex<TaskContext>> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                let (queue, _) = ResponseQueue::new();
                SessionEntry {
                    ctx: Arc::new(Mutex::new(TaskContext::new(queue, None))),
                    last_used: Instant::now(),
                }
            });
        entry.last_used = Instant::now();
        Arc::clone(&entry.ctx)
    }

    pub async fn remove(&self, session_id: &str) -> bool {
        self.sessions.write().await.remove(session_id).is_some()
    }

    /// 移除空闲超过 max_idle 且没有被持有（无进行中调用）的会话，返回移除数量
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| {
            entry.last_used.elapsed() < max_idle || Arc::strong_count(&entry.ctx) > 1
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::info!(evicted, remaining = sessions.len(), "Evicted idle sessions");
        }
        evicted
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// 在后台运行一次 agent_task，返回本次调用的响应接收端
    pub async fn invoke(
        &self,
        deps: Arc<TaskDeps>,
        session_id: &str,
        actor_id: &str,
        gateway_token: Option<String>,
        user_message: impl Into<String>,
    ) -> ResponseReceiver {
        if let Some(idle) = self.idle_timeout {
            self.evict_idle(idle).await;
        }
        let (queue, receiver) = ResponseQueue::new();
        let ctx = self.context(session_id).await;
        let session_id = session_id.to_string();
        let actor_id = actor_id.to_string();
        let user_message = user_message.into();

        tokio::spawn(async move {
            let mut ctx = ctx.lock().await;
            ctx.response_queue = queue;
            ctx.gateway_token = gateway_token;
            if let Err(e) = agent_task(&mut ctx, &deps, &user_message, &session_id, &actor_id).await {
                tracing::debug!(session = %session_id, "Invocation ended with error: {e}");
            }
        });
        receiver
    }
}
