//! 客服 Agent 端到端测试：参数存储 + 记忆资源 + 记忆钩子 + Mock 工具 + 日历工具 + 任务入口

use std::sync::Arc;

use async_trait::async_trait;
use bee_support::agent::SupportAgent;
use bee_support::auth::StaticTokenSource;
use bee_support::config::AppConfig;
use bee_support::core::AgentError;
use bee_support::llm::MockLlmClient;
use bee_support::memory::hook::PASSIVE_MEMORY_INSTRUCTION;
use bee_support::memory::{
    create_memory_resource, ContentBlock, InMemoryMemoryClient, MemoryHook, MemoryHookSettings,
};
use bee_support::params::{FileParameterStore, ParameterStore};
use bee_support::task::{
    agent_task, AgentFactory, DefaultAgentFactory, ResponseQueue, SessionAgents, TaskContext,
    TaskDeps,
};
use bee_support::tools::calendar::{CreatedEvent, EventRequest, ListQuery};
use bee_support::tools::{support_tools, CalendarApi, CalendarError, CalendarToolset};
use serde_json::Value;
use tokio::sync::Mutex;

struct FakeCalendar;

#[async_trait]
impl CalendarApi for FakeCalendar {
    async fn insert_event(
        &self,
        _token: &str,
        _calendar_id: &str,
        _event: &EventRequest,
    ) -> Result<CreatedEvent, CalendarError> {
        Ok(CreatedEvent {
            id: Some("evt-42".to_string()),
            html_link: Some("https://calendar.example/evt-42".to_string()),
        })
    }

    async fn list_events(
        &self,
        _token: &str,
        _calendar_id: &str,
        _query: &ListQuery,
    ) -> Result<Vec<Value>, CalendarError> {
        Ok(vec![serde_json::json!({"summary": "Warranty call"})])
    }
}

fn calendar() -> CalendarToolset {
    CalendarToolset {
        tokens: Arc::new(StaticTokenSource("ya29.test".to_string())),
        api: Arc::new(FakeCalendar),
        calendar_id: "primary".to_string(),
        utc_offset_hours: -5,
    }
}

/// 每次创建 Agent 时消费一组脚本回复，并保留 Mock LLM 以便断言
struct ScriptedFactory {
    scripts: Mutex<Vec<Vec<String>>>,
    llms: Mutex<Vec<Arc<MockLlmClient>>>,
}

impl ScriptedFactory {
    fn new(scripts: Vec<Vec<&str>>) -> Self {
        Self {
            scripts: Mutex::new(
                scripts
                    .into_iter()
                    .map(|s| s.into_iter().map(String::from).collect())
                    .collect(),
            ),
            llms: Mutex::new(Vec::new()),
        }
    }

    async fn llm(&self, index: usize) -> Arc<MockLlmClient> {
        Arc::clone(&self.llms.lock().await[index])
    }
}

#[async_trait]
impl AgentFactory for ScriptedFactory {
    async fn create(&self, token: &str, hook: MemoryHook) -> Result<SupportAgent, AgentError> {
        let mut scripts = self.scripts.lock().await;
        let script = if scripts.is_empty() {
            Vec::new()
        } else {
            scripts.remove(0)
        };
        let llm = Arc::new(MockLlmClient::scripted(script));
        self.llms.lock().await.push(llm.clone());

        let mut tools = support_tools();
        calendar().register(&mut tools);
        SupportAgent::builder()
            .llm(llm)
            .tools(tools)
            .hook(Arc::new(hook))
            .bearer_token(token)
            .build()
            .await
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    memory: Arc<InMemoryMemoryClient>,
    memory_id: String,
    deps: TaskDeps,
}

async fn fixture(factory: Arc<dyn AgentFactory>) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let params = Arc::new(FileParameterStore::new(dir.path().join("params.json")));
    let memory = Arc::new(InMemoryMemoryClient::new());
    let memory_id = create_memory_resource(memory.as_ref(), params.as_ref())
        .await
        .expect("memory resource");
    Fixture {
        _dir: dir,
        memory: memory.clone(),
        memory_id,
        deps: TaskDeps {
            memory,
            params,
            factory,
            memory_settings: MemoryHookSettings::default(),
        },
    }
}

async fn ask(ctx: &mut TaskContext, deps: &TaskDeps, text: &str, session: &str) -> String {
    let (queue, receiver) = ResponseQueue::new();
    ctx.response_queue = queue;
    let _ = agent_task(ctx, deps, text, session, "customer_001").await;
    receiver.collect().await.concat()
}

#[tokio::test]
async fn test_memory_id_is_reused_from_parameter_store() {
    let f = fixture(Arc::new(ScriptedFactory::new(vec![]))).await;
    let again = create_memory_resource(f.memory.as_ref(), f.deps.params.as_ref()).await;
    assert_eq!(again.as_deref(), Some(f.memory_id.as_str()));
    assert_eq!(
        f.deps
            .params
            .get(bee_support::memory::MEMORY_ID_PARAM)
            .await
            .unwrap()
            .as_deref(),
        Some(f.memory_id.as_str())
    );
}

#[tokio::test]
async fn test_calendar_tool_round_trip() {
    let factory = Arc::new(ScriptedFactory::new(vec![vec![
        r#"{"tool": "Get_calendar_events_today", "args": {}}"#,
        "You have a warranty call today.",
    ]]));
    let f = fixture(factory.clone()).await;
    let mut ctx = TaskContext::new(ResponseQueue::new().0, Some("gw".to_string()));

    let answer = ask(&mut ctx, &f.deps, "What's on my calendar today?", "s1").await;
    assert_eq!(answer, "You have a warranty call today.");

    let agent = ctx.agent.as_ref().unwrap();
    let observation = agent
        .messages()
        .iter()
        .find_map(|m| match &m.content[0] {
            ContentBlock::ToolResult { output, .. } => Some(output.clone()),
            _ => None,
        })
        .unwrap();
    assert!(observation.contains("Warranty call"));
    assert_eq!(factory.llm(0).await.calls().await.len(), 2);
}

#[tokio::test]
async fn test_preferences_augment_prompt_but_not_saved_text() {
    let factory = Arc::new(ScriptedFactory::new(vec![vec![]]));
    let f = fixture(factory.clone()).await;
    f.memory
        .add_record(
            "support/user/customer_001/preferences",
            "Customer prefers express shipping",
        )
        .await;
    let mut ctx = TaskContext::new(ResponseQueue::new().0, Some("gw".to_string()));

    let question = "Which shipping do I usually choose?";
    let answer = ask(&mut ctx, &f.deps, question, "s1").await;
    assert!(answer.contains("These are user preferences:"));
    assert!(answer.contains("express shipping"));

    let events = f.memory.events(&f.memory_id, "customer_001", "s1").await;
    assert_eq!(events[0].text, question);
}

#[tokio::test]
async fn test_new_context_reloads_session_history() {
    let factory = Arc::new(ScriptedFactory::new(vec![
        vec!["Order 12345 has shipped."],
        vec!["As I said, it has shipped."],
    ]));
    let f = fixture(factory.clone()).await;

    let mut first = TaskContext::new(ResponseQueue::new().0, Some("gw".to_string()));
    ask(&mut first, &f.deps, "Status of order 12345?", "s1").await;

    let mut second = TaskContext::new(ResponseQueue::new().0, Some("gw".to_string()));
    let answer = ask(&mut second, &f.deps, "And again?", "s1").await;
    assert_eq!(answer, "As I said, it has shipped.");

    let calls = factory.llm(1).await.calls().await;
    let first_call = &calls[0];
    assert!(first_call[0].text().unwrap().ends_with(PASSIVE_MEMORY_INSTRUCTION));
    let texts: Vec<&str> = first_call[1..].iter().filter_map(|m| m.text()).collect();
    assert_eq!(
        texts,
        vec!["Status of order 12345?", "Order 12345 has shipped.", "And again?"]
    );
}

#[tokio::test]
async fn test_default_factory_with_mock_provider() {
    let mut cfg = AppConfig::default();
    cfg.llm.provider = "mock".to_string();
    let factory = DefaultAgentFactory::from_config(&cfg).with_calendar(calendar());
    let f = fixture(Arc::new(factory)).await;
    let deps = Arc::new(f.deps.clone());
    let sessions = SessionAgents::new();

    let answer = sessions
        .invoke(deps.clone(), "s1", "customer_001", Some("gw".to_string()), "hello")
        .await
        .collect()
        .await
        .concat();
    assert_eq!(answer, "Echo from Mock: hello");

    let ctx = sessions.context("s1").await;
    let ctx = ctx.lock().await;
    let tools = ctx.agent.as_ref().unwrap().tool_names();
    assert!(tools.contains(&"get_order_status".to_string()));
    assert!(tools.contains(&"Create_calendar_event".to_string()));

    let rejected = sessions
        .invoke(deps, "s2", "customer_001", None, "hello")
        .await
        .collect()
        .await;
    assert_eq!(rejected, vec!["Error: Gateway Access token is none".to_string()]);
}
