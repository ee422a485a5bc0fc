//! bee-support 命令行客服
//!
//! 入口：初始化日志与配置，准备参数存储、记忆资源与（可选的）日历凭据，
//! 然后逐行读取 stdin，每行跑一次 agent_task 并把回答片段实时打印出来。

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bee_support::auth::{
    setup_credentials, CredentialProviderClient, FederatedTokenSource, HttpIdentityClient,
    InMemoryIdentityClient,
};
use bee_support::config::{load_config, AppConfig};
use bee_support::memory::{
    create_memory_resource, HttpMemoryClient, InMemoryMemoryClient, MemoryClient, MemoryHookSettings,
};
use bee_support::params::{FileParameterStore, ParameterStore};
use bee_support::task::{agent_task, DefaultAgentFactory, ResponseQueue, TaskContext, TaskDeps};
use bee_support::tools::{CalendarToolset, GoogleCalendarClient};
use tokio::io::{AsyncBufReadExt, BufReader};

/// 网关访问令牌的环境变量
const GATEWAY_TOKEN_ENV: &str = "BEE_SUPPORT_GATEWAY_TOKEN";

/// 读取凭据并构建日历工具；任何一步失败都只告警，Agent 仍可在无日历工具时运行
async fn calendar_toolset(cfg: &AppConfig, params: &dyn ParameterStore) -> Option<CalendarToolset> {
    let identity: Arc<dyn CredentialProviderClient> = match &cfg.identity.endpoint {
        Some(endpoint) => Arc::new(HttpIdentityClient::new(endpoint, cfg.identity.timeout_secs)),
        None => Arc::new(InMemoryIdentityClient::new()),
    };
    if let Err(e) = setup_credentials(
        &cfg.calendar.credentials_file,
        identity.as_ref(),
        params,
        &cfg.calendar.provider_name,
    )
    .await
    {
        tracing::warn!("Calendar tools disabled: {e}");
        return None;
    }

    let tokens = FederatedTokenSource::new(
        identity,
        cfg.calendar.provider_name.clone(),
        cfg.calendar.scopes.clone(),
    )
    .with_polling(
        Duration::from_secs(cfg.identity.poll_interval_secs),
        cfg.identity.max_polls,
    )
    .with_force_authentication(cfg.calendar.force_authentication);
    Some(CalendarToolset {
        tokens: Arc::new(tokens),
        api: Arc::new(GoogleCalendarClient::new(
            cfg.calendar.api_base.clone(),
            cfg.calendar.timeout_secs,
        )),
        calendar_id: cfg.calendar.calendar_id.clone(),
        utc_offset_hours: cfg.calendar.utc_offset_hours,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    bee_support::observability::init();

    let cfg = load_config(std::env::args().nth(1).map(PathBuf::from))
        .context("Failed to load config")?;

    let params: Arc<dyn ParameterStore> = Arc::new(FileParameterStore::new(&cfg.params.store_path));
    let memory: Arc<dyn MemoryClient> = match &cfg.memory.endpoint {
        Some(endpoint) => Arc::new(HttpMemoryClient::new(endpoint, cfg.memory.timeout_secs)),
        None => {
            tracing::warn!("No memory endpoint configured, using in-process memory");
            Arc::new(InMemoryMemoryClient::new())
        }
    };
    create_memory_resource(memory.as_ref(), params.as_ref()).await;

    let mut factory = DefaultAgentFactory::from_config(&cfg);
    if cfg.calendar.enabled {
        if let Some(calendar) = calendar_toolset(&cfg, params.as_ref()).await {
            factory = factory.with_calendar(calendar);
        }
    }

    let deps = TaskDeps {
        memory,
        params,
        factory: Arc::new(factory),
        memory_settings: MemoryHookSettings::from(&cfg.memory),
    };

    let session_id = uuid::Uuid::new_v4().to_string();
    let actor_id = cfg.memory.actor_id.clone();
    let gateway_token = std::env::var(GATEWAY_TOKEN_ENV).ok();
    if gateway_token.is_none() {
        tracing::warn!("{GATEWAY_TOKEN_ENV} is not set; requests will be rejected");
    }
    tracing::info!(app = %cfg.app.name, session = %session_id, actor = %actor_id, "Session started");

    let (queue, _) = ResponseQueue::new();
    let mut ctx = TaskContext::new(queue, gateway_token);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush().ok();
        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        let (queue, mut receiver) = ResponseQueue::new();
        ctx.response_queue = queue;
        let printer = async {
            while let Some(chunk) = receiver.recv().await {
                print!("{chunk}");
                std::io::stdout().flush().ok();
            }
            println!();
        };
        // 错误已作为 "Error: ..." 片段打印
        let _ = tokio::join!(
            agent_task(&mut ctx, &deps, line, &session_id, &actor_id),
            printer
        );
    }

    tracing::info!(session = %session_id, "Session ended");
    Ok(())
}
