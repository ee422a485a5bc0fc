//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `BEE_SUPPORT__*` 覆盖（双下划线表示嵌套，如 `BEE_SUPPORT__LLM__MODEL=gpt-4o`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub memory: MemorySection,
    pub calendar: CalendarSection,
    pub identity: IdentitySection,
    pub params: ParamsSection,
    pub tools: ToolsSection,
}

/// [app] 段：应用名、system prompt 文件
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: String,
    /// 未设置或读取失败时使用内置 prompt
    pub system_prompt_path: Option<PathBuf>,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "bee-support".to_string(),
            system_prompt_path: None,
        }
    }
}

/// [llm] 段：OpenAI 兼容网关
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// openai（网关）/ mock
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            request_timeout_secs: 60,
        }
    }
}

/// [memory] 段：记忆服务与钩子参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemorySection {
    /// 未设置时使用进程内记忆服务
    pub endpoint: Option<String>,
    pub actor_id: String,
    pub last_k_turns: usize,
    pub top_k: usize,
    pub namespace_prefix: String,
    pub timeout_secs: u64,
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            endpoint: None,
            actor_id: "customer_001".to_string(),
            last_k_turns: 5,
            top_k: 3,
            namespace_prefix: "support/user".to_string(),
            timeout_secs: 30,
        }
    }
}

/// [calendar] 段：Google Calendar
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CalendarSection {
    pub enabled: bool,
    pub api_base: String,
    pub credentials_file: PathBuf,
    pub provider_name: String,
    pub scopes: Vec<String>,
    /// 「今天」所在时区相对 UTC 的小时偏移
    pub utc_offset_hours: i32,
    pub calendar_id: String,
    pub timeout_secs: u64,
    /// 首次取令牌时强制用户重新授权
    pub force_authentication: bool,
}

impl Default for CalendarSection {
    fn default() -> Self {
        Self {
            enabled: false,
            api_base: crate::tools::DEFAULT_CALENDAR_API.to_string(),
            credentials_file: PathBuf::from("../credentials.json"),
            provider_name: "customersupport-google-calendar".to_string(),
            scopes: vec![crate::tools::CALENDAR_SCOPE.to_string()],
            utc_offset_hours: -5,
            calendar_id: "primary".to_string(),
            timeout_secs: 30,
            force_authentication: true,
        }
    }
}

/// [identity] 段：身份服务与授权轮询
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IdentitySection {
    /// 未设置时使用进程内身份服务
    pub endpoint: Option<String>,
    pub poll_interval_secs: u64,
    pub max_polls: usize,
    pub timeout_secs: u64,
}

impl Default for IdentitySection {
    fn default() -> Self {
        Self {
            endpoint: None,
            poll_interval_secs: 2,
            max_polls: 60,
            timeout_secs: 30,
        }
    }
}

/// [params] 段：参数存储文件
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ParamsSection {
    pub store_path: PathBuf,
}

impl Default for ParamsSection {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(".bee-support/params.json"),
        }
    }
}

/// [tools] 段：工具超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 30,
        }
    }
}

/// 从 config 目录加载配置，环境变量 BEE_SUPPORT__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 BEE_SUPPORT__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("BEE_SUPPORT")
            .prefix_separator("__")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("calendar.scopes")
            .try_parsing(true),
    );

    let c = builder.build()?;
    let cfg: AppConfig = c.try_deserialize()?;
    validate(&cfg)?;
    Ok(cfg)
}

/// 真实时区偏移在 UTC-12 到 UTC+14 之间
const UTC_OFFSET_RANGE: std::ops::RangeInclusive<i32> = -12..=14;

fn validate(cfg: &AppConfig) -> Result<(), config::ConfigError> {
    if !UTC_OFFSET_RANGE.contains(&cfg.calendar.utc_offset_hours) {
        return Err(config::ConfigError::Message(format!(
            "calendar.utc_offset_hours must be within {}..={}, got {}",
            UTC_OFFSET_RANGE.start(),
            UTC_OFFSET_RANGE.end(),
            cfg.calendar.utc_offset_hours
        )));
    }
    Ok(())
}

/// 读取 system prompt：配置路径 → config/prompts/system.txt → 内置默认
pub fn load_system_prompt(cfg: &AppConfig) -> String {
    let configured = cfg.app.system_prompt_path.iter().cloned();
    let fallbacks = ["config/prompts/system.txt", "../config/prompts/system.txt"]
        .into_iter()
        .map(PathBuf::from);
    configured
        .chain(fallbacks)
        .find_map(|p| std::fs::read_to_string(p).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string())
}

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful and professional customer support assistant for an electronics e-commerce company. \
Use the available tools to look up orders, shipping, return policies and product details, and to manage the customer's calendar. \
Never invent order details. If a tool reports that something was not found, tell the customer and ask them to double-check.";
