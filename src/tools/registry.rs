//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / execute），由 ToolRegistry 按名注册与查找，
//! ToolExecutor 在调用时加超时并统一转 AgentError。

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、异步执行（args 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（用于 JSON 中的 "tool" 字段）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 参数 JSON Schema；默认无参数
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String>;
}

/// 单个必填字符串参数的 schema
pub fn string_arg_schema(name: &str, description: &str) -> Value {
    let mut properties = serde_json::Map::new();
    properties.insert(
        name.to_string(),
        serde_json::json!({ "type": "string", "description": description }),
    );
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": [name]
    })
}

/// 取必填字符串参数
pub fn required_str<'a>(args: &'a Value, name: &str) -> Result<&'a str, String> {
    args.get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| format!("Missing argument: {name}"))
}

/// 工具注册表：按名称存储 Arc<dyn Tool>，支持 register / get / execute / tool_names
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.register_arc(Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub async fn execute(&self, name: &str, args: Value) -> Result<String, String> {
        let tool = self.tools.get(name).ok_or_else(|| format!("Unknown tool: {name}"))?;
        tool.execute(args).await
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// 动态生成工具 schema JSON，拼入 system prompt 的 Available tools 段落
    pub fn to_schema_json(&self) -> String {
        let tools: Vec<Value> = self
            .tools
            .iter()
            .map(|(name, tool)| {
                serde_json::json!({
                    "name": name,
                    "description": tool.description(),
                    "parameters": tool.parameters_schema()
                })
            })
            .collect();
        serde_json::to_string_pretty(&tools).unwrap_or_else(|_| "[]".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::OrderStatusTool;

    #[tokio::test]
    async fn test_registry_execute_and_unknown() {
        let mut registry = ToolRegistry::new();
        registry.register(OrderStatusTool);

        assert_eq!(registry.tool_names(), vec!["get_order_status".to_string()]);
        let out = registry
            .execute("get_order_status", serde_json::json!({"order_id": "12345"}))
            .await
            .unwrap();
        assert!(out.contains("12345"));

        let err = registry.execute("nope", Value::Null).await.unwrap_err();
        assert_eq!(err, "Unknown tool: nope");
        assert!(registry.to_schema_json().contains("order_id"));
    }

    #[test]
    fn test_required_str() {
        let args = serde_json::json!({"order_id": "1", "n": 3});
        assert_eq!(required_str(&args, "order_id"), Ok("1"));
        assert!(required_str(&args, "n").is_err());
        assert!(required_str(&args, "missing").is_err());
    }
}
