//! 对话消息模型
//!
//! 一条消息由角色与若干内容块组成；首个内容块为 Text 时才算「带文本」的消息，
//! 记忆钩子只处理这类消息（工具调用与工具结果不入记忆）。

use serde::{Deserialize, Serialize};

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// 内容块：文本、工具调用、工具结果
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ToolUse { tool: String, args: serde_json::Value },
    ToolResult { tool: String, output: String },
}

/// 单条消息
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    fn text_message(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text_message(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text_message(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text_message(Role::System, content)
    }

    /// Assistant 发起的工具调用
    pub fn tool_use(tool: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentBlock::ToolUse {
                tool: tool.into(),
                args,
            }],
        }
    }

    /// 工具执行结果，以 user 角色回写给模型
    pub fn tool_result(tool: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::ToolResult {
                tool: tool.into(),
                output: output.into(),
            }],
        }
    }

    /// 首个内容块的文本；首块不是 Text 时返回 None
    pub fn text(&self) -> Option<&str> {
        match self.content.first() {
            Some(ContentBlock::Text { text }) => Some(text),
            _ => None,
        }
    }

    pub fn text_mut(&mut self) -> Option<&mut String> {
        match self.content.first_mut() {
            Some(ContentBlock::Text { text }) => Some(text),
            _ => None,
        }
    }

    /// 拼成发给 LLM 的纯文本（工具块序列化为简短描述）
    pub fn render(&self) -> String {
        self.content
            .iter()
            .map(|block| match block {
                ContentBlock::Text { text } => text.clone(),
                ContentBlock::ToolUse { tool, args } => {
                    serde_json::json!({ "tool": tool, "args": args }).to_string()
                }
                ContentBlock::ToolResult { tool, output } => {
                    format!("Observation from {tool}: {output}")
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
