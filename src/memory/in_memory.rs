//! 进程内记忆服务
//!
//! 未配置远端记忆服务时使用，也是测试的默认替身。对话事件按 (memory, actor, session) 存储，
//! 读取时以每条 user 消息为界切分成轮；检索按小写词重叠打分（无真实向量）。

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::memory::client::{
    CreateMemoryRequest, MemoryClient, MemoryError, MemoryRecord, MemoryResource, RecordContent,
    Turn, TurnMessage, TurnRole,
};
use crate::memory::Role;

type SessionKey = (String, String, String);

#[derive(Default)]
pub struct InMemoryMemoryClient {
    resources: RwLock<HashMap<String, MemoryResource>>,
    events: RwLock<HashMap<SessionKey, Vec<TurnMessage>>>,
    /// namespace -> 记录文本
    records: RwLock<HashMap<String, Vec<String>>>,
}

/// 将文本切分为小写词集合，用于简单相似度（词重叠数）
fn tokenize_lower(s: &str) -> HashSet<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .map(|w| w.to_lowercase())
        .filter(|w| w.len() > 1)
        .collect()
}

/// 以 user 消息为界把事件切分成轮
fn group_turns(events: &[TurnMessage]) -> Vec<Turn> {
    let mut turns: Vec<Turn> = Vec::new();
    for event in events {
        let start_new = event.role == TurnRole::User || turns.is_empty();
        if start_new {
            turns.push(vec![event.clone()]);
        } else if let Some(last) = turns.last_mut() {
            last.push(event.clone());
        }
    }
    turns
}

impl InMemoryMemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置一个已存在的记忆资源
    pub async fn with_resource(self, id: &str) -> Self {
        self.resources.write().await.insert(
            id.to_string(),
            MemoryResource {
                id: id.to_string(),
                name: id.to_string(),
                status: "ACTIVE".to_string(),
            },
        );
        self
    }

    /// 向命名空间写入一条长期记忆（偏好 / 事实）
    pub async fn add_record(&self, namespace: &str, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        self.records
            .write()
            .await
            .entry(namespace.to_string())
            .or_default()
            .push(text.to_string());
    }

    /// 某会话已保存的全部事件（按写入顺序）
    pub async fn events(&self, memory_id: &str, actor_id: &str, session_id: &str) -> Vec<TurnMessage> {
        let key = (
            memory_id.to_string(),
            actor_id.to_string(),
            session_id.to_string(),
        );
        self.events.read().await.get(&key).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl MemoryClient for InMemoryMemoryClient {
    async fn get_last_k_turns(
        &self,
        memory_id: &str,
        actor_id: &str,
        session_id: &str,
        k: usize,
    ) -> Result<Vec<Turn>, MemoryError> {
        let events = self.events(memory_id, actor_id, session_id).await;
        let turns = group_turns(&events);
        let skip = turns.len().saturating_sub(k);
        Ok(turns.into_iter().skip(skip).collect())
    }

    async fn retrieve_memories(
        &self,
        _memory_id: &str,
        namespace: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        let query_tokens = tokenize_lower(query);
        if query_tokens.is_empty() {
            return Ok(Vec::new());
        }
        let records = self.records.read().await;
        let Some(texts) = records.get(namespace) else {
            return Ok(Vec::new());
        };
        let mut scored: Vec<(usize, &String)> = texts
            .iter()
            .map(|text| (query_tokens.intersection(&tokenize_lower(text)).count(), text))
            .filter(|(s, _)| *s > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(s, text)| MemoryRecord {
                content: RecordContent { text: text.clone() },
                namespace: namespace.to_string(),
                score: s as f32 / query_tokens.len() as f32,
            })
            .collect())
    }

    async fn save_conversation(
        &self,
        memory_id: &str,
        actor_id: &str,
        session_id: &str,
        messages: &[(String, Role)],
    ) -> Result<(), MemoryError> {
        let key = (
            memory_id.to_string(),
            actor_id.to_string(),
            session_id.to_string(),
        );
        let mut events = self.events.write().await;
        let log = events.entry(key).or_default();
        log.extend(
            messages
                .iter()
                .map(|(text, role)| TurnMessage::new((*role).into(), text.clone())),
        );
        Ok(())
    }

    async fn get_memory(&self, memory_id: &str) -> Result<MemoryResource, MemoryError> {
        self.resources
            .read()
            .await
            .get(memory_id)
            .cloned()
            .ok_or_else(|| MemoryError::NotFound(memory_id.to_string()))
    }

    async fn create_memory(
        &self,
        request: CreateMemoryRequest,
    ) -> Result<MemoryResource, MemoryError> {
        let suffix: String = uuid::Uuid::new_v4().simple().to_string().chars().take(8).collect();
        let resource = MemoryResource {
            id: format!("{}-{}", request.name, suffix),
            name: request.name,
            status: "ACTIVE".to_string(),
        };
        self.resources
            .write()
            .await
            .insert(resource.id.clone(), resource.clone());
        Ok(resource)
    }

    async fn delete_memory(&self, memory_id: &str) -> Result<(), MemoryError> {
        self.resources
            .write()
            .await
            .remove(memory_id)
            .map(|_| ())
            .ok_or_else(|| MemoryError::NotFound(memory_id.to_string()))
    }
}
