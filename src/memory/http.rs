//! REST 记忆服务客户端
//!
//! 以 JSON over HTTP 访问远端记忆服务（endpoint 来自配置 [memory].endpoint）。
//! 404 映射为 NotFound，其它非 2xx 映射为 Service；不做重试，单次失败即为该调用的最终结果。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::memory::client::{
    CreateMemoryRequest, MemoryClient, MemoryError, MemoryRecord, MemoryResource, Turn,
    TurnMessage, TurnRole,
};
use crate::memory::Role;

pub struct HttpMemoryClient {
    client: Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct TurnsResponse {
    #[serde(default)]
    turns: Vec<Turn>,
}

#[derive(Debug, Serialize)]
struct SaveEventsRequest {
    messages: Vec<TurnMessage>,
}

#[derive(Debug, Serialize)]
struct RetrieveRequest<'a> {
    namespace: &'a str,
    query: &'a str,
    top_k: usize,
}

#[derive(Debug, Deserialize)]
struct RetrieveResponse {
    #[serde(default)]
    records: Vec<MemoryRecord>,
}

impl HttpMemoryClient {
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    /// endpoint 后追加路径段；每段单独做百分号编码，id 中的 `/` 不会改变路由
    fn url(&self, segments: &[&str]) -> Result<Url, MemoryError> {
        let invalid = || MemoryError::Transport(format!("invalid memory endpoint: {}", self.endpoint));
        let mut url = Url::parse(&self.endpoint).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn session_url(
        &self,
        memory_id: &str,
        actor_id: &str,
        session_id: &str,
        leaf: &str,
    ) -> Result<Url, MemoryError> {
        self.url(&["memories", memory_id, "actors", actor_id, "sessions", session_id, leaf])
    }

    /// 检查状态码并解析 JSON 响应体
    async fn decode<T: DeserializeOwned>(resp: Response, what: &str) -> Result<T, MemoryError> {
        let resp = Self::check(resp, what).await?;
        resp.json::<T>()
            .await
            .map_err(|e| MemoryError::Decode(e.to_string()))
    }

    async fn check(resp: Response, what: &str) -> Result<Response, MemoryError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(MemoryError::NotFound(what.to_string()));
        }
        let message = resp.text().await.unwrap_or_default();
        Err(MemoryError::Service {
            status: status.as_u16(),
            message,
        })
    }
}

fn transport(e: reqwest::Error) -> MemoryError {
    MemoryError::Transport(e.to_string())
}

#[async_trait]
impl MemoryClient for HttpMemoryClient {
    async fn get_last_k_turns(
        &self,
        memory_id: &str,
        actor_id: &str,
        session_id: &str,
        k: usize,
    ) -> Result<Vec<Turn>, MemoryError> {
        let url = self.session_url(memory_id, actor_id, session_id, "turns")?;
        let resp = self
            .client
            .get(url)
            .query(&[("k", k)])
            .send()
            .await
            .map_err(transport)?;
        let body: TurnsResponse = Self::decode(resp, memory_id).await?;
        Ok(body.turns)
    }

    async fn retrieve_memories(
        &self,
        memory_id: &str,
        namespace: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        let resp = self
            .client
            .post(self.url(&["memories", memory_id, "retrieve"])?)
            .json(&RetrieveRequest {
                namespace,
                query,
                top_k,
            })
            .send()
            .await
            .map_err(transport)?;
        let body: RetrieveResponse = Self::decode(resp, memory_id).await?;
        Ok(body.records)
    }

    async fn save_conversation(
        &self,
        memory_id: &str,
        actor_id: &str,
        session_id: &str,
        messages: &[(String, Role)],
    ) -> Result<(), MemoryError> {
        let url = self.session_url(memory_id, actor_id, session_id, "events")?;
        let body = SaveEventsRequest {
            messages: messages
                .iter()
                .map(|(text, role)| TurnMessage::new(TurnRole::from(*role), text.clone()))
                .collect(),
        };
        let resp = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        Self::check(resp, memory_id).await?;
        Ok(())
    }

    async fn get_memory(&self, memory_id: &str) -> Result<MemoryResource, MemoryError> {
        let resp = self
            .client
            .get(self.url(&["memories", memory_id])?)
            .send()
            .await
            .map_err(transport)?;
        Self::decode(resp, memory_id).await
    }

    async fn create_memory(
        &self,
        request: CreateMemoryRequest,
    ) -> Result<MemoryResource, MemoryError> {
        let name = request.name.clone();
        let resp = self
            .client
            .post(self.url(&["memories"])?)
            .json(&request)
            .send()
            .await
            .map_err(transport)?;
        Self::decode(resp, &name).await
    }

    async fn delete_memory(&self, memory_id: &str) -> Result<(), MemoryError> {
        let resp = self
            .client
            .delete(self.url(&["memories", memory_id])?)
            .send()
            .await
            .map_err(transport)?;
        Self::check(resp, memory_id).await?;
        Ok(())
    }
}
