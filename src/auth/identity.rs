//! 身份服务契约：OAuth2 credential provider 管理与资源令牌获取
//!
//! 托管身份服务持有 client id / secret，替 Agent 完成用户授权（USER_FEDERATION）。
//! 令牌请求要么直接返回 access token，要么返回需要用户在浏览器中打开的授权 URL。

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::auth::{AuthError, OAuthClientCredentials};

pub const GOOGLE_VENDOR: &str = "GoogleOauth2";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CredentialProvider {
    pub name: String,
    pub credential_provider_arn: String,
    pub vendor: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthFlow {
    UserFederation,
    M2m,
}

#[derive(Clone, Debug, Serialize)]
pub struct TokenRequest {
    pub provider_name: String,
    pub scopes: Vec<String>,
    pub auth_flow: AuthFlow,
    pub force_authentication: bool,
    /// 轮询时带上首次请求返回的会话，避免重复发起授权
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_uri: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub authorization_url: Option<String>,
    #[serde(default)]
    pub session_uri: Option<String>,
}

#[async_trait]
pub trait CredentialProviderClient: Send + Sync {
    /// 不存在时返回 AuthError::NotFound
    async fn get_oauth2_credential_provider(&self, name: &str) -> Result<CredentialProvider, AuthError>;

    async fn create_oauth2_credential_provider(
        &self,
        name: &str,
        vendor: &str,
        credentials: &OAuthClientCredentials,
    ) -> Result<CredentialProvider, AuthError>;

    async fn get_resource_oauth2_token(&self, request: &TokenRequest) -> Result<TokenResponse, AuthError>;
}

/// REST 身份服务客户端（endpoint 来自配置 [identity].endpoint）
pub struct HttpIdentityClient {
    client: Client,
    endpoint: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateProviderBody<'a> {
    name: &'a str,
    credential_provider_vendor: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
}

impl HttpIdentityClient {
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

    /// endpoint 后追加路径段（逐段百分号编码）
    fn url(&self, segments: &[&str]) -> Result<Url, AuthError> {
        let invalid = || AuthError::Transport(format!("invalid identity endpoint: {}", self.endpoint));
        let mut url = Url::parse(&self.endpoint).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn decode<T: DeserializeOwned>(resp: Response, what: &str) -> Result<T, AuthError> {
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(AuthError::NotFound(what.to_string()));
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(AuthError::Service {
                status: status.as_u16(),
                message,
            });
        }
        resp.json::<T>()
            .await
            .map_err(|e| AuthError::Transport(format!("decode: {e}")))
    }
}

fn transport(e: reqwest::Error) -> AuthError {
    AuthError::Transport(e.to_string())
}

#[async_trait]
impl CredentialProviderClient for HttpIdentityClient {
    async fn get_oauth2_credential_provider(&self, name: &str) -> Result<CredentialProvider, AuthError> {
        let resp = self
            .client
            .get(self.url(&["oauth2-credential-providers", name])?)
            .send()
            .await
            .map_err(transport)?;
        Self::decode(resp, name).await
    }

    async fn create_oauth2_credential_provider(
        &self,
        name: &str,
        vendor: &str,
        credentials: &OAuthClientCredentials,
    ) -> Result<CredentialProvider, AuthError> {
        let body = CreateProviderBody {
            name,
            credential_provider_vendor: vendor,
            client_id: &credentials.client_id,
            client_secret: &credentials.client_secret,
        };
        let resp = self
            .client
            .post(self.url(&["oauth2-credential-providers"])?)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        Self::decode(resp, name).await
    }

    async fn get_resource_oauth2_token(&self, request: &TokenRequest) -> Result<TokenResponse, AuthError> {
        let resp = self
            .client
            .post(self.url(&["resource-oauth2-token"])?)
            .json(request)
            .send()
            .await
            .map_err(transport)?;
        Self::decode(resp, &request.provider_name).await
    }
}

/// 进程内身份服务：测试与离线运行使用。
/// 授权过程用「第 n 次请求才发放令牌」模拟：在此之前返回授权 URL。
#[derive(Default)]
pub struct InMemoryIdentityClient {
    providers: RwLock<HashMap<String, CredentialProvider>>,
    token: Option<String>,
    /// 发放令牌前需要经历的请求次数
    pending_requests: RwLock<usize>,
    requests: RwLock<usize>,
}

impl InMemoryIdentityClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 授权完成后发放的令牌；None 表示永远拿不到令牌
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// 前 n 次请求只返回授权 URL
    pub fn requiring_authorization(self, requests: usize) -> Self {
        Self {
            pending_requests: RwLock::new(requests),
            ..self
        }
    }

    pub async fn request_count(&self) -> usize {
        *self.requests.read().await
    }
}

#[async_trait]
impl CredentialProviderClient for InMemoryIdentityClient {
    async fn get_oauth2_credential_provider(&self, name: &str) -> Result<CredentialProvider, AuthError> {
        self.providers
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| AuthError::NotFound(name.to_string()))
    }

    async fn create_oauth2_credential_provider(
        &self,
        name: &str,
        vendor: &str,
        _credentials: &OAuthClientCredentials,
    ) -> Result<CredentialProvider, AuthError> {
        let provider = CredentialProvider {
            name: name.to_string(),
            credential_provider_arn: format!("arn:local:token-vault/default/oauth2credentialprovider/{name}"),
            vendor: vendor.to_string(),
        };
        self.providers
            .write()
            .await
            .insert(name.to_string(), provider.clone());
        Ok(provider)
    }

    async fn get_resource_oauth2_token(&self, request: &TokenRequest) -> Result<TokenResponse, AuthError> {
        *self.requests.write().await += 1;
        let mut pending = self.pending_requests.write().await;
        if *pending > 0 {
            *pending -= 1;
            return Ok(TokenResponse {
                access_token: None,
                authorization_url: Some(format!(
                    "https://accounts.example.com/authorize?provider={}",
                    request.provider_name
                )),
                session_uri: Some("urn:local:session:1".to_string()),
            });
        }
        Ok(TokenResponse {
            access_token: self.token.clone(),
            authorization_url: None,
            session_uri: None,
        })
    }
}
