//! 访问令牌来源
//!
//! FederatedTokenSource 向身份服务请求用户授权令牌：若返回授权 URL，则回调 on_auth_url（默认打开浏览器）一次，
//! 随后按固定间隔轮询直到拿到令牌或次数用尽。日历工具只依赖 TokenSource trait。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::auth::identity::{AuthFlow, CredentialProviderClient, TokenRequest};
use crate::auth::AuthError;

#[async_trait]
pub trait TokenSource: Send + Sync {
    /// 返回非空的 bearer token
    async fn access_token(&self) -> Result<String, AuthError>;
}

/// 固定令牌（测试 / 已有令牌时使用）；空字符串视为没有令牌
#[derive(Debug, Clone)]
pub struct StaticTokenSource(pub String);

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn access_token(&self) -> Result<String, AuthError> {
        if self.0.is_empty() {
            return Err(AuthError::NoToken("static token is empty".to_string()));
        }
        Ok(self.0.clone())
    }
}

/// 授权 URL 回调
pub type AuthUrlCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// 尝试用系统默认浏览器打开 URL；失败时只记录日志
pub fn open_in_browser(url: &str) {
    tracing::info!(%url, "Opening authorization URL");
    if let Err(e) = try_open_browser(url) {
        tracing::warn!("Could not open browser ({e}); open the URL manually: {url}");
    }
}

fn try_open_browser(url: &str) -> std::io::Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).spawn()?;
    }
    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(url).spawn()?;
    }
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", url])
            .spawn()?;
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        return Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "unsupported platform",
        ));
    }
    Ok(())
}

pub struct FederatedTokenSource {
    identity: Arc<dyn CredentialProviderClient>,
    provider_name: String,
    scopes: Vec<String>,
    force_authentication: bool,
    on_auth_url: AuthUrlCallback,
    poll_interval: Duration,
    max_polls: usize,
}

impl FederatedTokenSource {
    pub fn new(
        identity: Arc<dyn CredentialProviderClient>,
        provider_name: impl Into<String>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            identity,
            provider_name: provider_name.into(),
            scopes,
            force_authentication: true,
            on_auth_url: Arc::new(open_in_browser),
            poll_interval: Duration::from_secs(2),
            max_polls: 60,
        }
    }

    pub fn with_auth_url_callback(mut self, callback: AuthUrlCallback) -> Self {
        self.on_auth_url = callback;
        self
    }

    pub fn with_polling(mut self, interval: Duration, max_polls: usize) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }

    pub fn with_force_authentication(mut self, force: bool) -> Self {
        self.force_authentication = force;
        self
    }
}

#[async_trait]
impl TokenSource for FederatedTokenSource {
    async fn access_token(&self) -> Result<String, AuthError> {
        let mut request = TokenRequest {
            provider_name: self.provider_name.clone(),
            scopes: self.scopes.clone(),
            auth_flow: AuthFlow::UserFederation,
            force_authentication: self.force_authentication,
            session_uri: None,
        };
        let mut notified = false;

        for attempt in 0..=self.max_polls {
            let resp = self.identity.get_resource_oauth2_token(&request).await?;
            if let Some(token) = resp.access_token.filter(|t| !t.is_empty()) {
                return Ok(token);
            }
            let Some(url) = resp.authorization_url else {
                return Err(AuthError::NoToken(
                    "identity service did not provide tokens".to_string(),
                ));
            };
            if !notified {
                (self.on_auth_url)(&url);
                notified = true;
            }
            // 轮询沿用同一授权会话，且不再强制重新授权
            request.session_uri = resp.session_uri.or(request.session_uri.take());
            request.force_authentication = false;

            if attempt < self.max_polls {
                tokio::time::sleep(self.poll_interval).await;
            }
        }
        Err(AuthError::AuthorizationTimeout(self.max_polls))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::identity::InMemoryIdentityClient;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_callback() -> (AuthUrlCallback, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let cb: AuthUrlCallback = Arc::new(move |url: &str| {
            assert!(url.starts_with("https://"));
            c.fetch_add(1, Ordering::SeqCst);
        });
        (cb, count)
    }

    #[tokio::test(start_paused = true)]
    async fn test_authorization_then_token() {
        let identity = Arc::new(
            InMemoryIdentityClient::new()
                .with_token("ya29.token")
                .requiring_authorization(3),
        );
        let (cb, count) = counting_callback();
        let source = FederatedTokenSource::new(identity.clone(), "google", vec!["calendar".into()])
            .with_auth_url_callback(cb)
            .with_polling(Duration::from_millis(10), 10);

        assert_eq!(source.access_token().await.unwrap(), "ya29.token");
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(identity.request_count().await, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_authorization_times_out() {
        let identity = Arc::new(InMemoryIdentityClient::new().requiring_authorization(100));
        let (cb, _) = counting_callback();
        let source = FederatedTokenSource::new(identity, "google", vec![])
            .with_auth_url_callback(cb)
            .with_polling(Duration::from_millis(10), 2);

        assert!(matches!(
            source.access_token().await,
            Err(AuthError::AuthorizationTimeout(2))
        ));
    }

    #[tokio::test]
    async fn test_no_token_and_no_url() {
        let identity = Arc::new(InMemoryIdentityClient::new());
        let source = FederatedTokenSource::new(identity, "google", vec![]);
        assert!(matches!(source.access_token().await, Err(AuthError::NoToken(_))));
    }

    #[tokio::test]
    async fn test_static_token() {
        assert_eq!(StaticTokenSource("t".into()).access_token().await.unwrap(), "t");
        assert!(StaticTokenSource(String::new()).access_token().await.is_err());
    }
}
