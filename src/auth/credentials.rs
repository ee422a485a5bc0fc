//! 本地 OAuth 客户端凭据
//!
//! credentials.json 需包含 `web.client_id` 与 `web.client_secret`（Google Cloud Console 下载的 Web 应用凭据）。
//! 文件缺失或字段不全时直接报错：没有可用的降级方案。

use std::path::Path;

use serde::Deserialize;

use crate::auth::AuthError;

/// OAuth2 客户端 ID / Secret
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for OAuthClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct CredentialsFile {
    web: Option<WebSection>,
}

#[derive(Debug, Deserialize)]
struct WebSection {
    client_id: Option<String>,
    client_secret: Option<String>,
}

pub fn load_client_credentials(path: &Path) -> Result<OAuthClientCredentials, AuthError> {
    if !path.is_file() {
        return Err(AuthError::Credentials(format!(
            "'{}' file not found",
            path.display()
        )));
    }
    let data = std::fs::read_to_string(path)
        .map_err(|e| AuthError::Credentials(format!("read {}: {e}", path.display())))?;
    let file: CredentialsFile = serde_json::from_str(&data)
        .map_err(|e| AuthError::Credentials(format!("invalid JSON in {}: {e}", path.display())))?;

    let web = file
        .web
        .ok_or_else(|| AuthError::Credentials("'web' section missing in credentials file".to_string()))?;

    match (web.client_id, web.client_secret) {
        (Some(client_id), Some(client_secret)) if !client_id.is_empty() && !client_secret.is_empty() => {
            Ok(OAuthClientCredentials {
                client_id,
                client_secret,
            })
        }
        _ => Err(AuthError::Credentials(
            "client_id or client_secret not found in credentials file".to_string(),
        )),
    }
}
