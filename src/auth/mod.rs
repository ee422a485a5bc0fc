//! 鉴权层：本地 OAuth 凭据、托管身份服务（credential provider 与令牌）、访问令牌来源

pub mod credentials;
pub mod identity;
pub mod token;

use std::path::Path;

use thiserror::Error;

pub use credentials::{load_client_credentials, OAuthClientCredentials};
pub use identity::{
    AuthFlow, CredentialProvider, CredentialProviderClient, HttpIdentityClient,
    InMemoryIdentityClient, TokenRequest, TokenResponse, GOOGLE_VENDOR,
};
pub use token::{
    open_in_browser, AuthUrlCallback, FederatedTokenSource, StaticTokenSource, TokenSource,
};

use crate::params::ParameterStore;

/// 参数存储中记录 Google provider 名称的键
pub const GOOGLE_PROVIDER_PARAM: &str = "/customersupport/google_provider_name";

#[derive(Error, Debug)]
pub enum AuthError {
    /// 本地凭据文件缺失或不完整
    #[error("Credentials error: {0}")]
    Credentials(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Identity service returned {status}: {message}")]
    Service { status: u16, message: String },

    #[error("Identity transport error: {0}")]
    Transport(String),

    #[error("No access token: {0}")]
    NoToken(String),

    #[error("Authorization not completed after {0} polls")]
    AuthorizationTimeout(usize),
}

/// 获取已有 provider，不存在时用本地凭据创建；创建/获取失败直接返回错误
pub async fn ensure_credential_provider(
    identity: &dyn CredentialProviderClient,
    provider_name: &str,
    credentials: &OAuthClientCredentials,
) -> Result<CredentialProvider, AuthError> {
    match identity.get_oauth2_credential_provider(provider_name).await {
        Ok(existing) => {
            tracing::info!(
                arn = %existing.credential_provider_arn,
                "Found existing OAuth2 credential provider {provider_name}"
            );
            Ok(existing)
        }
        Err(AuthError::NotFound(_)) => {
            let created = identity
                .create_oauth2_credential_provider(provider_name, GOOGLE_VENDOR, credentials)
                .await?;
            tracing::info!(
                arn = %created.credential_provider_arn,
                "Created OAuth2 credential provider {provider_name}"
            );
            Ok(created)
        }
        Err(e) => Err(e),
    }
}

/// 读取本地凭据、确保 credential provider 存在，并把 provider 名写入参数存储（写入失败仅告警）
pub async fn setup_credentials(
    credentials_file: &Path,
    identity: &dyn CredentialProviderClient,
    params: &dyn ParameterStore,
    provider_name: &str,
) -> Result<OAuthClientCredentials, AuthError> {
    let credentials = load_client_credentials(credentials_file)?;
    ensure_credential_provider(identity, provider_name, &credentials)
        .await
        .map_err(|e| {
            tracing::error!("Error with Google credential provider: {e}");
            e
        })?;
    if let Err(e) = params.put(GOOGLE_PROVIDER_PARAM, provider_name).await {
        tracing::warn!("Error storing provider name in parameter store: {e}");
    }
    Ok(credentials)
}
