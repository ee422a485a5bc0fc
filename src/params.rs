//! 参数存储
//!
//! 扁平的「名称 -> 字符串」键值存储，用于跨进程保存生成的资源标识（记忆 ID、OAuth provider 名等）。
//! FileParameterStore 以单个 JSON 对象落盘；InMemoryParameterStore 供测试使用。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Error, Debug)]
pub enum ParamError {
    #[error("Parameter store IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parameter store JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[async_trait]
pub trait ParameterStore: Send + Sync {
    async fn get(&self, name: &str) -> Result<Option<String>, ParamError>;

    /// 写入（覆盖同名参数）
    async fn put(&self, name: &str, value: &str) -> Result<(), ParamError>;
}

#[derive(Debug, Default)]
pub struct InMemoryParameterStore {
    values: RwLock<BTreeMap<String, String>>,
}

impl InMemoryParameterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ParameterStore for InMemoryParameterStore {
    async fn get(&self, name: &str) -> Result<Option<String>, ParamError> {
        Ok(self.values.read().await.get(name).cloned())
    }

    async fn put(&self, name: &str, value: &str) -> Result<(), ParamError> {
        self.values
            .write()
            .await
            .insert(name.to_string(), value.to_string());
        Ok(())
    }
}

/// 单文件 JSON 参数存储；文件不存在视为空，首次 put 时创建（含父目录）
#[derive(Debug)]
pub struct FileParameterStore {
    path: PathBuf,
    /// 串行化读改写
    lock: RwLock<()>,
}

impl FileParameterStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: RwLock::new(()),
        }
    }

    async fn load(&self) -> Result<BTreeMap<String, String>, ParamError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(data) if data.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(data) => Ok(serde_json::from_str(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ParameterStore for FileParameterStore {
    async fn get(&self, name: &str) -> Result<Option<String>, ParamError> {
        let _guard = self.lock.read().await;
        Ok(self.load().await?.remove(name))
    }

    async fn put(&self, name: &str, value: &str) -> Result<(), ParamError> {
        let _guard = self.lock.write().await;
        let mut values = self.load().await?;
        values.insert(name.to_string(), value.to_string());
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, serde_json::to_string_pretty(&values)?).await?;
        Ok(())
    }
}
