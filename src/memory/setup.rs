//! 记忆资源生命周期：复用或创建记忆资源、构建记忆钩子、删除资源
//!
//! 资源 ID 存放在参数存储中；创建失败时退化为无记忆模式（返回 None），而不是中断整个启动流程。

use std::sync::Arc;

use crate::memory::client::{CreateMemoryRequest, MemoryClient, SemanticStrategy};
use crate::memory::MemoryHook;
use crate::params::ParameterStore;

pub const MEMORY_ID_PARAM: &str = "/app/customersupport/agentcore/memory_id";
pub const MEMORY_RESOURCE_NAME: &str = "CustomerSupportMemory";

/// 对话事件保留天数
const EVENT_EXPIRY_DAYS: u32 = 90;

fn memory_request() -> CreateMemoryRequest {
    CreateMemoryRequest {
        name: MEMORY_RESOURCE_NAME.to_string(),
        description: "Customer support agent memory for context and preferences".to_string(),
        event_expiry_days: EVENT_EXPIRY_DAYS,
        strategies: vec![SemanticStrategy {
            name: "SEMANTIC".to_string(),
            description: "Store conversation context for reference".to_string(),
        }],
    }
}

/// 读取已登记的记忆 ID 并确认资源存在；否则新建并登记。全部失败时返回 None
pub async fn create_memory_resource(
    client: &dyn MemoryClient,
    params: &dyn ParameterStore,
) -> Option<String> {
    match params.get(MEMORY_ID_PARAM).await {
        Ok(Some(memory_id)) => match client.get_memory(&memory_id).await {
            Ok(_) => {
                tracing::info!(%memory_id, "Found existing memory resource");
                return Some(memory_id);
            }
            Err(e) => tracing::warn!(%memory_id, "Using existing memory resource failed: {e}"),
        },
        Ok(None) => {}
        Err(e) => tracing::warn!("Reading memory id parameter failed: {e}"),
    }

    let resource = match client.create_memory(memory_request()).await {
        Ok(resource) => resource,
        Err(e) => {
            tracing::warn!("Memory creation failed, continuing without memory: {e}");
            return None;
        }
    };

    if let Err(e) = params.put(MEMORY_ID_PARAM, &resource.id).await {
        tracing::warn!("Could not store memory id in parameter store: {e}");
    }
    tracing::info!(memory_id = %resource.id, "Created memory resource");
    Some(resource.id)
}

/// 创建（或复用）记忆资源并返回绑定到该会话的记忆钩子
pub async fn setup_memory(
    client: Arc<dyn MemoryClient>,
    params: &dyn ParameterStore,
    actor_id: &str,
    session_id: &str,
) -> MemoryHook {
    let memory_id = create_memory_resource(client.as_ref(), params).await;
    MemoryHook::new(client, memory_id, actor_id, session_id)
}

/// 删除钩子所用的记忆资源；降级模式下无事可做
pub async fn delete_memory(
    client: &dyn MemoryClient,
    hook: &MemoryHook,
) -> Result<(), crate::memory::MemoryError> {
    match hook.memory_id() {
        Some(memory_id) => {
            client.delete_memory(memory_id).await?;
            tracing::info!(%memory_id, "Deleted memory resource");
            Ok(())
        }
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryMemoryClient;
    use crate::params::InMemoryParameterStore;

    #[tokio::test]
    async fn test_reuses_registered_memory() {
        let client = InMemoryMemoryClient::new().with_resource("mem-existing").await;
        let params = InMemoryParameterStore::new();
        params.put(MEMORY_ID_PARAM, "mem-existing").await.unwrap();

        let id = create_memory_resource(&client, &params).await;
        assert_eq!(id.as_deref(), Some("mem-existing"));
    }

    #[tokio::test]
    async fn test_creates_and_registers_when_missing() {
        let client = InMemoryMemoryClient::new();
        let params = InMemoryParameterStore::new();
        params.put(MEMORY_ID_PARAM, "mem-gone").await.unwrap();

        let id = create_memory_resource(&client, &params).await.unwrap();
        assert!(id.starts_with(MEMORY_RESOURCE_NAME));
        assert_eq!(params.get(MEMORY_ID_PARAM).await.unwrap(), Some(id.clone()));
        assert!(client.get_memory(&id).await.is_ok());
    }

    #[tokio::test]
    async fn test_setup_and_delete() {
        let client: Arc<InMemoryMemoryClient> = Arc::new(InMemoryMemoryClient::new());
        let params = InMemoryParameterStore::new();
        let hook = setup_memory(client.clone(), &params, "default", "s-1").await;
        let id = hook.memory_id().unwrap().to_string();
        assert_eq!(hook.actor_id(), "default");

        delete_memory(client.as_ref(), &hook).await.unwrap();
        assert!(client.get_memory(&id).await.is_err());
    }
}
