// 远程文档存储模块
// 定义文档存储接口，以及内存和 Redis 两种实现

mod document;
mod memory;
mod redis_store;
mod subscription;

use async_trait::async_trait;

pub use document::{Document, Fields, OrderBy, SetMode};
pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use subscription::Subscription;

/// 存储层错误
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("failed to decode document: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// 远程文档存储接口
///
/// 路径使用 `collection/id` 形式，例如 `groups/abc/messages/xyz`。
/// 只保证单文档原子性，多步操作由调用方按顺序执行。
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// 读取单个文档
    async fn get(&self, path: &str) -> Result<Option<Document>, StoreError>;

    /// 读取集合内全部文档，按排序键排序，相同键按写入顺序
    async fn list(
        &self,
        collection: &str,
        order: Option<&OrderBy>,
    ) -> Result<Vec<Document>, StoreError>;

    /// 新增文档，由存储分配ID
    async fn add(&self, collection: &str, fields: Fields) -> Result<String, StoreError>;

    /// 写入文档（覆盖或合并）
    async fn set(&self, path: &str, fields: Fields, mode: SetMode) -> Result<(), StoreError>;

    /// 更新已存在的文档，文档不存在时返回 NotFound
    async fn update(&self, path: &str, fields: Fields) -> Result<(), StoreError>;

    /// 原子地增减文档中的数值字段
    async fn increment(&self, path: &str, field: &str, delta: i64) -> Result<(), StoreError>;

    /// 删除文档
    async fn delete(&self, path: &str) -> Result<(), StoreError>;

    /// 订阅集合，每次变更推送完整的有序快照
    async fn subscribe(
        &self,
        collection: &str,
        order: Option<OrderBy>,
    ) -> Result<Subscription, StoreError>;

    /// 订阅单个文档，快照中包含0或1个文档
    async fn watch(&self, path: &str) -> Result<Subscription, StoreError>;
}

/// 拆分文档路径为 (集合, 文档ID)
pub(crate) fn split_path(path: &str) -> Result<(&str, &str), StoreError> {
    path.rsplit_once('/')
        .filter(|(collection, id)| !collection.is_empty() && !id.is_empty())
        .ok_or_else(|| StoreError::Backend(format!("invalid document path: {}", path)))
}
