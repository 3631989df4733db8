use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::watch;
use uuid::Uuid;

use super::document::sort_documents;
use super::subscription::SnapshotSender;
use super::{
    Document, DocumentStore, Fields, OrderBy, SetMode, StoreError, Subscription, split_path,
};

#[derive(Default)]
struct Inner {
    /// 集合 -> (文档ID -> 文档)
    collections: HashMap<String, BTreeMap<String, Document>>,
    /// 集合变更通知
    channels: HashMap<String, watch::Sender<u64>>,
    /// 写入失败注入（路径前缀）
    failing_prefixes: Vec<String>,
    /// 写入失败注入（完整路径）
    failing_paths: Vec<String>,
    /// 写入延迟注入（路径前缀）
    slow_prefixes: Vec<(String, Duration)>,
    seq: u64,
    last_timestamp: i64,
}

impl Inner {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    /// 存储时钟，毫秒，严格递增
    fn next_timestamp(&mut self) -> i64 {
        let now = Utc::now().timestamp_millis();
        self.last_timestamp = now.max(self.last_timestamp + 1);
        self.last_timestamp
    }

    fn resolve(&mut self, fields: Fields) -> serde_json::Map<String, Value> {
        let now = if fields.has_server_timestamps() {
            self.next_timestamp()
        } else {
            0
        };
        fields.resolve(now)
    }

    fn check_writable(&self, path: &str) -> Result<(), StoreError> {
        if self
            .failing_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
            || self.failing_paths.iter().any(|p| p == path)
        {
            return Err(StoreError::Backend(format!("write rejected: {}", path)));
        }
        Ok(())
    }

    fn write_delay(&self, path: &str) -> Option<Duration> {
        self.slow_prefixes
            .iter()
            .find(|(prefix, _)| path.starts_with(prefix.as_str()))
            .map(|(_, delay)| *delay)
    }

    fn channel(&mut self, collection: &str) -> &watch::Sender<u64> {
        self.channels
            .entry(collection.to_string())
            .or_insert_with(|| watch::channel(0).0)
    }

    fn notify(&mut self, collection: &str) {
        self.channel(collection).send_modify(|version| *version += 1);
    }

    fn snapshot(&self, collection: &str, order: Option<&OrderBy>) -> Vec<Document> {
        let mut documents: Vec<Document> = self
            .collections
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default();
        sort_documents(&mut documents, order);
        documents
    }
}

/// 进程内文档存储
///
/// 测试中作为远程存储的替身，未配置 Redis 时服务也使用它。
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 故障注入：之后所有路径以 prefix 开头的写入都失败
    pub fn fail_writes(&self, prefix: &str) {
        self.lock().failing_prefixes.push(prefix.to_string());
    }

    /// 故障注入：只有路径恰好为 path 的写入失败
    pub fn fail_writes_to(&self, path: &str) {
        self.lock().failing_paths.push(path.to_string());
    }

    /// 延迟注入：路径以 prefix 开头的写入先等待 delay
    pub fn slow_writes(&self, prefix: &str, delay: Duration) {
        self.lock().slow_prefixes.push((prefix.to_string(), delay));
    }

    /// 取消所有故障注入
    pub fn heal(&self) {
        let mut inner = self.lock();
        inner.failing_prefixes.clear();
        inner.failing_paths.clear();
        inner.slow_prefixes.clear();
    }

    async fn delay_write(&self, path: &str) {
        let delay = self.lock().write_delay(path);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    /// 集合内文档数量
    pub fn count(&self, collection: &str) -> usize {
        self.lock()
            .collections
            .get(collection)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    fn spawn_feed<F>(&self, collection: &str, select: F) -> Subscription
    where
        F: Fn(&Inner) -> Vec<Document> + Send + 'static,
    {
        let mut changes = self.lock().channel(collection).subscribe();
        let (mut sender, updates) = SnapshotSender::channel();
        let store = self.clone();

        let task = tokio::spawn(async move {
            loop {
                let snapshot = {
                    let inner = store.lock();
                    select(&*inner)
                };
                if !sender.send(snapshot) {
                    break;
                }
                if changes.changed().await.is_err() {
                    break;
                }
            }
        });

        Subscription::new(updates, task)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &str) -> Result<Option<Document>, StoreError> {
        let (collection, id) = split_path(path)?;
        Ok(self
            .lock()
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn list(
        &self,
        collection: &str,
        order: Option<&OrderBy>,
    ) -> Result<Vec<Document>, StoreError> {
        Ok(self.lock().snapshot(collection, order))
    }

    async fn add(&self, collection: &str, fields: Fields) -> Result<String, StoreError> {
        let id = Uuid::new_v4().simple().to_string();
        self.set(&format!("{}/{}", collection, id), fields, SetMode::Replace)
            .await?;
        Ok(id)
    }

    async fn set(&self, path: &str, fields: Fields, mode: SetMode) -> Result<(), StoreError> {
        let (collection, id) = split_path(path)?;
        self.delay_write(path).await;
        let mut inner = self.lock();
        inner.check_writable(path)?;

        let values = inner.resolve(fields);
        let existing = inner
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|doc| (doc.seq, doc.data.clone()));

        let (seq, data) = match (existing, mode) {
            (Some((seq, mut data)), SetMode::Merge) => {
                data.extend(values);
                (seq, data)
            }
            (Some((seq, _)), SetMode::Replace) => (seq, values),
            (None, _) => (inner.next_seq(), values),
        };

        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), Document::new(id, data, seq));
        inner.notify(collection);
        Ok(())
    }

    async fn update(&self, path: &str, fields: Fields) -> Result<(), StoreError> {
        let (collection, id) = split_path(path)?;
        self.delay_write(path).await;
        let mut inner = self.lock();
        inner.check_writable(path)?;

        let exists = inner
            .collections
            .get(collection)
            .is_some_and(|docs| docs.contains_key(id));
        if !exists {
            return Err(StoreError::NotFound(path.to_string()));
        }

        let values = inner.resolve(fields);
        if let Some(doc) = inner
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
        {
            doc.data.extend(values);
        }
        inner.notify(collection);
        Ok(())
    }

    async fn increment(&self, path: &str, field: &str, delta: i64) -> Result<(), StoreError> {
        let (collection, id) = split_path(path)?;
        let mut inner = self.lock();
        inner.check_writable(path)?;

        let doc = inner
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        let current = doc.field(field).and_then(Value::as_i64).unwrap_or(0);
        doc.data
            .insert(field.to_string(), Value::from(current + delta));
        inner.notify(collection);
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        let (collection, id) = split_path(path)?;
        let mut inner = self.lock();
        inner.check_writable(path)?;

        let removed = inner
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.remove(id))
            .is_some();
        if removed {
            inner.notify(collection);
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        collection: &str,
        order: Option<OrderBy>,
    ) -> Result<Subscription, StoreError> {
        let name = collection.to_string();
        Ok(self.spawn_feed(collection, move |inner| {
            inner.snapshot(&name, order.as_ref())
        }))
    }

    async fn watch(&self, path: &str) -> Result<Subscription, StoreError> {
        let (collection, id) = split_path(path)?;
        let (name, id) = (collection.to_string(), id.to_string());
        Ok(self.spawn_feed(collection, move |inner| {
            inner
                .collections
                .get(&name)
                .and_then(|docs| docs.get(&id))
                .cloned()
                .into_iter()
                .collect()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn merge_keeps_existing_fields() {
        let store = MemoryStore::new();
        store
            .set("groups/g1", Fields::new().set("name", "Park").set("memberCount", 1), SetMode::Replace)
            .await
            .unwrap();
        store
            .set("groups/g1", Fields::new().set("lastMessage", "hi"), SetMode::Merge)
            .await
            .unwrap();

        let doc = store.get("groups/g1").await.unwrap().unwrap();
        assert_eq!(doc.field("name"), Some(&json!("Park")));
        assert_eq!(doc.field("lastMessage"), Some(&json!("hi")));
    }

    #[tokio::test]
    async fn update_requires_existing_document() {
        let store = MemoryStore::new();
        let err = store
            .update("groups/missing", Fields::new().set("lastMessage", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn server_timestamps_are_strictly_increasing() {
        let store = MemoryStore::new();
        for _ in 0..5 {
            store
                .add("groups/g1/messages", Fields::new().server_timestamp("createdAt"))
                .await
                .unwrap();
        }
        let docs = store
            .list("groups/g1/messages", Some(&OrderBy::asc("createdAt")))
            .await
            .unwrap();
        let stamps: Vec<i64> = docs
            .iter()
            .map(|d| d.field("createdAt").and_then(Value::as_i64).unwrap())
            .collect();
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn subscription_delivers_full_snapshots() {
        let store = MemoryStore::new();
        let mut feed = store
            .subscribe("groups/g1/messages", Some(OrderBy::asc("createdAt")))
            .await
            .unwrap();
        assert_eq!(feed.next().await.unwrap().len(), 0);

        store
            .add("groups/g1/messages", Fields::new().set("text", "a").server_timestamp("createdAt"))
            .await
            .unwrap();
        store
            .add("groups/g1/messages", Fields::new().set("text", "b").server_timestamp("createdAt"))
            .await
            .unwrap();

        let mut latest = feed.next().await.unwrap();
        while latest.len() < 2 {
            latest = feed.next().await.unwrap();
        }
        assert_eq!(latest[0].field("text"), Some(&json!("a")));
        assert_eq!(latest[1].field("text"), Some(&json!("b")));
    }

    #[tokio::test]
    async fn injected_failures_reject_writes_until_healed() {
        let store = MemoryStore::new();
        store.fail_writes("users/");
        assert!(
            store
                .set("users/u1/joinedGroups/g1", Fields::new(), SetMode::Replace)
                .await
                .is_err()
        );
        store.heal();
        assert!(
            store
                .set("users/u1/joinedGroups/g1", Fields::new(), SetMode::Replace)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn exact_path_failure_spares_subcollections() {
        let store = MemoryStore::new();
        store
            .set("groups/g1", Fields::new().set("name", "Park"), SetMode::Replace)
            .await
            .unwrap();
        store.fail_writes_to("groups/g1");
        assert!(store.update("groups/g1", Fields::new().set("lastMessage", "x")).await.is_err());
        assert!(store.add("groups/g1/messages", Fields::new()).await.is_ok());
    }
}
