use async_trait::async_trait;
use futures_util::StreamExt;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client as RedisClient, Script};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::document::sort_documents;
use super::subscription::SnapshotSender;
use super::{
    Document, DocumentStore, Fields, OrderBy, SetMode, StoreError, Subscription, split_path,
};

/// 文档键前缀
const DOC_PREFIX: &str = "doc:";
/// 集合索引键前缀（有序集合，分值为写入序号）
const COLLECTION_PREFIX: &str = "col:";
/// 变更通知频道前缀
const CHANGES_PREFIX: &str = "changes:";
/// 全局写入序号
const SEQ_KEY: &str = "neartalk:seq";
/// 存储时钟（毫秒）
const CLOCK_KEY: &str = "neartalk:clock";

// 单文档写入，整个脚本原子执行
// KEYS: 文档键, 集合键, 序号键, 时钟键
// ARGV: 模式, 字段JSON, 时间戳字段JSON, 文档ID, 通知频道
const WRITE_SCRIPT: &str = r#"
local existing = redis.call('GET', KEYS[1])
local mode = ARGV[1]
if mode == 'update' and not existing then
  return redis.error_reply('NOT_FOUND')
end
local doc = {}
if existing and mode ~= 'replace' then
  doc = cjson.decode(existing)
end
for k, v in pairs(cjson.decode(ARGV[2])) do
  doc[k] = v
end
local stamps = cjson.decode(ARGV[3])
if #stamps > 0 then
  local t = redis.call('TIME')
  local now = tonumber(t[1]) * 1000 + math.floor(tonumber(t[2]) / 1000)
  local last = tonumber(redis.call('GET', KEYS[4]) or '0')
  if now <= last then
    now = last + 1
  end
  redis.call('SET', KEYS[4], now)
  for _, field in ipairs(stamps) do
    doc[field] = now
  end
end
if not redis.call('ZSCORE', KEYS[2], ARGV[4]) then
  local seq = redis.call('INCR', KEYS[3])
  redis.call('ZADD', KEYS[2], seq, ARGV[4])
end
redis.call('SET', KEYS[1], cjson.encode(doc))
redis.call('PUBLISH', ARGV[5], ARGV[4])
return 1
"#;

// 原子计数器
// KEYS: 文档键
// ARGV: 字段, 增量, 通知频道, 文档ID
const INCREMENT_SCRIPT: &str = r#"
local existing = redis.call('GET', KEYS[1])
if not existing then
  return redis.error_reply('NOT_FOUND')
end
local doc = cjson.decode(existing)
local current = tonumber(doc[ARGV[1]]) or 0
doc[ARGV[1]] = current + tonumber(ARGV[2])
redis.call('SET', KEYS[1], cjson.encode(doc))
redis.call('PUBLISH', ARGV[3], ARGV[4])
return doc[ARGV[1]]
"#;

// KEYS: 文档键, 集合键
// ARGV: 文档ID, 通知频道
const DELETE_SCRIPT: &str = r#"
local removed = redis.call('DEL', KEYS[1])
redis.call('ZREM', KEYS[2], ARGV[1])
if removed > 0 then
  redis.call('PUBLISH', ARGV[2], ARGV[1])
end
return removed
"#;

fn doc_key(path: &str) -> String {
    format!("{}{}", DOC_PREFIX, path)
}

fn collection_key(collection: &str) -> String {
    format!("{}{}", COLLECTION_PREFIX, collection)
}

fn changes_channel(collection: &str) -> String {
    format!("{}{}", CHANGES_PREFIX, collection)
}

fn map_script_error(err: redis::RedisError, path: &str) -> StoreError {
    if err.code() == Some("NOT_FOUND") {
        StoreError::NotFound(path.to_string())
    } else {
        StoreError::from(err)
    }
}

fn parse_document(id: String, raw: &str, seq: u64) -> Result<Document, StoreError> {
    let data: Map<String, Value> = serde_json::from_str(raw)?;
    Ok(Document::new(id, data, seq))
}

/// 基于 Redis 的文档存储
#[derive(Clone)]
pub struct RedisStore {
    client: RedisClient,
    conn: MultiplexedConnection,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = RedisClient::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        tracing::info!("Connected to redis document store");
        Ok(Self { client, conn })
    }

    async fn write(&self, path: &str, fields: Fields, mode: &str) -> Result<(), StoreError> {
        let (collection, id) = split_path(path)?;
        let values = serde_json::to_string(fields.values())?;
        let stamps = serde_json::to_string(fields.server_timestamp_fields())?;
        let mut conn = self.conn.clone();

        let _: i64 = Script::new(WRITE_SCRIPT)
            .key(doc_key(path))
            .key(collection_key(collection))
            .key(SEQ_KEY)
            .key(CLOCK_KEY)
            .arg(mode)
            .arg(values)
            .arg(stamps)
            .arg(id)
            .arg(changes_channel(collection))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| map_script_error(e, path))?;
        Ok(())
    }

    async fn read_document(&self, path: &str) -> Result<Option<Document>, StoreError> {
        let (collection, id) = split_path(path)?;
        let mut conn = self.conn.clone();

        let raw: Option<String> = conn.get(doc_key(path)).await?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        let seq: Option<f64> = conn.zscore(collection_key(collection), id).await?;
        parse_document(id.to_string(), &raw, seq.unwrap_or(0.0) as u64).map(Some)
    }

    async fn read_collection(
        &self,
        collection: &str,
        order: Option<&OrderBy>,
    ) -> Result<Vec<Document>, StoreError> {
        let mut conn = self.conn.clone();
        let members: Vec<(String, f64)> = conn
            .zrange_withscores(collection_key(collection), 0, -1)
            .await?;
        if members.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = members
            .iter()
            .map(|(id, _)| doc_key(&format!("{}/{}", collection, id)))
            .collect();
        let raws: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await?;

        let mut documents = Vec::with_capacity(members.len());
        for ((id, seq), raw) in members.into_iter().zip(raws) {
            // 集合索引与文档之间可能短暂不一致，跳过已删除的文档
            if let Some(raw) = raw {
                documents.push(parse_document(id, &raw, seq as u64)?);
            }
        }
        sort_documents(&mut documents, order);
        Ok(documents)
    }

    async fn spawn_feed(
        &self,
        collection: &str,
        order: Option<OrderBy>,
        only: Option<String>,
    ) -> Result<Subscription, StoreError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(changes_channel(collection)).await?;

        let (mut sender, updates) = SnapshotSender::channel();
        let store = self.clone();
        let collection = collection.to_string();

        let task = tokio::spawn(async move {
            let mut messages = pubsub.into_on_message();
            loop {
                let snapshot = match &only {
                    Some(path) => store
                        .read_document(path)
                        .await
                        .map(|doc| doc.into_iter().collect()),
                    None => store.read_collection(&collection, order.as_ref()).await,
                };
                match snapshot {
                    Ok(snapshot) => {
                        if !sender.send(snapshot) {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Failed to refresh feed for {}: {}", collection, e);
                    }
                }
                if messages.next().await.is_none() {
                    tracing::warn!("Change feed closed: {}", collection);
                    break;
                }
            }
        });

        Ok(Subscription::new(updates, task))
    }
}

#[async_trait]
impl DocumentStore for RedisStore {
    async fn get(&self, path: &str) -> Result<Option<Document>, StoreError> {
        self.read_document(path).await
    }

    async fn list(
        &self,
        collection: &str,
        order: Option<&OrderBy>,
    ) -> Result<Vec<Document>, StoreError> {
        self.read_collection(collection, order).await
    }

    async fn add(&self, collection: &str, fields: Fields) -> Result<String, StoreError> {
        let id = Uuid::new_v4().simple().to_string();
        self.write(&format!("{}/{}", collection, id), fields, "replace")
            .await?;
        Ok(id)
    }

    async fn set(&self, path: &str, fields: Fields, mode: SetMode) -> Result<(), StoreError> {
        let mode = match mode {
            SetMode::Replace => "replace",
            SetMode::Merge => "merge",
        };
        self.write(path, fields, mode).await
    }

    async fn update(&self, path: &str, fields: Fields) -> Result<(), StoreError> {
        self.write(path, fields, "update").await
    }

    async fn increment(&self, path: &str, field: &str, delta: i64) -> Result<(), StoreError> {
        let (collection, id) = split_path(path)?;
        let mut conn = self.conn.clone();

        let _: i64 = Script::new(INCREMENT_SCRIPT)
            .key(doc_key(path))
            .arg(field)
            .arg(delta)
            .arg(changes_channel(collection))
            .arg(id)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| map_script_error(e, path))?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        let (collection, id) = split_path(path)?;
        let mut conn = self.conn.clone();

        let _: i64 = Script::new(DELETE_SCRIPT)
            .key(doc_key(path))
            .key(collection_key(collection))
            .arg(id)
            .arg(changes_channel(collection))
            .invoke_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn subscribe(
        &self,
        collection: &str,
        order: Option<OrderBy>,
    ) -> Result<Subscription, StoreError> {
        self.spawn_feed(collection, order, None).await
    }

    async fn watch(&self, path: &str) -> Result<Subscription, StoreError> {
        let (collection, _) = split_path(path)?;
        self.spawn_feed(collection, None, Some(path.to_string()))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced_by_path() {
        assert_eq!(doc_key("groups/g1"), "doc:groups/g1");
        assert_eq!(collection_key("groups/g1/messages"), "col:groups/g1/messages");
        assert_eq!(changes_channel("groups"), "changes:groups");
    }

    #[test]
    fn parse_document_reads_json_object() {
        let doc = parse_document("g1".into(), r#"{"name":"Park","memberCount":3}"#, 7).unwrap();
        assert_eq!(doc.id, "g1");
        assert_eq!(doc.seq, 7);
        assert_eq!(doc.field("memberCount").and_then(Value::as_i64), Some(3));
    }

    #[test]
    fn parse_document_rejects_non_objects() {
        assert!(parse_document("g1".into(), "[1,2]", 0).is_err());
    }
}
