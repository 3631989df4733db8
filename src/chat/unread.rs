// 未读计数
// lastSeen 为空时全部消息都算未读；否则只算 lastSeen 之后别人发的消息

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::try_join_all;
use tokio::task::JoinHandle;

use crate::error::AppResult;
use crate::group::JoinedGroups;
use crate::models::{Message, paths};
use crate::store::{DocumentStore, Fields, StoreError};

/// 计算未读数量
pub fn unread_count(messages: &[Message], last_seen: Option<i64>, user_id: &str) -> usize {
    match last_seen {
        None => messages.len(),
        Some(watermark) => messages
            .iter()
            .filter(|m| m.created_at.is_some_and(|t| t > watermark) && m.sender_id != user_id)
            .count(),
    }
}

async fn count_unread(
    store: &Arc<dyn DocumentStore>,
    group_id: &str,
    last_seen: Option<i64>,
    user_id: &str,
) -> Result<usize, StoreError> {
    let docs = store.list(&paths::messages(group_id), None).await?;
    let messages: Vec<Message> = docs.iter().filter_map(|doc| doc.decode().ok()).collect();
    Ok(unread_count(&messages, last_seen, user_id))
}

/// 每个已加入群组的未读角标
pub struct UnreadTracker {
    store: Arc<dyn DocumentStore>,
    user_id: String,
    badges: HashMap<String, usize>,
}

impl UnreadTracker {
    pub fn new(store: Arc<dyn DocumentStore>, user_id: &str) -> Self {
        Self {
            store,
            user_id: user_id.to_string(),
            badges: HashMap::new(),
        }
    }

    /// 按已加入索引重新计算全部角标
    pub async fn refresh(&mut self, joined: &JoinedGroups) -> AppResult<()> {
        let entries: Vec<(String, Option<i64>)> = joined
            .entries()
            .map(|entry| (entry.id.clone(), entry.last_seen))
            .collect();

        let store = &self.store;
        let user_id = self.user_id.as_str();
        let counts = try_join_all(entries.iter().map(|(group_id, last_seen)| async move {
            let count = count_unread(store, group_id, *last_seen, user_id).await?;
            Ok::<_, StoreError>((group_id.clone(), count))
        }))
        .await?;

        self.badges = counts.into_iter().collect();
        Ok(())
    }

    /// 只重新计算一个群组，不在索引中时忽略
    pub async fn refresh_group(&mut self, joined: &JoinedGroups, group_id: &str) -> AppResult<()> {
        let Some(entry) = joined.entry(group_id) else {
            return Ok(());
        };
        let count = count_unread(&self.store, group_id, entry.last_seen, &self.user_id).await?;
        self.badges.insert(group_id.to_string(), count);
        Ok(())
    }

    pub fn badge(&self, group_id: &str) -> usize {
        self.badges.get(group_id).copied().unwrap_or(0)
    }

    /// 把角标写入群组列表
    pub fn apply_to(&self, joined: &mut JoinedGroups) {
        for (group_id, count) in &self.badges {
            joined.set_unread(group_id, *count);
        }
    }

    /// 打开群组：立即清零角标，后台把 lastSeen 推进到当前时间
    ///
    /// 不等待写入完成。写入之前到达的消息在下一次刷新时可能少算。
    pub fn open_group(&mut self, group_id: &str) -> JoinHandle<()> {
        self.badges.insert(group_id.to_string(), 0);

        let store = self.store.clone();
        let path = paths::joined_group(&self.user_id, group_id);
        tokio::spawn(async move {
            let watermark = Fields::new().server_timestamp("lastSeen");
            match store.update(&path, watermark).await {
                Ok(()) => tracing::debug!("Advanced watermark {}", path),
                Err(StoreError::NotFound(_)) => {
                    tracing::debug!("Skipping watermark for {}, not joined", path)
                }
                Err(e) => tracing::warn!("Failed to advance watermark {}: {}", path, e),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(sender: &str, created_at: i64) -> Message {
        Message {
            id: format!("{}-{}", sender, created_at),
            text: "hi".into(),
            sender_id: sender.into(),
            sender_name: sender.into(),
            created_at: Some(created_at),
        }
    }

    #[test]
    fn never_opened_counts_everything() {
        let messages = vec![message("me", 1), message("bob", 2)];
        assert_eq!(unread_count(&messages, None, "me"), 2);
    }

    #[test]
    fn watermark_excludes_old_and_own_messages() {
        let messages = vec![
            message("bob", 10),
            message("bob", 20),
            message("me", 30),
            message("carol", 40),
        ];
        assert_eq!(unread_count(&messages, Some(10), "me"), 2);
        assert_eq!(unread_count(&messages, Some(40), "me"), 0);
    }
}
