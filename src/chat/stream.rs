use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::models::{MAX_MESSAGE_LEN, Message, paths, summarize};
use crate::store::{Document, DocumentStore, Fields, OrderBy, Subscription};

/// 一次快照带来的变化
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedUpdate {
    /// 新出现的消息数量
    pub appended: usize,
    /// 消失（被删除）的消息数量
    pub removed: usize,
    /// 新消息中最后一条的发送者
    pub last_sender: Option<String>,
}

impl FeedUpdate {
    pub fn has_new_messages(&self) -> bool {
        self.appended > 0
    }
}

/// 本地消息列表
///
/// 每份快照整体替换本地状态，重复或乱序的快照不会破坏列表。
#[derive(Debug, Clone, Default)]
pub struct MessageFeed {
    messages: Vec<Message>,
}

impl MessageFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, snapshot: &[Document]) -> FeedUpdate {
        let messages: Vec<Message> = snapshot
            .iter()
            .filter_map(|doc| match doc.decode::<Message>() {
                Ok(message) => Some(message),
                Err(e) => {
                    tracing::warn!("Skipping malformed message {}: {}", doc.id, e);
                    None
                }
            })
            .collect();

        let before: HashSet<&str> = self.messages.iter().map(|m| m.id.as_str()).collect();
        let after: HashSet<&str> = messages.iter().map(|m| m.id.as_str()).collect();

        let appended: Vec<&Message> = messages
            .iter()
            .filter(|m| !before.contains(m.id.as_str()))
            .collect();
        let update = FeedUpdate {
            appended: appended.len(),
            removed: before.difference(&after).count(),
            last_sender: appended.last().map(|m| m.sender_id.clone()),
        };

        self.messages = messages;
        update
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// 消息读写
#[derive(Clone)]
pub struct MessageService {
    store: Arc<dyn DocumentStore>,
}

impl MessageService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// 订阅群组消息，按创建时间升序
    pub async fn subscribe(&self, group_id: &str) -> AppResult<Subscription> {
        Ok(self
            .store
            .subscribe(&paths::messages(group_id), Some(OrderBy::asc("createdAt")))
            .await?)
    }

    pub async fn list(&self, group_id: &str) -> AppResult<Vec<Message>> {
        let docs = self
            .store
            .list(&paths::messages(group_id), Some(&OrderBy::asc("createdAt")))
            .await?;
        let mut feed = MessageFeed::new();
        feed.apply(&docs);
        Ok(feed.messages)
    }

    /// 发送消息
    ///
    /// 文本去掉首尾空白；全是空白时什么也不写，返回 None。
    /// 群组不存在时返回 NotFound，不写入消息。
    /// 写入消息后再更新群组的最后消息摘要。
    pub async fn send(
        &self,
        group_id: &str,
        sender_id: &str,
        sender_name: &str,
        text: &str,
    ) -> AppResult<Option<String>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        if text.chars().count() > MAX_MESSAGE_LEN {
            return Err(AppError::validation(format!(
                "Messages must be at most {} characters.",
                MAX_MESSAGE_LEN
            )));
        }
        if self.store.get(&paths::group(group_id)).await?.is_none() {
            return Err(AppError::NotFound(format!("Group {}", group_id)));
        }

        let message = Fields::new()
            .set("text", text)
            .set("senderId", sender_id)
            .set("senderName", sender_name)
            .server_timestamp("createdAt");
        let message_id = self
            .store
            .add(&paths::messages(group_id), message)
            .await
            .map_err(|e| {
                tracing::error!("Failed to send message to {}: {}", group_id, e);
                e
            })?;

        // 消息已写入，摘要更新失败不影响发送结果
        let summary = Fields::new()
            .set("lastMessage", summarize(text))
            .server_timestamp("updatedAt");
        if let Err(e) = self.store.update(&paths::group(group_id), summary).await {
            tracing::warn!("Failed to update summary of group {}: {}", group_id, e);
        }

        tracing::debug!("Message {} sent to group {}", message_id, group_id);
        Ok(Some(message_id))
    }

    /// 删除自己的消息，不刷新群组摘要
    pub async fn delete(&self, group_id: &str, message_id: &str, user_id: &str) -> AppResult<()> {
        let path = paths::message(group_id, message_id);
        let message: Message = self
            .store
            .get(&path)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Message {}", message_id)))?
            .decode()?;

        if message.sender_id != user_id {
            return Err(AppError::Forbidden(
                "You can only delete your own messages.".into(),
            ));
        }

        self.store.delete(&path).await?;
        tracing::info!("User {} deleted message {} in {}", user_id, message_id, group_id);
        Ok(())
    }
}
