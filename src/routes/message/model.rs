use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::Segment;
use crate::models::{Message, timestamp_to_datetime};

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub group_id: String,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    /// 文本全是空白时没有写入，为空
    pub message_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteMessageRequest {
    pub group_id: String,
    pub message_id: String,
}

#[derive(Debug, Deserialize)]
pub struct GroupQuery {
    pub group_id: String,
}

#[derive(Debug, Deserialize)]
pub struct MessageSearchQuery {
    pub group_id: String,
    #[serde(default)]
    pub q: String,
    /// 光标位置，越界时循环
    #[serde(default)]
    pub cursor: usize,
}

#[derive(Debug, Serialize)]
pub struct MessageInfo {
    pub message_id: String,
    pub text: String,
    pub sender_id: String,
    pub sender_name: String,
    pub created_at: Option<DateTime<Utc>>,
    pub is_own: bool,
}

impl MessageInfo {
    pub fn new(message: &Message, user_id: &str) -> Self {
        Self {
            message_id: message.id.clone(),
            text: message.text.clone(),
            sender_id: message.sender_id.clone(),
            sender_name: message.sender_name.clone(),
            created_at: timestamp_to_datetime(message.created_at),
            is_own: message.sender_id == user_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SearchMatch<'a> {
    pub index: usize,
    pub message_id: &'a str,
    /// 光标当前所在的结果
    pub current: bool,
    pub segments: Vec<Segment<'a>>,
}

#[derive(Debug, Serialize)]
pub struct MessageSearchResponse<'a> {
    pub matches: Vec<SearchMatch<'a>>,
    /// 需要滚动到中央的消息下标
    pub focus: Option<usize>,
    pub label: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FeedEvent {
    pub messages: Vec<MessageInfo>,
    pub appended: usize,
    pub removed: usize,
    pub last_sender: Option<String>,
}
