// 存储文档模型
// 字段名与存储中的文档保持一致（camelCase）

mod group;
mod membership;
mod message;
mod typing;

pub use group::{Group, MAX_GROUP_NAME_LEN};
pub use membership::{JoinedGroupEntry, MAX_NICKNAME_LEN, Membership};
pub use message::{MAX_MESSAGE_LEN, Message, SUMMARY_LEN, summarize};
pub use typing::TypingState;

use chrono::{DateTime, Utc};

/// 存储时间戳（毫秒）转换为 UTC 时间
pub fn timestamp_to_datetime(millis: Option<i64>) -> Option<DateTime<Utc>> {
    millis.and_then(DateTime::from_timestamp_millis)
}

/// 文档路径
pub mod paths {
    pub fn groups() -> String {
        "groups".to_string()
    }

    pub fn group(group_id: &str) -> String {
        format!("groups/{}", group_id)
    }

    pub fn members(group_id: &str) -> String {
        format!("groups/{}/members", group_id)
    }

    pub fn member(group_id: &str, user_id: &str) -> String {
        format!("groups/{}/members/{}", group_id, user_id)
    }

    pub fn messages(group_id: &str) -> String {
        format!("groups/{}/messages", group_id)
    }

    pub fn message(group_id: &str, message_id: &str) -> String {
        format!("groups/{}/messages/{}", group_id, message_id)
    }

    pub fn typing(group_id: &str) -> String {
        format!("groups/{}/typing", group_id)
    }

    pub fn typing_flag(group_id: &str, user_id: &str) -> String {
        format!("groups/{}/typing/{}", group_id, user_id)
    }

    pub fn joined_groups(user_id: &str) -> String {
        format!("users/{}/joinedGroups", user_id)
    }

    pub fn joined_group(user_id: &str, group_id: &str) -> String {
        format!("users/{}/joinedGroups/{}", user_id, group_id)
    }
}
