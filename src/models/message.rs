use serde::{Deserialize, Serialize};

/// 消息最大长度（字符）
pub const MAX_MESSAGE_LEN: usize = 1000;

/// 群组最后消息摘要长度（字符）
pub const SUMMARY_LEN: usize = 60;

/// 消息文档，创建后不可修改，只能由发送者删除
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default, skip_serializing)]
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub sender_id: String,
    /// 发送时的昵称快照
    #[serde(default)]
    pub sender_name: String,
    /// 存储端时间戳，写入尚未确认时为空
    #[serde(default)]
    pub created_at: Option<i64>,
}

/// 生成群组最后消息摘要，超过60个字符时截断并加省略号
pub fn summarize(text: &str) -> String {
    if text.chars().count() > SUMMARY_LEN {
        let mut summary: String = text.chars().take(SUMMARY_LEN).collect();
        summary.push('…');
        summary
    } else {
        text.to_string()
    }
}
