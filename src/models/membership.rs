use serde::{Deserialize, Serialize};

/// 昵称最大长度
pub const MAX_NICKNAME_LEN: usize = 30;

/// 群成员文档，键为 (群组ID, 用户ID)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    /// 用户ID
    #[serde(default, skip_serializing)]
    pub id: String,
    pub nickname: String,
    #[serde(default)]
    pub joined_at: Option<i64>,
}

impl Membership {
    /// 消息上显示的名称，昵称为空时为 "Anonymous"
    pub fn display_name(&self) -> &str {
        if self.nickname.is_empty() {
            "Anonymous"
        } else {
            &self.nickname
        }
    }
}

/// 用户已加入群组索引
///
/// 冗余保存群组的部分字段，`last_seen` 为空表示从未打开过。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinedGroupEntry {
    /// 群组ID
    #[serde(default, skip_serializing)]
    pub id: String,
    #[serde(default)]
    pub group_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub joined_at: Option<i64>,
    #[serde(default)]
    pub last_seen: Option<i64>,
}
