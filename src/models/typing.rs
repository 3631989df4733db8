use serde::{Deserialize, Serialize};

/// 输入状态，键为 (群组ID, 用户ID)，后写入者生效，不保留历史
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypingState {
    /// 用户ID
    #[serde(default, skip_serializing)]
    pub id: String,
    #[serde(default)]
    pub typing: bool,
    #[serde(default)]
    pub nickname: String,
}
