use serde::{Deserialize, Serialize};

use crate::models::TypingState;

#[derive(Debug, Deserialize)]
pub struct TypingRequest {
    pub group_id: String,
    /// 输入框当前内容，为空时清除输入状态
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct StopTypingRequest {
    pub group_id: String,
}

#[derive(Debug, Deserialize)]
pub struct TypingQuery {
    pub group_id: String,
}

#[derive(Debug, Serialize)]
pub struct TypingUser {
    pub user_id: String,
    pub nickname: String,
}

impl From<TypingState> for TypingUser {
    fn from(state: TypingState) -> Self {
        Self {
            user_id: state.id,
            nickname: state.nickname,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TypingEvent {
    pub users: Vec<TypingUser>,
    pub label: Option<String>,
}
