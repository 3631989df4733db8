use super::MessageService;
use crate::error::AppResult;

/// 输入框
///
/// 发送前先清空输入框，写入失败时恢复原文，不自动重试。
#[derive(Debug, Clone, Default)]
pub struct Composer {
    draft: String,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    pub async fn submit(
        &mut self,
        service: &MessageService,
        group_id: &str,
        sender_id: &str,
        sender_name: &str,
    ) -> AppResult<Option<String>> {
        let text = std::mem::take(&mut self.draft);
        if text.trim().is_empty() {
            self.draft = text;
            return Ok(None);
        }

        match service.send(group_id, sender_id, sender_name, &text).await {
            Ok(id) => Ok(id),
            Err(e) => {
                tracing::warn!("Send failed, restoring draft: {}", e);
                self.draft = text;
                Err(e)
            }
        }
    }
}
