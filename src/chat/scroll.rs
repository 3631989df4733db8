use super::FeedUpdate;

/// 距离底部多少像素以内算作“在底部”
pub const NEAR_BOTTOM_PX: f64 = 120.0;

/// 消息列表的滚动状态
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scroll_top: f64,
    pub client_height: f64,
    pub scroll_height: f64,
}

impl Viewport {
    pub fn distance_from_bottom(&self) -> f64 {
        (self.scroll_height - self.scroll_top - self.client_height).max(0.0)
    }
}

/// 新消息到达时是否滚动到底部
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollPolicy {
    pub threshold_px: f64,
}

impl Default for ScrollPolicy {
    fn default() -> Self {
        Self {
            threshold_px: NEAR_BOTTOM_PX,
        }
    }
}

impl ScrollPolicy {
    /// `before` 是应用更新之前的滚动状态。搜索进行中时从不自动滚动。
    pub fn should_scroll(
        &self,
        before: &Viewport,
        update: &FeedUpdate,
        user_id: &str,
        search_active: bool,
    ) -> bool {
        if search_active || !update.has_new_messages() {
            return false;
        }
        let own = update.last_sender.as_deref() == Some(user_id);
        own || before.distance_from_bottom() <= self.threshold_px
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arrival(sender: &str) -> FeedUpdate {
        FeedUpdate {
            appended: 1,
            removed: 0,
            last_sender: Some(sender.to_string()),
        }
    }

    fn viewport(from_bottom: f64) -> Viewport {
        Viewport {
            scroll_top: 1000.0 - 400.0 - from_bottom,
            client_height: 400.0,
            scroll_height: 1000.0,
        }
    }

    #[test]
    fn near_bottom_follows_new_messages() {
        let policy = ScrollPolicy::default();
        assert!(policy.should_scroll(&viewport(120.0), &arrival("bob"), "alice", false));
        assert!(!policy.should_scroll(&viewport(121.0), &arrival("bob"), "alice", false));
    }

    #[test]
    fn own_message_always_scrolls() {
        let policy = ScrollPolicy::default();
        assert!(policy.should_scroll(&viewport(500.0), &arrival("alice"), "alice", false));
    }

    #[test]
    fn search_suppresses_scrolling() {
        let policy = ScrollPolicy::default();
        assert!(!policy.should_scroll(&viewport(0.0), &arrival("alice"), "alice", true));
        assert!(!policy.should_scroll(&viewport(0.0), &FeedUpdate::default(), "alice", false));
    }
}
