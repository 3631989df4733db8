// 输入状态
// 每个 (群组, 用户) 一个标志，后写入者生效，没有服务端过期

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::error::AppResult;
use crate::models::{TypingState, paths};
use crate::store::{Document, DocumentStore, Fields, SetMode, StoreError, Subscription};

async fn publish(
    store: &Arc<dyn DocumentStore>,
    path: &str,
    nickname: &str,
    typing: bool,
) -> Result<(), StoreError> {
    let fields = Fields::new()
        .set("typing", typing)
        .set("nickname", nickname)
        .server_timestamp("updatedAt");
    store.set(path, fields, SetMode::Replace).await
}

/// 当前用户在某个群组的输入状态发布者
///
/// 每次输入都重启空闲计时器，计时结束或输入框清空时发布 false。
/// 被丢弃时取消计时器并尽力发布一次 false。
pub struct TypingPublisher {
    store: Arc<dyn DocumentStore>,
    path: String,
    nickname: String,
    idle: Duration,
    timer: Option<JoinHandle<()>>,
    closed: bool,
}

impl TypingPublisher {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        group_id: &str,
        user_id: &str,
        nickname: &str,
        idle: Duration,
    ) -> Self {
        Self {
            store,
            path: paths::typing_flag(group_id, user_id),
            nickname: nickname.to_string(),
            idle,
            timer: None,
            closed: false,
        }
    }

    /// 输入框内容变化
    pub async fn on_input(&mut self, text: &str) -> AppResult<()> {
        self.cancel_timer();
        if text.is_empty() {
            publish(&self.store, &self.path, &self.nickname, false).await?;
            return Ok(());
        }

        publish(&self.store, &self.path, &self.nickname, true).await?;

        let store = self.store.clone();
        let path = self.path.clone();
        let nickname = self.nickname.clone();
        let idle = self.idle;
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(idle).await;
            if let Err(e) = publish(&store, &path, &nickname, false).await {
                tracing::warn!("Failed to clear typing flag {}: {}", path, e);
            }
        }));
        Ok(())
    }

    /// 是否有未结束的空闲计时器
    pub fn has_pending_timer(&self) -> bool {
        self.timer.as_ref().is_some_and(|timer| !timer.is_finished())
    }

    /// 离开会话，无论计时器状态都发布 false
    pub async fn close(mut self) -> AppResult<()> {
        self.shutdown().await
    }

    async fn shutdown(&mut self) -> AppResult<()> {
        self.closed = true;
        self.cancel_timer();
        publish(&self.store, &self.path, &self.nickname, false).await?;
        Ok(())
    }

    /// 标志已是 false，丢弃时不再发布
    fn retire(&mut self) {
        self.closed = true;
        self.cancel_timer();
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl Drop for TypingPublisher {
    fn drop(&mut self) {
        self.cancel_timer();
        if self.closed {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let store = self.store.clone();
        let path = std::mem::take(&mut self.path);
        let nickname = std::mem::take(&mut self.nickname);
        handle.spawn(async move {
            if let Err(e) = publish(&store, &path, &nickname, false).await {
                tracing::warn!("Failed to clear typing flag {} on drop: {}", path, e);
            }
        });
    }
}

/// 从快照中取出其他正在输入的用户
pub fn typing_others(snapshot: &[Document], user_id: &str) -> Vec<TypingState> {
    snapshot
        .iter()
        .filter(|doc| doc.id != user_id)
        .filter_map(|doc| doc.decode::<TypingState>().ok())
        .filter(|state| state.typing)
        .collect()
}

/// 输入提示文案
pub fn typing_label(others: &[TypingState]) -> Option<String> {
    let name = |state: &TypingState| {
        if state.nickname.is_empty() {
            "Someone".to_string()
        } else {
            state.nickname.clone()
        }
    };
    match others {
        [] => None,
        [one] => Some(format!("{} is typing…", name(one))),
        [first, second] => Some(format!("{} and {} are typing…", name(first), name(second))),
        _ => Some(format!("{} people are typing…", others.len())),
    }
}

/// 群组内其他人的输入状态
pub struct TypingFeed {
    subscription: Subscription,
    user_id: String,
}

impl TypingFeed {
    pub async fn subscribe(
        store: &Arc<dyn DocumentStore>,
        group_id: &str,
        user_id: &str,
    ) -> AppResult<Self> {
        let subscription = store.subscribe(&paths::typing(group_id), None).await?;
        Ok(Self {
            subscription,
            user_id: user_id.to_string(),
        })
    }

    /// 下一份正在输入的用户列表，订阅结束时返回 None
    pub async fn next(&mut self) -> Option<Vec<TypingState>> {
        let snapshot = self.subscription.next().await?;
        Some(typing_others(&snapshot, &self.user_id))
    }
}

type PublisherSlot = Arc<Mutex<TypingPublisher>>;

/// 网关使用的发布者表，键为 (用户, 群组)
///
/// 表锁只在查找时持有，存储写入只锁单个发布者。
/// 空闲计时器已结束的发布者在下一次访问时移出。
#[derive(Clone)]
pub struct TypingRegistry {
    idle: Duration,
    publishers: Arc<Mutex<HashMap<(String, String), PublisherSlot>>>,
}

impl TypingRegistry {
    pub fn new(idle: Duration) -> Self {
        Self {
            idle,
            publishers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn input(
        &self,
        store: &Arc<dyn DocumentStore>,
        group_id: &str,
        user_id: &str,
        nickname: &str,
        text: &str,
    ) -> AppResult<()> {
        let slot = {
            let mut publishers = self.publishers.lock().await;
            evict_idle(&mut publishers);
            publishers
                .entry((user_id.to_string(), group_id.to_string()))
                .or_insert_with(|| {
                    Arc::new(Mutex::new(TypingPublisher::new(
                        store.clone(),
                        group_id,
                        user_id,
                        nickname,
                        self.idle,
                    )))
                })
                .clone()
        };
        slot.lock().await.on_input(text).await
    }

    /// 用户离开会话
    ///
    /// 没有发布者时只把已有的标志改为 false，不创建新文档。
    pub async fn stop(
        &self,
        store: &Arc<dyn DocumentStore>,
        group_id: &str,
        user_id: &str,
    ) -> AppResult<()> {
        let removed = {
            let mut publishers = self.publishers.lock().await;
            evict_idle(&mut publishers);
            publishers.remove(&(user_id.to_string(), group_id.to_string()))
        };
        if let Some(slot) = removed {
            return slot.lock().await.shutdown().await;
        }

        let fields = Fields::new()
            .set("typing", false)
            .server_timestamp("updatedAt");
        match store.update(&paths::typing_flag(group_id, user_id), fields).await {
            Ok(()) | Err(StoreError::NotFound(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// 移出没人持有且计时器已结束的发布者
fn evict_idle(publishers: &mut HashMap<(String, String), PublisherSlot>) {
    publishers.retain(|(user_id, group_id), slot| {
        if Arc::strong_count(slot) > 1 {
            return true;
        }
        let Ok(mut publisher) = slot.try_lock() else {
            return true;
        };
        if publisher.has_pending_timer() {
            return true;
        }
        publisher.retire();
        tracing::debug!("Evicted idle typing publisher {} in {}", user_id, group_id);
        false
    });
}
