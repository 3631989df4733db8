// 我的群组列表
// 已加入索引 + 每个群组文档的最新内容，按最近更新时间排序

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::try_join_all;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::chat::UnreadTracker;
use crate::error::AppResult;
use crate::models::{Group, JoinedGroupEntry, paths};
use crate::store::{Document, DocumentStore, Subscription};

/// 列表中的一项
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinedGroupSummary {
    pub id: String,
    pub name: String,
    pub avatar: String,
    pub member_count: i64,
    pub last_message: String,
    pub updated_at: Option<i64>,
    pub last_seen: Option<i64>,
    pub unread: usize,
}

/// 我的群组
///
/// 每次推送都用最新的文档整体替换，不根据本地旧值做增量计算，
/// 因此群组更新和索引更新以任意顺序到达都能得到一致结果。
#[derive(Debug, Clone, Default)]
pub struct JoinedGroups {
    entries: HashMap<String, JoinedGroupEntry>,
    groups: HashMap<String, Group>,
    unread: HashMap<String, usize>,
}

impl JoinedGroups {
    /// 一次性读取索引和对应的群组文档
    pub async fn load(store: &Arc<dyn DocumentStore>, user_id: &str) -> AppResult<Self> {
        let index = store.list(&paths::joined_groups(user_id), None).await?;
        let mut state = Self::default();
        state.apply_index(&index);

        let group_paths: Vec<String> = state.entries.keys().map(|id| paths::group(id)).collect();
        let docs = try_join_all(group_paths.iter().map(|path| store.get(path))).await?;
        for doc in docs.into_iter().flatten() {
            let id = doc.id.clone();
            state.apply_group(&id, decode_group(&doc));
        }
        Ok(state)
    }

    /// 用索引快照替换当前索引，返回新增的群组ID
    pub fn apply_index(&mut self, snapshot: &[Document]) -> Vec<String> {
        let mut entries = HashMap::with_capacity(snapshot.len());
        for doc in snapshot {
            match doc.decode::<JoinedGroupEntry>() {
                Ok(entry) => {
                    entries.insert(doc.id.clone(), entry);
                }
                Err(e) => tracing::warn!("Skipping malformed joined entry {}: {}", doc.id, e),
            }
        }

        let added = entries
            .keys()
            .filter(|id| !self.entries.contains_key(*id))
            .cloned()
            .collect();
        self.groups.retain(|id, _| entries.contains_key(id));
        self.unread.retain(|id, _| entries.contains_key(id));
        self.entries = entries;
        added
    }

    /// 应用群组文档的最新内容，None 表示群组已不存在
    pub fn apply_group(&mut self, group_id: &str, group: Option<Group>) {
        if !self.entries.contains_key(group_id) {
            return;
        }
        match group {
            Some(group) => {
                self.groups.insert(group_id.to_string(), group);
            }
            None => {
                self.groups.remove(group_id);
            }
        }
    }

    pub fn set_unread(&mut self, group_id: &str, count: usize) {
        if self.entries.contains_key(group_id) {
            self.unread.insert(group_id.to_string(), count);
        }
    }

    pub fn unread(&self, group_id: &str) -> usize {
        self.unread.get(group_id).copied().unwrap_or(0)
    }

    pub fn entries(&self) -> impl Iterator<Item = &JoinedGroupEntry> {
        self.entries.values()
    }

    pub fn entry(&self, group_id: &str) -> Option<&JoinedGroupEntry> {
        self.entries.get(group_id)
    }

    pub fn group_ids(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// 按最近更新时间降序；群组文档已不存在的条目不显示
    pub fn summaries(&self) -> Vec<JoinedGroupSummary> {
        let mut summaries: Vec<JoinedGroupSummary> = self
            .entries
            .iter()
            .filter_map(|(id, entry)| {
                let group = self.groups.get(id)?;
                Some(JoinedGroupSummary {
                    id: id.clone(),
                    name: group.display_name().to_string(),
                    avatar: if group.avatar_ref.is_empty() {
                        entry.avatar.clone()
                    } else {
                        group.avatar_ref.clone()
                    },
                    member_count: group.member_count,
                    last_message: group.last_message.clone(),
                    updated_at: group.updated_at,
                    last_seen: entry.last_seen,
                    unread: self.unread(id),
                })
            })
            .collect();
        summaries.sort_by(|a, b| {
            Reverse(a.updated_at)
                .cmp(&Reverse(b.updated_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        summaries
    }

    /// 名称过滤（不区分大小写）
    pub fn filter(&self, query: &str) -> Vec<JoinedGroupSummary> {
        let query = query.trim().to_lowercase();
        self.summaries()
            .into_iter()
            .filter(|summary| query.is_empty() || summary.name.to_lowercase().contains(&query))
            .collect()
    }
}

fn decode_group(doc: &Document) -> Option<Group> {
    match doc.decode() {
        Ok(group) => Some(group),
        Err(e) => {
            tracing::warn!("Failed to decode group {}: {}", doc.id, e);
            None
        }
    }
}

/// 实时维护我的群组
///
/// 订阅已加入索引，并为索引中的每个群组单独订阅群组文档。
/// 索引中移除的群组会立即释放对应的订阅。
/// 索引每次刷新都重算全部未读数，群组有新活动时重算该群组。
pub struct JoinedGroupsWatcher {
    store: Arc<dyn DocumentStore>,
    index: Subscription,
    group_tx: mpsc::UnboundedSender<(String, Option<Group>)>,
    group_rx: mpsc::UnboundedReceiver<(String, Option<Group>)>,
    watchers: HashMap<String, JoinHandle<()>>,
    unread: UnreadTracker,
    state: JoinedGroups,
}

impl JoinedGroupsWatcher {
    pub async fn start(store: Arc<dyn DocumentStore>, user_id: &str) -> AppResult<Self> {
        let index = store.subscribe(&paths::joined_groups(user_id), None).await?;
        let (group_tx, group_rx) = mpsc::unbounded_channel();
        Ok(Self {
            unread: UnreadTracker::new(store.clone(), user_id),
            store,
            index,
            group_tx,
            group_rx,
            watchers: HashMap::new(),
            state: JoinedGroups::default(),
        })
    }

    pub fn state(&self) -> &JoinedGroups {
        &self.state
    }

    /// 等待下一次变化并应用，索引订阅结束时返回 None
    pub async fn next(&mut self) -> Option<&JoinedGroups> {
        tokio::select! {
            snapshot = self.index.next() => {
                let snapshot = snapshot?;
                self.apply_index(&snapshot).await;
                if let Err(e) = self.unread.refresh(&self.state).await {
                    tracing::warn!("Failed to refresh unread counts: {}", e);
                }
                self.unread.apply_to(&mut self.state);
            }
            Some((group_id, group)) = self.group_rx.recv() => {
                let previous = self.state.groups.get(&group_id).and_then(|g| g.updated_at);
                let advanced = group.as_ref().and_then(|g| g.updated_at) > previous;
                self.state.apply_group(&group_id, group);
                if advanced {
                    match self.unread.refresh_group(&self.state, &group_id).await {
                        Ok(()) => self.unread.apply_to(&mut self.state),
                        Err(e) => tracing::warn!("Failed to refresh unread of {}: {}", group_id, e),
                    }
                }
            }
        }
        Some(&self.state)
    }

    async fn apply_index(&mut self, snapshot: &[Document]) {
        let added = self.state.apply_index(snapshot);

        let current: Vec<String> = self.state.group_ids();
        self.watchers.retain(|id, task| {
            let keep = current.contains(id);
            if !keep {
                task.abort();
                tracing::debug!("Stopped watching group {}", id);
            }
            keep
        });

        for group_id in added {
            match self.store.watch(&paths::group(&group_id)).await {
                Ok(subscription) => {
                    let task = spawn_group_forwarder(
                        group_id.clone(),
                        subscription,
                        self.group_tx.clone(),
                    );
                    self.watchers.insert(group_id, task);
                }
                Err(e) => tracing::warn!("Failed to watch group {}: {}", group_id, e),
            }
        }
    }
}

impl Drop for JoinedGroupsWatcher {
    fn drop(&mut self) {
        for task in self.watchers.values() {
            task.abort();
        }
    }
}

fn spawn_group_forwarder(
    group_id: String,
    mut subscription: Subscription,
    tx: mpsc::UnboundedSender<(String, Option<Group>)>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(snapshot) = subscription.next().await {
            let group = snapshot.first().and_then(decode_group);
            if tx.send((group_id.clone(), group)).is_err() {
                break;
            }
        }
    })
}
