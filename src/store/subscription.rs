use futures_util::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::Document;

/// 实时订阅句柄
///
/// 每次推送都是完整的当前快照。句柄被丢弃时监听任务随之终止，
/// 不需要手动取消订阅。
pub struct Subscription {
    updates: mpsc::UnboundedReceiver<Vec<Document>>,
    task: JoinHandle<()>,
}

impl Subscription {
    pub(crate) fn new(updates: mpsc::UnboundedReceiver<Vec<Document>>, task: JoinHandle<()>) -> Self {
        Self { updates, task }
    }

    /// 等待下一份快照，监听结束时返回 None
    pub async fn next(&mut self) -> Option<Vec<Document>> {
        self.updates.recv().await
    }

    pub fn into_stream(self) -> impl Stream<Item = Vec<Document>> + Send + 'static {
        futures_util::stream::unfold(self, |mut subscription| async move {
            subscription
                .next()
                .await
                .map(|snapshot| (snapshot, subscription))
        })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
        tracing::debug!("Subscription released");
    }
}

/// 快照去重发送器，内容未变化时不推送
pub(crate) struct SnapshotSender {
    tx: mpsc::UnboundedSender<Vec<Document>>,
    last: Option<Vec<Document>>,
}

impl SnapshotSender {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<Vec<Document>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, last: None }, rx)
    }

    /// 返回 false 表示订阅方已经离开
    pub(crate) fn send(&mut self, snapshot: Vec<Document>) -> bool {
        if self.last.as_ref() == Some(&snapshot) {
            return !self.tx.is_closed();
        }
        self.last = Some(snapshot.clone());
        self.tx.send(snapshot).is_ok()
    }
}
