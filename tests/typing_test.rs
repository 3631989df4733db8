mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{create_group, eventually, stores};
use neartalk::chat::{TypingFeed, TypingPublisher, TypingRegistry, typing_label};
use neartalk::store::DocumentStore;

const IDLE: Duration = Duration::from_millis(50);

async fn flag(store: &Arc<dyn DocumentStore>, group_id: &str, user_id: &str) -> Option<bool> {
    store
        .get(&format!("groups/{}/typing/{}", group_id, user_id))
        .await
        .unwrap()
        .and_then(|doc| doc.field("typing").and_then(|v| v.as_bool()))
}

#[tokio::test]
async fn idle_timer_clears_flag() {
    let (_memory, store) = stores();
    let group_id = create_group(&store, "alice", "Chess").await;
    let mut publisher = TypingPublisher::new(store.clone(), &group_id, "alice", "Al", IDLE);

    publisher.on_input("h").await.unwrap();
    assert_eq!(flag(&store, &group_id, "alice").await, Some(true));
    assert!(publisher.has_pending_timer());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(flag(&store, &group_id, "alice").await, Some(false));
    assert!(!publisher.has_pending_timer());
}

#[tokio::test]
async fn each_keystroke_restarts_the_timer() {
    let (_memory, store) = stores();
    let group_id = create_group(&store, "alice", "Chess").await;
    let idle = Duration::from_millis(300);
    let mut publisher = TypingPublisher::new(store.clone(), &group_id, "alice", "Al", idle);

    for text in ["h", "he", "hel", "hell"] {
        publisher.on_input(text).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(flag(&store, &group_id, "alice").await, Some(true));

    eventually(|| {
        let store = store.clone();
        let group_id = group_id.clone();
        async move { flag(&store, &group_id, "alice").await == Some(false) }
    })
    .await;
}

#[tokio::test]
async fn clearing_input_publishes_false_immediately() {
    let (_memory, store) = stores();
    let group_id = create_group(&store, "alice", "Chess").await;
    let mut publisher =
        TypingPublisher::new(store.clone(), &group_id, "alice", "Al", Duration::from_secs(60));

    publisher.on_input("hi").await.unwrap();
    publisher.on_input("").await.unwrap();

    assert_eq!(flag(&store, &group_id, "alice").await, Some(false));
    assert!(!publisher.has_pending_timer());
}

#[tokio::test]
async fn close_and_drop_both_clear_flag() {
    let (_memory, store) = stores();
    let group_id = create_group(&store, "alice", "Chess").await;
    let long = Duration::from_secs(60);

    let mut closed = TypingPublisher::new(store.clone(), &group_id, "alice", "Al", long);
    closed.on_input("hi").await.unwrap();
    closed.close().await.unwrap();
    assert_eq!(flag(&store, &group_id, "alice").await, Some(false));

    let mut dropped = TypingPublisher::new(store.clone(), &group_id, "bob", "Bob", long);
    dropped.on_input("hi").await.unwrap();
    drop(dropped);
    eventually(|| {
        let store = store.clone();
        let group_id = group_id.clone();
        async move { flag(&store, &group_id, "bob").await == Some(false) }
    })
    .await;
}

#[tokio::test]
async fn feed_hides_own_flag() {
    let (_memory, store) = stores();
    let group_id = create_group(&store, "alice", "Chess").await;
    let long = Duration::from_secs(60);
    let mut feed = TypingFeed::subscribe(&store, &group_id, "alice").await.unwrap();

    let mut mine = TypingPublisher::new(store.clone(), &group_id, "alice", "Al", long);
    let mut theirs = TypingPublisher::new(store.clone(), &group_id, "bob", "Bob", long);
    mine.on_input("a").await.unwrap();
    theirs.on_input("b").await.unwrap();

    let others = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let others = feed.next().await.unwrap();
            if !others.is_empty() {
                return others;
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(others.len(), 1);
    assert_eq!(others[0].id, "bob");
    assert_eq!(typing_label(&others).as_deref(), Some("Bob is typing…"));

    mine.close().await.unwrap();
    theirs.close().await.unwrap();
}

#[tokio::test]
async fn registry_reuses_publisher_per_user_and_group() {
    let (_memory, store) = stores();
    let group_id = create_group(&store, "alice", "Chess").await;
    let registry = TypingRegistry::new(Duration::from_secs(60));

    registry
        .input(&store, &group_id, "alice", "Al", "h")
        .await
        .unwrap();
    assert_eq!(flag(&store, &group_id, "alice").await, Some(true));

    registry.stop(&store, &group_id, "alice").await.unwrap();
    assert_eq!(flag(&store, &group_id, "alice").await, Some(false));

    // 从未输入过的用户不会留下标志
    registry.stop(&store, &group_id, "carol").await.unwrap();
    assert_eq!(flag(&store, &group_id, "carol").await, None);
}

#[tokio::test]
async fn slow_write_for_one_user_does_not_block_another() {
    let (memory, store) = stores();
    let slow = create_group(&store, "alice", "Slow").await;
    let fast = create_group(&store, "bob", "Fast").await;
    memory.slow_writes(&format!("groups/{}/typing", slow), Duration::from_millis(500));
    let registry = TypingRegistry::new(Duration::from_secs(60));

    let pending = {
        let registry = registry.clone();
        let store = store.clone();
        let slow = slow.clone();
        tokio::spawn(async move { registry.input(&store, &slow, "alice", "Al", "h").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    tokio::time::timeout(
        Duration::from_millis(200),
        registry.input(&store, &fast, "bob", "Bob", "h"),
    )
    .await
    .expect("input in another group should not wait")
    .unwrap();
    assert_eq!(flag(&store, &fast, "bob").await, Some(true));

    pending.await.unwrap().unwrap();
    assert_eq!(flag(&store, &slow, "alice").await, Some(true));
}
