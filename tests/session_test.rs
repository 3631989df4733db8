mod common;

use std::time::Duration;

use common::{create_group, stores};
use neartalk::chat::{ChatSession, MessageService, SessionEvent, Viewport};
use neartalk::group::{JoinedGroupsWatcher, MembershipLedger};

const WAIT: Duration = Duration::from_secs(2);

async fn wait_for_messages(session: &mut ChatSession, count: usize) {
    tokio::time::timeout(WAIT, async {
        while session.messages().len() < count {
            session.next_event().await.unwrap();
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn session_sends_and_receives() {
    let (_memory, store) = stores();
    let group_id = create_group(&store, "alice", "Chess").await;
    MembershipLedger::new(store.clone())
        .join_group("bob", &group_id, "Bobby")
        .await
        .unwrap();

    let mut session = ChatSession::open(store.clone(), &group_id, "bob", Duration::from_secs(60))
        .await
        .unwrap();
    assert_eq!(session.nickname(), "Bobby");
    assert_eq!(session.group_id(), group_id);

    session.input("  hi all ").await.unwrap();
    let sent = session.send().await.unwrap();
    assert!(sent.is_some());
    assert_eq!(session.composer().draft(), "");

    MessageService::new(store.clone())
        .send(&group_id, "alice", "Al", "welcome")
        .await
        .unwrap();

    wait_for_messages(&mut session, 2).await;
    let texts: Vec<_> = session.messages().iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["hi all", "welcome"]);
    assert_eq!(session.messages()[0].sender_name, "Bobby");

    session.close().await.unwrap();
    let flag = store
        .get(&format!("groups/{}/typing/bob", group_id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(flag.field("typing").and_then(|v| v.as_bool()), Some(false));
}

#[tokio::test]
async fn search_suppresses_auto_scroll() {
    let (_memory, store) = stores();
    let group_id = create_group(&store, "alice", "Chess").await;
    let mut session = ChatSession::open(store.clone(), &group_id, "alice", Duration::from_secs(60))
        .await
        .unwrap();
    let service = MessageService::new(store.clone());
    service.send(&group_id, "bob", "Bob", "a cat").await.unwrap();
    service.send(&group_id, "bob", "Bob", "a dog").await.unwrap();
    wait_for_messages(&mut session, 2).await;

    let at_bottom = Viewport {
        scroll_top: 900.0,
        client_height: 100.0,
        scroll_height: 1000.0,
    };

    service.send(&group_id, "bob", "Bob", "another cat").await.unwrap();
    let update = tokio::time::timeout(WAIT, async {
        loop {
            if let Some(SessionEvent::Messages(update)) = session.next_event().await {
                if update.has_new_messages() {
                    return update;
                }
            }
        }
    })
    .await
    .unwrap();
    assert!(session.should_scroll(&at_bottom, &update));

    session.set_search_query("CAT");
    assert_eq!(session.search().matches(), &[0, 2]);
    assert_eq!(session.search().label().as_deref(), Some("1/2"));
    assert!(!session.should_scroll(&at_bottom, &update));

    session.search_mut().clear();
    assert!(session.should_scroll(&at_bottom, &update));
    session.close().await.unwrap();
}

#[tokio::test]
async fn session_sees_other_typers_only() {
    let (_memory, store) = stores();
    let group_id = create_group(&store, "alice", "Chess").await;
    let idle = Duration::from_secs(60);
    let mut alice = ChatSession::open(store.clone(), &group_id, "alice", idle).await.unwrap();
    let mut bob = ChatSession::open(store.clone(), &group_id, "bob", idle).await.unwrap();

    alice.input("typing...").await.unwrap();
    bob.input("me too").await.unwrap();

    let typing = tokio::time::timeout(WAIT, async {
        loop {
            if let Some(SessionEvent::Typing(typing)) = alice.next_event().await {
                if !typing.is_empty() {
                    return typing;
                }
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(typing.len(), 1);
    assert_eq!(typing[0].id, "bob");
    assert_eq!(typing[0].nickname, "Anonymous");

    alice.close().await.unwrap();
    bob.close().await.unwrap();
}

#[tokio::test]
async fn watcher_tracks_joins_leaves_and_group_updates() {
    let (_memory, store) = stores();
    let group_id = create_group(&store, "alice", "Chess").await;
    let ledger = MembershipLedger::new(store.clone());
    let mut watcher = JoinedGroupsWatcher::start(store.clone(), "bob").await.unwrap();

    ledger.join_group("bob", &group_id, "Bob").await.unwrap();
    tokio::time::timeout(WAIT, async {
        while watcher.state().summaries().is_empty() {
            watcher.next().await.unwrap();
        }
    })
    .await
    .unwrap();
    assert_eq!(watcher.state().summaries()[0].member_count, 2);

    MessageService::new(store.clone())
        .send(&group_id, "alice", "Al", "news")
        .await
        .unwrap();
    tokio::time::timeout(WAIT, async {
        while watcher.state().summaries()[0].last_message != "news" {
            watcher.next().await.unwrap();
        }
    })
    .await
    .unwrap();

    ledger.leave_group("bob", &group_id).await.unwrap();
    tokio::time::timeout(WAIT, async {
        while !watcher.state().group_ids().is_empty() {
            watcher.next().await.unwrap();
        }
    })
    .await
    .unwrap();
    assert!(watcher.state().summaries().is_empty());
}

#[tokio::test]
async fn watcher_counts_unread_backlog_and_new_messages() {
    let (_memory, store) = stores();
    let group_id = create_group(&store, "alice", "Chess").await;
    MembershipLedger::new(store.clone())
        .join_group("bob", &group_id, "Bob")
        .await
        .unwrap();
    let service = MessageService::new(store.clone());
    for text in ["one", "two", "three"] {
        service.send(&group_id, "alice", "Al", text).await.unwrap();
    }

    let mut watcher = JoinedGroupsWatcher::start(store.clone(), "bob").await.unwrap();
    let unread = |watcher: &JoinedGroupsWatcher| {
        watcher.state().summaries().first().map(|summary| summary.unread)
    };
    tokio::time::timeout(WAIT, async {
        while unread(&watcher) != Some(3) {
            watcher.next().await.unwrap();
        }
    })
    .await
    .unwrap();

    service.send(&group_id, "alice", "Al", "four").await.unwrap();
    tokio::time::timeout(WAIT, async {
        while unread(&watcher) != Some(4) {
            watcher.next().await.unwrap();
        }
    })
    .await
    .unwrap();
}
