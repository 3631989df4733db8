#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use neartalk::geo::{Coordinate, Location};
use neartalk::group::{MembershipLedger, NewGroup};
use neartalk::store::{DocumentStore, MemoryStore};

/// 人民广场附近
pub const HOME: (f64, f64) = (31.2304, 121.4737);

/// 纬度每度约 111.195 公里
pub const KM_PER_DEGREE: f64 = 111.194_93;

pub fn home() -> Location {
    Location::Precise(Coordinate::new(HOME.0, HOME.1))
}

/// 正北方向 km 公里处
pub fn north_of_home(km: f64) -> Location {
    Location::Precise(Coordinate::new(HOME.0 + km / KM_PER_DEGREE, HOME.1))
}

pub fn stores() -> (MemoryStore, Arc<dyn DocumentStore>) {
    let memory = MemoryStore::new();
    let store: Arc<dyn DocumentStore> = Arc::new(memory.clone());
    (memory, store)
}

pub async fn create_group(store: &Arc<dyn DocumentStore>, user: &str, name: &str) -> String {
    create_group_at(store, user, name, home()).await
}

pub async fn create_group_at(
    store: &Arc<dyn DocumentStore>,
    user: &str,
    name: &str,
    location: Location,
) -> String {
    MembershipLedger::new(store.clone())
        .create_group(
            user,
            NewGroup {
                name,
                nickname: "Creator",
                avatar_style: None,
                location,
            },
        )
        .await
        .expect("group should be created")
        .id
}

pub async fn member_count(store: &Arc<dyn DocumentStore>, group_id: &str) -> i64 {
    store
        .get(&format!("groups/{}", group_id))
        .await
        .unwrap()
        .and_then(|doc| doc.field("memberCount").and_then(|v| v.as_i64()))
        .unwrap_or(-1)
}

/// 反复等待直到条件满足，最多两秒
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}
