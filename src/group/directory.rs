// 群组发现
// 载入全部群组，计算距离，按半径和名称过滤

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::future::try_join;
use serde::Serialize;

use crate::error::AppResult;
use crate::geo::{Location, ProximityPolicy, rank_by_distance, round_km, within_radius};
use crate::models::{Group, paths};
use crate::store::DocumentStore;

/// 发现列表中的一项
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectoryEntry {
    pub id: String,
    pub name: String,
    pub avatar: String,
    pub latitude: f64,
    pub longitude: f64,
    pub member_count: i64,
    pub last_message: String,
    /// 未取整的距离，用于排序和过滤
    #[serde(skip)]
    pub distance_km: Option<f64>,
    pub is_joined: bool,
}

impl DirectoryEntry {
    /// 展示用距离，保留一位小数
    pub fn display_distance_km(&self) -> Option<f64> {
        self.distance_km.map(round_km)
    }
}

/// 一次载入的发现结果
#[derive(Debug, Clone)]
pub struct DirectoryView {
    entries: Vec<DirectoryEntry>,
    location: Location,
    radius_km: f64,
}

impl DirectoryView {
    /// 由已排序前的条目构造，构造时按距离排序
    pub fn new(mut entries: Vec<DirectoryEntry>, location: Location, radius_km: f64) -> Self {
        rank_by_distance(&mut entries, |entry| entry.distance_km);
        Self {
            entries,
            location,
            radius_km,
        }
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    /// 位置不可用时发现列表退化为显示全部
    pub fn is_degraded(&self) -> bool {
        !self.location.is_available()
    }

    pub fn all(&self) -> &[DirectoryEntry] {
        &self.entries
    }

    /// 可见的群组：先按半径过滤（show_all 时跳过），再按名称过滤，保持距离顺序
    pub fn visible(&self, show_all: bool, query: &str) -> Vec<&DirectoryEntry> {
        let query = query.trim().to_lowercase();
        self.entries
            .iter()
            .filter(|entry| {
                show_all
                    || self.is_degraded()
                    || within_radius(entry.distance_km, self.radius_km, ProximityPolicy::Lenient)
            })
            .filter(|entry| query.is_empty() || entry.name.to_lowercase().contains(&query))
            .collect()
    }
}

/// 群组发现
pub struct GroupDirectory {
    store: Arc<dyn DocumentStore>,
    radius_km: f64,
}

impl GroupDirectory {
    pub fn new(store: Arc<dyn DocumentStore>, radius_km: f64) -> Self {
        Self { store, radius_km }
    }

    /// 并行读取全部群组和用户已加入的群组
    pub async fn load(&self, user_id: &str, location: &Location) -> AppResult<DirectoryView> {
        let groups_path = paths::groups();
        let joined_path = paths::joined_groups(user_id);
        let (groups, joined) = try_join(
            self.store.list(&groups_path, None),
            self.store.list(&joined_path, None),
        )
        .await?;

        let joined: HashSet<String> = joined.into_iter().map(|doc| doc.id).collect();

        let mut entries = Vec::with_capacity(groups.len());
        for doc in groups {
            let group: Group = match doc.decode() {
                Ok(group) => group,
                Err(e) => {
                    tracing::warn!("Skipping malformed group {}: {}", doc.id, e);
                    continue;
                }
            };
            // 坐标非法的群组直接排除，不能当作 (0,0)
            let Some((latitude, longitude)) = group.coordinate() else {
                tracing::debug!("Skipping group {} without valid coordinates", group.id);
                continue;
            };
            entries.push(DirectoryEntry {
                distance_km: location.distance_to(latitude, longitude),
                is_joined: joined.contains(&group.id),
                name: group.display_name().to_string(),
                id: group.id,
                avatar: group.avatar_ref,
                latitude,
                longitude,
                member_count: group.member_count,
                last_message: group.last_message,
            });
        }

        tracing::debug!("Loaded {} groups into directory", entries.len());
        Ok(DirectoryView::new(entries, *location, self.radius_km))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinate;

    fn entry(name: &str, distance: Option<f64>) -> DirectoryEntry {
        DirectoryEntry {
            id: name.to_lowercase(),
            name: name.to_string(),
            avatar: String::new(),
            latitude: 1.0,
            longitude: 1.0,
            member_count: 1,
            last_message: String::new(),
            distance_km: distance,
            is_joined: false,
        }
    }

    fn here() -> Location {
        Location::Precise(Coordinate::new(31.2, 121.5))
    }

    #[test]
    fn radius_filter_is_inclusive_and_lenient() {
        let view = DirectoryView::new(
            vec![
                entry("Edge", Some(5.0)),
                entry("Outside", Some(5.05)),
                entry("Unknown", None),
                entry("Near", Some(0.3)),
            ],
            here(),
            5.0,
        );
        let names: Vec<_> = view.visible(false, "").iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Near", "Edge", "Unknown"]);

        let all: Vec<_> = view.visible(true, "").iter().map(|e| e.name.as_str()).collect();
        assert_eq!(all, vec!["Near", "Edge", "Outside", "Unknown"]);
    }

    #[test]
    fn degraded_location_shows_everything() {
        let view = DirectoryView::new(
            vec![entry("A", None), entry("B", None)],
            Location::Unavailable,
            5.0,
        );
        assert!(view.is_degraded());
        assert_eq!(view.visible(false, "").len(), 2);
    }

    #[test]
    fn name_filter_composes_with_radius() {
        let view = DirectoryView::new(
            vec![entry("Coffee Near", Some(1.0)), entry("Coffee Far", Some(50.0))],
            here(),
            5.0,
        );
        let near: Vec<_> = view.visible(false, "COFFEE").iter().map(|e| e.name.as_str()).collect();
        assert_eq!(near, vec!["Coffee Near"]);
        assert_eq!(view.visible(true, "coffee").len(), 2);
    }

    #[test]
    fn display_distance_is_rounded() {
        assert_eq!(entry("A", Some(1.26)).display_distance_km(), Some(1.3));
        assert_eq!(entry("A", None).display_distance_km(), None);
    }
}
