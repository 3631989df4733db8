// 全局群组搜索
// 一次载入全部群组，之后的查询都在本地完成

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use futures_util::future::try_join;
use serde::Serialize;

use crate::error::AppResult;
use crate::geo::{Location, ProximityPolicy, within_radius};
use crate::models::{Group, paths};
use crate::store::DocumentStore;

/// 空查询时显示的群组数量
pub const DEFAULT_RESULT_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub id: String,
    pub name: String,
    pub avatar: String,
    pub member_count: i64,
    /// 未取整，坐标非法或位置不可用时为空
    pub distance_km: Option<f64>,
    pub is_joined: bool,
}

/// 搜索结果按是否已加入分组
#[derive(Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSections<'a> {
    pub joined: Vec<&'a SearchHit>,
    pub not_joined: Vec<&'a SearchHit>,
}

/// 全局搜索状态
#[derive(Debug, Clone)]
pub struct GlobalSearch {
    hits: Vec<SearchHit>,
    query: String,
    radius_km: Option<f64>,
    cursor: usize,
}

impl GlobalSearch {
    /// 并行读取群组和已加入索引
    pub async fn load(
        store: &Arc<dyn DocumentStore>,
        user_id: &str,
        location: &Location,
    ) -> AppResult<Self> {
        let groups_path = paths::groups();
        let joined_path = paths::joined_groups(user_id);
        let (groups, joined) = try_join(
            store.list(&groups_path, None),
            store.list(&joined_path, None),
        )
        .await?;
        let joined: HashSet<String> = joined.into_iter().map(|doc| doc.id).collect();

        let hits = groups
            .iter()
            .filter_map(|doc| match doc.decode::<Group>() {
                Ok(group) => Some(group),
                Err(e) => {
                    tracing::warn!("Skipping malformed group {}: {}", doc.id, e);
                    None
                }
            })
            .map(|group| SearchHit {
                distance_km: group
                    .coordinate()
                    .and_then(|(lat, lon)| location.distance_to(lat, lon)),
                is_joined: joined.contains(&group.id),
                name: group.display_name().to_string(),
                id: group.id,
                avatar: group.avatar_ref,
                member_count: group.member_count,
            })
            .collect();

        Ok(Self::from_hits(hits))
    }

    pub fn from_hits(hits: Vec<SearchHit>) -> Self {
        Self {
            hits,
            query: String::new(),
            radius_km: None,
            cursor: 0,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// 修改查询，光标回到第一项
    pub fn set_query(&mut self, query: &str) {
        self.query = query.to_string();
        self.cursor = 0;
    }

    /// 设置附近半径；距离未知的群组会被排除
    pub fn set_radius(&mut self, radius_km: Option<f64>) {
        self.radius_km = radius_km;
        self.cursor = 0;
    }

    /// 当前结果
    ///
    /// 空查询返回前20个群组；否则名称包含查询的群组，前缀匹配优先，再按距离。
    pub fn results(&self) -> Vec<&SearchHit> {
        let hits = self.hits.iter().filter(|hit| match self.radius_km {
            Some(radius) => within_radius(hit.distance_km, radius, ProximityPolicy::Strict),
            None => true,
        });

        let query = self.query.trim().to_lowercase();
        if query.is_empty() {
            return hits.take(DEFAULT_RESULT_LIMIT).collect();
        }

        let mut matched: Vec<(bool, &SearchHit)> = hits
            .filter_map(|hit| {
                let name = hit.name.to_lowercase();
                name.contains(&query)
                    .then(|| (name.starts_with(&query), hit))
            })
            .collect();
        matched.sort_by(|(a_prefix, a), (b_prefix, b)| {
            b_prefix
                .cmp(a_prefix)
                .then_with(|| compare_distance(a.distance_km, b.distance_km))
        });
        matched.into_iter().map(|(_, hit)| hit).collect()
    }

    pub fn sections(&self) -> SearchSections<'_> {
        let (joined, not_joined) = self.results().into_iter().partition(|hit| hit.is_joined);
        SearchSections { joined, not_joined }
    }

    /// 键盘向下，停在最后一项
    pub fn move_down(&mut self) {
        let len = self.results().len();
        if len > 0 {
            self.cursor = (self.cursor + 1).min(len - 1);
        }
    }

    /// 键盘向上，停在第一项
    pub fn move_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// 光标所在的结果
    pub fn active(&self) -> Option<&SearchHit> {
        self.results().get(self.cursor).copied()
    }
}

fn compare_distance(a: Option<f64>, b: Option<f64>) -> Ordering {
    a.unwrap_or(f64::INFINITY)
        .total_cmp(&b.unwrap_or(f64::INFINITY))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(name: &str, distance: Option<f64>, joined: bool) -> SearchHit {
        SearchHit {
            id: name.to_lowercase().replace(' ', "-"),
            name: name.to_string(),
            avatar: String::new(),
            member_count: 0,
            distance_km: distance,
            is_joined: joined,
        }
    }

    fn names(results: Vec<&SearchHit>) -> Vec<&str> {
        results.into_iter().map(|hit| hit.name.as_str()).collect()
    }

    #[test]
    fn empty_query_returns_first_groups() {
        let hits = (0..25).map(|i| hit(&format!("G{}", i), None, false)).collect();
        let search = GlobalSearch::from_hits(hits);
        assert_eq!(search.results().len(), DEFAULT_RESULT_LIMIT);
    }

    #[test]
    fn prefix_matches_rank_before_distance() {
        let mut search = GlobalSearch::from_hits(vec![
            hit("Late Night Cafe", Some(0.2), false),
            hit("Cafe Corner", Some(3.0), false),
            hit("Cafe Unknown", None, false),
            hit("Bakery", Some(0.1), false),
        ]);
        search.set_query("CAFE");
        assert_eq!(
            names(search.results()),
            vec!["Cafe Corner", "Cafe Unknown", "Late Night Cafe"]
        );
    }

    #[test]
    fn strict_radius_excludes_unknown_distances() {
        let mut search = GlobalSearch::from_hits(vec![
            hit("Near", Some(4.9), false),
            hit("Edge", Some(5.05), false),
            hit("Unknown", None, false),
        ]);
        search.set_radius(Some(5.0));
        assert_eq!(names(search.results()), vec!["Near"]);
        search.set_radius(None);
        assert_eq!(search.results().len(), 3);
    }

    #[test]
    fn cursor_is_clamped_and_reset() {
        let mut search = GlobalSearch::from_hits(vec![
            hit("A1", Some(1.0), false),
            hit("A2", Some(2.0), false),
        ]);
        search.set_query("a");
        search.move_up();
        assert_eq!(search.cursor(), 0);
        search.move_down();
        search.move_down();
        search.move_down();
        assert_eq!(search.cursor(), 1);
        assert_eq!(search.active().map(|h| h.name.as_str()), Some("A2"));

        search.set_query("a1");
        assert_eq!(search.cursor(), 0);
        assert_eq!(search.active().map(|h| h.name.as_str()), Some("A1"));
    }

    #[test]
    fn results_split_by_membership() {
        let mut search = GlobalSearch::from_hits(vec![
            hit("Park Joggers", Some(1.0), true),
            hit("Park Chess", Some(0.5), false),
        ]);
        search.set_query("park");
        let sections = search.sections();
        assert_eq!(names(sections.joined), vec!["Park Joggers"]);
        assert_eq!(names(sections.not_joined), vec!["Park Chess"]);
    }
}
