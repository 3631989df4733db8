use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::{AccuracyTier, round_km};
use crate::group::{DirectoryEntry, JoinOutcome, LeaveOutcome, SearchHit};
use crate::models::{Group, timestamp_to_datetime};

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    pub nickname: String,
    pub avatar_style: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy: Option<AccuracyTier>,
}

#[derive(Debug, Deserialize)]
pub struct JoinGroupRequest {
    pub group_id: String,
    pub nickname: String,
}

#[derive(Debug, Deserialize)]
pub struct GroupIdRequest {
    pub group_id: String,
}

#[derive(Debug, Deserialize)]
pub struct DiscoverQuery {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy: Option<AccuracyTier>,
    #[serde(default)]
    pub show_all: bool,
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy: Option<AccuracyTier>,
    #[serde(default)]
    pub q: String,
    /// 只搜索附近的群组，距离未知的不返回
    pub radius_km: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct FilterQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct AvatarQuery {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct GroupInfo {
    pub group_id: String,
    pub name: String,
    pub avatar: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub member_count: i64,
    pub last_message: String,
    pub created_by: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<Group> for GroupInfo {
    fn from(group: Group) -> Self {
        Self {
            name: group.display_name().to_string(),
            group_id: group.id,
            avatar: group.avatar_ref,
            latitude: group.latitude,
            longitude: group.longitude,
            member_count: group.member_count,
            last_message: group.last_message,
            created_by: group.created_by,
            created_at: timestamp_to_datetime(group.created_at),
            updated_at: timestamp_to_datetime(group.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JoinGroupResponse {
    pub group: GroupInfo,
    pub nickname: String,
    pub newly_joined: bool,
}

impl From<JoinOutcome> for JoinGroupResponse {
    fn from(outcome: JoinOutcome) -> Self {
        Self {
            group: GroupInfo::from(outcome.group),
            nickname: outcome.nickname,
            newly_joined: outcome.newly_joined,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LeaveGroupResponse {
    pub was_member: bool,
    pub decremented: bool,
}

impl From<LeaveOutcome> for LeaveGroupResponse {
    fn from(outcome: LeaveOutcome) -> Self {
        Self {
            was_member: outcome.was_member,
            decremented: outcome.decremented,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DiscoverItem {
    pub group_id: String,
    pub name: String,
    pub avatar: String,
    pub member_count: i64,
    pub last_message: String,
    /// 保留一位小数
    pub distance_km: Option<f64>,
    pub is_joined: bool,
}

impl From<&DirectoryEntry> for DiscoverItem {
    fn from(entry: &DirectoryEntry) -> Self {
        Self {
            group_id: entry.id.clone(),
            name: entry.name.clone(),
            avatar: entry.avatar.clone(),
            member_count: entry.member_count,
            last_message: entry.last_message.clone(),
            distance_km: entry.display_distance_km(),
            is_joined: entry.is_joined,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DiscoverResponse {
    pub accuracy: AccuracyTier,
    /// 位置不可用时列表显示全部群组
    pub degraded: bool,
    pub groups: Vec<DiscoverItem>,
}

#[derive(Debug, Serialize)]
pub struct SearchItem {
    pub group_id: String,
    pub name: String,
    pub avatar: String,
    pub member_count: i64,
    pub distance_km: Option<f64>,
}

impl From<&SearchHit> for SearchItem {
    fn from(hit: &SearchHit) -> Self {
        Self {
            group_id: hit.id.clone(),
            name: hit.name.clone(),
            avatar: hit.avatar.clone(),
            member_count: hit.member_count,
            distance_km: hit.distance_km.map(round_km),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub joined: Vec<SearchItem>,
    pub not_joined: Vec<SearchItem>,
}

#[derive(Debug, Serialize)]
pub struct OpenGroupResponse {
    pub group_id: String,
    pub unread: usize,
}
