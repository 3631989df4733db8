use serde::{Deserialize, Serialize};

use crate::geo::lenient_coordinate;

/// 群组名称最大长度
pub const MAX_GROUP_NAME_LEN: usize = 60;

/// 群组文档
///
/// `member_count` 是冗余计数，只通过原子增减维护，不重新统计。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    #[serde(default, skip_serializing)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// 头像地址
    #[serde(default, rename = "avatar")]
    pub avatar_ref: String,
    /// 坐标非法时为 None
    #[serde(default, deserialize_with = "lenient_coordinate")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_coordinate")]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub member_count: i64,
    /// 最后一条消息摘要
    #[serde(default)]
    pub last_message: String,
    #[serde(default)]
    pub updated_at: Option<i64>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub created_by: String,
}

impl Group {
    /// 坐标齐全时返回 (纬度, 经度)
    pub fn coordinate(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "Unnamed Group"
        } else {
            &self.name
        }
    }
}
