use std::cmp::Ordering;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// 地球半径（公里）
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// 距离过滤策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProximityPolicy {
    /// 距离未知时保留（发现列表）
    Lenient,
    /// 距离未知时排除（严格的附近搜索）
    Strict,
}

/// 使用Haversine公式计算两点间距离（公里）
///
/// 任一坐标不是有限数值时返回 None。
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> Option<f64> {
    if ![lat1, lon1, lat2, lon2].iter().all(|v| v.is_finite()) {
        return None;
    }

    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_phi = (lat2 - lat1).to_radians();
    let delta_lambda = (lon2 - lon1).to_radians();

    let a = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    Some(EARTH_RADIUS_KM * c)
}

/// 保留一位小数，仅用于展示
pub fn round_km(distance: f64) -> f64 {
    (distance * 10.0).round() / 10.0
}

/// 解析文档中的坐标字段，只接受数字和数字字符串
pub fn parse_coordinate(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// serde 反序列化辅助：坐标非法时得到 None，而不是默认成 0
pub fn lenient_coordinate<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_coordinate))
}

/// 判断距离是否在半径内
pub fn within_radius(distance: Option<f64>, radius_km: f64, policy: ProximityPolicy) -> bool {
    match distance {
        Some(d) => d <= radius_km,
        None => policy == ProximityPolicy::Lenient,
    }
}

fn by_distance(a: Option<f64>, b: Option<f64>) -> Ordering {
    a.unwrap_or(f64::INFINITY)
        .total_cmp(&b.unwrap_or(f64::INFINITY))
}

/// 按距离升序排序，距离未知的排在最后；排序使用未取整的距离
pub fn rank_by_distance<T, F>(items: &mut [T], distance: F)
where
    F: Fn(&T) -> Option<f64>,
{
    items.sort_by(|a, b| by_distance(distance(a), distance(b)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn same_point_is_zero() {
        for (lat, lon) in [(0.0, 0.0), (31.2304, 121.4737), (-33.86, 151.2), (89.9, -179.9)] {
            assert_eq!(distance_km(lat, lon, lat, lon), Some(0.0));
        }
    }

    #[test]
    fn non_numeric_input_is_invalid() {
        assert_eq!(distance_km(f64::NAN, 0.0, 1.0, 1.0), None);
        assert_eq!(distance_km(0.0, f64::INFINITY, 1.0, 1.0), None);
        assert_eq!(distance_km(0.0, 0.0, 1.0, f64::NEG_INFINITY), None);
    }

    #[test]
    fn known_distance_is_close() {
        // 纬度差约 1.07 公里，经度差约 1.55 公里
        let d = distance_km(31.2304, 121.4737, 31.2400, 121.4900).unwrap();
        assert!((d - 1.9).abs() < 0.3, "unexpected distance {}", d);
    }

    #[test]
    fn coordinates_parse_defensively() {
        assert_eq!(parse_coordinate(&json!(12.5)), Some(12.5));
        assert_eq!(parse_coordinate(&json!(" 12.5 ")), Some(12.5));
        assert_eq!(parse_coordinate(&json!("north")), None);
        assert_eq!(parse_coordinate(&json!(null)), None);
        assert_eq!(parse_coordinate(&json!(true)), None);
    }

    #[test]
    fn radius_policies_differ_on_unknown_distance() {
        assert!(within_radius(None, 5.0, ProximityPolicy::Lenient));
        assert!(!within_radius(None, 5.0, ProximityPolicy::Strict));
        assert!(!within_radius(Some(5.05), 5.0, ProximityPolicy::Lenient));
        assert!(within_radius(Some(5.0), 5.0, ProximityPolicy::Strict));
    }

    #[test]
    fn unknown_distances_rank_last() {
        let mut items = vec![("far", Some(9.0)), ("unknown", None), ("near", Some(0.4))];
        rank_by_distance(&mut items, |item| item.1);
        let names: Vec<_> = items.iter().map(|item| item.0).collect();
        assert_eq!(names, vec!["near", "far", "unknown"]);
    }

    #[test]
    fn rounding_is_one_decimal() {
        assert_eq!(round_km(5.05_f64 + 1e-9), 5.1);
        assert_eq!(round_km(0.04), 0.0);
    }
}
