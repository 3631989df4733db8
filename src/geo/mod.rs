// 地理位置模块
// 包含位置获取（GPS / IP 定位）和距离计算

mod distance;
mod provider;

pub use distance::{
    EARTH_RADIUS_KM, ProximityPolicy, distance_km, lenient_coordinate, parse_coordinate,
    rank_by_distance, round_km, within_radius,
};
pub use provider::{
    AccuracyTier, Coordinate, FallbackGeoProvider, FixedGeoProvider, GeoProvider, IpGeoProvider,
    Location,
};
