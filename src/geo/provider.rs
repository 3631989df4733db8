use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::distance::parse_coordinate;

/// 经纬度坐标
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// 定位精度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccuracyTier {
    Precise,
    IpApproximate,
    Unavailable,
}

/// 用户位置
///
/// 不可用的位置不再用 (0,0) 表示，调用方必须显式处理 `Unavailable`。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "accuracy", rename_all = "snake_case")]
pub enum Location {
    /// GPS 定位
    Precise(Coordinate),
    /// IP 定位，精度较低
    Approximate(Coordinate),
    Unavailable,
}

impl Location {
    /// 把客户端上报的坐标转换为位置
    ///
    /// 纬度恰好为 0 视为“没有位置”，与客户端的降级约定一致。
    pub fn from_reported(
        latitude: Option<f64>,
        longitude: Option<f64>,
        accuracy: Option<AccuracyTier>,
    ) -> Self {
        let (Some(latitude), Some(longitude)) = (latitude, longitude) else {
            return Location::Unavailable;
        };
        let coordinate = Coordinate::new(latitude, longitude);
        if !coordinate.is_valid() || latitude == 0.0 {
            return Location::Unavailable;
        }
        match accuracy.unwrap_or(AccuracyTier::Precise) {
            AccuracyTier::Precise => Location::Precise(coordinate),
            AccuracyTier::IpApproximate => Location::Approximate(coordinate),
            AccuracyTier::Unavailable => Location::Unavailable,
        }
    }

    pub fn coordinate(&self) -> Option<Coordinate> {
        match self {
            Location::Precise(c) | Location::Approximate(c) => Some(*c),
            Location::Unavailable => None,
        }
    }

    pub fn accuracy(&self) -> AccuracyTier {
        match self {
            Location::Precise(_) => AccuracyTier::Precise,
            Location::Approximate(_) => AccuracyTier::IpApproximate,
            Location::Unavailable => AccuracyTier::Unavailable,
        }
    }

    pub fn is_available(&self) -> bool {
        self.coordinate().is_some()
    }

    /// 到某点的距离（公里），位置不可用或坐标非法时为 None
    pub fn distance_to(&self, latitude: f64, longitude: f64) -> Option<f64> {
        let origin = self.coordinate()?;
        super::distance_km(origin.latitude, origin.longitude, latitude, longitude)
    }
}

/// 位置提供者
#[async_trait]
pub trait GeoProvider: Send + Sync {
    async fn locate(&self) -> Location;
}

/// 固定位置，通常来自设备上报的 GPS 坐标
pub struct FixedGeoProvider(pub Location);

#[async_trait]
impl GeoProvider for FixedGeoProvider {
    async fn locate(&self) -> Location {
        self.0
    }
}

/// 基于 IP 的近似定位（ipapi 兼容接口）
pub struct IpGeoProvider {
    client: reqwest::Client,
    url: String,
}

impl IpGeoProvider {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    async fn fetch(&self) -> Result<Value, reqwest::Error> {
        self.client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await
    }
}

/// 解析 IP 定位服务的响应，经纬度缺失或为 0 时视为失败
fn parse_ip_location(body: &Value) -> Option<Coordinate> {
    let latitude = body.get("latitude").and_then(parse_coordinate)?;
    let longitude = body.get("longitude").and_then(parse_coordinate)?;
    if latitude == 0.0 || longitude == 0.0 {
        return None;
    }
    let coordinate = Coordinate::new(latitude, longitude);
    coordinate.is_valid().then_some(coordinate)
}

#[async_trait]
impl GeoProvider for IpGeoProvider {
    async fn locate(&self) -> Location {
        match self.fetch().await {
            Ok(body) => match parse_ip_location(&body) {
                Some(coordinate) => Location::Approximate(coordinate),
                None => {
                    tracing::warn!("IP geolocation returned no usable coordinate");
                    Location::Unavailable
                }
            },
            Err(e) => {
                tracing::warn!("IP geolocation failed: {}", e);
                Location::Unavailable
            }
        }
    }
}

/// 依次尝试多个提供者，全部失败时返回 Unavailable
pub struct FallbackGeoProvider {
    providers: Vec<Box<dyn GeoProvider>>,
}

impl FallbackGeoProvider {
    pub fn new(providers: Vec<Box<dyn GeoProvider>>) -> Self {
        Self { providers }
    }
}

#[async_trait]
impl GeoProvider for FallbackGeoProvider {
    async fn locate(&self) -> Location {
        for provider in &self.providers {
            let location = provider.locate().await;
            if location.is_available() {
                return location;
            }
        }
        tracing::info!("No geo provider produced a location, running degraded");
        Location::Unavailable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reported_zero_latitude_is_unavailable() {
        assert_eq!(
            Location::from_reported(Some(0.0), Some(0.0), None),
            Location::Unavailable
        );
        assert_eq!(Location::from_reported(None, Some(10.0), None), Location::Unavailable);
        assert_eq!(
            Location::from_reported(Some(95.0), Some(10.0), None),
            Location::Unavailable
        );
    }

    #[test]
    fn reported_accuracy_is_kept() {
        let location =
            Location::from_reported(Some(31.2), Some(121.5), Some(AccuracyTier::IpApproximate));
        assert_eq!(location, Location::Approximate(Coordinate::new(31.2, 121.5)));
        assert_eq!(location.accuracy(), AccuracyTier::IpApproximate);
    }

    #[test]
    fn unavailable_location_has_no_distance() {
        assert_eq!(Location::Unavailable.distance_to(31.2, 121.5), None);
    }

    #[test]
    fn ip_response_parsing() {
        assert_eq!(
            parse_ip_location(&json!({"latitude": 31.2, "longitude": "121.5"})),
            Some(Coordinate::new(31.2, 121.5))
        );
        assert_eq!(parse_ip_location(&json!({"latitude": 0, "longitude": 0})), None);
        assert_eq!(parse_ip_location(&json!({"error": true})), None);
    }

    #[tokio::test]
    async fn fallback_uses_first_available_location() {
        let precise = Location::Precise(Coordinate::new(1.0, 2.0));
        let provider = FallbackGeoProvider::new(vec![
            Box::new(FixedGeoProvider(Location::Unavailable)),
            Box::new(FixedGeoProvider(precise)),
        ]);
        assert_eq!(provider.locate().await, precise);

        let empty = FallbackGeoProvider::new(vec![Box::new(FixedGeoProvider(Location::Unavailable))]);
        assert_eq!(empty.locate().await, Location::Unavailable);
    }

    #[test]
    fn location_serializes_as_tagged_variant() {
        let value = serde_json::to_value(Location::Unavailable).unwrap();
        assert_eq!(value, json!({"accuracy": "unavailable"}));
    }
}
