use std::env;
use std::time::Duration;

/// 发现列表默认半径（公里）
pub const DEFAULT_DISCOVERY_RADIUS_KM: f64 = 5.0;
/// 输入状态空闲超时（毫秒）
pub const DEFAULT_TYPING_IDLE_MS: u64 = 2000;
/// 默认 IP 定位服务
pub const DEFAULT_IP_GEO_URL: &str = "https://ipapi.co/json/";

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    /// 未配置时使用进程内存储
    pub redis_url: Option<String>,
    pub jwt_secret: String,
    pub discovery_radius_km: f64,
    pub typing_idle_ms: u64,
    pub ip_geo_url: String,
    pub geo_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        Ok(Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            redis_url: env::var("REDIS_URL").ok().filter(|url| !url.trim().is_empty()),
            jwt_secret: env::var("JWT_SECRET")?,
            discovery_radius_km: env::var("DISCOVERY_RADIUS_KM")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_DISCOVERY_RADIUS_KM),
            typing_idle_ms: env::var("TYPING_IDLE_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_TYPING_IDLE_MS),
            ip_geo_url: env::var("IP_GEO_URL").unwrap_or_else(|_| DEFAULT_IP_GEO_URL.into()),
            geo_timeout_secs: env::var("GEO_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
        })
    }

    pub fn typing_idle(&self) -> Duration {
        Duration::from_millis(self.typing_idle_ms)
    }

    pub fn geo_timeout(&self) -> Duration {
        Duration::from_secs(self.geo_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "127.0.0.1".into(),
            server_port: 3000,
            redis_url: None,
            jwt_secret: String::new(),
            discovery_radius_km: DEFAULT_DISCOVERY_RADIUS_KM,
            typing_idle_ms: DEFAULT_TYPING_IDLE_MS,
            ip_geo_url: DEFAULT_IP_GEO_URL.into(),
            geo_timeout_secs: 5,
        }
    }
}
