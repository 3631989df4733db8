use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use neartalk::{
    AppState,
    config::Config,
    geo::{FallbackGeoProvider, GeoProvider, IpGeoProvider},
    router::create_router,
    store::{DocumentStore, MemoryStore, RedisStore},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with CORS disabled");

    // 文档存储：配置了 Redis 就用 Redis，否则用进程内存储
    let store: Arc<dyn DocumentStore> = match &config.redis_url {
        Some(url) => Arc::new(
            RedisStore::connect(url)
                .await
                .expect("Failed to connect to Redis"),
        ),
        None => {
            tracing::warn!("REDIS_URL not set, using in-memory document store");
            Arc::new(MemoryStore::new())
        }
    };

    // 请求没有带坐标时使用 IP 定位
    let ip_geo = IpGeoProvider::new(&config.ip_geo_url, config.geo_timeout())
        .expect("Failed to build geolocation client");
    let geo: Arc<dyn GeoProvider> = Arc::new(FallbackGeoProvider::new(vec![Box::new(ip_geo)]));

    let state = AppState::new(store, config.clone(), geo);
    let router = create_router(state);

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(tower_http::cors::CorsLayer::permissive())
    };

    // 启动服务器
    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}
