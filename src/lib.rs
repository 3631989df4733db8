use std::sync::Arc;

use chat::TypingRegistry;
use config::Config;
use geo::GeoProvider;
use store::DocumentStore;

pub mod chat;
pub mod config;
pub mod error;
pub mod geo;
pub mod group;
pub mod middleware;
pub mod models;
pub mod router;
pub mod routes;
pub mod store;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub config: Config,
    pub geo: Arc<dyn GeoProvider>,
    pub typing: TypingRegistry,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, config: Config, geo: Arc<dyn GeoProvider>) -> Self {
        let typing = TypingRegistry::new(config.typing_idle());
        Self {
            store,
            config,
            geo,
            typing,
        }
    }
}
