use axum::{
    Router,
    routing::{get, post},
};

use crate::{
    AppState,
    middleware::{auth_middleware, log_errors},
    routes,
};

/// 组装全部路由；除头像候选外都需要身份令牌
pub fn create_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/avatars/options", get(routes::group::avatar_options));

    let protected_routes = Router::new()
        // 群组路由
        .route("/groups/create", post(routes::group::create_group))
        .route("/groups/join", post(routes::group::join_group))
        .route("/groups/leave", post(routes::group::leave_group))
        .route("/groups/discover", get(routes::group::discover_groups))
        .route("/groups/search", get(routes::group::search_groups))
        .route("/groups/joined", get(routes::group::joined_groups))
        .route("/groups/open", post(routes::group::open_group))
        // 消息路由
        .route("/messages/list", get(routes::message::list_messages))
        .route("/messages/send", post(routes::message::send_message))
        .route("/messages/delete", post(routes::message::delete_message))
        .route("/messages/stream", get(routes::message::stream_messages))
        .route("/messages/search", get(routes::message::search_messages))
        // 输入状态路由
        .route("/typing", post(routes::typing::update_typing))
        .route("/typing/stop", post(routes::typing::stop_typing))
        .route("/typing/stream", get(routes::typing::stream_typing))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(axum::middleware::from_fn(log_errors))
        .with_state(state)
}
