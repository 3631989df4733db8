use axum::{
    Extension,
    extract::{Json, Query, State},
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures_util::stream;

use super::model::{StopTypingRequest, TypingEvent, TypingQuery, TypingRequest, TypingUser};
use crate::AppState;
use crate::chat::{TypingFeed, typing_label};
use crate::error::AppError;
use crate::group::MembershipLedger;
use crate::routes::respond;
use crate::utils::Claims;

/// 输入框内容变化
#[axum::debug_handler]
pub async fn update_typing(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<TypingRequest>,
) -> Response {
    let result = async {
        let member = MembershipLedger::new(state.store.clone())
            .require_member(&req.group_id, &claims.sub)
            .await?;
        state
            .typing
            .input(&state.store, &req.group_id, &claims.sub, member.display_name(), &req.text)
            .await?;
        Ok::<_, AppError>(serde_json::json!({ "typing": !req.text.is_empty() }))
    }
    .await;
    respond(StatusCode::OK, result)
}

/// 离开会话
#[axum::debug_handler]
pub async fn stop_typing(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<StopTypingRequest>,
) -> Response {
    let result = state
        .typing
        .stop(&state.store, &req.group_id, &claims.sub)
        .await
        .map(|()| serde_json::json!({ "typing": false }));
    respond(StatusCode::OK, result)
}

/// 其他人的输入状态推送
#[axum::debug_handler]
pub async fn stream_typing(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<TypingQuery>,
) -> Response {
    if let Err(e) = MembershipLedger::new(state.store.clone())
        .require_member(&query.group_id, &claims.sub)
        .await
    {
        return e.into_response();
    }
    let feed = match TypingFeed::subscribe(&state.store, &query.group_id, &claims.sub).await {
        Ok(feed) => feed,
        Err(e) => return e.into_response(),
    };

    let events = stream::unfold(feed, |mut feed| async move {
        let others = feed.next().await?;
        let event = TypingEvent {
            label: typing_label(&others),
            users: others.into_iter().map(TypingUser::from).collect(),
        };
        Some((Event::default().event("typing").json_data(event), feed))
    });

    Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response()
}
