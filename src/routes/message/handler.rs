use axum::{
    Extension,
    extract::{Json, Query, State},
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures_util::StreamExt;

use super::model::{
    DeleteMessageRequest, FeedEvent, GroupQuery, MessageInfo, MessageSearchQuery,
    MessageSearchResponse, SearchMatch, SendMessageRequest, SendMessageResponse,
};
use crate::AppState;
use crate::chat::{ConversationSearch, MessageFeed, MessageService, highlight};
use crate::error::AppError;
use crate::group::MembershipLedger;
use crate::routes::respond;
use crate::utils::Claims;

#[axum::debug_handler]
pub async fn list_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<GroupQuery>,
) -> Response {
    let result = async {
        MembershipLedger::new(state.store.clone())
            .require_member(&query.group_id, &claims.sub)
            .await?;
        let messages = MessageService::new(state.store.clone())
            .list(&query.group_id)
            .await?;
        Ok::<_, AppError>(
            messages
                .iter()
                .map(|m| MessageInfo::new(m, &claims.sub))
                .collect::<Vec<_>>(),
        )
    }
    .await;
    respond(StatusCode::OK, result)
}

#[axum::debug_handler]
pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Response {
    let result = async {
        // 发送者名称是发送时昵称的快照
        let member = MembershipLedger::new(state.store.clone())
            .require_member(&req.group_id, &claims.sub)
            .await?;
        let message_id = MessageService::new(state.store.clone())
            .send(&req.group_id, &claims.sub, member.display_name(), &req.text)
            .await?;
        Ok::<_, AppError>(SendMessageResponse { message_id })
    }
    .await;

    let status = match &result {
        Ok(SendMessageResponse {
            message_id: Some(_),
        }) => StatusCode::CREATED,
        _ => StatusCode::OK,
    };
    respond(status, result)
}

#[axum::debug_handler]
pub async fn delete_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<DeleteMessageRequest>,
) -> Response {
    let result = MessageService::new(state.store.clone())
        .delete(&req.group_id, &req.message_id, &claims.sub)
        .await
        .map(|()| serde_json::json!({ "message_id": req.message_id }));
    respond(StatusCode::OK, result)
}

/// 消息实时推送，每个事件都是完整的有序列表
#[axum::debug_handler]
pub async fn stream_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<GroupQuery>,
) -> Response {
    if let Err(e) = MembershipLedger::new(state.store.clone())
        .require_member(&query.group_id, &claims.sub)
        .await
    {
        return e.into_response();
    }
    let subscription = match MessageService::new(state.store.clone())
        .subscribe(&query.group_id)
        .await
    {
        Ok(subscription) => subscription,
        Err(e) => return e.into_response(),
    };
    tracing::debug!("User {} streaming messages of {}", claims.sub, query.group_id);

    let user_id = claims.sub;
    let mut feed = MessageFeed::new();
    let events = subscription.into_stream().map(move |snapshot| {
        let update = feed.apply(&snapshot);
        let event = FeedEvent {
            messages: feed
                .messages()
                .iter()
                .map(|m| MessageInfo::new(m, &user_id))
                .collect(),
            appended: update.appended,
            removed: update.removed,
            last_sender: update.last_sender,
        };
        Event::default().event("messages").json_data(event)
    });

    Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// 会话内搜索
#[axum::debug_handler]
pub async fn search_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<MessageSearchQuery>,
) -> Response {
    if let Err(e) = MembershipLedger::new(state.store.clone())
        .require_member(&query.group_id, &claims.sub)
        .await
    {
        return e.into_response();
    }
    let messages = match MessageService::new(state.store.clone())
        .list(&query.group_id)
        .await
    {
        Ok(messages) => messages,
        Err(e) => return e.into_response(),
    };

    let mut search = ConversationSearch::new();
    search.set_query(&query.q, &messages);
    search.seek(query.cursor);

    let response = MessageSearchResponse {
        matches: search
            .matches()
            .iter()
            .map(|&index| SearchMatch {
                index,
                message_id: &messages[index].id,
                current: search.is_current(index),
                segments: highlight(&messages[index].text, &query.q),
            })
            .collect(),
        focus: search.focus(),
        label: search.label(),
    };
    respond(StatusCode::OK, Ok(response))
}
