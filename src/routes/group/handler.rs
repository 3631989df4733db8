use axum::{
    Extension,
    extract::{Json, Query, State},
    http::StatusCode,
    response::Response,
};

use super::model::{
    AvatarQuery, CreateGroupRequest, DiscoverItem, DiscoverQuery, DiscoverResponse, FilterQuery,
    GroupIdRequest, GroupInfo, JoinGroupRequest, JoinGroupResponse, LeaveGroupResponse,
    OpenGroupResponse, SearchItem, SearchQuery, SearchResponse,
};
use crate::AppState;
use crate::chat::UnreadTracker;
use crate::group::{GlobalSearch, GroupDirectory, JoinedGroups, MembershipLedger, NewGroup};
use crate::routes::{resolve_location, respond};
use crate::error::AppError;
use crate::utils::{Claims, avatar};

#[axum::debug_handler]
pub async fn create_group(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateGroupRequest>,
) -> Response {
    let location = resolve_location(&state, req.latitude, req.longitude, req.accuracy).await;
    let ledger = MembershipLedger::new(state.store.clone());
    let result = ledger
        .create_group(
            &claims.sub,
            NewGroup {
                name: &req.name,
                nickname: &req.nickname,
                avatar_style: req.avatar_style.as_deref(),
                location,
            },
        )
        .await
        .map(GroupInfo::from);
    respond(StatusCode::CREATED, result)
}

#[axum::debug_handler]
pub async fn join_group(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<JoinGroupRequest>,
) -> Response {
    let ledger = MembershipLedger::new(state.store.clone());
    let result = ledger
        .join_group(&claims.sub, &req.group_id, &req.nickname)
        .await
        .map(JoinGroupResponse::from);
    respond(StatusCode::OK, result)
}

#[axum::debug_handler]
pub async fn leave_group(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<GroupIdRequest>,
) -> Response {
    let ledger = MembershipLedger::new(state.store.clone());
    let result = ledger
        .leave_group(&claims.sub, &req.group_id)
        .await
        .map(LeaveGroupResponse::from);
    respond(StatusCode::OK, result)
}

#[axum::debug_handler]
pub async fn discover_groups(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<DiscoverQuery>,
) -> Response {
    let location = resolve_location(&state, query.latitude, query.longitude, query.accuracy).await;
    let directory = GroupDirectory::new(state.store.clone(), state.config.discovery_radius_km);
    let result = directory
        .load(&claims.sub, &location)
        .await
        .map(|view| DiscoverResponse {
            accuracy: view.location().accuracy(),
            degraded: view.is_degraded(),
            groups: view
                .visible(query.show_all, &query.q)
                .into_iter()
                .map(DiscoverItem::from)
                .collect(),
        });
    respond(StatusCode::OK, result)
}

#[axum::debug_handler]
pub async fn search_groups(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<SearchQuery>,
) -> Response {
    let location = resolve_location(&state, query.latitude, query.longitude, query.accuracy).await;
    let result = GlobalSearch::load(&state.store, &claims.sub, &location)
        .await
        .map(|mut search| {
            search.set_query(&query.q);
            search.set_radius(query.radius_km);
            let sections = search.sections();
            SearchResponse {
                joined: sections.joined.into_iter().map(SearchItem::from).collect(),
                not_joined: sections.not_joined.into_iter().map(SearchItem::from).collect(),
            }
        });
    respond(StatusCode::OK, result)
}

#[axum::debug_handler]
pub async fn joined_groups(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<FilterQuery>,
) -> Response {
    let result = async {
        let mut joined = JoinedGroups::load(&state.store, &claims.sub).await?;
        let mut tracker = UnreadTracker::new(state.store.clone(), &claims.sub);
        tracker.refresh(&joined).await?;
        tracker.apply_to(&mut joined);
        Ok::<_, AppError>(joined.filter(&query.q))
    }
    .await;
    respond(StatusCode::OK, result)
}

/// 打开群组：角标立即清零，lastSeen 在后台推进
#[axum::debug_handler]
pub async fn open_group(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<GroupIdRequest>,
) -> Response {
    let mut tracker = UnreadTracker::new(state.store.clone(), &claims.sub);
    // 不等待写入完成
    drop(tracker.open_group(&req.group_id));
    respond(
        StatusCode::OK,
        Ok(OpenGroupResponse {
            unread: tracker.badge(&req.group_id),
            group_id: req.group_id,
        }),
    )
}

#[axum::debug_handler]
pub async fn avatar_options(Query(query): Query<AvatarQuery>) -> Response {
    respond(StatusCode::OK, Ok(avatar::avatar_options(&query.name)))
}
