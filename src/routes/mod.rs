pub mod group;
pub mod message;
pub mod typing;

use axum::{http::StatusCode, response::{IntoResponse, Response}};
use serde::Serialize;

use crate::AppState;
use crate::error::AppResult;
use crate::geo::{AccuracyTier, Location};
use crate::utils::success_to_api_response;

/// 请求中带的坐标优先；没有时退回位置提供者（IP 定位）
pub(crate) async fn resolve_location(
    state: &AppState,
    latitude: Option<f64>,
    longitude: Option<f64>,
    accuracy: Option<AccuracyTier>,
) -> Location {
    if latitude.is_some() || longitude.is_some() {
        return Location::from_reported(latitude, longitude, accuracy);
    }
    state.geo.locate().await
}

/// 把业务结果转换为统一响应
pub(crate) fn respond<T: Serialize>(status: StatusCode, result: AppResult<T>) -> Response {
    match result {
        Ok(data) => (status, success_to_api_response(data)).into_response(),
        Err(e) => e.into_response(),
    }
}
