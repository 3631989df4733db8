use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::store::StoreError;
use crate::utils::{error_codes, error_to_api_response};

/// 业务错误
///
/// 所有错误都只影响触发它的那次用户操作，不会导致进程退出。
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 输入校验失败，发生在任何网络请求之前
    #[error("{0}")]
    Validation(String),
    /// 创建群组时没有可用位置
    #[error("Location is required. Please retry or allow location access.")]
    LocationRequired,
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("Unauthorized")]
    Unauthorized,
    /// 存储读写失败，由用户决定是否重试
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    fn status_and_code(&self) -> (StatusCode, i32) {
        match self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, error_codes::VALIDATION_ERROR),
            AppError::LocationRequired => {
                (StatusCode::BAD_REQUEST, error_codes::LOCATION_REQUIRED)
            }
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, error_codes::NOT_FOUND),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, error_codes::PERMISSION_DENIED),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, error_codes::AUTH_FAILED),
            AppError::Store(StoreError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, error_codes::NOT_FOUND)
            }
            AppError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, error_codes::INTERNAL_ERROR),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        // 存储错误只给用户通用提示，细节写日志
        let message = match &self {
            AppError::Store(e) => {
                tracing::error!("Store operation failed: {}", e);
                "Something went wrong. Please try again.".to_string()
            }
            other => other.to_string(),
        };
        (status, error_to_api_response::<()>(code, message)).into_response()
    }
}
