use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};

use crate::AppState;
use crate::error::AppError;
use crate::utils::verify_token;

/// 浏览器的 EventSource 不能带请求头，推送接口允许用查询参数传令牌
fn token_from_query(query: Option<&str>) -> Option<String> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "token")
        .map(|(_, value)| value.to_string())
        .filter(|token| !token.is_empty())
}

/// 校验身份令牌，把声明放进请求扩展
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_string())
        .or_else(|| token_from_query(req.uri().query()));

    let Some(token) = token else {
        tracing::debug!("Missing token for {}", req.uri().path());
        return AppError::Unauthorized.into_response();
    };

    match verify_token(&token, &state.config) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(e) => {
            tracing::debug!("Rejected token for {}: {}", req.uri().path(), e);
            AppError::Unauthorized.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_token_is_extracted() {
        assert_eq!(
            token_from_query(Some("group_id=g1&token=abc.def.ghi")).as_deref(),
            Some("abc.def.ghi")
        );
        assert_eq!(token_from_query(Some("group_id=g1&token=")), None);
        assert_eq!(token_from_query(None), None);
    }
}
