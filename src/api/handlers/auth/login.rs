//! Password login endpoint.

use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::{
    session::session_cookie,
    state::AuthState,
    storage::{insert_session, lookup_login_record},
    types::LoginRequest,
    utils::{normalize_email, verify_password},
};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 204, description = "Login successful, session cookie set"),
        (status = 400, description = "Missing payload"),
        (status = 401, description = "Invalid email or password")
    ),
    tag = "auth"
)]
pub async fn login(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> axum::response::Response {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload").into_response();
    };

    let email = normalize_email(&request.email);

    // Unknown user and wrong password produce the same response, so the
    // endpoint is not an account-probing oracle.
    let record = match lookup_login_record(&pool, &email).await {
        Ok(Some(record)) => record,
        Ok(None) => return (StatusCode::UNAUTHORIZED, INVALID_CREDENTIALS).into_response(),
        Err(err) => {
            error!("Failed to lookup login record: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if !verify_password(&request.password, &record.password_hash) {
        return (StatusCode::UNAUTHORIZED, INVALID_CREDENTIALS).into_response();
    }

    let token = match insert_session(
        &pool,
        record.user_id,
        auth_state.config().session_ttl_seconds(),
    )
    .await
    {
        Ok(token) => token,
        Err(err) => {
            error!("Failed to create session: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let mut response_headers = HeaderMap::new();
    match session_cookie(&auth_state, &token) {
        Ok(cookie) => {
            response_headers.insert(SET_COOKIE, cookie);
            (StatusCode::NO_CONTENT, response_headers).into_response()
        }
        Err(err) => {
            error!("Failed to set session cookie: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
