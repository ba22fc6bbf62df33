//! Biometric (`WebAuthn`) login and enrollment endpoints.
//!
//! Enrollment requires an existing session (password login bootstraps it).
//! Login starts from an email, issues per-attempt options, and finishes by
//! verifying the assertion against the state stored for that attempt.

use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;
use webauthn_rs::prelude::*;

use crate::webauthn::{
    deserialize_passkey, serialize_passkey, BiometricAuthenticationError,
    BiometricRegistrationError, BiometricService, CredentialRepo,
};

use super::{
    session::{require_session, session_cookie},
    state::AuthState,
    storage::{insert_session, lookup_user_id_by_email},
    types::{
        BiometricLoginFinishRequest, BiometricLoginStartRequest, BiometricLoginStartResponse,
        BiometricRegisterFinishRequest, BiometricRegisterStartResponse,
    },
    utils::normalize_email,
};

const LOGIN_UNAVAILABLE: &str = "Biometric login is not available for this account";
const ATTEMPT_INVALID: &str = "Attempt is expired or invalid";

/// Serialize ceremony options for the response body. The caller must not
/// answer 200 with empty options, so a failure here becomes a 500.
fn options_json<T: serde::Serialize>(options: &T) -> anyhow::Result<serde_json::Value> {
    serde_json::to_value(options).map_err(anyhow::Error::from)
}

/// Resolve and validate the request `Origin` against the allow-list.
fn request_origin(headers: &HeaderMap, service: &BiometricService) -> Option<String> {
    let origin = headers.get(axum::http::header::ORIGIN)?.to_str().ok()?;
    service.match_origin(origin)
}

#[utoipa::path(
    post,
    path = "/v1/auth/biometric/register/start",
    responses(
        (status = 200, description = "Registration options generated", body = BiometricRegisterStartResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Origin not allowed")
    ),
    tag = "auth"
)]
pub async fn register_start(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    biometric: Extension<Arc<BiometricService>>,
) -> axum::response::Response {
    let record = match require_session(&headers, &pool).await {
        Ok(record) => record,
        Err(status) => return status.into_response(),
    };

    let Some(origin) = request_origin(&headers, &biometric) else {
        return (StatusCode::FORBIDDEN, "Origin not allowed").into_response();
    };

    match biometric
        .register_begin(record.user_id, &record.email, &record.full_name, &origin)
        .await
    {
        Ok((attempt_id, options)) => match options_json(&options) {
            Ok(options) => (
                StatusCode::OK,
                Json(BiometricRegisterStartResponse {
                    attempt_id: attempt_id.to_string(),
                    options,
                }),
            )
                .into_response(),
            Err(err) => {
                error!("Failed to serialize registration options: {err}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        },
        Err(err) => {
            error!("Failed to start biometric registration: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/biometric/register/finish",
    request_body = BiometricRegisterFinishRequest,
    responses(
        (status = 204, description = "Credential registered"),
        (status = 400, description = "Invalid or expired attempt"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Origin not allowed")
    ),
    tag = "auth"
)]
pub async fn register_finish(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    biometric: Extension<Arc<BiometricService>>,
    payload: Option<Json<BiometricRegisterFinishRequest>>,
) -> axum::response::Response {
    let record = match require_session(&headers, &pool).await {
        Ok(record) => record,
        Err(status) => return status.into_response(),
    };

    let Some(origin) = request_origin(&headers, &biometric) else {
        return (StatusCode::FORBIDDEN, "Origin not allowed").into_response();
    };

    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload").into_response();
    };

    let Ok(attempt_id) = Uuid::parse_str(request.attempt_id.trim()) else {
        return (StatusCode::BAD_REQUEST, "Invalid attempt ID").into_response();
    };

    let credential: RegisterPublicKeyCredential = match serde_json::from_value(request.credential) {
        Ok(credential) => credential,
        Err(err) => {
            return (
                StatusCode::BAD_REQUEST,
                format!("Invalid WebAuthn response: {err}"),
            )
                .into_response();
        }
    };

    match biometric
        .register_finish(attempt_id, record.user_id, &origin, credential)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(
            BiometricRegistrationError::NotFound
            | BiometricRegistrationError::Expired
            | BiometricRegistrationError::UserMismatch
            | BiometricRegistrationError::OriginMismatch,
        ) => (StatusCode::BAD_REQUEST, ATTEMPT_INVALID).into_response(),
        Err(BiometricRegistrationError::Webauthn(err)) => {
            error!("Biometric registration rejected: {err}");
            (StatusCode::BAD_REQUEST, "Registration failed").into_response()
        }
        Err(BiometricRegistrationError::Storage(err)) => {
            error!("Failed to finish biometric registration: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/biometric/login/start",
    request_body = BiometricLoginStartRequest,
    responses(
        (status = 200, description = "Authentication options generated", body = BiometricLoginStartResponse),
        (status = 400, description = "Unknown account or no enrolled credentials"),
        (status = 403, description = "Origin not allowed")
    ),
    tag = "auth"
)]
pub async fn login_start(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    biometric: Extension<Arc<BiometricService>>,
    payload: Option<Json<BiometricLoginStartRequest>>,
) -> axum::response::Response {
    let Some(origin) = request_origin(&headers, &biometric) else {
        return (StatusCode::FORBIDDEN, "Origin not allowed").into_response();
    };

    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload").into_response();
    };

    let email = normalize_email(&request.email);

    // Unknown email and "no credentials" share one generic message; the
    // endpoint must not reveal which accounts exist or are enrolled.
    let user_id = match lookup_user_id_by_email(&pool, &email).await {
        Ok(Some(user_id)) => user_id,
        Ok(None) => return (StatusCode::BAD_REQUEST, LOGIN_UNAVAILABLE).into_response(),
        Err(err) => {
            error!("Failed to lookup user for biometric login: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match biometric.auth_begin(user_id, &origin).await {
        Ok((attempt_id, options)) => match options_json(&options) {
            Ok(options) => (
                StatusCode::OK,
                Json(BiometricLoginStartResponse {
                    attempt_id: attempt_id.to_string(),
                    options,
                }),
            )
                .into_response(),
            Err(err) => {
                error!("Failed to serialize authentication options: {err}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        },
        Err(err) => {
            error!("Failed to start biometric login: {err}");
            (StatusCode::BAD_REQUEST, LOGIN_UNAVAILABLE).into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/biometric/login/finish",
    request_body = BiometricLoginFinishRequest,
    responses(
        (status = 204, description = "Login successful, session cookie set"),
        (status = 400, description = "Invalid or expired attempt"),
        (status = 401, description = "Verification failed"),
        (status = 403, description = "Origin not allowed")
    ),
    tag = "auth"
)]
pub async fn login_finish(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    biometric: Extension<Arc<BiometricService>>,
    payload: Option<Json<BiometricLoginFinishRequest>>,
) -> axum::response::Response {
    let Some(origin) = request_origin(&headers, &biometric) else {
        return (StatusCode::FORBIDDEN, "Origin not allowed").into_response();
    };

    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload").into_response();
    };

    let Ok(attempt_id) = Uuid::parse_str(request.attempt_id.trim()) else {
        return (StatusCode::BAD_REQUEST, "Invalid attempt ID").into_response();
    };

    let credential: PublicKeyCredential = match serde_json::from_value(request.credential) {
        Ok(credential) => credential,
        Err(err) => {
            return (
                StatusCode::BAD_REQUEST,
                format!("Invalid WebAuthn response: {err}"),
            )
                .into_response();
        }
    };

    let (user_id, result) = match biometric.auth_finish(attempt_id, &origin, credential).await {
        Ok(verified) => verified,
        Err(
            BiometricAuthenticationError::NotFound
            | BiometricAuthenticationError::Expired
            | BiometricAuthenticationError::OriginMismatch,
        ) => return (StatusCode::BAD_REQUEST, ATTEMPT_INVALID).into_response(),
        Err(BiometricAuthenticationError::Webauthn(err)) => {
            error!("Biometric login rejected: {err}");
            return (StatusCode::UNAUTHORIZED, "Verification failed").into_response();
        }
        Err(BiometricAuthenticationError::Storage(err)) => {
            error!("Failed to finish biometric login: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if let Err(err) = persist_counter_update(&pool, &result).await {
        error!("Failed to persist credential usage: {err}");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let token = match insert_session(&pool, user_id, auth_state.config().session_ttl_seconds())
        .await
    {
        Ok(token) => token,
        Err(err) => {
            error!("Failed to create session after biometric login: {err}");
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

/// Apply the verifier's counter/backup-state update to the stored passkey.
async fn persist_counter_update(pool: &PgPool, result: &AuthenticationResult) -> anyhow::Result<()> {
    let credential_id = result.cred_id().as_slice();
    let Some(row) = CredentialRepo::get(pool, credential_id).await? else {
        return Err(anyhow::anyhow!("verified credential missing from store"));
    };

    let mut passkey = deserialize_passkey(&row.passkey_data)?;
    if passkey.update_credential(result) == Some(true) {
        let passkey_data = serialize_passkey(&passkey)?;
        CredentialRepo::update_usage(pool, credential_id, &passkey_data).await?;
    } else {
        CredentialRepo::touch(pool, credential_id).await?;
    }
    Ok(())
}
