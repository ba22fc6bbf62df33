//! User administration endpoints.
//!
//! Flow Overview:
//! 1) Authenticate the request via session cookie.
//! 2) Enforce role capabilities (`Role::can`) once per request.
//! 3) Perform the read or write, keeping multi-row writes transactional.

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use tracing::{error, Instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use super::auth::{
    hash_password, is_unique_violation, normalize_email,
    policy::{Action, Role},
    session::require_capability,
    valid_email,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct UserSummary {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub mobile: Option<String>,
    pub role: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UserCreateRequest {
    pub email: String,
    pub full_name: String,
    pub mobile: Option<String>,
    pub role: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

const MIN_PASSWORD_LEN: usize = 8;

#[utoipa::path(
    get,
    path = "/v1/users",
    responses(
        (status = 200, description = "List users, newest first", body = [UserSummary]),
        (status = 401, description = "Missing or invalid session cookie"),
        (status = 403, description = "Forbidden")
    ),
    tag = "users"
)]
pub async fn list_users(headers: HeaderMap, pool: Extension<PgPool>) -> impl IntoResponse {
    if let Err(status) = require_capability(&headers, &pool, Action::ListUsers).await {
        return status.into_response();
    }

    match fetch_user_summaries(&pool).await {
        Ok(list) => (StatusCode::OK, Json(list)).into_response(),
        Err(err) => {
            error!("Failed to list users: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/users",
    request_body = UserCreateRequest,
    responses(
        (status = 201, description = "User created", body = UserSummary),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Missing or invalid session cookie"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Email already registered")
    ),
    tag = "users"
)]
pub async fn create_user(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    payload: Option<Json<UserCreateRequest>>,
) -> axum::response::Response {
    if let Err(status) = require_capability(&headers, &pool, Action::CreateUser).await {
        return status.into_response();
    }

    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload").into_response();
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email").into_response();
    }

    let Ok(role) = request.role.parse::<Role>() else {
        return (StatusCode::BAD_REQUEST, "Invalid role").into_response();
    };

    let full_name = request.full_name.trim();
    if full_name.is_empty() {
        return (StatusCode::BAD_REQUEST, "Full name is required").into_response();
    }

    if request.password.len() < MIN_PASSWORD_LEN {
        return (StatusCode::BAD_REQUEST, "Password is too short").into_response();
    }

    let password_hash = match hash_password(&request.password) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash password: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match insert_user(
        &pool,
        &email,
        full_name,
        request.mobile.as_deref(),
        role,
        &password_hash,
    )
    .await
    {
        Ok(Some(summary)) => (StatusCode::CREATED, Json(summary)).into_response(),
        Ok(None) => (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: "Email already registered".to_string(),
            }),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to create user: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    delete,
    path = "/v1/users/{id}",
    params(
        ("id" = String, Path, description = "User id")
    ),
    responses(
        (status = 204, description = "User deleted"),
        (status = 400, description = "Invalid user id"),
        (status = 401, description = "Missing or invalid session cookie"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    tag = "users"
)]
pub async fn delete_user(
    Path(id): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
) -> axum::response::Response {
    if let Err(status) = require_capability(&headers, &pool, Action::DeleteUser).await {
        return status.into_response();
    }

    let Ok(user_id) = Uuid::parse_str(id.trim()) else {
        return (StatusCode::BAD_REQUEST, "Invalid user id").into_response();
    };

    match remove_user(&pool, user_id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "User not found".to_string(),
            }),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to delete user: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn fetch_user_summaries(pool: &PgPool) -> anyhow::Result<Vec<UserSummary>> {
    use anyhow::Context;

    let query = r"
        SELECT id, email, full_name, mobile, role::text AS role, created_at, updated_at
        FROM users
        ORDER BY created_at DESC
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list users")?;

    Ok(rows.into_iter().map(|row| row_to_summary(&row)).collect())
}

fn row_to_summary(row: &sqlx::postgres::PgRow) -> UserSummary {
    let id: Uuid = row.get("id");
    let created_at: chrono::DateTime<chrono::Utc> = row.get("created_at");
    let updated_at: chrono::DateTime<chrono::Utc> = row.get("updated_at");
    UserSummary {
        id: id.to_string(),
        email: row.get("email"),
        full_name: row.get("full_name"),
        mobile: row.get("mobile"),
        role: row.get("role"),
        created_at: created_at.to_rfc3339(),
        updated_at: updated_at.to_rfc3339(),
    }
}

/// Insert the identity row and its password credential in one transaction.
///
/// Returns `None` on a duplicate email.
async fn insert_user(
    pool: &PgPool,
    email: &str,
    full_name: &str,
    mobile: Option<&str>,
    role: Role,
    password_hash: &str,
) -> anyhow::Result<Option<UserSummary>> {
    use anyhow::Context;

    let mut tx = pool.begin().await.context("begin create-user transaction")?;

    let query = r"
        INSERT INTO users (email, full_name, mobile, role, password_hash)
        VALUES ($1, $2, $3, $4::user_role, $5)
        RETURNING id, email, full_name, mobile, role::text AS role, created_at, updated_at
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .bind(full_name)
        .bind(mobile)
        .bind(role.as_str())
        .bind(password_hash)
        .fetch_one(&mut *tx)
        .instrument(span)
        .await;

    let row = match row {
        Ok(row) => row,
        Err(err) => {
            if is_unique_violation(&err) {
                let _ = tx.rollback().await;
                return Ok(None);
            }
            return Err(err).context("failed to insert user");
        }
    };

    tx.commit().await.context("commit create-user transaction")?;
    Ok(Some(row_to_summary(&row)))
}

/// Delete a user and their auth artifacts in one transaction.
///
/// Voucher history references are intentionally left intact.
async fn remove_user(pool: &PgPool, user_id: Uuid) -> anyhow::Result<bool> {
    use anyhow::Context;

    let mut tx = pool.begin().await.context("begin delete-user transaction")?;

    for query in [
        "DELETE FROM user_sessions WHERE user_id = $1",
        "DELETE FROM biometric_credentials WHERE user_id = $1",
        "DELETE FROM webauthn_attempts WHERE user_id = $1",
    ] {
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(user_id)
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context("failed to delete user auth artifacts")?;
    }

    let query = "DELETE FROM users WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(user_id)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to delete user")?;

    if result.rows_affected() == 0 {
        let _ = tx.rollback().await;
        return Ok(false);
    }

    tx.commit().await.context("commit delete-user transaction")?;
    Ok(true)
}
