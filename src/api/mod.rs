use crate::{
    api::handlers::{auth, root},
    webauthn::{AttemptRepo, BiometricConfig, BiometricService},
};
use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    routing::{get, options},
    Extension, Router,
};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{debug, info, info_span, warn, Span};
use ulid::Ulid;
use url::Url;
use utoipa_axum::router::OpenApiRouter;

pub mod handlers;
mod middleware;
// OpenAPI router wiring and route registration live in openapi.rs.
mod openapi;

pub use openapi::openapi;

const PRUNE_INTERVAL_SECONDS: u64 = 60;

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// Assemble the full application: documented routes, the root banner, the
/// route guard, security headers, and the tracing/CORS layer stack.
///
/// Kept separate from [`new`] so tests can drive it with `tower::oneshot`.
///
/// # Errors
/// Returns an error if the frontend origin cannot be parsed.
pub fn build_app(
    pool: PgPool,
    auth_state: Arc<auth::AuthState>,
    biometric_service: Arc<BiometricService>,
) -> Result<Router> {
    let frontend_origin = frontend_origin(auth_state.config().frontend_base_url())?;
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_origin(AllowOrigin::exact(frontend_origin))
        .allow_credentials(true);

    // Build the router from OpenAPI-wired routes, then extend it with non-doc
    // routes like `/`. The spec stays in openapi.rs.
    let (router, _openapi) = router().split_for_parts();
    let app = router
        .route("/", get(root::root))
        .route("/health", options(handlers::health::health))
        .layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(cors)
            .layer(axum::middleware::from_fn(middleware::security_headers))
            .layer(Extension(auth_state))
            .layer(Extension(biometric_service))
            .layer(Extension(pool))
            .layer(axum::middleware::from_fn(middleware::route_guard)),
    );

    Ok(app)
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(
    port: u16,
    dsn: String,
    auth_config: auth::AuthConfig,
    biometric_config: BiometricConfig,
) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let auth_state = Arc::new(auth::AuthState::new(auth_config));
    let biometric_service = Arc::new(BiometricService::new(biometric_config, pool.clone())?);

    // Abandoned ceremonies and lapsed logins leave expired rows behind; sweep
    // them so the tables stay small.
    spawn_pruner(pool.clone());

    let app = build_app(pool, auth_state, biometric_service)?;

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

/// Delete expired webauthn attempts and sessions.
///
/// Returns how many rows of each were removed.
///
/// # Errors
/// Returns an error if either delete fails.
pub async fn prune_expired(pool: &PgPool) -> Result<(u64, u64)> {
    let attempts = AttemptRepo::prune_expired(pool).await?;
    let sessions = auth::prune_expired_sessions(pool).await?;
    Ok((attempts, sessions))
}

fn spawn_pruner(pool: PgPool) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(PRUNE_INTERVAL_SECONDS));
        loop {
            interval.tick().await;
            match prune_expired(&pool).await {
                Ok((0, 0)) => {}
                Ok((attempts, sessions)) => {
                    debug!("Pruned {attempts} expired webauthn attempts and {sessions} sessions");
                }
                Err(err) => warn!("Failed to prune expired rows: {err}"),
            }
        }
    });
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(frontend_base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_base_url)
        .with_context(|| format!("Invalid frontend base URL: {frontend_base_url}"))?;
    let host = parsed.host_str().ok_or_else(|| {
        anyhow!("Frontend base URL must include a valid host: {frontend_base_url}")
    })?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}

#[cfg(test)]
mod tests {
    use super::frontend_origin;

    #[test]
    fn frontend_origin_strips_path() -> anyhow::Result<()> {
        let origin = frontend_origin("https://vouchers.example.com/app/")?;
        assert_eq!(origin.to_str()?, "https://vouchers.example.com");
        Ok(())
    }

    #[test]
    fn frontend_origin_keeps_port() -> anyhow::Result<()> {
        let origin = frontend_origin("http://localhost:3000")?;
        assert_eq!(origin.to_str()?, "http://localhost:3000");
        Ok(())
    }

    #[test]
    fn frontend_origin_rejects_garbage() {
        assert!(frontend_origin("not a url").is_err());
    }
}
