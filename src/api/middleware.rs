//! Request middleware: session route guard and baseline security headers.

use axum::{
    body::Body,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use sqlx::PgPool;
use tracing::warn;

use crate::api::handlers::auth::session::authenticate_session;

const LOGIN_PATH: &str = "/login";

/// Paths served without a session.
///
/// `/v1/` handlers authenticate per request, so the guard lets them through
/// and each endpoint decides for itself.
fn is_public_path(path: &str) -> bool {
    if path == "/" {
        return true;
    }
    const PREFIXES: [&str; 7] = [
        "/login",
        "/health",
        "/v1/",
        "/static/",
        "/favicon.ico",
        "/sw.js",
        "/manifest.json",
    ];
    PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

/// Redirect any protected path to `/login` unless a valid session cookie is
/// presented. Errors while resolving the session count as unauthenticated.
pub(crate) async fn route_guard(request: Request<Body>, next: Next) -> Response {
    if is_public_path(request.uri().path()) {
        return next.run(request).await;
    }

    let authenticated = match request.extensions().get::<PgPool>() {
        Some(pool) => match authenticate_session(request.headers(), pool).await {
            Ok(record) => record.is_some(),
            Err(_) => {
                // Fail closed: a database error never opens a protected page.
                warn!("Session lookup failed; treating request as unauthenticated");
                false
            }
        },
        None => false,
    };

    if authenticated {
        next.run(request).await
    } else {
        redirect_to_login()
    }
}

/// Attach baseline security headers to every response.
pub(crate) async fn security_headers(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert("x-content-type-options", HeaderValue::from_static("nosniff"));
    headers.insert(
        "referrer-policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        "permissions-policy",
        HeaderValue::from_static("camera=(), microphone=(), geolocation=()"),
    );
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static(
            "default-src 'self'; frame-ancestors 'none'; base-uri 'self'; form-action 'self'",
        ),
    );
    response
}

/// The app uses 302 so browsers replay the original method as GET.
fn redirect_to_login() -> Response {
    (
        StatusCode::FOUND,
        [(header::LOCATION, HeaderValue::from_static(LOGIN_PATH))],
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_paths_skip_the_guard() {
        assert!(is_public_path("/"));
        assert!(is_public_path("/login"));
        assert!(is_public_path("/health"));
        assert!(is_public_path("/v1/auth/login"));
        assert!(is_public_path("/static/app.css"));
        assert!(is_public_path("/favicon.ico"));
        assert!(is_public_path("/sw.js"));
        assert!(is_public_path("/manifest.json"));
    }

    #[test]
    fn protected_paths_hit_the_guard() {
        assert!(!is_public_path("/dashboard"));
        assert!(!is_public_path("/vouchers/42"));
        assert!(!is_public_path("/v2/anything"));
    }

    #[test]
    fn redirect_is_302_to_login() {
        let response = redirect_to_login();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response
                .headers()
                .get(header::LOCATION)
                .and_then(|value| value.to_str().ok()),
            Some("/login")
        );
    }
}
