use axum::response::IntoResponse;

/// One-line service banner, undocumented on purpose.
pub async fn root() -> impl IntoResponse {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::root;
    use axum::response::IntoResponse;

    #[tokio::test]
    async fn root_returns_banner() {
        let response = root().await.into_response();
        assert!(response.status().is_success());
    }
}
