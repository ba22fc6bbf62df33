//! Auth configuration and shared state.

use url::Url;

const DEFAULT_SESSION_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_CHALLENGE_TTL_SECONDS: i64 = 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    session_ttl_seconds: i64,
    challenge_ttl_seconds: i64,
    rp_id: String,
    rp_origin: String,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        let rp_id = Url::parse(&frontend_base_url)
            .ok()
            .and_then(|url: Url| url.host_str().map(ToString::to_string))
            .unwrap_or_else(|| "localhost".to_string());

        // Ensure origin does not have a trailing slash
        let rp_origin = frontend_base_url.trim_end_matches('/').to_string();

        Self {
            frontend_base_url,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            challenge_ttl_seconds: DEFAULT_CHALLENGE_TTL_SECONDS,
            rp_id,
            rp_origin,
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_challenge_ttl_seconds(mut self, seconds: i64) -> Self {
        self.challenge_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_rp_id(mut self, rp_id: String) -> Self {
        self.rp_id = rp_id;
        self
    }

    #[must_use]
    pub fn with_rp_origin(mut self, rp_origin: String) -> Self {
        self.rp_origin = rp_origin;
        self
    }

    #[must_use]
    pub fn rp_id(&self) -> &str {
        &self.rp_id
    }

    #[must_use]
    pub fn rp_origin(&self) -> &str {
        &self.rp_origin
    }

    pub(crate) fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    pub(crate) fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    pub(crate) fn challenge_ttl_seconds(&self) -> i64 {
        self.challenge_ttl_seconds
    }

    pub(super) fn session_cookie_secure(&self) -> bool {
        self.frontend_base_url.starts_with("https://")
    }
}

pub struct AuthState {
    config: AuthConfig,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::{AuthConfig, AuthState};

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = AuthConfig::new("https://vouchers.example.com".to_string());

        assert_eq!(config.frontend_base_url(), "https://vouchers.example.com");
        assert_eq!(
            config.session_ttl_seconds(),
            super::DEFAULT_SESSION_TTL_SECONDS
        );
        assert_eq!(
            config.challenge_ttl_seconds(),
            super::DEFAULT_CHALLENGE_TTL_SECONDS
        );
        assert_eq!(config.rp_id(), "vouchers.example.com");
        assert_eq!(config.rp_origin(), "https://vouchers.example.com");
        assert!(config.session_cookie_secure());

        let config = config
            .with_session_ttl_seconds(120)
            .with_challenge_ttl_seconds(30)
            .with_rp_id("example.com".to_string())
            .with_rp_origin("https://app.example.com".to_string());

        assert_eq!(config.session_ttl_seconds(), 120);
        assert_eq!(config.challenge_ttl_seconds(), 30);
        assert_eq!(config.rp_id(), "example.com");
        assert_eq!(config.rp_origin(), "https://app.example.com");
    }

    #[test]
    fn rp_defaults_from_frontend_url() {
        let config = AuthConfig::new("http://localhost:3000/".to_string());
        assert_eq!(config.rp_id(), "localhost");
        assert_eq!(config.rp_origin(), "http://localhost:3000");
        assert!(!config.session_cookie_secure());
    }

    #[test]
    fn auth_state_exposes_config() {
        let state = AuthState::new(AuthConfig::new("https://vouchers.example.com".to_string()));
        assert_eq!(state.config().rp_id(), "vouchers.example.com");
    }
}
