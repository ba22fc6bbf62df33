use crate::{
    api,
    api::handlers::auth::AuthConfig,
    cli::actions::Action,
    webauthn::BiometricConfig,
};
use anyhow::{Context, Result};
use std::time::Duration;

/// Execute the server action.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the server fails to start.
pub async fn handle(action: Action) -> Result<()> {
    let Action::Server {
        port,
        dsn,
        frontend_url,
        rp_id,
        session_ttl_seconds,
        challenge_ttl_seconds,
    } = action;

    let mut auth_config = AuthConfig::new(frontend_url)
        .with_session_ttl_seconds(session_ttl_seconds)
        .with_challenge_ttl_seconds(challenge_ttl_seconds);
    if let Some(rp_id) = rp_id {
        auth_config = auth_config.with_rp_id(rp_id);
    }

    let challenge_ttl = u64::try_from(auth_config.challenge_ttl_seconds())
        .context("challenge TTL must be a positive number of seconds")?;
    let biometric_config = BiometricConfig::from_env(
        auth_config.rp_id(),
        auth_config.rp_origin(),
        Duration::from_secs(challenge_ttl),
    )?;

    api::new(port, dsn, auth_config, biometric_config).await
}
