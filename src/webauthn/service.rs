//! Biometric (`WebAuthn`) service for voucher-app login and enrollment.
//!
//! Flow Overview:
//! 1) Create registration or authentication options bound to a fresh attempt id.
//! 2) Persist the serialized protocol state in the database with a short TTL.
//! 3) Finish the ceremony by consuming the attempt row exactly once and
//!    verifying the authenticator response against the stored state.
//!
//! Security boundaries:
//! - Origin and RP ID validation are enforced by `webauthn-rs` and by explicit
//!   Origin header checks before options/finish are served.
//! - Challenges are single-use, expire quickly, and are keyed per attempt, so
//!   concurrent logins from different users never interfere.
//! - Attempt state lives in the shared database, not process memory, so any
//!   server instance can finish a ceremony another instance started.

use crate::webauthn::models::AttemptKind;
use crate::webauthn::repo::{AttemptRepo, CredentialRepo};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::{collections::HashMap, time::Duration};
use url::Url;
use uuid::Uuid;
use webauthn_rs::prelude::*;

const DEFAULT_RP_NAME: &str = "Payment Voucher Approvals";
const ENV_RP_NAME: &str = "VOUCHERD_RP_NAME";
const ENV_ALLOWED_ORIGINS: &str = "VOUCHERD_ALLOWED_ORIGINS";

#[derive(Clone, Debug)]
pub struct BiometricConfig {
    rp_id: String,
    rp_name: String,
    allowed_origins: Vec<String>,
    challenge_ttl: Duration,
}

impl BiometricConfig {
    /// Build biometric configuration from environment with safe defaults.
    ///
    /// # Errors
    /// Returns error if any configured origin cannot be parsed.
    pub fn from_env(rp_id: &str, rp_origin: &str, challenge_ttl: Duration) -> Result<Self> {
        let rp_name = std::env::var(ENV_RP_NAME)
            .ok()
            .map(|val| val.trim().to_string())
            .filter(|val| !val.is_empty())
            .unwrap_or_else(|| DEFAULT_RP_NAME.to_string());

        let allowed_origins = match std::env::var(ENV_ALLOWED_ORIGINS) {
            Ok(value) => value
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(ToString::to_string)
                .collect::<Vec<_>>(),
            Err(_) => vec![rp_origin.to_string()],
        };

        Self::new(rp_id.to_string(), rp_name, allowed_origins, challenge_ttl)
    }

    /// Create a new biometric configuration.
    ///
    /// # Errors
    /// Returns error if origins are invalid or empty.
    pub fn new(
        rp_id: String,
        rp_name: String,
        allowed_origins: Vec<String>,
        challenge_ttl: Duration,
    ) -> Result<Self> {
        if rp_id.trim().is_empty() {
            return Err(anyhow!("Relying-party ID must not be empty"));
        }

        let allowed_origins = normalize_origins(allowed_origins)?;
        if allowed_origins.is_empty() {
            return Err(anyhow!("Allowed origins must not be empty"));
        }

        Ok(Self {
            rp_id,
            rp_name,
            allowed_origins,
            challenge_ttl,
        })
    }

    #[must_use]
    pub fn rp_id(&self) -> &str {
        &self.rp_id
    }

    #[must_use]
    pub fn rp_name(&self) -> &str {
        &self.rp_name
    }

    #[must_use]
    pub fn allowed_origins(&self) -> &[String] {
        &self.allowed_origins
    }

    #[must_use]
    pub fn challenge_ttl(&self) -> Duration {
        self.challenge_ttl
    }

    fn challenge_ttl_seconds(&self) -> i64 {
        i64::try_from(self.challenge_ttl.as_secs()).unwrap_or(i64::MAX)
    }
}

#[derive(Debug)]
pub enum BiometricRegistrationError {
    NotFound,
    Expired,
    UserMismatch,
    OriginMismatch,
    Webauthn(WebauthnError),
    Storage(anyhow::Error),
}

#[derive(Debug)]
pub enum BiometricAuthenticationError {
    NotFound,
    Expired,
    OriginMismatch,
    Webauthn(WebauthnError),
    Storage(anyhow::Error),
}

pub struct BiometricService {
    config: BiometricConfig,
    webauthn_by_origin: HashMap<String, Webauthn>,
    pool: PgPool,
}

impl BiometricService {
    /// Create a new biometric service.
    ///
    /// # Errors
    /// Returns error if the `WebAuthn` builder fails for any configured origin.
    pub fn new(config: BiometricConfig, pool: PgPool) -> Result<Self> {
        let mut webauthn_by_origin = HashMap::new();

        for origin in config.allowed_origins() {
            let rp_origin_url =
                Url::parse(origin).with_context(|| format!("Invalid origin: {origin}"))?;
            let webauthn = WebauthnBuilder::new(config.rp_id(), &rp_origin_url)?
                .rp_name(config.rp_name())
                .build()?;
            webauthn_by_origin.insert(origin.clone(), webauthn);
        }

        Ok(Self {
            config,
            webauthn_by_origin,
            pool,
        })
    }

    #[must_use]
    pub fn config(&self) -> &BiometricConfig {
        &self.config
    }

    #[must_use]
    pub fn match_origin(&self, origin: &str) -> Option<String> {
        let normalized = normalize_origin(origin).ok()?;
        if self.webauthn_by_origin.contains_key(&normalized) {
            Some(normalized)
        } else {
            None
        }
    }

    fn webauthn_for_origin(&self, origin: &str) -> Result<&Webauthn> {
        self.webauthn_by_origin
            .get(origin)
            .ok_or_else(|| anyhow!("Origin not allowed"))
    }

    /// Begin biometric registration for an already-authenticated user.
    ///
    /// Returns the attempt id the client must present at finish time.
    ///
    /// # Errors
    /// Returns error if origin is invalid, `WebAuthn` fails, or storage fails.
    pub async fn register_begin(
        &self,
        user_id: Uuid,
        user_name: &str,
        user_display_name: &str,
        origin: &str,
    ) -> Result<(Uuid, CreationChallengeResponse)> {
        let webauthn = self.webauthn_for_origin(origin)?;

        // Exclude already-registered authenticators from re-enrollment.
        let existing = CredentialRepo::list_for_user(&self.pool, user_id).await?;
        let exclude: Vec<CredentialID> = existing
            .into_iter()
            .map(|cred| cred.credential_id.into())
            .collect();
        let exclude = if exclude.is_empty() {
            None
        } else {
            Some(exclude)
        };

        let (mut challenge, registration) =
            webauthn.start_passkey_registration(user_id, user_name, user_display_name, exclude)?;
        request_platform_authenticator(&mut challenge);

        let state = serde_json::to_vec(&registration)
            .context("Failed to serialize registration state")?;
        let attempt_id = AttemptRepo::create(
            &self.pool,
            AttemptKind::Registration,
            Some(user_id),
            origin,
            &state,
            self.config.challenge_ttl_seconds(),
        )
        .await?;

        Ok((attempt_id, challenge))
    }

    /// Finish biometric registration and store the verified credential.
    ///
    /// # Errors
    /// Returns error if the attempt is missing, expired, or mismatched, or if
    /// verification or storage fails.
    pub async fn register_finish(
        &self,
        attempt_id: Uuid,
        user_id: Uuid,
        origin: &str,
        response: RegisterPublicKeyCredential,
    ) -> Result<(), BiometricRegistrationError> {
        let attempt = AttemptRepo::consume(&self.pool, attempt_id, AttemptKind::Registration)
            .await
            .map_err(BiometricRegistrationError::Storage)?
            .ok_or(BiometricRegistrationError::NotFound)?;

        if attempt_is_expired(attempt.expires_at, Utc::now()) {
            return Err(BiometricRegistrationError::Expired);
        }
        if attempt.user_id != Some(user_id) {
            return Err(BiometricRegistrationError::UserMismatch);
        }
        if attempt.origin != origin {
            return Err(BiometricRegistrationError::OriginMismatch);
        }

        let registration: PasskeyRegistration = serde_json::from_slice(&attempt.state)
            .map_err(|err| BiometricRegistrationError::Storage(err.into()))?;

        let webauthn = self
            .webauthn_for_origin(origin)
            .map_err(|_| BiometricRegistrationError::OriginMismatch)?;
        let passkey = webauthn
            .finish_passkey_registration(&response, &registration)
            .map_err(BiometricRegistrationError::Webauthn)?;

        let passkey_data =
            serialize_passkey(&passkey).map_err(BiometricRegistrationError::Storage)?;
        CredentialRepo::create(
            &self.pool,
            user_id,
            passkey.cred_id().as_slice(),
            &passkey_data,
        )
        .await
        .map_err(BiometricRegistrationError::Storage)?;

        Ok(())
    }

    /// Begin biometric authentication for a user's enrolled credentials.
    ///
    /// # Errors
    /// Returns error if no credentials are enrolled, origin is invalid,
    /// `WebAuthn` fails, or storage fails.
    pub async fn auth_begin(
        &self,
        user_id: Uuid,
        origin: &str,
    ) -> Result<(Uuid, RequestChallengeResponse)> {
        let webauthn = self.webauthn_for_origin(origin)?;

        let rows = CredentialRepo::list_for_user(&self.pool, user_id).await?;
        if rows.is_empty() {
            return Err(anyhow!("No biometric credentials enrolled for this user"));
        }

        let mut passkeys = Vec::with_capacity(rows.len());
        for row in rows {
            passkeys.push(deserialize_passkey(&row.passkey_data)?);
        }

        // User verification is already required in the generated options and
        // enforced server side at finish time.
        let (challenge, authentication) = webauthn.start_passkey_authentication(&passkeys)?;

        let state = serde_json::to_vec(&authentication)
            .context("Failed to serialize authentication state")?;
        let attempt_id = AttemptRepo::create(
            &self.pool,
            AttemptKind::Authentication,
            Some(user_id),
            origin,
            &state,
            self.config.challenge_ttl_seconds(),
        )
        .await?;

        Ok((attempt_id, challenge))
    }

    /// Finish biometric authentication.
    ///
    /// Returns the verified user id and the authentication result the caller
    /// must persist (counter bump).
    ///
    /// # Errors
    /// Returns error if the attempt is missing, expired, or mismatched, or if
    /// verification fails.
    pub async fn auth_finish(
        &self,
        attempt_id: Uuid,
        origin: &str,
        response: PublicKeyCredential,
    ) -> Result<(Uuid, AuthenticationResult), BiometricAuthenticationError> {
        let attempt = AttemptRepo::consume(&self.pool, attempt_id, AttemptKind::Authentication)
            .await
            .map_err(BiometricAuthenticationError::Storage)?
            .ok_or(BiometricAuthenticationError::NotFound)?;

        if attempt_is_expired(attempt.expires_at, Utc::now()) {
            return Err(BiometricAuthenticationError::Expired);
        }
        if attempt.origin != origin {
            return Err(BiometricAuthenticationError::OriginMismatch);
        }

        let user_id = attempt.user_id.ok_or_else(|| {
            BiometricAuthenticationError::Storage(anyhow!("Authentication attempt has no user"))
        })?;

        let authentication: PasskeyAuthentication = serde_json::from_slice(&attempt.state)
            .map_err(|err| BiometricAuthenticationError::Storage(err.into()))?;

        let webauthn = self
            .webauthn_for_origin(origin)
            .map_err(|_| BiometricAuthenticationError::OriginMismatch)?;
        webauthn
            .finish_passkey_authentication(&response, &authentication)
            .map_err(BiometricAuthenticationError::Webauthn)
            .map(|result| (user_id, result))
    }
}

/// Ask the client platform for a built-in (platform) authenticator. The
/// generated options already require user verification, which the stored
/// server state checks again at finish time.
fn request_platform_authenticator(challenge: &mut CreationChallengeResponse) {
    if let Some(selection) = challenge.public_key.authenticator_selection.as_mut() {
        selection.authenticator_attachment = Some(AuthenticatorAttachment::Platform);
    }
}

fn attempt_is_expired(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    expires_at <= now
}

fn normalize_origins(origins: Vec<String>) -> Result<Vec<String>> {
    let mut normalized = Vec::new();
    for origin in origins {
        let origin = normalize_origin(&origin)?;
        if !normalized.contains(&origin) {
            normalized.push(origin);
        }
    }
    Ok(normalized)
}

fn normalize_origin(origin: &str) -> Result<String> {
    let parsed = Url::parse(origin).with_context(|| format!("Invalid origin URL: {origin}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("Origin must include a host: {origin}"))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    Ok(format!("{}://{}{}", parsed.scheme(), host, port))
}

/// Serialize a passkey for storage.
///
/// # Errors
/// Returns error if serialization fails.
pub fn serialize_passkey(passkey: &Passkey) -> Result<Vec<u8>> {
    serde_json::to_vec(passkey).context("Failed to serialize passkey")
}

/// Deserialize a stored passkey.
///
/// # Errors
/// Returns error if deserialization fails.
pub fn deserialize_passkey(data: &[u8]) -> Result<Passkey> {
    serde_json::from_slice(data).context("Failed to deserialize passkey")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn test_config() -> Result<BiometricConfig> {
        BiometricConfig::new(
            "vouchers.example.com".to_string(),
            "Payment Voucher Approvals".to_string(),
            vec!["https://vouchers.example.com".to_string()],
            Duration::from_secs(60),
        )
    }

    #[test]
    fn config_rejects_empty_rp_id() {
        let result = BiometricConfig::new(
            "  ".to_string(),
            "Vouchers".to_string(),
            vec!["https://vouchers.example.com".to_string()],
            Duration::from_secs(60),
        );
        assert!(result.is_err());
    }

    #[test]
    fn config_rejects_empty_origins() {
        let result = BiometricConfig::new(
            "vouchers.example.com".to_string(),
            "Vouchers".to_string(),
            vec![],
            Duration::from_secs(60),
        );
        assert!(result.is_err());
    }

    #[test]
    fn origin_normalization_strips_path_and_dedups() -> Result<()> {
        let config = BiometricConfig::new(
            "vouchers.example.com".to_string(),
            "Vouchers".to_string(),
            vec![
                "https://vouchers.example.com/".to_string(),
                "https://vouchers.example.com/login".to_string(),
            ],
            Duration::from_secs(60),
        )?;
        assert_eq!(
            config.allowed_origins(),
            &["https://vouchers.example.com".to_string()]
        );
        Ok(())
    }

    #[test]
    fn origin_normalization_keeps_port() -> Result<()> {
        assert_eq!(
            normalize_origin("http://localhost:3000/")?,
            "http://localhost:3000"
        );
        Ok(())
    }

    #[test]
    fn challenge_ttl_converts_to_seconds() -> Result<()> {
        let config = test_config()?;
        assert_eq!(config.challenge_ttl_seconds(), 60);
        Ok(())
    }

    #[test]
    fn registration_options_ask_for_platform_verification() -> Result<()> {
        let origin = Url::parse("https://vouchers.example.com")?;
        let webauthn = WebauthnBuilder::new("vouchers.example.com", &origin)?
            .rp_name("Vouchers")
            .build()?;
        let (mut challenge, _state) = webauthn.start_passkey_registration(
            Uuid::new_v4(),
            "approver@example.com",
            "Approver",
            None,
        )?;
        request_platform_authenticator(&mut challenge);

        let options = serde_json::to_value(&challenge)?;
        let selection = &options["publicKey"]["authenticatorSelection"];
        assert_eq!(selection["authenticatorAttachment"], "platform");
        assert_eq!(selection["userVerification"], "required");
        Ok(())
    }

    #[test]
    fn expiry_is_inclusive() {
        let now = Utc::now();
        assert!(attempt_is_expired(now, now));
        assert!(attempt_is_expired(now - TimeDelta::seconds(1), now));
        assert!(!attempt_is_expired(now + TimeDelta::seconds(1), now));
    }
}
