use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, FromRow, Row};
use uuid::Uuid;

/// A registered biometric authenticator for a user.
///
/// `passkey_data` holds the serialized `webauthn_rs` passkey, which carries
/// the public key and the signature counter used for clone detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiometricCredential {
    pub credential_id: Vec<u8>,
    pub user_id: Uuid,
    pub passkey_data: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl<'r> FromRow<'r, PgRow> for BiometricCredential {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            credential_id: row.try_get("credential_id")?,
            user_id: row.try_get("user_id")?,
            passkey_data: row.try_get("passkey_data")?,
            created_at: row.try_get("created_at")?,
            last_used_at: row.try_get("last_used_at")?,
        })
    }
}

/// Which half of the `WebAuthn` protocol an attempt row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptKind {
    Registration,
    Authentication,
}

impl AttemptKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Registration => "registration",
            Self::Authentication => "authentication",
        }
    }
}

/// One in-flight `WebAuthn` ceremony.
///
/// `state` is the serialized `PasskeyRegistration` / `PasskeyAuthentication`
/// produced at options time. Rows are consumed at most once and rejected when
/// `expires_at` has passed.
#[derive(Debug, Clone)]
pub struct WebauthnAttempt {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub origin: String,
    pub state: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for WebauthnAttempt {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            origin: row.try_get("origin")?,
            state: row.try_get("state")?,
            created_at: row.try_get("created_at")?,
            expires_at: row.try_get("expires_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::AttemptKind;

    #[test]
    fn attempt_kind_as_str() {
        assert_eq!(AttemptKind::Registration.as_str(), "registration");
        assert_eq!(AttemptKind::Authentication.as_str(), "authentication");
    }
}
