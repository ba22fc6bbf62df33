use crate::webauthn::models::{AttemptKind, BiometricCredential, WebauthnAttempt};
use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

pub struct CredentialRepo;

impl CredentialRepo {
    /// Saves a new biometric credential.
    ///
    /// # Errors
    /// Returns error if the database query fails.
    pub async fn create(
        pool: &PgPool,
        user_id: Uuid,
        credential_id: &[u8],
        passkey_data: &[u8],
    ) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO biometric_credentials (credential_id, user_id, passkey_data)
            VALUES ($1, $2, $3)
            ",
        )
        .bind(credential_id)
        .bind(user_id)
        .bind(passkey_data)
        .execute(pool)
        .await
        .context("Failed to insert biometric credential")?;

        Ok(())
    }

    /// Lists all credentials for a user.
    ///
    /// # Errors
    /// Returns error if the database query fails.
    pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<BiometricCredential>> {
        sqlx::query_as::<_, BiometricCredential>(
            "SELECT * FROM biometric_credentials WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
        .context("Failed to list biometric credentials")
    }

    /// Gets a single credential by its credential ID.
    ///
    /// # Errors
    /// Returns error if the database query fails.
    pub async fn get(pool: &PgPool, credential_id: &[u8]) -> Result<Option<BiometricCredential>> {
        sqlx::query_as::<_, BiometricCredential>(
            "SELECT * FROM biometric_credentials WHERE credential_id = $1",
        )
        .bind(credential_id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch biometric credential")
    }

    /// Updates the serialized passkey (counter bump) and last-used timestamp.
    ///
    /// # Errors
    /// Returns error if the database query fails.
    pub async fn update_usage(
        pool: &PgPool,
        credential_id: &[u8],
        passkey_data: &[u8],
    ) -> Result<()> {
        sqlx::query(
            r"
            UPDATE biometric_credentials
            SET passkey_data = $1, last_used_at = NOW()
            WHERE credential_id = $2
            ",
        )
        .bind(passkey_data)
        .bind(credential_id)
        .execute(pool)
        .await
        .context("Failed to update biometric credential usage")?;

        Ok(())
    }

    /// Updates only the last-used timestamp.
    ///
    /// # Errors
    /// Returns error if the database query fails.
    pub async fn touch(pool: &PgPool, credential_id: &[u8]) -> Result<()> {
        sqlx::query("UPDATE biometric_credentials SET last_used_at = NOW() WHERE credential_id = $1")
            .bind(credential_id)
            .execute(pool)
            .await
            .context("Failed to update biometric credential last_used_at")?;
        Ok(())
    }

    /// Deletes a credential by credential ID and user ID.
    ///
    /// # Errors
    /// Returns error if the database query fails.
    pub async fn delete(pool: &PgPool, user_id: Uuid, credential_id: &[u8]) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM biometric_credentials WHERE user_id = $1 AND credential_id = $2",
        )
        .bind(user_id)
        .bind(credential_id)
        .execute(pool)
        .await
        .context("Failed to delete biometric credential")?;
        Ok(result.rows_affected() > 0)
    }
}

pub struct AttemptRepo;

impl AttemptRepo {
    /// Persists a new ceremony attempt and returns its id.
    ///
    /// # Errors
    /// Returns error if the database query fails.
    pub async fn create(
        pool: &PgPool,
        kind: AttemptKind,
        user_id: Option<Uuid>,
        origin: &str,
        state: &[u8],
        ttl_seconds: i64,
    ) -> Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            r"
            INSERT INTO webauthn_attempts (id, kind, user_id, origin, state, expires_at)
            VALUES ($1, $2, $3, $4, $5, NOW() + ($6 * INTERVAL '1 second'))
            ",
        )
        .bind(id)
        .bind(kind.as_str())
        .bind(user_id)
        .bind(origin)
        .bind(state)
        .bind(ttl_seconds)
        .execute(pool)
        .await
        .context("Failed to insert webauthn attempt")?;

        Ok(id)
    }

    /// Removes and returns an attempt, enforcing single use.
    ///
    /// The row is deleted even when it has already expired; the caller checks
    /// `expires_at` so an expired attempt is both rejected and unusable.
    ///
    /// # Errors
    /// Returns error if the database query fails.
    pub async fn consume(
        pool: &PgPool,
        id: Uuid,
        kind: AttemptKind,
    ) -> Result<Option<WebauthnAttempt>> {
        sqlx::query_as::<_, WebauthnAttempt>(
            r"
            DELETE FROM webauthn_attempts
            WHERE id = $1 AND kind = $2
            RETURNING id, user_id, origin, state, created_at, expires_at
            ",
        )
        .bind(id)
        .bind(kind.as_str())
        .fetch_optional(pool)
        .await
        .context("Failed to consume webauthn attempt")
    }

    /// Removes expired attempts; abandoned ceremonies go away on their own.
    ///
    /// # Errors
    /// Returns error if the database query fails.
    pub async fn prune_expired(pool: &PgPool) -> Result<u64> {
        let result = sqlx::query("DELETE FROM webauthn_attempts WHERE expires_at < NOW()")
            .execute(pool)
            .await
            .context("Failed to prune expired webauthn attempts")?;
        Ok(result.rows_affected())
    }
}
