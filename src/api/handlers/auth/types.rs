//! Request/response types for auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionResponse {
    pub user_id: String,
    pub email: String,
    pub full_name: String,
    pub role: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct BiometricRegisterStartResponse {
    pub attempt_id: String,
    /// WebAuthn creation options, passed verbatim to `navigator.credentials.create`.
    #[schema(value_type = Object)]
    pub options: serde_json::Value,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct BiometricRegisterFinishRequest {
    pub attempt_id: String,
    /// Attestation response from `navigator.credentials.create`.
    #[schema(value_type = Object)]
    pub credential: serde_json::Value,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct BiometricLoginStartRequest {
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct BiometricLoginStartResponse {
    pub attempt_id: String,
    /// WebAuthn request options, passed verbatim to `navigator.credentials.get`.
    #[schema(value_type = Object)]
    pub options: serde_json::Value,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct BiometricLoginFinishRequest {
    pub attempt_id: String,
    /// Assertion response from `navigator.credentials.get`.
    #[schema(value_type = Object)]
    pub credential: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn login_request_round_trips() -> Result<()> {
        let request = LoginRequest {
            email: "alice@example.com".to_string(),
            password: "hunter22".to_string(),
        };
        let value = serde_json::to_value(&request)?;
        let email = value
            .get("email")
            .and_then(serde_json::Value::as_str)
            .context("missing email")?;
        assert_eq!(email, "alice@example.com");
        let decoded: LoginRequest = serde_json::from_value(value)?;
        assert_eq!(decoded.password, "hunter22");
        Ok(())
    }

    #[test]
    fn biometric_finish_request_keeps_credential_verbatim() -> Result<()> {
        let raw = serde_json::json!({
            "attempt_id": "0e4c8f9e-3f57-4dd7-bf12-9486da6f2b5f",
            "credential": { "id": "abc", "type": "public-key" },
        });
        let decoded: BiometricLoginFinishRequest = serde_json::from_value(raw)?;
        assert_eq!(
            decoded
                .credential
                .get("type")
                .and_then(serde_json::Value::as_str),
            Some("public-key")
        );
        Ok(())
    }
}
