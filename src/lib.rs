//! # Voucherd (Payment Voucher Approval Service)
//!
//! `voucherd` is the server side of a payment-voucher approval application:
//! users submit expense vouchers, designated approvers approve or reject them,
//! and administrators manage user accounts. This crate implements the
//! authentication and session subsystem backing that application.
//!
//! ## Authentication
//!
//! Two login paths feed the same session issuer:
//!
//! - **Password login:** email + password verified against an argon2id hash
//!   stored with the user record.
//! - **Biometric login:** a `WebAuthn` ceremony (platform authenticator,
//!   user verification required) verified with `webauthn-rs`.
//!
//! Both paths mint an opaque session token; the database stores only its
//! SHA-256 hash. The session cookie is `HttpOnly` with a 7-day expiry.
//!
//! ## `WebAuthn` ceremony state
//!
//! Every registration or login ceremony gets its own attempt id. The
//! serialized protocol state lives in the `webauthn_attempts` table with an
//! explicit expiry and is consumed at most once (`DELETE ... RETURNING`), so
//! concurrent logins never interfere and state survives across server
//! instances.
//!
//! ## Authorization
//!
//! Roles (`super_admin`, `admin`, `approver`, `requester`) form a closed enum
//! with a single capability check ([`api::handlers::auth::policy::Role::can`]).
//! Admin endpoints consult it once per request.

pub mod api;
pub mod cli;
pub mod webauthn;

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with("voucherd/"));
        let version = APP_USER_AGENT
            .split('/')
            .nth(1)
            .expect("user agent has a version part");
        assert!(!version.is_empty());
    }
}
