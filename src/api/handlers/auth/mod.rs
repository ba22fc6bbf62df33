//! Auth handlers and supporting modules.
//!
//! This module coordinates password login, biometric (`WebAuthn`) login and
//! enrollment, session management, and role-based authorization.
//!
//! ## Sessions
//!
//! Session tokens are 32 random bytes, base64 URL-safe encoded. The database
//! stores only a SHA-256 hash; the raw value lives in the `voucherd_session`
//! cookie. Password and biometric logins mint identical sessions.
//!
//! ## Biometric attempts
//!
//! WebAuthn ceremony state is persisted per attempt in `webauthn_attempts`,
//! consumed at most once, and expires after a short TTL. See the `webauthn`
//! module for the service that owns those rows.

pub(crate) mod biometric;
pub(crate) mod login;
pub mod policy;
pub(crate) mod session;
mod state;
mod storage;
pub(crate) mod types;
mod utils;

pub use policy::{Action, Role};
pub use state::{AuthConfig, AuthState};
pub(crate) use storage::prune_expired_sessions;
pub(crate) use utils::{hash_password, is_unique_violation, normalize_email, valid_email};
