//! API handlers for voucherd.
//!
//! Auth (password + biometric), session management, user administration, and
//! the health/root endpoints live here.

pub mod auth;
pub mod health;
pub mod root;
pub mod users;
