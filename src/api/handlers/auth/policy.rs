//! Role-based authorization for voucher-app endpoints.
//!
//! Roles form a closed set and every capability check goes through
//! [`Role::can`], so there is a single place to read the policy.

use std::fmt;
use std::str::FromStr;

/// Application roles, ordered from most to least privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    SuperAdmin,
    Admin,
    Approver,
    Requester,
}

/// Capabilities the API cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ListUsers,
    CreateUser,
    DeleteUser,
    ApproveVoucher,
    CreateVoucher,
}

impl Role {
    #[must_use]
    pub const fn can(self, action: Action) -> bool {
        match action {
            Action::ListUsers | Action::CreateUser => {
                matches!(self, Self::SuperAdmin | Self::Admin)
            }
            Action::DeleteUser => matches!(self, Self::SuperAdmin),
            Action::ApproveVoucher => {
                matches!(self, Self::SuperAdmin | Self::Admin | Self::Approver)
            }
            Action::CreateVoucher => true,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::Admin => "admin",
            Self::Approver => "approver",
            Self::Requester => "requester",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown role: {}", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "super_admin" => Ok(Self::SuperAdmin),
            "admin" => Ok(Self::Admin),
            "approver" => Ok(Self::Approver),
            "requester" => Ok(Self::Requester),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Action, Role};

    #[test]
    fn role_round_trips_through_str() {
        for role in [
            Role::SuperAdmin,
            Role::Admin,
            Role::Approver,
            Role::Requester,
        ] {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn only_super_admin_deletes_users() {
        assert!(Role::SuperAdmin.can(Action::DeleteUser));
        assert!(!Role::Admin.can(Action::DeleteUser));
        assert!(!Role::Approver.can(Action::DeleteUser));
        assert!(!Role::Requester.can(Action::DeleteUser));
    }

    #[test]
    fn admins_manage_users() {
        assert!(Role::SuperAdmin.can(Action::ListUsers));
        assert!(Role::Admin.can(Action::CreateUser));
        assert!(!Role::Approver.can(Action::ListUsers));
        assert!(!Role::Requester.can(Action::CreateUser));
    }

    #[test]
    fn approvers_approve_but_requesters_do_not() {
        assert!(Role::Approver.can(Action::ApproveVoucher));
        assert!(!Role::Requester.can(Action::ApproveVoucher));
        assert!(Role::Requester.can(Action::CreateVoucher));
    }
}
