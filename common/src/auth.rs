//! Treasury based access rules.
//!
//! The treasury address is the only administrator. Checks here are
//! client side only: the token contract enforces its own permissions
//! on chain and does not trust anything decided in this module.

use serde::Serialize;
use strum::Display;

/// Returns true when the connected account is the treasury address.
///
/// Both sides are lowercased before comparison, so checksummed and
/// lowercase forms of the same address match. No connected account
/// is never an admin.
pub fn is_admin(account: Option<&str>, treasury: &str) -> bool {
    match account {
        Some(account) => account.to_lowercase() == treasury.to_lowercase(),
        None => false,
    }
}

/// What a view may show to the current visitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[strum(serialize_all = "lowercase")]
pub enum AccessLevel {
    /// No wallet connected
    Disconnected,
    /// Connected, but not the treasury
    Viewer,
    /// Connected as the treasury address
    Admin,
}

impl AccessLevel {
    pub fn of(account: Option<&str>, treasury: &str) -> Self {
        match account {
            None => Self::Disconnected,
            Some(_) if is_admin(account, treasury) => Self::Admin,
            Some(_) => Self::Viewer,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}
