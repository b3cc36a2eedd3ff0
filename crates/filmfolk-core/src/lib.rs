//! filmfolk Core - Domain types shared by the filmfolk services
//!
//! This crate provides the fundamental building blocks:
//! - Role hierarchy and account lifecycle enumerations
//! - Catalog status enumerations for movies and reviews
//! - Pagination helpers
//! - Configuration loading

pub mod config;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

/// Returned when a stored or transmitted enumeration value is not recognized
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unrecognized {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

// ============================================================================
// Roles
// ============================================================================

/// Account role
///
/// Roles form a total order: `User < Moderator < Admin`. A role gate
/// requiring some level admits every role at or above it, so an admin
/// passes every gate.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    User,
    Moderator,
    Admin,
}

impl UserRole {
    /// Numeric level in the hierarchy (user=1, moderator=2, admin=3)
    pub fn level(self) -> u8 {
        match self {
            UserRole::User => 1,
            UserRole::Moderator => 2,
            UserRole::Admin => 3,
        }
    }

    /// Whether this role satisfies a gate requiring `required`
    pub fn satisfies(self, required: UserRole) -> bool {
        self.level() >= required.level()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Moderator => "moderator",
            UserRole::Admin => "admin",
        }
    }
}

impl FromStr for UserRole {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(UserRole::User),
            "moderator" => Ok(UserRole::Moderator),
            "admin" => Ok(UserRole::Admin),
            other => Err(ParseEnumError::new("role", other)),
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Account lifecycle
// ============================================================================

/// Account status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Active,
    Suspended,
    Banned,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Suspended => "suspended",
            AccountStatus::Banned => "banned",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, AccountStatus::Active)
    }
}

impl FromStr for AccountStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(AccountStatus::Active),
            "suspended" => Ok(AccountStatus::Suspended),
            "banned" => Ok(AccountStatus::Banned),
            other => Err(ParseEnumError::new("account status", other)),
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an account authenticates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    #[default]
    Email,
    Google,
    Facebook,
    Instagram,
    Twitter,
    Guest,
}

impl AuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthProvider::Email => "email",
            AuthProvider::Google => "google",
            AuthProvider::Facebook => "facebook",
            AuthProvider::Instagram => "instagram",
            AuthProvider::Twitter => "twitter",
            AuthProvider::Guest => "guest",
        }
    }

    /// Only email accounts carry a password hash
    pub fn requires_password(&self) -> bool {
        matches!(self, AuthProvider::Email)
    }
}

impl FromStr for AuthProvider {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "email" => Ok(AuthProvider::Email),
            "google" => Ok(AuthProvider::Google),
            "facebook" => Ok(AuthProvider::Facebook),
            "instagram" => Ok(AuthProvider::Instagram),
            "twitter" => Ok(AuthProvider::Twitter),
            "guest" => Ok(AuthProvider::Guest),
            other => Err(ParseEnumError::new("auth provider", other)),
        }
    }
}

impl fmt::Display for AuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// Moderation state of a submitted movie
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovieStatus {
    #[default]
    PendingApproval,
    Approved,
    Rejected,
}

impl MovieStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovieStatus::PendingApproval => "pending_approval",
            MovieStatus::Approved => "approved",
            MovieStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for MovieStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending_approval" => Ok(MovieStatus::PendingApproval),
            "approved" => Ok(MovieStatus::Approved),
            "rejected" => Ok(MovieStatus::Rejected),
            other => Err(ParseEnumError::new("movie status", other)),
        }
    }
}

impl fmt::Display for MovieStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Moderation state of a review
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    PendingModeration,
    #[default]
    Published,
    Rejected,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::PendingModeration => "pending_moderation",
            ReviewStatus::Published => "published",
            ReviewStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for ReviewStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending_moderation" => Ok(ReviewStatus::PendingModeration),
            "published" => Ok(ReviewStatus::Published),
            "rejected" => Ok(ReviewStatus::Rejected),
            other => Err(ParseEnumError::new("review status", other)),
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Pagination
// ============================================================================

/// A normalized page request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub page: u32,
    pub page_size: u32,
}

impl Page {
    /// Build a page from optional query values
    ///
    /// `page` is at least 1. `page_size` falls back to `default_size` when
    /// missing or outside `1..=max_size`.
    pub fn new(page: Option<u32>, page_size: Option<u32>, default_size: u32, max_size: u32) -> Self {
        let page = page.filter(|p| *p >= 1).unwrap_or(1);
        let page_size = page_size
            .filter(|s| (1..=max_size).contains(s))
            .unwrap_or(default_size);
        Self { page, page_size }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_role_levels() {
        assert_eq!(UserRole::User.level(), 1);
        assert_eq!(UserRole::Moderator.level(), 2);
        assert_eq!(UserRole::Admin.level(), 3);
    }

    #[test]
    fn test_moderator_gate() {
        assert!(UserRole::Moderator.satisfies(UserRole::Moderator));
        assert!(UserRole::Admin.satisfies(UserRole::Moderator));
        assert!(!UserRole::User.satisfies(UserRole::Moderator));
    }

    #[test]
    fn test_role_serde() {
        let json = serde_json::to_string(&UserRole::Moderator).unwrap();
        assert_eq!(json, "\"moderator\"");
        let role: UserRole = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, UserRole::Admin);
        assert!(serde_json::from_str::<UserRole>("\"root\"").is_err());
    }

    #[test]
    fn test_enum_round_trip_strings() {
        for status in [
            AccountStatus::Active,
            AccountStatus::Suspended,
            AccountStatus::Banned,
        ] {
            assert_eq!(status.as_str().parse::<AccountStatus>().unwrap(), status);
        }
        assert_eq!(
            "pending_approval".parse::<MovieStatus>().unwrap(),
            MovieStatus::PendingApproval
        );
        assert!("deleted".parse::<ReviewStatus>().is_err());
    }

    #[test]
    fn test_provider_requires_password() {
        assert!(AuthProvider::Email.requires_password());
        assert!(!AuthProvider::Google.requires_password());
        assert!(!AuthProvider::Guest.requires_password());
    }

    #[test]
    fn test_page_normalization() {
        let page = Page::new(None, None, 20, 100);
        assert_eq!(page, Page { page: 1, page_size: 20 });

        let page = Page::new(Some(0), Some(500), 20, 100);
        assert_eq!(page, Page { page: 1, page_size: 20 });

        let page = Page::new(Some(3), Some(10), 20, 100);
        assert_eq!(page.offset(), 20);
        assert_eq!(page.limit(), 10);
    }

    fn any_role() -> impl Strategy<Value = UserRole> {
        prop_oneof![
            Just(UserRole::User),
            Just(UserRole::Moderator),
            Just(UserRole::Admin),
        ]
    }

    proptest! {
        #[test]
        fn admin_passes_every_gate(required in any_role()) {
            prop_assert!(UserRole::Admin.satisfies(required));
        }

        #[test]
        fn gate_matches_level_order(actual in any_role(), required in any_role()) {
            prop_assert_eq!(actual.satisfies(required), actual >= required);
        }
    }
}
