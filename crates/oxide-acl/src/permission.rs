//! Permission kinds and GRANT/DENY entries.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AclError;
use crate::principal::PrincipalId;
use crate::securable::SecurableId;

/// A permission that can be granted or denied on a securable.
///
/// Kinds are independent: holding `CONTROL` does not imply `SELECT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionKind {
    /// Read rows.
    Select,
    /// Add rows.
    Insert,
    /// Modify rows.
    Update,
    /// Remove rows.
    Delete,
    /// Run a procedure or function.
    Execute,
    /// Reference in a foreign key.
    References,
    /// Change the definition.
    Alter,
    /// Full control over the securable.
    Control,
    /// See the definition in catalog metadata.
    ViewDefinition,
    /// Become the owner.
    TakeOwnership,
    /// Create objects inside the securable.
    Create,
}

impl PermissionKind {
    /// Every permission kind, in display order.
    pub const ALL: [Self; 11] = [
        Self::Select,
        Self::Insert,
        Self::Update,
        Self::Delete,
        Self::Execute,
        Self::References,
        Self::Alter,
        Self::Control,
        Self::ViewDefinition,
        Self::TakeOwnership,
        Self::Create,
    ];

    /// SQL spelling of the permission.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Execute => "EXECUTE",
            Self::References => "REFERENCES",
            Self::Alter => "ALTER",
            Self::Control => "CONTROL",
            Self::ViewDefinition => "VIEW DEFINITION",
            Self::TakeOwnership => "TAKE OWNERSHIP",
            Self::Create => "CREATE",
        }
    }
}

impl fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionKind {
    type Err = AclError;

    /// Parses a permission name case-insensitively. Words may be separated
    /// by spaces or underscores (`view definition`, `VIEW_DEFINITION`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s
            .split(|c: char| c.is_whitespace() || c == '_')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
            .to_uppercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| AclError::UnknownPermission(s.to_string()))
    }
}

/// Outcome recorded by an explicit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// `GRANT`.
    Grant,
    /// `DENY`.
    Deny,
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Grant => f.write_str("GRANT"),
            Self::Deny => f.write_str("DENY"),
        }
    }
}

/// The key an entry is stored under. At most one entry exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryKey {
    /// Holder of the entry.
    pub principal: PrincipalId,
    /// Permission the entry is about.
    pub permission: PermissionKind,
    /// Scope the entry applies at.
    pub securable: SecurableId,
}

impl EntryKey {
    /// Creates an entry key.
    pub fn new(
        principal: impl Into<PrincipalId>,
        permission: PermissionKind,
        securable: impl Into<SecurableId>,
    ) -> Self {
        Self {
            principal: principal.into(),
            permission,
            securable: securable.into(),
        }
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ON {} TO {}",
            self.permission, self.securable, self.principal
        )
    }
}

/// An explicit GRANT or DENY.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionEntry {
    /// Holder of the entry.
    pub principal: PrincipalId,
    /// Permission the entry is about.
    pub permission: PermissionKind,
    /// Scope the entry applies at.
    pub securable: SecurableId,
    /// GRANT or DENY.
    pub effect: Effect,
    /// `WITH GRANT OPTION`; always false for DENY.
    #[serde(default)]
    pub grant_option: bool,
    /// Principal that issued the statement.
    pub granted_by: PrincipalId,
}

impl PermissionEntry {
    /// Returns the key this entry is stored under.
    #[must_use]
    pub fn key(&self) -> EntryKey {
        EntryKey {
            principal: self.principal.clone(),
            permission: self.permission,
            securable: self.securable.clone(),
        }
    }

    /// Returns whether this entry is a DENY.
    #[must_use]
    pub fn is_deny(&self) -> bool {
        self.effect == Effect::Deny
    }
}

impl fmt::Display for PermissionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ON {} TO {}",
            self.effect, self.permission, self.securable, self.principal
        )?;
        if self.grant_option {
            f.write_str(" WITH GRANT OPTION")?;
        }
        write!(f, " AS {}", self.granted_by)
    }
}
