//! Error types for permission management.

use thiserror::Error;

use crate::permission::PermissionKind;
use crate::principal::PrincipalId;
use crate::securable::{SecurableId, SecurableKind};

/// Errors raised by directory, hierarchy and store mutations.
///
/// An access check that ends in Deny is not an error; see
/// [`Decision`](crate::Decision).
#[derive(Debug, Error)]
pub enum AclError {
    /// A principal with this id already exists.
    #[error("principal '{0}' already exists")]
    DuplicatePrincipal(PrincipalId),

    /// A securable with this id already exists.
    #[error("securable '{0}' already exists")]
    DuplicateSecurable(SecurableId),

    /// The membership would make the role graph cyclic.
    #[error("adding '{member}' to role '{role}' would create a membership cycle")]
    CycleDetected {
        /// The prospective member.
        member: PrincipalId,
        /// The role it was being added to.
        role: PrincipalId,
    },

    /// Only roles can have members.
    #[error("principal '{0}' is not a role")]
    NotARole(PrincipalId),

    /// The principal still owns securables.
    #[error("principal '{principal}' owns {count} securable(s); transfer ownership first")]
    PrincipalOwnsObjects {
        /// The principal being removed.
        principal: PrincipalId,
        /// Number of securables it owns.
        count: usize,
    },

    /// The role still has members.
    #[error("role '{role}' has {count} member(s); remove them first")]
    PrincipalHasMembers {
        /// The role being removed.
        role: PrincipalId,
        /// Number of direct members.
        count: usize,
    },

    /// The principal is recorded as the grantor of other entries.
    #[error("principal '{0}' has granted or denied permissions and cannot be removed")]
    PrincipalIsGrantor(PrincipalId),

    /// The parent cannot contain a securable of this kind.
    #[error("a {child} cannot be placed under {}", parent_description(.parent))]
    InvalidParent {
        /// Kind of the securable being added.
        child: SecurableKind,
        /// Kind of the requested parent, if one was given.
        parent: Option<SecurableKind>,
    },

    /// The securable still has children.
    #[error("securable '{id}' is not empty ({children} child securable(s))")]
    NotEmpty {
        /// The securable being removed.
        id: SecurableId,
        /// Number of direct children.
        children: usize,
    },

    /// DENY cannot carry WITH GRANT OPTION.
    #[error("DENY cannot be issued with a grant option")]
    InvalidGrantOption,

    /// Revoking would orphan grants delegated through the grant option.
    #[error(
        "'{principal}' delegated {permission} on '{securable}' to {dependents} principal(s); \
         use CASCADE"
    )]
    DependentGrantsExist {
        /// The principal whose entry is being revoked.
        principal: PrincipalId,
        /// Permission of the revoked entry.
        permission: PermissionKind,
        /// Scope of the revoked entry.
        securable: SecurableId,
        /// Number of grants made by `principal` on that key.
        dependents: usize,
    },

    /// The grantor holds no grant option, ownership or superuser status.
    #[error("'{grantor}' cannot grant {permission} on '{securable}'")]
    GrantOptionRequired {
        /// The principal attempting to grant.
        grantor: PrincipalId,
        /// Requested permission.
        permission: PermissionKind,
        /// Requested scope.
        securable: SecurableId,
    },

    /// No principal with this id exists.
    #[error("unknown principal '{0}'")]
    UnknownPrincipal(PrincipalId),

    /// No securable with this id exists.
    #[error("unknown securable '{0}'")]
    UnknownSecurable(SecurableId),

    /// A permission name could not be parsed.
    #[error("unknown permission '{0}'")]
    UnknownPermission(String),

    /// A catalog snapshot is internally inconsistent.
    #[error("invalid catalog snapshot: {0}")]
    Snapshot(String),

    /// IO error reading or writing a snapshot or config file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn parent_description(parent: &Option<SecurableKind>) -> String {
    match parent {
        Some(kind) => format!("a {kind}"),
        None => "no parent".to_string(),
    }
}

/// Result type alias for permission operations.
pub type Result<T> = std::result::Result<T, AclError>;
