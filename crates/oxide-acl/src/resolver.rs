//! Effective permission resolution.
//!
//! For a request `(principal, permission, securable)` the resolver looks at
//! every entry held by the principal or by any role it transitively belongs
//! to, at the securable or any of its ancestors:
//!
//! 1. any DENY in that set gives [`Decision::Deny`];
//! 2. otherwise any GRANT gives [`Decision::Allow`];
//! 3. otherwise the answer is [`Decision::Deny`].
//!
//! Scope plays no part in precedence. A DENY on a column beats a GRANT on
//! its schema, and a DENY on the schema beats a GRANT on the column.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::error::Result;
use crate::ownership::Ownership;
use crate::permission::{Effect, PermissionEntry, PermissionKind};
use crate::principal::{PrincipalDirectory, PrincipalId};
use crate::securable::{SecurableHierarchy, SecurableId};
use crate::store::PermissionStore;

/// The answer to an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Access is allowed.
    Allow,
    /// Access is denied, explicitly or by default.
    Deny,
}

impl Decision {
    /// Returns whether access is allowed.
    #[must_use]
    pub fn is_allowed(self) -> bool {
        self == Self::Allow
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => f.write_str("ALLOW"),
            Self::Deny => f.write_str("DENY"),
        }
    }
}

/// Why a [`Decision`] was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    /// At least one matching DENY entry.
    ExplicitDeny,
    /// At least one matching GRANT entry and no DENY.
    ExplicitGrant,
    /// No matching entry at all.
    NoMatchingEntry,
    /// The principal or one of its roles is a superuser.
    Superuser,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::ExplicitDeny => "explicit DENY",
            Self::ExplicitGrant => "explicit GRANT",
            Self::NoMatchingEntry => "no matching entry",
            Self::Superuser => "superuser",
        };
        f.write_str(text)
    }
}

/// A decision together with the evidence it was based on.
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    /// The effective answer.
    pub decision: Decision,
    /// Why.
    pub reason: Reason,
    /// The requesting principal followed by its roles, nearest first.
    pub principals: Vec<PrincipalId>,
    /// The securable followed by its ancestors.
    pub scopes: Vec<SecurableId>,
    /// Entries found for the requested permission, principal-major.
    pub matched: Vec<PermissionEntry>,
}

impl Resolution {
    /// Matching DENY entries.
    pub fn denies(&self) -> impl Iterator<Item = &PermissionEntry> {
        self.matched.iter().filter(|e| e.effect == Effect::Deny)
    }

    /// Matching GRANT entries.
    pub fn grants(&self) -> impl Iterator<Item = &PermissionEntry> {
        self.matched.iter().filter(|e| e.effect == Effect::Grant)
    }
}

/// Read-only view used to answer access checks.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    directory: &'a PrincipalDirectory,
    hierarchy: &'a SecurableHierarchy,
    ownership: &'a Ownership,
    store: &'a PermissionStore,
    superuser_bypass: bool,
}

impl<'a> Resolver<'a> {
    /// Creates a resolver over the given components. Superuser flags are
    /// ignored until [`with_superuser_bypass`](Self::with_superuser_bypass)
    /// turns them on.
    #[must_use]
    pub const fn new(
        directory: &'a PrincipalDirectory,
        hierarchy: &'a SecurableHierarchy,
        ownership: &'a Ownership,
        store: &'a PermissionStore,
    ) -> Self {
        Self {
            directory,
            hierarchy,
            ownership,
            store,
            superuser_bypass: false,
        }
    }

    /// Sets whether superuser principals bypass every check.
    #[must_use]
    pub fn with_superuser_bypass(mut self, enabled: bool) -> Self {
        self.superuser_bypass = enabled;
        self
    }

    /// Computes the effective decision.
    ///
    /// Fails with `UnknownPrincipal` or `UnknownSecurable` for ids that do
    /// not exist; Deny is a normal return value.
    pub fn resolve(
        &self,
        principal: &str,
        permission: PermissionKind,
        securable: &str,
    ) -> Result<Decision> {
        let principals = self.candidate_principals(principal)?;
        let scopes = self.candidate_scopes(securable)?;

        if self.bypasses(principal) {
            return Ok(Decision::Allow);
        }

        let mut granted = false;
        for holder in &principals {
            for scope in &scopes {
                match self.store.get(holder.as_str(), permission, scope.as_str()) {
                    Some(entry) if entry.effect == Effect::Deny => return Ok(Decision::Deny),
                    Some(_) => granted = true,
                    None => {}
                }
            }
        }

        Ok(if granted {
            Decision::Allow
        } else {
            Decision::Deny
        })
    }

    /// Like [`resolve`](Self::resolve), but also reports the entries and
    /// the rule that produced the decision.
    pub fn explain(
        &self,
        principal: &str,
        permission: PermissionKind,
        securable: &str,
    ) -> Result<Resolution> {
        let principals = self.candidate_principals(principal)?;
        let scopes = self.candidate_scopes(securable)?;

        let matched: Vec<PermissionEntry> = principals
            .iter()
            .flat_map(|holder| {
                scopes.iter().filter_map(move |scope| {
                    self.store.get(holder.as_str(), permission, scope.as_str())
                })
            })
            .cloned()
            .collect();

        let (decision, reason) = if self.bypasses(principal) {
            (Decision::Allow, Reason::Superuser)
        } else if matched.iter().any(PermissionEntry::is_deny) {
            (Decision::Deny, Reason::ExplicitDeny)
        } else if matched.is_empty() {
            (Decision::Deny, Reason::NoMatchingEntry)
        } else {
            (Decision::Allow, Reason::ExplicitGrant)
        };

        Ok(Resolution {
            decision,
            reason,
            principals,
            scopes,
            matched,
        })
    }

    /// The decision for every permission kind on one securable.
    pub fn effective_permissions(
        &self,
        principal: &str,
        securable: &str,
    ) -> Result<BTreeMap<PermissionKind, Decision>> {
        PermissionKind::ALL
            .into_iter()
            .map(|permission| Ok((permission, self.resolve(principal, permission, securable)?)))
            .collect()
    }

    /// Returns whether `grantor` may grant `permission` on `securable` to
    /// someone else.
    ///
    /// That holds for superusers, for the owner of the securable or of any
    /// ancestor, and for principals that are allowed the permission while
    /// holding (directly or through a role) a GRANT with the grant option in
    /// the scope chain.
    pub fn can_delegate(
        &self,
        grantor: &str,
        permission: PermissionKind,
        securable: &str,
    ) -> Result<bool> {
        let resolution = self.explain(grantor, permission, securable)?;
        if resolution.reason == Reason::Superuser {
            return Ok(true);
        }

        let owns_scope = resolution.scopes.iter().any(|scope| {
            self.ownership
                .owner_of(scope.as_str())
                .is_some_and(|owner| owner.as_str() == grantor)
        });
        if owns_scope {
            return Ok(true);
        }

        Ok(resolution.decision.is_allowed() && resolution.grants().any(|e| e.grant_option))
    }

    fn bypasses(&self, principal: &str) -> bool {
        self.superuser_bypass && self.directory.is_effective_superuser(principal)
    }

    fn candidate_principals(&self, principal: &str) -> Result<Vec<PrincipalId>> {
        let mut principals = vec![self.directory.require(principal)?.id.clone()];
        principals.extend(self.directory.transitive_roles(principal)?);
        Ok(principals)
    }

    fn candidate_scopes(&self, securable: &str) -> Result<Vec<SecurableId>> {
        Ok(self
            .hierarchy
            .ancestor_chain(securable)?
            .map(|s| s.id.clone())
            .collect())
    }
}
