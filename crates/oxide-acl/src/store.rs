//! Storage of explicit GRANT and DENY entries.
//!
//! The store enforces the per-key invariants: one entry per
//! `(principal, permission, securable)`, no grant option on DENY, and no
//! delegated grant left behind by a revoke. It does not know whether the
//! principals and securables it is given exist; the
//! [`AccessControl`](crate::AccessControl) facade checks that.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::debug;

use crate::error::{AclError, Result};
use crate::permission::{Effect, PermissionEntry, PermissionKind};
use crate::principal::PrincipalId;
use crate::securable::SecurableId;

type PermissionsAt = BTreeMap<PermissionKind, PermissionEntry>;

/// Entries removed or changed by a revoke.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevokeOutcome {
    /// The targeted entry as it was before the call, or `None` if the call
    /// changed nothing.
    pub target: Option<PermissionEntry>,
    /// Delegated grants removed by `CASCADE`, in breadth-first order.
    pub cascaded: Vec<PermissionEntry>,
}

impl RevokeOutcome {
    /// Returns whether the call changed the store.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.target.is_none()
    }
}

/// GRANT/DENY entries indexed by principal, then securable, then permission.
#[derive(Debug, Default, Clone)]
pub struct PermissionStore {
    entries: BTreeMap<PrincipalId, BTreeMap<SecurableId, PermissionsAt>>,
    len: usize,
}

impl PermissionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns whether the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the entry at an exact key.
    #[must_use]
    pub fn get(
        &self,
        principal: &str,
        permission: PermissionKind,
        securable: &str,
    ) -> Option<&PermissionEntry> {
        self.entries.get(principal)?.get(securable)?.get(&permission)
    }

    /// Iterates over every entry.
    pub fn iter(&self) -> impl Iterator<Item = &PermissionEntry> {
        self.entries
            .values()
            .flat_map(BTreeMap::values)
            .flat_map(BTreeMap::values)
    }

    /// Entries held directly by a principal.
    pub fn entries_for(&self, principal: &str) -> impl Iterator<Item = &PermissionEntry> {
        self.entries
            .get(principal)
            .into_iter()
            .flat_map(BTreeMap::values)
            .flat_map(BTreeMap::values)
    }

    /// Entries recorded at exactly one securable.
    pub fn entries_at<'a>(
        &'a self,
        securable: &'a str,
    ) -> impl Iterator<Item = &'a PermissionEntry> {
        self.entries
            .values()
            .filter_map(move |by_securable| by_securable.get(securable))
            .flat_map(BTreeMap::values)
    }

    /// Upserts the entry for `(principal, permission, securable)`.
    ///
    /// Returns the effect the key held before, if any. A DENY cannot carry
    /// the grant option.
    ///
    /// A GRANT written over a GRANT keeps an existing grant option; only
    /// [`revoke_grant_option_only`](Self::revoke_grant_option_only) clears
    /// it. A DENY written over a GRANT whose option was used to delegate the
    /// permission fails with `DependentGrantsExist`; revoke with `CASCADE`
    /// first.
    pub fn write(
        &mut self,
        principal: &str,
        permission: PermissionKind,
        securable: &str,
        effect: Effect,
        grant_option: bool,
        grantor: &str,
    ) -> Result<Option<Effect>> {
        if effect == Effect::Deny && grant_option {
            return Err(AclError::InvalidGrantOption);
        }

        let held_option = self
            .get(principal, permission, securable)
            .is_some_and(|existing| existing.grant_option);
        if held_option && effect == Effect::Deny {
            self.check_dependents(principal, permission, securable, false)?;
        }
        let grant_option = grant_option || (held_option && effect == Effect::Grant);

        let entry = PermissionEntry {
            principal: PrincipalId::new(principal),
            permission,
            securable: SecurableId::new(securable),
            effect,
            grant_option,
            granted_by: PrincipalId::new(grantor),
        };
        let previous = self
            .entries
            .entry(entry.principal.clone())
            .or_default()
            .entry(entry.securable.clone())
            .or_default()
            .insert(permission, entry);

        if previous.is_none() {
            self.len += 1;
        }
        Ok(previous.map(|e| e.effect))
    }

    /// Removes the entry at exactly this key.
    ///
    /// Entries at other scopes and entries held by roles are never touched.
    /// If `principal` delegated this permission to others (GRANT entries at
    /// the same key with `granted_by == principal`), the call fails with
    /// `DependentGrantsExist` unless `cascade` is set, in which case the
    /// delegated grants are revoked recursively. Revoking a missing key is a
    /// no-op.
    pub fn revoke(
        &mut self,
        principal: &str,
        permission: PermissionKind,
        securable: &str,
        cascade: bool,
    ) -> Result<RevokeOutcome> {
        let Some(target) = self.get(principal, permission, securable).cloned() else {
            return Ok(RevokeOutcome::default());
        };

        let has_dependents = self.check_dependents(principal, permission, securable, cascade)?;
        self.remove_entry(principal, permission, securable);
        let cascaded = if has_dependents {
            self.cascade_from(&target.principal, permission, securable)
        } else {
            Vec::new()
        };

        Ok(RevokeOutcome {
            target: Some(target),
            cascaded,
        })
    }

    /// Clears the grant option of a GRANT while keeping the GRANT itself
    /// (`REVOKE GRANT OPTION FOR`).
    ///
    /// Delegated grants made through the option are handled as in
    /// [`revoke`](Self::revoke). Entries without the option are left alone.
    pub fn revoke_grant_option_only(
        &mut self,
        principal: &str,
        permission: PermissionKind,
        securable: &str,
        cascade: bool,
    ) -> Result<RevokeOutcome> {
        let Some(target) = self
            .get(principal, permission, securable)
            .filter(|entry| entry.grant_option)
            .cloned()
        else {
            return Ok(RevokeOutcome::default());
        };

        let has_dependents = self.check_dependents(principal, permission, securable, cascade)?;
        if let Some(entry) = self.get_mut(principal, permission, securable) {
            entry.grant_option = false;
        }
        let cascaded = if has_dependents {
            self.cascade_from(&target.principal, permission, securable)
        } else {
            Vec::new()
        };

        Ok(RevokeOutcome {
            target: Some(target),
            cascaded,
        })
    }

    /// Removes every entry held by a principal.
    pub fn remove_principal(&mut self, principal: &str) -> Vec<PermissionEntry> {
        let removed: Vec<PermissionEntry> = self
            .entries
            .remove(principal)
            .into_iter()
            .flat_map(BTreeMap::into_values)
            .flat_map(BTreeMap::into_values)
            .collect();
        self.len -= removed.len();
        removed
    }

    /// Removes every entry recorded at one of the given securables.
    pub fn remove_securables(&mut self, securables: &[SecurableId]) -> Vec<PermissionEntry> {
        let mut removed = Vec::new();
        for by_securable in self.entries.values_mut() {
            for securable in securables {
                if let Some(at) = by_securable.remove(securable) {
                    removed.extend(at.into_values());
                }
            }
        }
        self.entries.retain(|_, by_securable| !by_securable.is_empty());
        self.len -= removed.len();
        removed
    }

    /// Returns whether `principal` is recorded as the grantor of an entry
    /// held by someone else.
    #[must_use]
    pub fn is_grantor(&self, principal: &str) -> bool {
        self.iter()
            .any(|e| e.granted_by.as_str() == principal && e.principal.as_str() != principal)
    }

    /// GRANT entries at `(permission, securable)` that `grantor` issued to
    /// other principals.
    fn dependents(
        &self,
        grantor: &str,
        permission: PermissionKind,
        securable: &str,
    ) -> Vec<PrincipalId> {
        self.entries_at(securable)
            .filter(|e| {
                e.permission == permission
                    && e.effect == Effect::Grant
                    && e.granted_by.as_str() == grantor
                    && e.principal.as_str() != grantor
            })
            .map(|e| e.principal.clone())
            .collect()
    }

    /// Fails with `DependentGrantsExist` if there are dependents and
    /// `cascade` is off; otherwise reports whether any exist.
    fn check_dependents(
        &self,
        principal: &str,
        permission: PermissionKind,
        securable: &str,
        cascade: bool,
    ) -> Result<bool> {
        let dependents = self.dependents(principal, permission, securable).len();
        if dependents > 0 && !cascade {
            return Err(AclError::DependentGrantsExist {
                principal: PrincipalId::new(principal),
                permission,
                securable: SecurableId::new(securable),
                dependents,
            });
        }
        Ok(dependents > 0)
    }

    /// Revokes everything delegated from `root` at one key, breadth-first.
    ///
    /// The visited set bounds the walk by the number of principals even if
    /// grantor chains loop back.
    fn cascade_from(
        &mut self,
        root: &PrincipalId,
        permission: PermissionKind,
        securable: &str,
    ) -> Vec<PermissionEntry> {
        let mut visited: BTreeSet<PrincipalId> = BTreeSet::from([root.clone()]);
        let mut queue: VecDeque<PrincipalId> = VecDeque::from([root.clone()]);
        let mut removed = Vec::new();

        while let Some(grantor) = queue.pop_front() {
            for dependent in self.dependents(grantor.as_str(), permission, securable) {
                if !visited.insert(dependent.clone()) {
                    continue;
                }
                if let Some(entry) = self.remove_entry(dependent.as_str(), permission, securable) {
                    debug!(
                        grantor = %grantor,
                        grantee = %dependent,
                        permission = %permission,
                        securable = %securable,
                        "Cascading revoke"
                    );
                    removed.push(entry);
                }
                queue.push_back(dependent);
            }
        }
        removed
    }

    fn get_mut(
        &mut self,
        principal: &str,
        permission: PermissionKind,
        securable: &str,
    ) -> Option<&mut PermissionEntry> {
        self.entries
            .get_mut(principal)?
            .get_mut(securable)?
            .get_mut(&permission)
    }

    fn remove_entry(
        &mut self,
        principal: &str,
        permission: PermissionKind,
        securable: &str,
    ) -> Option<PermissionEntry> {
        let by_securable = self.entries.get_mut(principal)?;
        let at = by_securable.get_mut(securable)?;
        let removed = at.remove(&permission)?;
        if at.is_empty() {
            by_securable.remove(securable);
        }
        if by_securable.is_empty() {
            self.entries.remove(principal);
        }
        self.len -= 1;
        Some(removed)
    }
}
