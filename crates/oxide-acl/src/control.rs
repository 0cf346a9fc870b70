//! Thread-safe access control over the whole permission model.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};
use tracing::{debug, info};

use crate::audit::{AuditEvent, AuditSink, NullAuditSink, TracingAuditSink};
use crate::config::AclConfig;
use crate::error::{AclError, Result};
use crate::ownership::Ownership;
use crate::permission::{Effect, EntryKey, PermissionKind};
use crate::principal::{Principal, PrincipalDirectory, PrincipalId, PrincipalKind};
use crate::resolver::{Decision, Resolution, Resolver};
use crate::securable::{SecurableHierarchy, SecurableId, SecurableKind};
use crate::snapshot::CatalogSnapshot;
use crate::store::{PermissionStore, RevokeOutcome};

/// Everything a decision depends on.
#[derive(Debug, Default, Clone)]
pub struct AclState {
    /// Users, roles and memberships.
    pub directory: PrincipalDirectory,
    /// Scope tree.
    pub hierarchy: SecurableHierarchy,
    /// Securable owners.
    pub ownership: Ownership,
    /// GRANT and DENY entries.
    pub store: PermissionStore,
}

impl AclState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A resolver over this state honouring `config`.
    #[must_use]
    pub fn resolver(&self, config: &AclConfig) -> Resolver<'_> {
        Resolver::new(&self.directory, &self.hierarchy, &self.ownership, &self.store)
            .with_superuser_bypass(config.superuser_bypass)
    }

    fn require_key(&self, principal: &str, securable: &str) -> Result<()> {
        self.directory.require(principal)?;
        self.hierarchy.require(securable)?;
        Ok(())
    }
}

/// The permission model behind a readers-writer lock.
///
/// Mutations hold the write lock for their whole duration, so every
/// invariant is checked and applied atomically. Checks hold the read lock
/// and see either all or none of a concurrent mutation. Audit events are
/// numbered under the write lock and delivered after it is released.
///
/// ```rust
/// use oxide_acl::{AccessControl, Decision, PermissionKind, PrincipalKind, SecurableKind};
///
/// let acl = AccessControl::new();
/// acl.add_principal("dbo", PrincipalKind::User).unwrap();
/// acl.add_principal("Clerk1", PrincipalKind::User).unwrap();
/// acl.add_principal("HRClerks", PrincipalKind::Role).unwrap();
/// acl.add_membership("Clerk1", "HRClerks").unwrap();
///
/// acl.add_securable("SQLPROD01", SecurableKind::Server, None).unwrap();
/// acl.add_securable("HRSystem", SecurableKind::Database, Some("SQLPROD01")).unwrap();
/// acl.add_securable("HR", SecurableKind::Schema, Some("HRSystem")).unwrap();
/// acl.add_securable("HR.SalaryHistory", SecurableKind::Object, Some("HR")).unwrap();
///
/// acl.grant("HRClerks", PermissionKind::Select, "HR.SalaryHistory", false, "dbo").unwrap();
/// assert_eq!(
///     acl.resolve("Clerk1", PermissionKind::Select, "HR.SalaryHistory").unwrap(),
///     Decision::Allow
/// );
///
/// acl.deny("HRClerks", PermissionKind::Select, "HR.SalaryHistory", "dbo").unwrap();
/// assert_eq!(
///     acl.resolve("Clerk1", PermissionKind::Select, "HR.SalaryHistory").unwrap(),
///     Decision::Deny
/// );
/// ```
pub struct AccessControl {
    state: RwLock<AclState>,
    config: AclConfig,
    audit: Arc<dyn AuditSink>,
    sequence: AtomicU64,
}

impl std::fmt::Debug for AccessControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessControl")
            .field("state", &*self.state.read())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for AccessControl {
    fn default() -> Self {
        Self::new()
    }
}

impl AccessControl {
    /// Creates an empty instance with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(AclConfig::default())
    }

    /// Creates an empty instance.
    #[must_use]
    pub fn with_config(config: AclConfig) -> Self {
        Self::from_state(AclState::new(), config)
    }

    /// Wraps an existing state.
    #[must_use]
    pub fn from_state(state: AclState, config: AclConfig) -> Self {
        let audit: Arc<dyn AuditSink> = if config.audit_log {
            Arc::new(TracingAuditSink)
        } else {
            Arc::new(NullAuditSink)
        };
        Self {
            state: RwLock::new(state),
            config,
            audit,
            sequence: AtomicU64::new(0),
        }
    }

    /// Builds an instance from a catalog snapshot.
    pub fn from_snapshot(snapshot: &CatalogSnapshot, config: AclConfig) -> Result<Self> {
        let state = AclState::from_snapshot(snapshot)?;
        info!(
            principals = state.directory.len(),
            securables = state.hierarchy.len(),
            entries = state.store.len(),
            "Loaded catalog snapshot"
        );
        Ok(Self::from_state(state, config))
    }

    /// Replaces the audit sink.
    #[must_use]
    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = sink;
        self
    }

    /// The configuration this instance was built with.
    #[must_use]
    pub fn config(&self) -> &AclConfig {
        &self.config
    }

    /// Read access to the whole state.
    ///
    /// Mutations wait while the guard is held, so several checks made
    /// through it see the same state.
    pub fn read(&self) -> RwLockReadGuard<'_, AclState> {
        self.state.read()
    }

    /// Exports the current state.
    #[must_use]
    pub fn snapshot(&self) -> CatalogSnapshot {
        self.state.read().to_snapshot()
    }

    // -------------------------------------------------------------------
    // Principals
    // -------------------------------------------------------------------

    /// Adds a user or role.
    pub fn add_principal(&self, id: &str, kind: PrincipalKind) -> Result<()> {
        self.state.write().directory.add_principal(id, kind)?;
        info!(principal = %id, kind = %kind, "Principal added");
        Ok(())
    }

    /// Sets or clears the superuser flag of a principal.
    pub fn set_superuser(&self, id: &str, superuser: bool) -> Result<()> {
        self.state.write().directory.set_superuser(id, superuser)?;
        info!(principal = %id, superuser, "Superuser flag changed");
        Ok(())
    }

    /// Makes `member` a member of `role`. See
    /// [`PrincipalDirectory::add_membership`].
    pub fn add_membership(&self, member: &str, role: &str) -> Result<bool> {
        let added = self.state.write().directory.add_membership(member, role)?;
        if added {
            info!(member = %member, role = %role, "Membership added");
        }
        Ok(added)
    }

    /// Removes a direct membership.
    pub fn remove_membership(&self, member: &str, role: &str) -> Result<bool> {
        let removed = self
            .state
            .write()
            .directory
            .remove_membership(member, role)?;
        if removed {
            info!(member = %member, role = %role, "Membership removed");
        }
        Ok(removed)
    }

    /// Removes a principal and every entry it holds.
    ///
    /// Fails while it owns securables, has members, or is the grantor of
    /// entries held by others.
    pub fn remove_principal(&self, id: &str) -> Result<Principal> {
        let mut state = self.state.write();
        state.directory.require(id)?;
        if state.store.is_grantor(id) {
            return Err(AclError::PrincipalIsGrantor(PrincipalId::new(id)));
        }

        let AclState {
            directory,
            ownership,
            store,
            ..
        } = &mut *state;
        let principal = directory.remove_principal(id, ownership)?;
        let dropped = store.remove_principal(id);
        drop(state);

        info!(principal = %id, entries = dropped.len(), "Principal removed");
        Ok(principal)
    }

    /// Roles `principal` belongs to, nearest first.
    pub fn transitive_roles(&self, principal: &str) -> Result<Vec<PrincipalId>> {
        self.state.read().directory.transitive_roles(principal)
    }

    // -------------------------------------------------------------------
    // Securables
    // -------------------------------------------------------------------

    /// Adds a securable. See [`SecurableHierarchy::add_securable`].
    pub fn add_securable(&self, id: &str, kind: SecurableKind, parent: Option<&str>) -> Result<()> {
        self.state
            .write()
            .hierarchy
            .add_securable(id, kind, parent)?;
        debug!(securable = %id, kind = %kind, parent = ?parent, "Securable added");
        Ok(())
    }

    /// Removes a securable together with the entries and ownership records
    /// at every removed id.
    pub fn remove_securable(&self, id: &str) -> Result<Vec<SecurableId>> {
        let mut state = self.state.write();
        let removed = state.hierarchy.remove_securable(id)?;
        let dropped = state.store.remove_securables(&removed);
        state.ownership.remove_securables(&removed);
        drop(state);

        info!(
            securable = %id,
            removed = removed.len(),
            entries = dropped.len(),
            "Securable removed"
        );
        Ok(removed)
    }

    /// The securable and its ancestors, innermost first.
    pub fn ancestor_chain(&self, securable: &str) -> Result<Vec<SecurableId>> {
        Ok(self
            .state
            .read()
            .hierarchy
            .ancestor_chain(securable)?
            .map(|s| s.id.clone())
            .collect())
    }

    /// Transfers ownership of a securable, returning the previous owner.
    pub fn set_owner(&self, securable: &str, owner: &str) -> Result<Option<PrincipalId>> {
        let mut state = self.state.write();
        let owner_id = state.directory.require(owner)?.id.clone();
        let securable_id = state.hierarchy.require(securable)?.id.clone();
        let previous = state.ownership.set_owner(securable_id, owner_id);
        drop(state);

        info!(securable = %securable, owner = %owner, previous = ?previous, "Owner changed");
        Ok(previous)
    }

    /// Current owner of a securable.
    #[must_use]
    pub fn owner_of(&self, securable: &str) -> Option<PrincipalId> {
        self.state.read().ownership.owner_of(securable).cloned()
    }

    // -------------------------------------------------------------------
    // GRANT / DENY / REVOKE
    // -------------------------------------------------------------------

    /// Upserts the entry for `(principal, permission, securable)`.
    ///
    /// Returns the effect the key held before. See
    /// [`PermissionStore::write`].
    pub fn write(
        &self,
        principal: &str,
        permission: PermissionKind,
        securable: &str,
        effect: Effect,
        grant_option: bool,
        grantor: &str,
    ) -> Result<Option<Effect>> {
        let (before, events) = {
            let mut state = self.state.write();
            state.require_key(principal, securable)?;
            state.directory.require(grantor)?;
            let before = state
                .store
                .write(principal, permission, securable, effect, grant_option, grantor)?;
            let event = AuditEvent::written(
                PrincipalId::new(grantor),
                EntryKey::new(principal, permission, securable),
                before,
                effect,
            );
            (before, self.stamp(vec![event]))
        };

        self.emit(&events);
        Ok(before)
    }

    /// `GRANT permission ON securable TO principal [WITH GRANT OPTION]`.
    pub fn grant(
        &self,
        principal: &str,
        permission: PermissionKind,
        securable: &str,
        with_grant_option: bool,
        grantor: &str,
    ) -> Result<Option<Effect>> {
        self.write(
            principal,
            permission,
            securable,
            Effect::Grant,
            with_grant_option,
            grantor,
        )
    }

    /// `DENY permission ON securable TO principal`.
    pub fn deny(
        &self,
        principal: &str,
        permission: PermissionKind,
        securable: &str,
        grantor: &str,
    ) -> Result<Option<Effect>> {
        self.write(principal, permission, securable, Effect::Deny, false, grantor)
    }

    /// Grants on behalf of `grantor`, who must be able to delegate the
    /// permission (see [`Resolver::can_delegate`]).
    ///
    /// The check and the write happen under one write lock.
    pub fn grant_checked(
        &self,
        grantor: &str,
        principal: &str,
        permission: PermissionKind,
        securable: &str,
        with_grant_option: bool,
    ) -> Result<Option<Effect>> {
        let (before, events) = {
            let mut state = self.state.write();
            state.require_key(principal, securable)?;
            if !state
                .resolver(&self.config)
                .can_delegate(grantor, permission, securable)?
            {
                return Err(AclError::GrantOptionRequired {
                    grantor: PrincipalId::new(grantor),
                    permission,
                    securable: SecurableId::new(securable),
                });
            }
            let before = state.store.write(
                principal,
                permission,
                securable,
                Effect::Grant,
                with_grant_option,
                grantor,
            )?;
            let event = AuditEvent::written(
                PrincipalId::new(grantor),
                EntryKey::new(principal, permission, securable),
                before,
                Effect::Grant,
            );
            (before, self.stamp(vec![event]))
        };

        self.emit(&events);
        Ok(before)
    }

    /// `REVOKE permission ON securable FROM principal [CASCADE]`.
    ///
    /// See [`PermissionStore::revoke`].
    pub fn revoke(
        &self,
        principal: &str,
        permission: PermissionKind,
        securable: &str,
        cascade: bool,
    ) -> Result<RevokeOutcome> {
        let (outcome, events) = {
            let mut state = self.state.write();
            state.require_key(principal, securable)?;
            let outcome = state.store.revoke(principal, permission, securable, cascade)?;
            let events = self.stamp(AuditEvent::revoked(outcome.clone(), false));
            (outcome, events)
        };

        if !outcome.cascaded.is_empty() {
            info!(
                principal = %principal,
                permission = %permission,
                securable = %securable,
                cascaded = outcome.cascaded.len(),
                "Revoke cascaded to delegated grants"
            );
        }
        self.emit(&events);
        Ok(outcome)
    }

    /// `REVOKE GRANT OPTION FOR permission ON securable FROM principal
    /// [CASCADE]`.
    pub fn revoke_grant_option(
        &self,
        principal: &str,
        permission: PermissionKind,
        securable: &str,
        cascade: bool,
    ) -> Result<RevokeOutcome> {
        let (outcome, events) = {
            let mut state = self.state.write();
            state.require_key(principal, securable)?;
            let outcome = state
                .store
                .revoke_grant_option_only(principal, permission, securable, cascade)?;
            let events = self.stamp(AuditEvent::revoked(outcome.clone(), true));
            (outcome, events)
        };

        self.emit(&events);
        Ok(outcome)
    }

    // -------------------------------------------------------------------
    // Checks
    // -------------------------------------------------------------------

    /// Can `principal` exercise `permission` on `securable`?
    pub fn resolve(
        &self,
        principal: &str,
        permission: PermissionKind,
        securable: &str,
    ) -> Result<Decision> {
        self.state
            .read()
            .resolver(&self.config)
            .resolve(principal, permission, securable)
    }

    /// The decision plus the entries behind it.
    pub fn explain(
        &self,
        principal: &str,
        permission: PermissionKind,
        securable: &str,
    ) -> Result<Resolution> {
        self.state
            .read()
            .resolver(&self.config)
            .explain(principal, permission, securable)
    }

    /// The decision for every permission kind on one securable.
    pub fn effective_permissions(
        &self,
        principal: &str,
        securable: &str,
    ) -> Result<std::collections::BTreeMap<PermissionKind, Decision>> {
        self.state
            .read()
            .resolver(&self.config)
            .effective_permissions(principal, securable)
    }

    /// Whether `grantor` may grant `permission` on `securable` to others.
    pub fn can_delegate(
        &self,
        grantor: &str,
        permission: PermissionKind,
        securable: &str,
    ) -> Result<bool> {
        self.state
            .read()
            .resolver(&self.config)
            .can_delegate(grantor, permission, securable)
    }

    /// Numbers events in commit order. Called with the write lock held.
    fn stamp(&self, mut events: Vec<AuditEvent>) -> Vec<AuditEvent> {
        for event in &mut events {
            event.seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        }
        events
    }

    fn emit(&self, events: &[AuditEvent]) {
        for event in events {
            self.audit.record(event);
        }
    }
}
