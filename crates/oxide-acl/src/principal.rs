//! Users, roles and the role membership graph.

use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AclError, Result};
use crate::ownership::Ownership;

/// Identifier of a user or role (e.g. `Clerk1`, `HRClerks`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(String);

impl PrincipalId {
    /// Creates a principal id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for PrincipalId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PrincipalId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PrincipalId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Whether a principal is a login-style user or a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    /// A user. Users can be members of roles but have no members.
    User,
    /// A role. Roles can have users and other roles as members.
    Role,
}

impl fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Role => f.write_str("role"),
        }
    }
}

/// A user or role that can hold permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Unique identifier.
    pub id: PrincipalId,
    /// User or role.
    pub kind: PrincipalKind,
    /// Bypasses DENY checks when the resolver honours superusers.
    #[serde(default)]
    pub superuser: bool,
}

impl Principal {
    /// Creates a principal without superuser status.
    pub fn new(id: impl Into<PrincipalId>, kind: PrincipalKind) -> Self {
        Self {
            id: id.into(),
            kind,
            superuser: false,
        }
    }

    /// Returns whether this principal is a role.
    #[must_use]
    pub fn is_role(&self) -> bool {
        self.kind == PrincipalKind::Role
    }
}

/// Principals plus the membership edges between them.
///
/// Membership is a directed graph from member to role. The graph is kept
/// acyclic by [`add_membership`](Self::add_membership).
#[derive(Debug, Default, Clone)]
pub struct PrincipalDirectory {
    principals: BTreeMap<PrincipalId, Principal>,
    /// member -> roles it belongs to directly
    roles: BTreeMap<PrincipalId, BTreeSet<PrincipalId>>,
    /// role -> direct members
    members: BTreeMap<PrincipalId, BTreeSet<PrincipalId>>,
}

impl PrincipalDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a principal.
    pub fn add_principal(
        &mut self,
        id: impl Into<PrincipalId>,
        kind: PrincipalKind,
    ) -> Result<&Principal> {
        let id = id.into();
        if self.principals.contains_key(&id) {
            return Err(AclError::DuplicatePrincipal(id));
        }
        self.principals
            .insert(id.clone(), Principal::new(id.clone(), kind));
        Ok(&self.principals[&id])
    }

    /// Returns the principal with the given id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Principal> {
        self.principals.get(id)
    }

    /// Returns whether a principal with the given id exists.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.principals.contains_key(id)
    }

    /// Looks up a principal, failing with `UnknownPrincipal`.
    pub fn require(&self, id: &str) -> Result<&Principal> {
        self.get(id)
            .ok_or_else(|| AclError::UnknownPrincipal(PrincipalId::new(id)))
    }

    /// Iterates over all principals in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Principal> {
        self.principals.values()
    }

    /// Number of principals.
    #[must_use]
    pub fn len(&self) -> usize {
        self.principals.len()
    }

    /// Returns whether the directory is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.principals.is_empty()
    }

    /// Sets or clears the superuser flag.
    pub fn set_superuser(&mut self, id: &str, superuser: bool) -> Result<()> {
        let principal = self
            .principals
            .get_mut(id)
            .ok_or_else(|| AclError::UnknownPrincipal(PrincipalId::new(id)))?;
        principal.superuser = superuser;
        Ok(())
    }

    /// Makes `member` a direct member of `role`.
    ///
    /// Returns `false` if the edge already existed. Fails with
    /// `CycleDetected` if `member` is `role` or if `role` already belongs to
    /// `member`, directly or transitively. A failed call changes nothing.
    pub fn add_membership(&mut self, member: &str, role: &str) -> Result<bool> {
        let member_id = self.require(member)?.id.clone();
        let role_principal = self.require(role)?;
        if !role_principal.is_role() {
            return Err(AclError::NotARole(role_principal.id.clone()));
        }
        let role_id = role_principal.id.clone();

        if member_id == role_id
            || self
                .reachable_roles(role)
                .iter()
                .any(|r| r.as_str() == member)
        {
            return Err(AclError::CycleDetected {
                member: member_id,
                role: role_id,
            });
        }

        let inserted = self
            .roles
            .entry(member_id.clone())
            .or_default()
            .insert(role_id.clone());
        self.members.entry(role_id).or_default().insert(member_id);
        Ok(inserted)
    }

    /// Removes the direct membership of `member` in `role`.
    ///
    /// Returns whether the edge existed. Inherited memberships through other
    /// roles are unaffected.
    pub fn remove_membership(&mut self, member: &str, role: &str) -> Result<bool> {
        self.require(member)?;
        self.require(role)?;
        let removed = self
            .roles
            .get_mut(member)
            .is_some_and(|roles| roles.remove(role));
        if let Some(members) = self.members.get_mut(role) {
            members.remove(member);
        }
        Ok(removed)
    }

    /// Direct roles of a principal.
    pub fn roles_of(&self, member: &str) -> impl Iterator<Item = &PrincipalId> {
        self.roles.get(member).into_iter().flatten()
    }

    /// Direct members of a role.
    pub fn members_of(&self, role: &str) -> impl Iterator<Item = &PrincipalId> {
        self.members.get(role).into_iter().flatten()
    }

    /// All membership edges as `(member, role)` pairs.
    pub fn memberships(&self) -> impl Iterator<Item = (&PrincipalId, &PrincipalId)> {
        self.roles
            .iter()
            .flat_map(|(member, roles)| roles.iter().map(move |role| (member, role)))
    }

    /// Every role reachable from `principal` over membership edges.
    ///
    /// Roles are listed in breadth-first discovery order, nearest first,
    /// without duplicates. The principal itself is not included.
    pub fn transitive_roles(&self, principal: &str) -> Result<Vec<PrincipalId>> {
        self.require(principal)?;
        Ok(self.reachable_roles(principal))
    }

    /// Breadth-first walk with a visited set, so it terminates on any graph.
    fn reachable_roles(&self, start: &str) -> Vec<PrincipalId> {
        let mut visited: BTreeSet<&str> = BTreeSet::new();
        visited.insert(start);
        let mut queue: VecDeque<&str> = VecDeque::from([start]);
        let mut found = Vec::new();

        while let Some(current) = queue.pop_front() {
            for role in self.roles_of(current) {
                if visited.insert(role.as_str()) {
                    found.push(role.clone());
                    queue.push_back(role.as_str());
                }
            }
        }
        found
    }

    /// Returns whether the principal or any role it belongs to is a superuser.
    #[must_use]
    pub fn is_effective_superuser(&self, principal: &str) -> bool {
        self.get(principal).is_some_and(|p| p.superuser)
            || self
                .reachable_roles(principal)
                .iter()
                .any(|role| self.get(role.as_str()).is_some_and(|p| p.superuser))
    }

    /// Removes a principal together with the roles it is a member of.
    ///
    /// Fails with `PrincipalOwnsObjects` while `ownership` lists it as an
    /// owner, and with `PrincipalHasMembers` for a role with members.
    pub fn remove_principal(&mut self, id: &str, ownership: &Ownership) -> Result<Principal> {
        let principal_id = self.require(id)?.id.clone();

        let owned = ownership.owned_by(id).count();
        if owned > 0 {
            return Err(AclError::PrincipalOwnsObjects {
                principal: principal_id,
                count: owned,
            });
        }

        let members = self.members_of(id).count();
        if members > 0 {
            return Err(AclError::PrincipalHasMembers {
                role: principal_id,
                count: members,
            });
        }

        if let Some(roles) = self.roles.remove(id) {
            for role in roles {
                if let Some(members) = self.members.get_mut(&role) {
                    members.remove(id);
                }
            }
        }
        self.members.remove(id);

        self.principals
            .remove(id)
            .ok_or(AclError::UnknownPrincipal(principal_id))
    }
}
