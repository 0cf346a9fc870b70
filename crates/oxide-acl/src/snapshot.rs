//! JSON catalog snapshots.
//!
//! A snapshot is how an external schema catalog hands its securables,
//! principals and existing permissions to this crate, and how the current
//! state is exported again.
//!
//! ```json
//! {
//!   "principals": [
//!     { "id": "dbo", "kind": "user" },
//!     { "id": "HRClerks", "kind": "role" }
//!   ],
//!   "memberships": [],
//!   "securables": [
//!     { "id": "SQLPROD01", "kind": "server" },
//!     { "id": "HRSystem", "kind": "database", "parent": "SQLPROD01" }
//!   ],
//!   "owners": [{ "securable": "HRSystem", "owner": "dbo" }],
//!   "entries": [{
//!     "principal": "HRClerks", "permission": "SELECT", "securable": "HRSystem",
//!     "effect": "grant", "granted_by": "dbo"
//!   }]
//! }
//! ```

use std::collections::{BTreeSet, VecDeque};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::control::AclState;
use crate::error::{AclError, Result};
use crate::permission::PermissionEntry;
use crate::principal::{Principal, PrincipalId};
use crate::securable::{Securable, SecurableId};

/// A `member` belongs directly to `role`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    /// The member user or role.
    pub member: PrincipalId,
    /// The role.
    pub role: PrincipalId,
}

/// `owner` owns `securable`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRecord {
    /// The owned securable.
    pub securable: SecurableId,
    /// Its owner.
    pub owner: PrincipalId,
}

/// Serializable form of an [`AclState`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSnapshot {
    /// Users and roles.
    pub principals: Vec<Principal>,
    /// Direct membership edges.
    pub memberships: Vec<Membership>,
    /// Securables, in any order.
    pub securables: Vec<Securable>,
    /// Ownership records.
    pub owners: Vec<OwnerRecord>,
    /// GRANT and DENY entries.
    pub entries: Vec<PermissionEntry>,
}

impl CatalogSnapshot {
    /// Parses a snapshot from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a snapshot from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Serializes the snapshot as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes the snapshot to a JSON file.
    pub fn write_file(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }
}

impl AclState {
    /// Builds a state from a snapshot, enforcing every invariant the
    /// individual operations enforce.
    pub fn from_snapshot(snapshot: &CatalogSnapshot) -> Result<Self> {
        let mut state = Self::new();

        for principal in &snapshot.principals {
            state
                .directory
                .add_principal(principal.id.clone(), principal.kind)?;
            if principal.superuser {
                state
                    .directory
                    .set_superuser(principal.id.as_str(), true)?;
            }
        }

        for membership in &snapshot.memberships {
            state
                .directory
                .add_membership(membership.member.as_str(), membership.role.as_str())?;
        }

        insert_securables(&mut state, &snapshot.securables)?;

        for record in &snapshot.owners {
            let owner = state.directory.require(record.owner.as_str())?.id.clone();
            let securable = state.hierarchy.require(record.securable.as_str())?.id.clone();
            if state.ownership.set_owner(securable, owner).is_some() {
                return Err(AclError::Snapshot(format!(
                    "securable '{}' has more than one owner",
                    record.securable
                )));
            }
        }

        for entry in &snapshot.entries {
            state.require_entry_ids(entry)?;
            let previous = state.store.write(
                entry.principal.as_str(),
                entry.permission,
                entry.securable.as_str(),
                entry.effect,
                entry.grant_option,
                entry.granted_by.as_str(),
            )?;
            if previous.is_some() {
                return Err(AclError::Snapshot(format!("duplicate entry {}", entry.key())));
            }
        }

        Ok(state)
    }

    /// Exports the state. Securables are listed parents first.
    #[must_use]
    pub fn to_snapshot(&self) -> CatalogSnapshot {
        let mut securables = Vec::with_capacity(self.hierarchy.len());
        let mut queue: VecDeque<&Securable> = self
            .hierarchy
            .iter()
            .filter(|s| s.parent.is_none())
            .collect();
        while let Some(securable) = queue.pop_front() {
            securables.push(securable.clone());
            queue.extend(
                self.hierarchy
                    .children(securable.id.as_str())
                    .filter_map(|child| self.hierarchy.get(child.as_str())),
            );
        }

        CatalogSnapshot {
            principals: self.directory.iter().cloned().collect(),
            memberships: self
                .directory
                .memberships()
                .map(|(member, role)| Membership {
                    member: member.clone(),
                    role: role.clone(),
                })
                .collect(),
            securables,
            owners: self
                .ownership
                .iter()
                .map(|(securable, owner)| OwnerRecord {
                    securable: securable.clone(),
                    owner: owner.clone(),
                })
                .collect(),
            entries: self.store.iter().cloned().collect(),
        }
    }

    fn require_entry_ids(&self, entry: &PermissionEntry) -> Result<()> {
        self.directory.require(entry.principal.as_str())?;
        self.directory.require(entry.granted_by.as_str())?;
        self.hierarchy.require(entry.securable.as_str())?;
        Ok(())
    }
}

/// Inserts securables parents first, whatever order they are listed in.
fn insert_securables(state: &mut AclState, securables: &[Securable]) -> Result<()> {
    let mut pending: Vec<&Securable> = securables.iter().collect();
    let mut inserted: BTreeSet<&str> = BTreeSet::new();

    while !pending.is_empty() {
        let before = pending.len();
        let mut deferred = Vec::new();
        for securable in pending {
            let ready = securable
                .parent
                .as_ref()
                .is_none_or(|parent| inserted.contains(parent.as_str()));
            if ready {
                state.hierarchy.add_securable(
                    securable.id.clone(),
                    securable.kind,
                    securable.parent.as_ref().map(SecurableId::as_str),
                )?;
                inserted.insert(securable.id.as_str());
            } else {
                deferred.push(securable);
            }
        }
        if deferred.len() == before {
            let names: Vec<String> = deferred
                .iter()
                .map(|s| {
                    format!(
                        "'{}' (parent '{}')",
                        s.id,
                        s.parent.as_ref().map_or("", SecurableId::as_str)
                    )
                })
                .collect();
            return Err(AclError::Snapshot(format!(
                "securables with missing or cyclic parents: {}",
                names.join(", ")
            )));
        }
        pending = deferred;
    }
    Ok(())
}
