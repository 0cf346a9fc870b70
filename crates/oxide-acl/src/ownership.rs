//! Securable ownership (`ALTER AUTHORIZATION`).

use std::collections::BTreeMap;

use crate::principal::PrincipalId;
use crate::securable::SecurableId;

/// One owner per securable.
#[derive(Debug, Default, Clone)]
pub struct Ownership {
    owners: BTreeMap<SecurableId, PrincipalId>,
}

impl Ownership {
    /// Creates an empty ownership map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the owner of a securable, returning the previous owner.
    pub fn set_owner(&mut self, securable: SecurableId, owner: PrincipalId) -> Option<PrincipalId> {
        self.owners.insert(securable, owner)
    }

    /// Returns the owner of a securable.
    #[must_use]
    pub fn owner_of(&self, securable: &str) -> Option<&PrincipalId> {
        self.owners.get(securable)
    }

    /// Securables owned by a principal.
    pub fn owned_by<'a>(&'a self, principal: &'a str) -> impl Iterator<Item = &'a SecurableId> {
        self.owners
            .iter()
            .filter(move |(_, owner)| owner.as_str() == principal)
            .map(|(securable, _)| securable)
    }

    /// Drops the ownership records of removed securables.
    pub fn remove_securables(&mut self, removed: &[SecurableId]) {
        for securable in removed {
            self.owners.remove(securable);
        }
    }

    /// All `(securable, owner)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&SecurableId, &PrincipalId)> {
        self.owners.iter()
    }
}
