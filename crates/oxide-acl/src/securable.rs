//! The scope tree permissions apply to: server, database, schema, object,
//! column.

use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AclError, Result};

/// Identifier of a securable (e.g. `HRSystem`, `HR.EMP_Details.Salary`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecurableId(String);

impl SecurableId {
    /// Creates a securable id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SecurableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for SecurableId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SecurableId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SecurableId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Scope level of a securable, outermost first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurableKind {
    /// The server instance; the root of every chain.
    Server,
    /// A database on the server.
    Database,
    /// A schema inside a database.
    Schema,
    /// A table, view, procedure or function inside a schema.
    Object,
    /// A column of a table or view.
    Column,
}

impl SecurableKind {
    /// The only kind that may directly contain this kind.
    ///
    /// `None` for [`Server`](Self::Server), which has no parent.
    #[must_use]
    pub const fn parent_kind(self) -> Option<Self> {
        match self {
            Self::Server => None,
            Self::Database => Some(Self::Server),
            Self::Schema => Some(Self::Database),
            Self::Object => Some(Self::Schema),
            Self::Column => Some(Self::Object),
        }
    }

    /// Whether removing a securable of this kind requires it to be empty.
    ///
    /// Objects take their columns with them, like `DROP TABLE`.
    #[must_use]
    pub const fn requires_empty_on_remove(self) -> bool {
        matches!(self, Self::Server | Self::Database | Self::Schema)
    }
}

impl fmt::Display for SecurableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Server => "server",
            Self::Database => "database",
            Self::Schema => "schema",
            Self::Object => "object",
            Self::Column => "column",
        };
        f.write_str(name)
    }
}

/// A node of the scope tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Securable {
    /// Unique identifier.
    pub id: SecurableId,
    /// Scope level.
    pub kind: SecurableKind,
    /// Enclosing securable; `None` only for a server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<SecurableId>,
}

/// Tree of securables with total parent chains.
#[derive(Debug, Default, Clone)]
pub struct SecurableHierarchy {
    securables: BTreeMap<SecurableId, Securable>,
    children: BTreeMap<SecurableId, BTreeSet<SecurableId>>,
}

impl SecurableHierarchy {
    /// Creates an empty hierarchy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a securable under `parent`.
    ///
    /// The parent must exist and be of the kind that directly contains
    /// `kind`; a server must be added without a parent.
    pub fn add_securable(
        &mut self,
        id: impl Into<SecurableId>,
        kind: SecurableKind,
        parent: Option<&str>,
    ) -> Result<&Securable> {
        let id = id.into();
        if self.securables.contains_key(&id) {
            return Err(AclError::DuplicateSecurable(id));
        }

        let parent = match parent {
            Some(parent_id) => Some(self.require(parent_id)?),
            None => None,
        };
        let parent_kind = parent.map(|p| p.kind);
        if kind.parent_kind() != parent_kind {
            return Err(AclError::InvalidParent {
                child: kind,
                parent: parent_kind,
            });
        }
        let parent = parent.map(|p| p.id.clone());

        if let Some(parent_id) = &parent {
            self.children
                .entry(parent_id.clone())
                .or_default()
                .insert(id.clone());
        }
        self.securables.insert(
            id.clone(),
            Securable {
                id: id.clone(),
                kind,
                parent,
            },
        );
        Ok(&self.securables[&id])
    }

    /// Returns the securable with the given id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Securable> {
        self.securables.get(id)
    }

    /// Returns whether a securable with the given id exists.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.securables.contains_key(id)
    }

    /// Looks up a securable, failing with `UnknownSecurable`.
    pub fn require(&self, id: &str) -> Result<&Securable> {
        self.get(id)
            .ok_or_else(|| AclError::UnknownSecurable(SecurableId::new(id)))
    }

    /// Direct children of a securable.
    pub fn children(&self, id: &str) -> impl Iterator<Item = &SecurableId> {
        self.children.get(id).into_iter().flatten()
    }

    /// Iterates over all securables in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Securable> {
        self.securables.values()
    }

    /// Number of securables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.securables.len()
    }

    /// Returns whether the hierarchy is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.securables.is_empty()
    }

    /// The securable followed by each of its ancestors up to the server.
    ///
    /// This is the order in which scopes are searched. The returned iterator
    /// is `Clone`, so the walk can be restarted.
    pub fn ancestor_chain(&self, id: &str) -> Result<AncestorChain<'_>> {
        let start = self.require(id)?;
        Ok(AncestorChain {
            hierarchy: self,
            next: Some(start),
            remaining: self.securables.len(),
        })
    }

    /// Removes a securable.
    ///
    /// Servers, databases and schemas must be empty. Removing an object also
    /// removes its columns. Returns every removed id, the securable itself
    /// first.
    pub fn remove_securable(&mut self, id: &str) -> Result<Vec<SecurableId>> {
        let securable = self.require(id)?;
        let kind = securable.kind;
        let securable_id = securable.id.clone();
        let parent = securable.parent.clone();

        let children: Vec<SecurableId> = self.children(id).cloned().collect();
        if kind.requires_empty_on_remove() && !children.is_empty() {
            return Err(AclError::NotEmpty {
                id: securable_id,
                children: children.len(),
            });
        }

        let mut removed = vec![securable_id];
        removed.extend(children);
        for removed_id in &removed {
            self.securables.remove(removed_id);
            self.children.remove(removed_id);
        }
        if let Some(parent) = parent {
            if let Some(siblings) = self.children.get_mut(&parent) {
                siblings.remove(id);
            }
        }
        Ok(removed)
    }
}

/// Iterator over a securable and its ancestors, innermost first.
#[derive(Debug, Clone)]
pub struct AncestorChain<'a> {
    hierarchy: &'a SecurableHierarchy,
    next: Option<&'a Securable>,
    remaining: usize,
}

impl<'a> Iterator for AncestorChain<'a> {
    type Item = &'a Securable;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let current = self.next?;
        self.remaining -= 1;
        self.next = current
            .parent
            .as_ref()
            .and_then(|parent| self.hierarchy.get(parent.as_str()));
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hierarchy() -> SecurableHierarchy {
        let mut h = SecurableHierarchy::new();
        h.add_securable("SQLPROD01", SecurableKind::Server, None)
            .unwrap();
        h.add_securable("HRSystem", SecurableKind::Database, Some("SQLPROD01"))
            .unwrap();
        h.add_securable("HR", SecurableKind::Schema, Some("HRSystem"))
            .unwrap();
        h.add_securable("HR.EMP_Details", SecurableKind::Object, Some("HR"))
            .unwrap();
        h.add_securable(
            "HR.EMP_Details.Salary",
            SecurableKind::Column,
            Some("HR.EMP_Details"),
        )
        .unwrap();
        h.add_securable(
            "HR.EMP_Details.Email",
            SecurableKind::Column,
            Some("HR.EMP_Details"),
        )
        .unwrap();
        h
    }

    #[test]
    fn test_ancestor_chain_order() {
        let h = hierarchy();
        let chain: Vec<&str> = h
            .ancestor_chain("HR.EMP_Details.Salary")
            .unwrap()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(
            chain,
            vec![
                "HR.EMP_Details.Salary",
                "HR.EMP_Details",
                "HR",
                "HRSystem",
                "SQLPROD01"
            ]
        );
    }

    #[test]
    fn test_ancestor_chain_restartable() {
        let h = hierarchy();
        let chain = h.ancestor_chain("HR").unwrap();
        assert_eq!(chain.clone().count(), 3);
        assert_eq!(chain.count(), 3);
    }

    #[test]
    fn test_server_chain_is_itself() {
        let h = hierarchy();
        let chain: Vec<_> = h.ancestor_chain("SQLPROD01").unwrap().collect();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].kind, SecurableKind::Server);
    }

    #[test]
    fn test_invalid_parent_kinds() {
        let mut h = hierarchy();
        let err = h
            .add_securable("HR.Bad", SecurableKind::Column, Some("HR"))
            .unwrap_err();
        assert!(matches!(
            err,
            AclError::InvalidParent {
                child: SecurableKind::Column,
                parent: Some(SecurableKind::Schema)
            }
        ));

        let err = h
            .add_securable("Orphan", SecurableKind::Schema, None)
            .unwrap_err();
        assert!(matches!(err, AclError::InvalidParent { parent: None, .. }));

        let err = h
            .add_securable("Nested", SecurableKind::Server, Some("SQLPROD01"))
            .unwrap_err();
        assert!(matches!(err, AclError::InvalidParent { .. }));
        assert!(!h.contains("HR.Bad"));
    }

    #[test]
    fn test_unknown_parent() {
        let mut h = hierarchy();
        let err = h
            .add_securable("Sales", SecurableKind::Schema, Some("Missing"))
            .unwrap_err();
        assert!(matches!(err, AclError::UnknownSecurable(_)));
    }

    #[test]
    fn test_duplicate_securable() {
        let mut h = hierarchy();
        let err = h
            .add_securable("HR", SecurableKind::Schema, Some("HRSystem"))
            .unwrap_err();
        assert!(matches!(err, AclError::DuplicateSecurable(_)));
    }

    #[test]
    fn test_remove_non_empty_schema_fails() {
        let mut h = hierarchy();
        let err = h.remove_securable("HR").unwrap_err();
        assert!(matches!(err, AclError::NotEmpty { children: 1, .. }));
        assert!(h.contains("HR"));
    }

    #[test]
    fn test_remove_object_takes_columns() {
        let mut h = hierarchy();
        let removed = h.remove_securable("HR.EMP_Details").unwrap();
        assert_eq!(removed.len(), 3);
        assert_eq!(removed[0].as_str(), "HR.EMP_Details");
        assert!(!h.contains("HR.EMP_Details.Salary"));
        assert_eq!(h.children("HR").count(), 0);

        // the schema is empty now
        h.remove_securable("HR").unwrap();
    }

    #[test]
    fn test_remove_column() {
        let mut h = hierarchy();
        h.remove_securable("HR.EMP_Details.Email").unwrap();
        assert_eq!(h.children("HR.EMP_Details").count(), 1);
    }
}
