//! # oxide-acl
//!
//! GRANT / DENY / REVOKE permission resolution for SQL-style catalogs.
//!
//! This crate provides:
//! - A [`PrincipalDirectory`] of users and roles with an acyclic membership graph
//! - A [`SecurableHierarchy`] of server, database, schema, object and column scopes
//! - A [`PermissionStore`] of explicit GRANT and DENY entries, with exact and
//!   cascading REVOKE
//! - A [`Resolver`] that turns all of the above into an Allow/Deny decision
//! - [`AccessControl`], a thread-safe facade with audit notifications
//!
//! ## Precedence
//!
//! A request is answered from every entry held by the principal or by a role
//! it belongs to (transitively), at the securable or at any enclosing scope.
//! DENY anywhere in that set wins. Otherwise a GRANT allows. Otherwise access
//! is denied by default.
//!
//! ```rust
//! use oxide_acl::{AccessControl, Decision, PermissionKind, PrincipalKind, SecurableKind};
//!
//! let acl = AccessControl::new();
//! acl.add_principal("dbo", PrincipalKind::User).unwrap();
//! acl.add_principal("Clerk1", PrincipalKind::User).unwrap();
//! acl.add_principal("HRClerks", PrincipalKind::Role).unwrap();
//! acl.add_membership("Clerk1", "HRClerks").unwrap();
//!
//! acl.add_securable("SQLPROD01", SecurableKind::Server, None).unwrap();
//! acl.add_securable("HRSystem", SecurableKind::Database, Some("SQLPROD01")).unwrap();
//! acl.add_securable("HR", SecurableKind::Schema, Some("HRSystem")).unwrap();
//! acl.add_securable("HR.EMP_Details", SecurableKind::Object, Some("HR")).unwrap();
//! acl.add_securable("HR.EMP_Details.Salary", SecurableKind::Column, Some("HR.EMP_Details"))
//!     .unwrap();
//! acl.add_securable("HR.EMP_Details.Email", SecurableKind::Column, Some("HR.EMP_Details"))
//!     .unwrap();
//!
//! // Schema-wide read access, but not the salary column.
//! acl.grant("HRClerks", PermissionKind::Select, "HR", false, "dbo").unwrap();
//! acl.deny("HRClerks", PermissionKind::Select, "HR.EMP_Details.Salary", "dbo").unwrap();
//!
//! let select = PermissionKind::Select;
//! assert_eq!(acl.resolve("Clerk1", select, "HR.EMP_Details.Salary").unwrap(), Decision::Deny);
//! assert_eq!(acl.resolve("Clerk1", select, "HR.EMP_Details.Email").unwrap(), Decision::Allow);
//! ```
//!
//! ## Revoking
//!
//! [`AccessControl::revoke`] removes one entry at one scope and never
//! touches entries elsewhere. Grants delegated through `WITH GRANT OPTION`
//! must be revoked with `cascade`, otherwise the call fails with
//! [`AclError::DependentGrantsExist`].
//!
//! ## Auditing
//!
//! Every change is reported to an [`AuditSink`]. By default events go to
//! `tracing`; see [`MemoryAuditSink`] and [`ChannelAuditSink`] for other
//! destinations.

pub mod audit;
mod config;
mod control;
mod error;
mod ownership;
mod permission;
mod principal;
mod resolver;
mod securable;
pub mod snapshot;
mod store;

pub use audit::{
    AuditEvent, AuditOperation, AuditSink, ChannelAuditSink, MemoryAuditSink, NullAuditSink,
    TracingAuditSink,
};
pub use config::AclConfig;
pub use control::{AccessControl, AclState};
pub use error::{AclError, Result};
pub use ownership::Ownership;
pub use permission::{Effect, EntryKey, PermissionEntry, PermissionKind};
pub use principal::{Principal, PrincipalDirectory, PrincipalId, PrincipalKind};
pub use resolver::{Decision, Reason, Resolution, Resolver};
pub use securable::{AncestorChain, Securable, SecurableHierarchy, SecurableId, SecurableKind};
pub use snapshot::CatalogSnapshot;
pub use store::{PermissionStore, RevokeOutcome};
