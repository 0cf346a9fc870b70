#![allow(dead_code)]

use std::sync::Arc;

use oxide_acl::{
    AccessControl, AclConfig, Decision, MemoryAuditSink, PermissionKind, PrincipalKind,
    SecurableKind,
};

pub const SERVER: &str = "SQLPROD01";
pub const DATABASE: &str = "HRSystem";
pub const SCHEMA: &str = "HR";
pub const EMP_DETAILS: &str = "HR.EMP_Details";
pub const SALARY: &str = "HR.EMP_Details.Salary";
pub const EMAIL: &str = "HR.EMP_Details.Email";
pub const SALARY_HISTORY: &str = "HR.SalaryHistory";

/// The HR catalog used throughout the tests:
///
/// ```text
/// SQLPROD01 (server)
/// └── HRSystem (database, owned by dbo)
///     └── HR (schema)
///         ├── HR.EMP_Details (object)
///         │   ├── HR.EMP_Details.Salary (column)
///         │   └── HR.EMP_Details.Email (column)
///         └── HR.SalaryHistory (object)
/// ```
///
/// Principals: users `dbo`, `Clerk1`, `Clerk2`, `Auditor`; role `HRClerks`
/// with members `Clerk1` and `Clerk2`. No entries.
pub fn hr_system() -> AccessControl {
    hr_system_with_config(AclConfig::default())
}

pub fn hr_system_with_config(config: AclConfig) -> AccessControl {
    let acl = AccessControl::with_config(config);
    populate(&acl);
    acl
}

/// Same catalog, with audit events captured in memory.
pub fn hr_system_audited() -> (AccessControl, Arc<MemoryAuditSink>) {
    let sink = Arc::new(MemoryAuditSink::new());
    let acl = AccessControl::new().with_audit_sink(sink.clone());
    populate(&acl);
    sink.take();
    (acl, sink)
}

fn populate(acl: &AccessControl) {
    for user in ["dbo", "Clerk1", "Clerk2", "Auditor"] {
        acl.add_principal(user, PrincipalKind::User)
            .unwrap_or_else(|e| panic!("Failed to add user {user}: {e}"));
    }
    acl.add_principal("HRClerks", PrincipalKind::Role)
        .unwrap_or_else(|e| panic!("Failed to add role HRClerks: {e}"));
    for clerk in ["Clerk1", "Clerk2"] {
        acl.add_membership(clerk, "HRClerks")
            .unwrap_or_else(|e| panic!("Failed to add {clerk} to HRClerks: {e}"));
    }

    let securables = [
        (SERVER, SecurableKind::Server, None),
        (DATABASE, SecurableKind::Database, Some(SERVER)),
        (SCHEMA, SecurableKind::Schema, Some(DATABASE)),
        (EMP_DETAILS, SecurableKind::Object, Some(SCHEMA)),
        (SALARY, SecurableKind::Column, Some(EMP_DETAILS)),
        (EMAIL, SecurableKind::Column, Some(EMP_DETAILS)),
        (SALARY_HISTORY, SecurableKind::Object, Some(SCHEMA)),
    ];
    for (id, kind, parent) in securables {
        acl.add_securable(id, kind, parent)
            .unwrap_or_else(|e| panic!("Failed to add securable {id}: {e}"));
    }
    acl.set_owner(DATABASE, "dbo")
        .unwrap_or_else(|e| panic!("Failed to set owner of {DATABASE}: {e}"));
}

pub fn assert_decision(
    acl: &AccessControl,
    principal: &str,
    permission: PermissionKind,
    securable: &str,
    expected: Decision,
) {
    let actual = acl
        .resolve(principal, permission, securable)
        .unwrap_or_else(|e| {
            panic!("Failed to resolve {permission} on {securable} for {principal}: {e}")
        });
    assert_eq!(
        actual, expected,
        "{permission} on {securable} for {principal}: expected {expected}, got {actual}"
    );
}

pub fn assert_allowed(
    acl: &AccessControl,
    principal: &str,
    permission: PermissionKind,
    securable: &str,
) {
    assert_decision(acl, principal, permission, securable, Decision::Allow);
}

pub fn assert_denied(
    acl: &AccessControl,
    principal: &str,
    permission: PermissionKind,
    securable: &str,
) {
    assert_decision(acl, principal, permission, securable, Decision::Deny);
}
