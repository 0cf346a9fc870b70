//! REVOKE, REVOKE GRANT OPTION and cascading through delegated grants.

mod common;

use common::*;
use oxide_acl::{AclError, AuditOperation, PermissionKind, PrincipalKind};

const SELECT: PermissionKind = PermissionKind::Select;

fn with_delegates() -> oxide_acl::AccessControl {
    let acl = hr_system();
    for user in ["A", "B", "C"] {
        acl.add_principal(user, PrincipalKind::User).unwrap();
    }
    acl
}

#[test]
fn test_revoke_removes_only_the_exact_key() {
    let acl = hr_system();
    acl.grant("Clerk1", SELECT, SCHEMA, false, "dbo").unwrap();
    acl.grant("Clerk1", SELECT, EMP_DETAILS, false, "dbo").unwrap();
    acl.grant("HRClerks", SELECT, EMP_DETAILS, false, "dbo")
        .unwrap();
    acl.grant("Clerk1", PermissionKind::Update, EMP_DETAILS, false, "dbo")
        .unwrap();

    let outcome = acl.revoke("Clerk1", SELECT, EMP_DETAILS, false).unwrap();
    assert!(outcome.target.is_some());
    assert!(outcome.cascaded.is_empty());

    let state = acl.read();
    assert_eq!(state.store.len(), 3);
    assert!(state.store.get("Clerk1", SELECT, EMP_DETAILS).is_none());
    assert!(state.store.get("Clerk1", SELECT, SCHEMA).is_some());
    assert!(state.store.get("HRClerks", SELECT, EMP_DETAILS).is_some());
    assert!(state.store.get("Clerk1", PermissionKind::Update, EMP_DETAILS).is_some());
}

#[test]
fn test_revoke_does_not_undo_inherited_access() {
    let acl = hr_system();
    acl.grant("Clerk1", SELECT, SCHEMA, false, "dbo").unwrap();
    acl.grant("Clerk1", SELECT, SALARY, false, "dbo").unwrap();
    acl.revoke("Clerk1", SELECT, SALARY, false).unwrap();
    assert_allowed(&acl, "Clerk1", SELECT, SALARY);
}

#[test]
fn test_revoke_deny_restores_access() {
    let acl = hr_system();
    acl.grant("HRClerks", SELECT, SCHEMA, false, "dbo").unwrap();
    acl.deny("HRClerks", SELECT, SALARY, "dbo").unwrap();
    assert_denied(&acl, "Clerk1", SELECT, SALARY);

    acl.revoke("HRClerks", SELECT, SALARY, false).unwrap();
    assert_allowed(&acl, "Clerk1", SELECT, SALARY);
}

#[test]
fn test_revoke_missing_entry_is_noop() {
    let (acl, sink) = hr_system_audited();
    let outcome = acl.revoke("Clerk1", SELECT, SCHEMA, false).unwrap();
    assert!(outcome.is_noop());
    assert!(sink.is_empty());
}

#[test]
fn test_revoke_with_dependents_requires_cascade() {
    let acl = with_delegates();
    acl.grant("A", SELECT, SALARY_HISTORY, true, "dbo").unwrap();
    acl.grant("B", SELECT, SALARY_HISTORY, false, "A").unwrap();
    let before = acl.snapshot();

    let err = acl.revoke("A", SELECT, SALARY_HISTORY, false).unwrap_err();
    assert!(matches!(
        err,
        AclError::DependentGrantsExist { dependents: 1, .. }
    ));
    assert_eq!(acl.snapshot(), before);
}

#[test]
fn test_cascade_follows_the_delegation_chain() {
    let acl = with_delegates();
    acl.grant("A", SELECT, SALARY_HISTORY, true, "dbo").unwrap();
    acl.grant("B", SELECT, SALARY_HISTORY, true, "A").unwrap();
    acl.grant("C", SELECT, SALARY_HISTORY, false, "B").unwrap();
    // Independent grant to C from dbo at another scope survives.
    acl.grant("C", SELECT, EMP_DETAILS, false, "dbo").unwrap();
    assert_allowed(&acl, "C", SELECT, SALARY_HISTORY);

    let outcome = acl.revoke("A", SELECT, SALARY_HISTORY, true).unwrap();
    let cascaded: Vec<&str> = outcome
        .cascaded
        .iter()
        .map(|e| e.principal.as_str())
        .collect();
    assert_eq!(cascaded, vec!["B", "C"]);

    for user in ["A", "B", "C"] {
        assert_denied(&acl, user, SELECT, SALARY_HISTORY);
    }
    assert_allowed(&acl, "C", SELECT, EMP_DETAILS);
}

#[test]
fn test_cascade_leaves_denies_alone() {
    let acl = with_delegates();
    acl.grant("A", SELECT, SALARY_HISTORY, true, "dbo").unwrap();
    acl.deny("B", SELECT, SALARY_HISTORY, "A").unwrap();

    let outcome = acl.revoke("A", SELECT, SALARY_HISTORY, false).unwrap();
    assert!(outcome.cascaded.is_empty());
    assert!(acl.read().store.get("B", SELECT, SALARY_HISTORY).is_some());
}

#[test]
fn test_revoke_grant_option_keeps_the_grant() {
    let acl = with_delegates();
    acl.grant("A", SELECT, SALARY_HISTORY, true, "dbo").unwrap();
    acl.grant("B", SELECT, SALARY_HISTORY, false, "A").unwrap();

    let err = acl
        .revoke_grant_option("A", SELECT, SALARY_HISTORY, false)
        .unwrap_err();
    assert!(matches!(err, AclError::DependentGrantsExist { .. }));

    let outcome = acl
        .revoke_grant_option("A", SELECT, SALARY_HISTORY, true)
        .unwrap();
    assert_eq!(outcome.cascaded.len(), 1);

    assert_allowed(&acl, "A", SELECT, SALARY_HISTORY);
    assert_denied(&acl, "B", SELECT, SALARY_HISTORY);
    assert!(!acl.can_delegate("A", SELECT, SALARY_HISTORY).unwrap());
}

#[test]
fn test_plain_regrant_does_not_orphan_delegates() {
    let acl = with_delegates();
    acl.grant("A", SELECT, SALARY_HISTORY, true, "dbo").unwrap();
    acl.grant("B", SELECT, SALARY_HISTORY, false, "A").unwrap();

    acl.grant("A", SELECT, SALARY_HISTORY, false, "dbo").unwrap();
    assert!(acl.can_delegate("A", SELECT, SALARY_HISTORY).unwrap());
    let state = acl.read();
    let entry = state.store.get("A", SELECT, SALARY_HISTORY).unwrap();
    assert!(entry.grant_option);
}

#[test]
fn test_deny_over_delegated_grant_requires_cascade() {
    let acl = with_delegates();
    acl.grant("A", SELECT, SALARY_HISTORY, true, "dbo").unwrap();
    acl.grant("B", SELECT, SALARY_HISTORY, false, "A").unwrap();
    let before = acl.snapshot();

    let err = acl.deny("A", SELECT, SALARY_HISTORY, "dbo").unwrap_err();
    assert!(matches!(
        err,
        AclError::DependentGrantsExist { dependents: 1, .. }
    ));
    assert_eq!(acl.snapshot(), before);

    acl.revoke("A", SELECT, SALARY_HISTORY, true).unwrap();
    acl.deny("A", SELECT, SALARY_HISTORY, "dbo").unwrap();
    assert_denied(&acl, "A", SELECT, SALARY_HISTORY);
    assert_denied(&acl, "B", SELECT, SALARY_HISTORY);

    let outcome = acl.revoke("A", SELECT, SALARY_HISTORY, false).unwrap();
    assert!(outcome.cascaded.is_empty());
}

#[test]
fn test_cascade_audit_trail() {
    let (acl, sink) = hr_system_audited();
    for user in ["A", "B"] {
        acl.add_principal(user, PrincipalKind::User).unwrap();
    }
    acl.grant("A", SELECT, SALARY_HISTORY, true, "dbo").unwrap();
    acl.grant("B", SELECT, SALARY_HISTORY, false, "A").unwrap();
    sink.take();

    acl.revoke_grant_option("A", SELECT, SALARY_HISTORY, true)
        .unwrap();
    let events = sink.take();
    let operations: Vec<AuditOperation> = events.iter().map(|e| e.operation).collect();
    assert_eq!(
        operations,
        vec![AuditOperation::RevokeGrantOption, AuditOperation::CascadeRevoke]
    );
    assert_eq!(events[1].principal.as_str(), "B");
    assert_eq!(events[1].actor.as_str(), "A");
}
