//! Principal directory and securable hierarchy through the facade.

mod common;

use common::*;
use oxide_acl::{AclError, PermissionKind, PrincipalKind, SecurableKind};

#[test]
fn test_membership_cycle_rejected_and_graph_unchanged() {
    let acl = hr_system();
    acl.add_principal("Payroll", PrincipalKind::Role).unwrap();
    acl.add_principal("Finance", PrincipalKind::Role).unwrap();
    acl.add_membership("HRClerks", "Payroll").unwrap();
    acl.add_membership("Payroll", "Finance").unwrap();
    let before = acl.snapshot();

    let err = acl.add_membership("Finance", "HRClerks").unwrap_err();
    assert!(matches!(err, AclError::CycleDetected { .. }));
    let err = acl.add_membership("Finance", "Finance").unwrap_err();
    assert!(matches!(err, AclError::CycleDetected { .. }));
    assert_eq!(acl.snapshot(), before);

    let roles: Vec<String> = acl
        .transitive_roles("Clerk1")
        .unwrap()
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(roles, vec!["HRClerks", "Payroll", "Finance"]);
}

#[test]
fn test_users_cannot_have_members() {
    let acl = hr_system();
    let err = acl.add_membership("Clerk2", "Clerk1").unwrap_err();
    assert!(matches!(err, AclError::NotARole(_)));
}

#[test]
fn test_nested_role_grants_apply() {
    let acl = hr_system();
    acl.add_principal("AllStaff", PrincipalKind::Role).unwrap();
    acl.add_membership("HRClerks", "AllStaff").unwrap();
    acl.grant("AllStaff", PermissionKind::Select, EMAIL, false, "dbo")
        .unwrap();
    assert_allowed(&acl, "Clerk1", PermissionKind::Select, EMAIL);

    acl.remove_membership("HRClerks", "AllStaff").unwrap();
    assert_denied(&acl, "Clerk1", PermissionKind::Select, EMAIL);
}

#[test]
fn test_role_with_members_cannot_be_removed() {
    let acl = hr_system();
    let err = acl.remove_principal("HRClerks").unwrap_err();
    assert!(matches!(err, AclError::PrincipalHasMembers { count: 2, .. }));

    acl.remove_membership("Clerk1", "HRClerks").unwrap();
    acl.remove_membership("Clerk2", "HRClerks").unwrap();
    acl.remove_principal("HRClerks").unwrap();
    assert!(!acl.read().directory.contains("HRClerks"));
}

#[test]
fn test_securable_parent_kinds_enforced() {
    let acl = hr_system();
    let err = acl
        .add_securable("HR.Bonus", SecurableKind::Column, Some(SCHEMA))
        .unwrap_err();
    assert!(matches!(err, AclError::InvalidParent { .. }));
    let err = acl
        .add_securable("Sales", SecurableKind::Schema, None)
        .unwrap_err();
    assert!(matches!(err, AclError::InvalidParent { .. }));
    let err = acl
        .add_securable(EMAIL, SecurableKind::Column, Some(EMP_DETAILS))
        .unwrap_err();
    assert!(matches!(err, AclError::DuplicateSecurable(_)));
}

#[test]
fn test_non_empty_schema_cannot_be_removed() {
    let acl = hr_system();
    let err = acl.remove_securable(SCHEMA).unwrap_err();
    assert!(matches!(err, AclError::NotEmpty { .. }));

    let removed = acl.remove_securable(SALARY_HISTORY).unwrap();
    assert_eq!(removed.len(), 1);
    let chain = acl.ancestor_chain(EMAIL).unwrap();
    assert_eq!(chain.len(), 5);
    assert_eq!(chain[4].as_str(), SERVER);
}
