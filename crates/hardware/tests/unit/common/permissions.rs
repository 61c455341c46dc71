//! # Access and Permission Tests
//!
//! Verifies the permission set attached to translations and cache entries.

use rvpriv_core::common::{AccessType, Permissions};

#[test]
fn test_required_permission_per_access() {
    assert_eq!(AccessType::Fetch.required(), Permissions::EXEC);
    assert_eq!(AccessType::Read.required(), Permissions::READ);
    assert_eq!(AccessType::Write.required(), Permissions::WRITE);
}

#[test]
fn test_union_and_intersection() {
    let rx = Permissions::READ | Permissions::EXEC;
    let rw = Permissions::READ | Permissions::WRITE;

    assert_eq!(rx & rw, Permissions::READ);
    assert!(rx.allows(AccessType::Fetch));
    assert!(!rx.allows(AccessType::Write));
    assert!((rx & Permissions::WRITE).is_empty());
}

#[test]
fn test_all_contains_every_permission() {
    for access in [AccessType::Fetch, AccessType::Read, AccessType::Write] {
        assert!(Permissions::ALL.allows(access));
        assert!(!Permissions::NONE.allows(access));
    }
    assert_eq!(Permissions::ALL.bits(), 0b111);
}

#[test]
fn test_debug_renders_rwx() {
    let mut p = Permissions::READ;
    p |= Permissions::EXEC;
    assert_eq!(format!("{p:?}"), "r-x");
    assert_eq!(format!("{:?}", Permissions::NONE), "---");
}
