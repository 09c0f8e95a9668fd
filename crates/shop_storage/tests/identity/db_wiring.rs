#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use shop_kernel_contracts::identity::{ActorId, PermissionToken, RoleName, UserRecord};
use shop_kernel_contracts::tenant::TenantId;
use shop_kernel_contracts::MonotonicTimeNs;
use shop_storage::repo::IdentityRepo;
use shop_storage::store::{ShopStore, StorageError};

fn tenant(id: &str) -> TenantId {
    TenantId::new(id).unwrap()
}

fn actor(id: &str) -> ActorId {
    ActorId::new(id).unwrap()
}

fn role(name: &str) -> RoleName {
    RoleName::new(name).unwrap()
}

fn perms(tokens: &[&str]) -> BTreeSet<PermissionToken> {
    tokens
        .iter()
        .map(|t| PermissionToken::new(*t).unwrap())
        .collect()
}

fn user(tenant_id: &str, actor_id: &str, roles: Vec<RoleName>) -> UserRecord {
    UserRecord::v1(
        tenant(tenant_id),
        actor(actor_id),
        format!("{actor_id}@{tenant_id}.test"),
        actor_id.to_string(),
        true,
        false,
        roles,
        None,
    )
    .unwrap()
}

#[test]
fn at_identity_db_01_user_lookup_is_tenant_scoped() {
    let s = ShopStore::new_in_memory();
    s.insert_user_row(user("shop_a", "mech_1", vec![role("mechanic")]))
        .unwrap();

    assert!(s.load_user(&tenant("shop_a"), &actor("mech_1")).is_some());
    assert!(s.load_user(&tenant("shop_b"), &actor("mech_1")).is_none());
    assert!(s.user_rows_for_tenant(&tenant("shop_b")).is_empty());
}

#[test]
fn at_identity_db_02_duplicate_actor_rejected() {
    let s = ShopStore::new_in_memory();
    s.insert_user_row(user("shop_a", "mech_1", vec![])).unwrap();
    assert!(matches!(
        s.insert_user_row(user("shop_b", "mech_1", vec![])),
        Err(StorageError::DuplicateKey { .. })
    ));
}

#[test]
fn at_identity_db_03_role_changes_are_visible_on_next_lookup() {
    let s = ShopStore::new_in_memory();
    s.insert_user_row(user("shop_a", "mech_1", vec![role("mechanic")]))
        .unwrap();

    s.assign_user_roles(
        &tenant("shop_a"),
        &actor("mech_1"),
        vec![role("mechanic"), role("cashier")],
    )
    .unwrap();
    let row = s.load_user(&tenant("shop_a"), &actor("mech_1")).unwrap();
    assert_eq!(row.roles, vec![role("mechanic"), role("cashier")]);
}

#[test]
fn at_identity_db_04_foreign_tenant_cannot_mutate_user() {
    let s = ShopStore::new_in_memory();
    s.insert_user_row(user("shop_a", "mech_1", vec![])).unwrap();

    assert!(matches!(
        s.set_user_active(&tenant("shop_b"), &actor("mech_1"), false),
        Err(StorageError::ForeignKeyViolation { .. })
    ));
    assert!(s.load_user(&tenant("shop_a"), &actor("mech_1")).unwrap().active);
}

#[test]
fn at_identity_db_05_role_assignment_rejects_duplicates() {
    let s = ShopStore::new_in_memory();
    s.insert_user_row(user("shop_a", "mech_1", vec![])).unwrap();
    assert!(matches!(
        s.assign_user_roles(
            &tenant("shop_a"),
            &actor("mech_1"),
            vec![role("mechanic"), role("mechanic")],
        ),
        Err(StorageError::ContractViolation(_))
    ));
}

#[test]
fn at_identity_db_06_unknown_role_resolves_to_empty_set() {
    let s = ShopStore::new_in_memory();
    s.upsert_role_permissions(role("mechanic"), perms(&["joborder.start"]))
        .unwrap();

    assert_eq!(s.load_role_permissions(&role("mechanic")).len(), 1);
    assert!(s.load_role_permissions(&role("ghost")).is_empty());

    s.upsert_role_permissions(
        role("mechanic"),
        perms(&["joborder.start", "joborder.complete"]),
    )
    .unwrap();
    assert_eq!(s.load_role_permissions(&role("mechanic")).len(), 2);
}

#[test]
fn at_identity_db_07_login_timestamp_recorded() {
    let s = ShopStore::new_in_memory();
    s.insert_user_row(user("shop_a", "mech_1", vec![])).unwrap();

    let row = s
        .record_user_login(&tenant("shop_a"), &actor("mech_1"), MonotonicTimeNs(99))
        .unwrap();
    assert_eq!(row.last_login_at, Some(MonotonicTimeNs(99)));
    assert!(s
        .record_user_login(&tenant("shop_a"), &actor("mech_1"), MonotonicTimeNs(0))
        .is_err());
}
