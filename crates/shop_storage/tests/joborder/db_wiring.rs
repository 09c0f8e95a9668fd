#![forbid(unsafe_code)]

use std::sync::Barrier;

use shop_kernel_contracts::identity::{ActorId, UserRecord};
use shop_kernel_contracts::joborder::{
    JobOrderId, JobOrderLifecycleEvent, JobOrderRecord, JobOrderStatus,
};
use shop_kernel_contracts::tenant::TenantId;
use shop_kernel_contracts::MonotonicTimeNs;
use shop_storage::repo::{JobOrderRepo, LifecycleLedgerRepo};
use shop_storage::store::{CompareAndSetOutcome, ShopStore, StorageError};

fn tenant(id: &str) -> TenantId {
    TenantId::new(id).unwrap()
}

fn actor(id: &str) -> ActorId {
    ActorId::new(id).unwrap()
}

fn job_order(id: &str) -> JobOrderId {
    JobOrderId::new(id).unwrap()
}

fn seed_user(s: &ShopStore, tenant_id: &str, actor_id: &str) {
    s.insert_user_row(
        UserRecord::v1(
            tenant(tenant_id),
            actor(actor_id),
            format!("{actor_id}@{tenant_id}.test"),
            actor_id.to_string(),
            true,
            true,
            vec![],
            None,
        )
        .unwrap(),
    )
    .unwrap();
}

fn seed_job_order(s: &ShopStore, tenant_id: &str, job_order_id: &str) {
    s.insert_job_order_row(
        JobOrderRecord::new_pending(
            tenant(tenant_id),
            job_order(job_order_id),
            actor("advisor_1"),
            None,
            MonotonicTimeNs(10),
        )
        .unwrap(),
    )
    .unwrap();
}

#[test]
fn at_joborder_db_01_tenant_isolation_enforced() {
    let s = ShopStore::new_in_memory();
    seed_user(&s, "shop_a", "advisor_1");
    seed_job_order(&s, "shop_a", "jo_1");

    assert!(s.load_job_order(&tenant("shop_a"), &job_order("jo_1")).is_some());
    assert!(s.load_job_order(&tenant("shop_b"), &job_order("jo_1")).is_none());
    assert!(s.load_job_order(&tenant("shop_a"), &job_order("jo_x")).is_none());
    assert_eq!(s.job_order_rows_for_tenant(&tenant("shop_a")).len(), 1);
    assert!(s.job_order_rows_for_tenant(&tenant("shop_b")).is_empty());
}

#[test]
fn at_joborder_db_02_cross_tenant_cas_reports_missing() {
    let s = ShopStore::new_in_memory();
    seed_user(&s, "shop_a", "advisor_1");
    seed_job_order(&s, "shop_a", "jo_1");

    let out = s.compare_and_set_status(
        &tenant("shop_b"),
        &job_order("jo_1"),
        JobOrderStatus::Pending,
        JobOrderStatus::Cancelled,
        MonotonicTimeNs(20),
    );
    assert_eq!(out, CompareAndSetOutcome::Missing);
    let row = s.load_job_order(&tenant("shop_a"), &job_order("jo_1")).unwrap();
    assert_eq!(row.status, JobOrderStatus::Pending);
}

#[test]
fn at_joborder_db_03_duplicate_id_rejected_across_tenants() {
    let s = ShopStore::new_in_memory();
    seed_user(&s, "shop_a", "advisor_1");
    seed_user(&s, "shop_b", "advisor_b");
    seed_job_order(&s, "shop_a", "jo_1");

    let dup = JobOrderRecord::new_pending(
        tenant("shop_b"),
        job_order("jo_1"),
        actor("advisor_b"),
        None,
        MonotonicTimeNs(11),
    )
    .unwrap();
    assert!(matches!(
        s.insert_job_order_row(dup),
        Err(StorageError::DuplicateKey { .. })
    ));
}

#[test]
fn at_joborder_db_04_creator_must_exist_in_tenant() {
    let s = ShopStore::new_in_memory();
    seed_user(&s, "shop_b", "advisor_1");

    let row = JobOrderRecord::new_pending(
        tenant("shop_a"),
        job_order("jo_1"),
        actor("advisor_1"),
        None,
        MonotonicTimeNs(10),
    )
    .unwrap();
    assert!(matches!(
        s.insert_job_order_row(row),
        Err(StorageError::ForeignKeyViolation {
            table: "job_orders.created_by",
            ..
        })
    ));
}

#[test]
fn at_joborder_db_05_cas_applies_once_and_bumps_revision() {
    let s = ShopStore::new_in_memory();
    seed_user(&s, "shop_a", "advisor_1");
    seed_job_order(&s, "shop_a", "jo_1");

    let first = s.compare_and_set_status(
        &tenant("shop_a"),
        &job_order("jo_1"),
        JobOrderStatus::Pending,
        JobOrderStatus::InProgress,
        MonotonicTimeNs(30),
    );
    let CompareAndSetOutcome::Applied(row) = first else {
        panic!("expected applied");
    };
    assert_eq!(row.revision, 2);
    assert_eq!(row.updated_at, MonotonicTimeNs(30));

    let second = s.compare_and_set_status(
        &tenant("shop_a"),
        &job_order("jo_1"),
        JobOrderStatus::Pending,
        JobOrderStatus::InProgress,
        MonotonicTimeNs(31),
    );
    assert_eq!(
        second,
        CompareAndSetOutcome::Stale {
            observed: JobOrderStatus::InProgress
        }
    );
}

#[test]
fn at_joborder_db_06_concurrent_cas_has_exactly_one_winner() {
    let s = ShopStore::new_in_memory();
    seed_user(&s, "shop_a", "advisor_1");
    seed_job_order(&s, "shop_a", "jo_race");

    const WRITERS: usize = 8;
    let barrier = Barrier::new(WRITERS);
    let outcomes: Vec<CompareAndSetOutcome> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..WRITERS)
            .map(|i| {
                let s = &s;
                let barrier = &barrier;
                scope.spawn(move || {
                    let next = if i % 2 == 0 {
                        JobOrderStatus::InProgress
                    } else {
                        JobOrderStatus::Cancelled
                    };
                    barrier.wait();
                    s.compare_and_set_status(
                        &tenant("shop_a"),
                        &job_order("jo_race"),
                        JobOrderStatus::Pending,
                        next,
                        MonotonicTimeNs(40 + i as u64),
                    )
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let winners: Vec<_> = outcomes
        .iter()
        .filter_map(|o| match o {
            CompareAndSetOutcome::Applied(row) => Some(row.status),
            _ => None,
        })
        .collect();
    assert_eq!(winners.len(), 1);
    let stale = outcomes
        .iter()
        .filter(|o| matches!(o, CompareAndSetOutcome::Stale { .. }))
        .count();
    assert_eq!(stale, WRITERS - 1);

    let row = s.load_job_order(&tenant("shop_a"), &job_order("jo_race")).unwrap();
    assert_eq!(row.status, winners[0]);
    assert_eq!(row.revision, 2);
}

#[test]
fn at_joborder_db_07_lifecycle_ledger_is_append_only_and_tenant_scoped() {
    let s = ShopStore::new_in_memory();
    let ev = JobOrderLifecycleEvent::v1(
        tenant("shop_a"),
        job_order("jo_1"),
        JobOrderStatus::Pending,
        JobOrderStatus::InProgress,
        actor("mech_1"),
        MonotonicTimeNs(50),
    )
    .unwrap();
    let id1 = s.append_lifecycle_row(ev.clone()).unwrap();
    let id2 = s.append_lifecycle_row(ev).unwrap();
    assert!(id2 > id1);

    assert_eq!(s.lifecycle_rows(&tenant("shop_a"), &job_order("jo_1")).len(), 2);
    assert!(s.lifecycle_rows(&tenant("shop_b"), &job_order("jo_1")).is_empty());
    assert!(matches!(
        s.attempt_overwrite_lifecycle_event_row(id1),
        Err(StorageError::AppendOnlyViolation { .. })
    ));
    assert_eq!(s.lifecycle_ledger_rows().len(), 2);
}

#[test]
fn at_joborder_db_08_cas_refuses_pairs_outside_transition_table() {
    let s = ShopStore::new_in_memory();
    seed_user(&s, "shop_a", "advisor_1");
    seed_job_order(&s, "shop_a", "jo_1");

    let skip = s.compare_and_set_status(
        &tenant("shop_a"),
        &job_order("jo_1"),
        JobOrderStatus::Pending,
        JobOrderStatus::Invoiced,
        MonotonicTimeNs(60),
    );
    assert_eq!(
        skip,
        CompareAndSetOutcome::Rejected {
            from: JobOrderStatus::Pending,
            to: JobOrderStatus::Invoiced
        }
    );

    for (at, next) in [
        (61, JobOrderStatus::InProgress),
        (62, JobOrderStatus::Completed),
        (63, JobOrderStatus::Invoiced),
    ] {
        let from = s
            .load_job_order(&tenant("shop_a"), &job_order("jo_1"))
            .unwrap()
            .status;
        assert!(matches!(
            s.compare_and_set_status(
                &tenant("shop_a"),
                &job_order("jo_1"),
                from,
                next,
                MonotonicTimeNs(at),
            ),
            CompareAndSetOutcome::Applied(_)
        ));
    }

    let reopen = s.compare_and_set_status(
        &tenant("shop_a"),
        &job_order("jo_1"),
        JobOrderStatus::Invoiced,
        JobOrderStatus::Pending,
        MonotonicTimeNs(64),
    );
    assert_eq!(
        reopen,
        CompareAndSetOutcome::Rejected {
            from: JobOrderStatus::Invoiced,
            to: JobOrderStatus::Pending
        }
    );

    let row = s.load_job_order(&tenant("shop_a"), &job_order("jo_1")).unwrap();
    assert_eq!(row.status, JobOrderStatus::Invoiced);
    assert_eq!(row.revision, 4);
}
