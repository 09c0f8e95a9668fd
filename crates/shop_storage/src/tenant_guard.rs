#![forbid(unsafe_code)]

//! Tenant isolation for every lookup.
//!
//! A row owned by another tenant is reported exactly like a row that does not
//! exist. Callers never learn that an id is in use elsewhere.

use shop_kernel_contracts::tenant::{TenantId, TenantScoped};

/// Keeps `row` only if it belongs to `tenant_id`.
pub fn scope_to_tenant<T: TenantScoped>(tenant_id: &TenantId, row: Option<T>) -> Option<T> {
    row.filter(|r| r.belongs_to(tenant_id))
}

/// Keeps the rows that belong to `tenant_id`.
pub fn filter_to_tenant<'a, T, I>(tenant_id: &'a TenantId, rows: I) -> impl Iterator<Item = T> + 'a
where
    T: TenantScoped + 'a,
    I: IntoIterator<Item = T>,
    I::IntoIter: 'a,
{
    rows.into_iter().filter(move |r| r.belongs_to(tenant_id))
}
