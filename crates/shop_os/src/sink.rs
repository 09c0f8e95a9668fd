#![forbid(unsafe_code)]

use shop_kernel_contracts::joborder::JobOrderLifecycleEvent;
use shop_storage::repo::LifecycleLedgerRepo;
use shop_storage::store::StorageError;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum EventSinkError {
    #[error("lifecycle ledger append failed: {0}")]
    Ledger(#[from] StorageError),
    #[error("lifecycle event encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Consumer of committed transitions. Fire-and-forget from the engine's side:
/// an error here is logged and never undoes the transition.
pub trait LifecycleEventSink: Send + Sync {
    fn publish(&self, event: &JobOrderLifecycleEvent) -> Result<(), EventSinkError>;
}

/// Appends every event to the store's lifecycle ledger.
#[derive(Debug, Clone)]
pub struct LedgerEventSink<R> {
    ledger: R,
}

impl<R> LedgerEventSink<R>
where
    R: LifecycleLedgerRepo,
{
    pub fn new(ledger: R) -> Self {
        Self { ledger }
    }
}

impl<R> LifecycleEventSink for LedgerEventSink<R>
where
    R: LifecycleLedgerRepo,
{
    fn publish(&self, event: &JobOrderLifecycleEvent) -> Result<(), EventSinkError> {
        self.ledger.append_lifecycle_row(event.clone())?;
        Ok(())
    }
}

/// Writes each event as one JSON log line.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl LifecycleEventSink for TracingEventSink {
    fn publish(&self, event: &JobOrderLifecycleEvent) -> Result<(), EventSinkError> {
        let json = serde_json::to_string(event)?;
        info!(target: "shop_os::lifecycle_event", event = %json, "job order lifecycle event");
        Ok(())
    }
}
