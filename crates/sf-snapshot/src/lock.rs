//! Per-target run serialization and cooperative cancellation

use sf_core::sql_utils::split_qualified_name;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

/// Registry of one async mutex per target table.
///
/// Runs against the same target are serialized; runs against different
/// targets proceed independently. Keys are lowercased schema-qualified
/// names, so `Snaps.Orders` and `snaps.orders` share a lock, as do `orders`
/// and `main.orders`.
#[derive(Debug, Clone, Default)]
pub struct TargetLocks {
    locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl TargetLocks {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `target`; released when the guard drops
    pub async fn acquire(&self, target: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
            Arc::clone(locks.entry(lock_key(target)).or_default())
        };
        lock.lock_owned().await
    }
}

fn lock_key(target: &str) -> String {
    let (schema, table) = split_qualified_name(target);
    format!("{}.{}", schema, table).to_lowercase()
}

/// Shared flag asking in-flight runs to stop before they write
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create an unset flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
