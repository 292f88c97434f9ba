//! Per-user serialization of money movements.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per user. Every debit path and every finalization holds
/// the owner's lock from its first read to its last write.
#[derive(Debug, Default)]
pub(crate) struct UserLocks {
    inner: DashMap<String, Arc<Mutex<()>>>,
}

impl UserLocks {
    pub(crate) async fn lock(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let mutex = self
            .inner
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }
}
