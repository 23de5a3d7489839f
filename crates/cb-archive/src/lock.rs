//! Per-board serialisation of restores.

use std::sync::Arc;

use cb_core::models::BoardType;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Advisory in-process locks keyed by board tag. Two restores of the same
/// board run one after the other; different boards do not contend.
#[derive(Default)]
pub struct BoardLocks {
    locks: DashMap<BoardType, Arc<Mutex<()>>>,
}

impl BoardLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until the board is free and holds it until the guard drops.
    pub async fn acquire(&self, board: &BoardType) -> OwnedMutexGuard<()> {
        let lock = self.locks.entry(board.clone()).or_default().value().clone();
        lock.lock_owned().await
    }
}
