//! Structural mutation lock
//!
//! Type creation, update and deletion, instance upserts and batch deletion
//! change the shape of the graph and must not interleave. Each mutating
//! repository call takes a [`StructuralGuard`] from the repository's own
//! [`StructuralLock`]; reads take nothing.

use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;

use crate::errors::{EquipError, EquipResult};

#[derive(Debug)]
pub struct StructuralLock {
    id: Uuid,
    mutex: Mutex<()>,
}

impl Default for StructuralLock {
    fn default() -> Self {
        Self::new()
    }
}

impl StructuralLock {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            mutex: Mutex::new(()),
        }
    }

    /// Block until the lock is free. A poisoned lock is recovered: the
    /// guarded state lives in the store, not in the mutex.
    pub fn acquire(&self) -> StructuralGuard<'_> {
        let inner = match self.mutex.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        StructuralGuard {
            lock_id: self.id,
            _inner: inner,
        }
    }

    pub(crate) fn verify(&self, guard: &StructuralGuard<'_>, operation: &str) -> EquipResult<()> {
        if guard.lock_id == self.id {
            Ok(())
        } else {
            Err(EquipError::internal(
                operation,
                "structural guard belongs to another repository",
            ))
        }
    }
}

/// Proof that the structural lock is held; released on drop
#[derive(Debug)]
pub struct StructuralGuard<'a> {
    lock_id: Uuid,
    _inner: MutexGuard<'a, ()>,
}
