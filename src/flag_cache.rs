//! A thread-safe in-memory storage for the last bulk evaluation. [`FlagCache`] provides concurrent
//! access for readers (flag accessors) and the single writer (the refresh path).
use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use crate::EvaluatedFlag;

/// Immutable set of evaluated flags keyed by flag key.
pub type FlagSet = HashMap<String, EvaluatedFlag>;

/// `FlagCache` holds the currently active [`FlagSet`] snapshot.
///
/// A `FlagSet` is never updated partially. It is replaced completely, so readers always observe
/// either the previous or the new evaluation.
#[derive(Debug, Default)]
pub struct FlagCache {
    flags: RwLock<Option<Arc<FlagSet>>>,
}

impl FlagCache {
    /// Create a new empty cache.
    pub fn new() -> Self {
        FlagCache::default()
    }

    /// Get the current snapshot. Returns None if no bulk evaluation has succeeded yet.
    pub fn snapshot(&self) -> Option<Arc<FlagSet>> {
        // A poisoned lock still holds a complete snapshot as the writer only swaps an `Arc`.
        let flags = self.flags.read().unwrap_or_else(PoisonError::into_inner);
        flags.clone()
    }

    /// Replace the snapshot with a new set of flags.
    pub fn replace(&self, flags: Vec<EvaluatedFlag>) {
        // Constructing new value before requesting the lock to minimize lock span.
        let new_value = Arc::new(
            flags
                .into_iter()
                .map(|flag| (flag.key.clone(), flag))
                .collect::<FlagSet>(),
        );

        let mut slot = self.flags.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(new_value);
    }
}
