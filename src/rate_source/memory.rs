//! In-memory oracle
//!
//! Backs the CLI driver and the tests. Supports per-key fault injection so
//! callers can exercise the `RateSourceError` paths.

use rustc_hash::FxHashMap;
use std::sync::Mutex;
use tracing::debug;

use super::{RateSource, RateSourceError, Word, ZERO_WORD, word_from_u128};
use crate::core_types::AccountId;

#[derive(Default)]
struct Inner {
    values: FxHashMap<(u64, String), Word>,
    /// key -> failure reason (any scope)
    faults: FxHashMap<String, String>,
    reads: u64,
    writes: u64,
}

#[derive(Default)]
pub struct InMemoryRateSource {
    inner: Mutex<Inner>,
}

impl InMemoryRateSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_u128(&self, scope: u64, key: &str, value: u128) {
        self.lock()
            .values
            .insert((scope, key.to_string()), word_from_u128(value));
    }

    pub fn set_account(&self, scope: u64, key: &str, id: AccountId) {
        self.lock()
            .values
            .insert((scope, key.to_string()), *id.as_bytes());
    }

    /// Make every subsequent access to `key` fail with `reason`.
    pub fn fail_key(&self, key: &str, reason: &str) {
        self.lock()
            .faults
            .insert(key.to_string(), reason.to_string());
    }

    pub fn clear_fault(&self, key: &str) {
        self.lock().faults.remove(key);
    }

    pub fn read_count(&self) -> u64 {
        self.lock().reads
    }

    pub fn write_count(&self) -> u64 {
        self.lock().writes
    }
}

impl RateSource for InMemoryRateSource {
    fn get(&self, scope: u64, key: &str) -> Result<Word, RateSourceError> {
        let mut inner = self.lock();
        inner.reads += 1;
        if let Some(reason) = inner.faults.get(key) {
            debug!(scope = scope, key = key, "Injected rate source read fault");
            return Err(RateSourceError::new(key, reason.clone()));
        }
        Ok(inner
            .values
            .get(&(scope, key.to_string()))
            .copied()
            .unwrap_or(ZERO_WORD))
    }

    fn set(&self, scope: u64, key: &str, value: Word) -> Result<(), RateSourceError> {
        let mut inner = self.lock();
        if let Some(reason) = inner.faults.get(key) {
            return Err(RateSourceError::new(key, reason.clone()));
        }
        inner.writes += 1;
        inner.values.insert((scope, key.to_string()), value);
        Ok(())
    }
}
