//! Fingerprint-keyed result cache with single-flight computation
//!
//! # Lookup Flow (strict order)
//!
//! 1. Fast path: live entry -> `Hit`
//! 2. Take the per-fingerprint gate (async mutex)
//! 3. Re-check: an entry published while waiting -> `Coalesced`
//! 4. Compute, publish, release the gate -> `Miss`
//!
//! Errors are never cached. When a leader fails, the next waiter holding
//! the gate computes on its own behalf.
//!
//! The state map sits behind a `std::sync::Mutex` that is never held
//! across an `.await`.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::config::CacheConfig;
use super::errors::{CacheError, CacheResult};
use crate::observability::Event;
use crate::planner::Fingerprint;

/// How a value was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    /// Served from a live entry
    Hit,
    /// Computed by this caller
    Miss,
    /// Computed by a concurrent caller this one waited on
    Coalesced,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "hit",
            CacheStatus::Miss => "miss",
            CacheStatus::Coalesced => "coalesced",
        }
    }

    /// True when the value was not computed by this caller
    pub fn is_cached(&self) -> bool {
        !matches!(self, CacheStatus::Miss)
    }
}

/// Immutable cache entry; replaced, never edited
#[derive(Debug)]
struct CacheEntry<V> {
    value: Arc<V>,
    expires_at: Instant,
    seq: u64,
}

#[derive(Debug)]
struct CacheState<V> {
    entries: HashMap<Fingerprint, Arc<CacheEntry<V>>>,
    /// Insertion order; stale `(fingerprint, seq)` pairs are skipped
    order: VecDeque<(Fingerprint, u64)>,
    next_seq: u64,
}

impl<V> Default for CacheState<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            next_seq: 0,
        }
    }
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub coalesced: u64,
    pub evictions: u64,
    pub expirations: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

type Gate = Arc<tokio::sync::Mutex<()>>;

/// Result cache shared by all requests
#[derive(Debug)]
pub struct ResultCache<V> {
    config: CacheConfig,
    state: Mutex<CacheState<V>>,
    gates: Mutex<HashMap<Fingerprint, Gate>>,
    counters: Counters,
}

impl<V> ResultCache<V> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            state: Mutex::new(CacheState::default()),
            gates: Mutex::new(HashMap::new()),
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Returns the cached value for `fingerprint` or computes it.
    ///
    /// At most one `compute` runs per fingerprint at a time.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        fingerprint: &Fingerprint,
        compute: F,
    ) -> Result<(Arc<V>, CacheStatus), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.lookup(fingerprint) {
            self.record(CacheStatus::Hit, fingerprint);
            return Ok((value, CacheStatus::Hit));
        }

        let guard = match self.gate(fingerprint) {
            Ok(gate) => Some(GateGuard {
                cache: self,
                fingerprint: fingerprint.clone(),
                gate,
            }),
            Err(err) => {
                self.report(&err);
                None
            }
        };
        let _permit = match &guard {
            Some(g) => Some(g.gate.lock().await),
            None => None,
        };

        if let Some(value) = self.lookup(fingerprint) {
            self.record(CacheStatus::Coalesced, fingerprint);
            return Ok((value, CacheStatus::Coalesced));
        }

        self.record(CacheStatus::Miss, fingerprint);
        let value = Arc::new(compute().await?);
        self.insert(fingerprint.clone(), Arc::clone(&value));
        Ok((value, CacheStatus::Miss))
    }

    /// Live value for `fingerprint`, if any. Does not touch counters.
    pub fn peek(&self, fingerprint: &Fingerprint) -> Option<Arc<V>> {
        self.lookup(fingerprint)
    }

    /// Publishes `value`, replacing any existing entry.
    pub fn insert(&self, fingerprint: Fingerprint, value: Arc<V>) {
        let mut state = match self.state() {
            Ok(state) => state,
            Err(err) => return self.report(&err),
        };

        let seq = state.next_seq;
        state.next_seq += 1;
        state.entries.insert(
            fingerprint.clone(),
            Arc::new(CacheEntry {
                value,
                expires_at: Instant::now() + self.config.ttl,
                seq,
            }),
        );
        state.order.push_back((fingerprint, seq));

        while state.entries.len() > self.config.max_entries {
            let Some((victim, victim_seq)) = state.order.pop_front() else {
                break;
            };
            let live = state
                .entries
                .get(&victim)
                .is_some_and(|e| e.seq == victim_seq);
            if live {
                state.entries.remove(&victim);
                self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(
                    event = Event::CacheEvicted.as_str(),
                    fingerprint = %victim,
                    "evicted least recently inserted entry"
                );
            }
        }

        // Replaced and expired entries leave stale order slots behind
        if state.order.len() > self.config.max_entries.saturating_mul(2) {
            let CacheState { entries, order, .. } = &mut *state;
            order.retain(|(fp, s)| entries.get(fp).is_some_and(|e| e.seq == *s));
        }
    }

    /// Removes every expired entry and returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let mut state = match self.state() {
            Ok(state) => state,
            Err(err) => {
                self.report(&err);
                return 0;
            }
        };

        let now = Instant::now();
        let before = state.entries.len();
        state.entries.retain(|_, e| e.expires_at > now);
        let purged = before - state.entries.len();

        let CacheState { entries, order, .. } = &mut *state;
        order.retain(|(fp, s)| entries.get(fp).is_some_and(|e| e.seq == *s));

        self.counters
            .expirations
            .fetch_add(purged as u64, Ordering::Relaxed);
        purged
    }

    /// Number of stored entries, expired ones included until touched
    pub fn len(&self) -> usize {
        self.state().map(|s| s.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        match self.state() {
            Ok(mut state) => {
                state.entries.clear();
                state.order.clear();
            }
            Err(err) => self.report(&err),
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            coalesced: self.counters.coalesced.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            expirations: self.counters.expirations.load(Ordering::Relaxed),
        }
    }

    fn lookup(&self, fingerprint: &Fingerprint) -> Option<Arc<V>> {
        let mut state = match self.state() {
            Ok(state) => state,
            Err(err) => {
                self.report(&err);
                return None;
            }
        };

        let entry = Arc::clone(state.entries.get(fingerprint)?);
        if entry.expires_at <= Instant::now() {
            state.entries.remove(fingerprint);
            self.counters.expirations.fetch_add(1, Ordering::Relaxed);
            debug!(
                event = Event::CacheExpired.as_str(),
                fingerprint = %fingerprint,
                "entry expired"
            );
            return None;
        }

        Some(Arc::clone(&entry.value))
    }

    fn gate(&self, fingerprint: &Fingerprint) -> CacheResult<Gate> {
        let mut gates = self.gates.lock().map_err(|_| CacheError::GatePoisoned)?;
        Ok(Arc::clone(gates.entry(fingerprint.clone()).or_default()))
    }

    fn state(&self) -> CacheResult<MutexGuard<'_, CacheState<V>>> {
        self.state.lock().map_err(|_| CacheError::StatePoisoned)
    }

    fn record(&self, status: CacheStatus, fingerprint: &Fingerprint) {
        let (counter, event) = match status {
            CacheStatus::Hit => (&self.counters.hits, Event::CacheHit),
            CacheStatus::Miss => (&self.counters.misses, Event::CacheMiss),
            CacheStatus::Coalesced => (&self.counters.coalesced, Event::CacheCoalesced),
        };
        counter.fetch_add(1, Ordering::Relaxed);
        debug!(event = event.as_str(), fingerprint = %fingerprint);
    }

    fn report(&self, err: &CacheError) {
        warn!(
            event = Event::CacheError.as_str(),
            error = %err,
            "cache unavailable, treating as miss"
        );
    }
}

/// Drops the gate from the map once no other caller holds it.
struct GateGuard<'a, V> {
    cache: &'a ResultCache<V>,
    fingerprint: Fingerprint,
    gate: Gate,
}

impl<V> Drop for GateGuard<'_, V> {
    fn drop(&mut self) {
        if let Ok(mut gates) = self.cache.gates.lock() {
            // One reference in the map, one here
            if Arc::strong_count(&self.gate) == 2 {
                gates.remove(&self.fingerprint);
            }
        }
    }
}
