use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use slog::debug;

use crate::config::{
    config_eviction_sample_size_or_default, config_max_keys_or_default,
    config_sweep_rerun_threshold_or_default, config_sweep_sample_limit_or_default, LOGGER,
};
use crate::eviction::{EvictionStrategy, SampledLruEvict};
use crate::metrics::REMOVED_EXPIRED_KEY_COUNTER;
use crate::sweeper::{SampleSweepExpiry, SweepStrategy};
use crate::utils::{lru_clock, ExpiryTime};

/// Server state shared across all connections.
///
/// `Db` is a handle around the shared state. Cloning it is shallow
/// and only increments a reference count.
#[derive(Clone)]
pub struct Db {
    shared: Arc<Shared>,
}

struct Shared {
    /// The keyspace tables, guarded by a mutex. Every public
    /// operation below is a single critical section, including the
    /// capacity-check / evict / insert sequence of `put` and the
    /// passive-expire read of `get`.
    state: Mutex<State>,

    /// Hard cap on live keys.
    max_keys: usize,

    /// Picks a victim when the keyspace is full.
    eviction: Box<dyn EvictionStrategy>,

    /// Removes expired keys when the sweeper runs.
    sweep: Box<dyn SweepStrategy>,
}

/// The three parallel keyspace tables.
///
/// A key present in `entries` is always present in `metadata`, and a
/// key present in `expirations` is always present in `entries`;
/// absence from `expirations` means "no expiry". The tables share
/// keys but never values, and only the methods below mutate them.
pub(crate) struct State {
    entries: HashMap<String, Value>,
    metadata: HashMap<String, KeyMetadata>,
    expirations: HashMap<String, ExpiryTime>,
}

/// A value held in the keyspace.
#[derive(Debug, Clone)]
pub(crate) struct Value {
    pub(crate) data: Bytes,
    #[allow(dead_code)]
    pub(crate) kind: ValueKind,
}

/// Datatype of a stored value. Only byte strings can be stored
/// today; the remaining variants are reserved for richer datatypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub(crate) enum ValueKind {
    String,
    Integer,
    Array,
}

/// Creation and last-access bookkeeping for a key.
#[derive(Debug, Clone)]
pub struct KeyMetadata {
    created_at: DateTime<Utc>,
    last_accessed: u32,
}

impl KeyMetadata {
    fn new() -> KeyMetadata {
        KeyMetadata {
            created_at: Utc::now(),
            last_accessed: lru_clock(),
        }
    }

    fn touch(&mut self) {
        self.last_accessed = lru_clock();
    }

    /// When the key was created. Survives overwrites of the value.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// LRU clock reading of the most recent read or overwrite.
    pub fn last_accessed(&self) -> u32 {
        self.last_accessed
    }
}

/// Expiry bookkeeping of a key, as seen by `TTL` and `EXPIRE`.
///
/// Reading it never mutates the keyspace; an elapsed deadline is
/// reported as-is and left for the read path or the sweeper to
/// collect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyExpiry {
    /// No such key.
    Missing,
    /// The key exists and carries no expiry.
    Persistent,
    /// The key exists and expires at the given deadline.
    At(ExpiryTime),
}

impl Db {
    /// Create a new `Db` configured from the global server config.
    pub fn new() -> Db {
        Db::with_strategies(
            config_max_keys_or_default(),
            Box::new(SampledLruEvict::new(config_eviction_sample_size_or_default())),
            Box::new(SampleSweepExpiry::new(
                config_sweep_sample_limit_or_default(),
                config_sweep_rerun_threshold_or_default(),
            )),
        )
    }

    pub(crate) fn with_strategies(
        max_keys: usize,
        eviction: Box<dyn EvictionStrategy>,
        sweep: Box<dyn SweepStrategy>,
    ) -> Db {
        Db {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    entries: HashMap::new(),
                    metadata: HashMap::new(),
                    expirations: HashMap::new(),
                }),
                max_keys,
                eviction,
                sweep,
            }),
        }
    }

    /// Insert or overwrite `key`.
    ///
    /// When the keyspace is at capacity, the eviction strategy runs
    /// once; if the keyspace is still full afterwards the write is
    /// dropped silently (best-effort under pressure). An overwrite
    /// keeps the key's creation timestamp and bumps its last-access
    /// clock; the expiry entry is replaced by `expire`, or removed
    /// when `expire` is `None`.
    pub fn put(&self, key: String, value: Bytes, expire: Option<ExpiryTime>) {
        let mut state = self.shared.state.lock().unwrap();

        if state.key_count() >= self.shared.max_keys {
            self.shared.eviction.evict(&mut state);
            if state.key_count() >= self.shared.max_keys {
                debug!(LOGGER, "keyspace full, write dropped, {}", key);
                return;
            }
        }

        match state.metadata.get_mut(&key) {
            Some(meta) => meta.touch(),
            None => {
                state.metadata.insert(key.clone(), KeyMetadata::new());
            }
        }
        match expire {
            Some(at) => {
                state.expirations.insert(key.clone(), at);
            }
            None => {
                state.expirations.remove(&key);
            }
        }
        state.entries.insert(
            key,
            Value {
                data: value,
                kind: ValueKind::String,
            },
        );
    }

    /// Read the value of `key`, bumping its last-access clock.
    ///
    /// A key observed past its deadline is deleted here and reported
    /// as absent. This is the only read path that mutates the
    /// keyspace.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        let mut state = self.shared.state.lock().unwrap();

        let expired = state.expirations.get(key).map_or(false, |at| at.is_expired());
        if expired {
            state.delete(key);
            REMOVED_EXPIRED_KEY_COUNTER
                .with_label_values(&["passive"])
                .inc();
            return None;
        }

        let data = state.entries.get(key)?.data.clone();
        if let Some(meta) = state.metadata.get_mut(key) {
            meta.touch();
        }
        Some(data)
    }

    /// Remove `key` and all its bookkeeping. Returns whether the key
    /// was present.
    pub fn delete(&self, key: &str) -> bool {
        let mut state = self.shared.state.lock().unwrap();
        state.delete(key)
    }

    /// Install, replace or clear the expiry of an existing key. A
    /// missing key is left untouched.
    pub fn set_expiry(&self, key: &str, expiry: Option<ExpiryTime>) {
        let mut state = self.shared.state.lock().unwrap();
        if !state.entries.contains_key(key) {
            return;
        }
        match expiry {
            Some(at) => {
                state.expirations.insert(key.to_string(), at);
            }
            None => {
                state.expirations.remove(key);
            }
        }
    }

    /// Report the expiry bookkeeping of `key` without evaluating it.
    pub fn get_expiry(&self, key: &str) -> KeyExpiry {
        let state = self.shared.state.lock().unwrap();
        if !state.entries.contains_key(key) {
            return KeyExpiry::Missing;
        }
        match state.expirations.get(key) {
            Some(at) => KeyExpiry::At(*at),
            None => KeyExpiry::Persistent,
        }
    }

    /// Walk live keys in unspecified order until the visitor returns
    /// `false`.
    pub fn for_each(&self, mut visitor: impl FnMut(&str) -> bool) {
        let state = self.shared.state.lock().unwrap();
        state.for_each(|key, _| visitor(key));
    }

    /// Number of live keys.
    pub fn key_count(&self) -> usize {
        let state = self.shared.state.lock().unwrap();
        state.key_count()
    }

    /// Drop every key. Irreversible.
    pub fn reset(&self) {
        let mut state = self.shared.state.lock().unwrap();
        state.entries.clear();
        state.metadata.clear();
        state.expirations.clear();
    }

    /// Run one full sweep of the expiration strategy.
    pub fn sweep_expired(&self) {
        let mut state = self.shared.state.lock().unwrap();
        self.shared.sweep.sweep(&mut state);
    }
}

impl Default for Db {
    fn default() -> Db {
        Db::new()
    }
}

#[cfg(test)]
impl Db {
    /// Rewind a key's last-access clock by `delta` seconds.
    pub(crate) fn test_backdate(&self, key: &str, delta: u32) {
        let mut state = self.shared.state.lock().unwrap();
        if let Some(meta) = state.metadata.get_mut(key) {
            meta.last_accessed = meta.last_accessed.wrapping_sub(delta);
        }
    }

    /// Run the configured eviction strategy once.
    pub(crate) fn test_evict_now(&self) -> usize {
        let mut state = self.shared.state.lock().unwrap();
        self.shared.eviction.evict(&mut state)
    }
}

impl State {
    /// Walk live keys, handing each visitor call the key and its
    /// expiry entry, until the visitor returns `false`.
    ///
    /// Iteration starts at a random position so that repeated
    /// bounded walks (the sweeper, the eviction sampler) do not keep
    /// resampling the same prefix.
    pub(crate) fn for_each(&self, mut visitor: impl FnMut(&str, Option<&ExpiryTime>) -> bool) {
        let len = self.entries.len();
        if len == 0 {
            return;
        }
        let start = SmallRng::from_entropy().gen_range(0..len);
        for (key, _) in self.entries.iter().cycle().skip(start).take(len) {
            if !visitor(key, self.expirations.get(key)) {
                break;
            }
        }
    }

    /// Remove a key from all three tables at once.
    pub(crate) fn delete(&mut self, key: &str) -> bool {
        let existed = self.entries.remove(key).is_some();
        self.metadata.remove(key);
        self.expirations.remove(key);
        existed
    }

    pub(crate) fn get_metadata(&self, key: &str) -> Option<&KeyMetadata> {
        self.metadata.get(key)
    }

    pub(crate) fn key_count(&self) -> usize {
        self.entries.len()
    }
}
