//! Victim selection for a keyspace at capacity.

use slog::debug;

use crate::config::LOGGER;
use crate::db::State;
use crate::metrics::EVICTED_KEY_COUNTER;
use crate::utils::lru_clock;

/// Picks and deletes the best eviction candidate when the keyspace
/// is full.
///
/// A strategy only sees the keyspace through its table walk, the
/// per-key metadata and deletion; new strategies plug into the
/// keyspace engine without modifying it.
pub(crate) trait EvictionStrategy: Send + Sync {
    /// Runs the strategy once, returning the number of keys evicted.
    fn evict(&self, state: &mut State) -> usize;
}

/// Approximated-LRU eviction.
///
/// Samples up to `sample_size` keys and deletes the one with the
/// earliest recorded last-access clock, trading exactness for
/// constant per-key overhead. With a sample at least as large as the
/// keyspace the choice is exact.
pub(crate) struct SampledLruEvict {
    sample_size: usize,
}

impl SampledLruEvict {
    pub(crate) fn new(sample_size: usize) -> SampledLruEvict {
        SampledLruEvict { sample_size }
    }

    /// The sampled key with the strictly earliest last-access clock,
    /// if any. Ties keep the first key observed; iteration order is
    /// unspecified, so tie resolution is not a guaranteed property.
    fn find_least_recently_used(&self, state: &State) -> Option<String> {
        let mut sampled = Vec::with_capacity(self.sample_size);
        state.for_each(|key, _| {
            sampled.push(key.to_string());
            sampled.len() < self.sample_size
        });

        let mut earliest = lru_clock();
        let mut victim = None;
        for key in sampled {
            if let Some(meta) = state.get_metadata(&key) {
                if meta.last_accessed() < earliest {
                    earliest = meta.last_accessed();
                    victim = Some(key);
                }
            }
        }
        victim
    }
}

impl EvictionStrategy for SampledLruEvict {
    fn evict(&self, state: &mut State) -> usize {
        let victim = match self.find_least_recently_used(state) {
            Some(key) => key,
            None => return 0,
        };
        if state.delete(&victim) {
            debug!(LOGGER, "evicted least-recently-used key, {}", victim);
            EVICTED_KEY_COUNTER.inc();
            1
        } else {
            0
        }
    }
}
