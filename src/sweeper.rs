//! Active expiration: a probabilistic background pass that bounds
//! how many stale keys can accumulate between reads.

use slog::debug;
use tokio::time::{self, Duration, MissedTickBehavior};

use crate::config::{config_sweep_interval_or_default, LOGGER};
use crate::db::{Db, State};
use crate::metrics::REMOVED_EXPIRED_KEY_COUNTER;

/// Removes expired keys from the keyspace when executed.
///
/// Like eviction, sweeping is a pluggable strategy over the table
/// walk and deletion; callers control the cadence.
pub(crate) trait SweepStrategy: Send + Sync {
    fn sweep(&self, state: &mut State);
}

/// Sampled expiry sweep.
///
/// Each pass visits up to `sample_limit` keys carrying an expiry and
/// deletes the elapsed ones. Passes repeat while the expired
/// fraction of the sample stays at or above `rerun_threshold`, so a
/// keyspace full of stale keys is drained in a handful of passes
/// while a mostly-fresh one costs a single bounded walk.
pub(crate) struct SampleSweepExpiry {
    sample_limit: usize,
    rerun_threshold: f64,
}

impl SampleSweepExpiry {
    /// Panics unless `rerun_threshold` lies in `(0, 0.99)`; a
    /// threshold outside that range would make the rerun loop either
    /// spin forever or never run.
    pub(crate) fn new(sample_limit: usize, rerun_threshold: f64) -> SampleSweepExpiry {
        if rerun_threshold <= 0.0 || rerun_threshold >= 0.99 {
            panic!("rerun threshold must be in the range (0, 0.99)");
        }
        SampleSweepExpiry {
            sample_limit,
            rerun_threshold,
        }
    }

    /// Runs one pass and returns the expired fraction of the sample.
    fn sweep_sample(&self, state: &mut State) -> f64 {
        let mut searched = 0usize;
        let mut doomed = Vec::new();

        state.for_each(|key, expiry| {
            if let Some(at) = expiry {
                searched += 1;
                if at.is_expired() {
                    doomed.push(key.to_string());
                }
            }
            searched < self.sample_limit
        });

        let mut expired = 0u64;
        for key in &doomed {
            if state.delete(key) {
                expired += 1;
            }
        }
        if expired > 0 {
            REMOVED_EXPIRED_KEY_COUNTER
                .with_label_values(&["active"])
                .inc_by(expired);
        }

        if searched > 0 {
            expired as f64 / searched as f64
        } else {
            0.0
        }
    }
}

impl SweepStrategy for SampleSweepExpiry {
    fn sweep(&self, state: &mut State) {
        loop {
            let fraction = self.sweep_sample(state);
            debug!(LOGGER, "sweep pass expired {:.0}% of the sample", fraction * 100.0);
            if fraction < self.rerun_threshold {
                break;
            }
        }
    }
}

/// Periodic driver for the sweep strategy.
///
/// Owned by the server run loop; ticks the keyspace's sweep at a
/// fixed interval until the server shuts down.
pub struct Sweeper {
    db: Db,
}

impl Sweeper {
    pub fn new(db: Db) -> Sweeper {
        Sweeper { db }
    }

    pub async fn run(&self) {
        let mut interval =
            time::interval(Duration::from_millis(config_sweep_interval_or_default()));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            self.db.sweep_expired();
        }
    }
}
