use crate::DEFAULT_PORT;

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use lazy_static::lazy_static;
use serde::Deserialize;
use slog::{o, Drain};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    server: Option<Server>,
    storage: Option<Storage>,
    expiration: Option<Expiration>,
}

#[derive(Debug, Deserialize, Clone, Default)]
struct Server {
    host: Option<String>,
    port: Option<u16>,
    log_level: Option<String>,
    log_request: Option<bool>,
}

#[derive(Debug, Deserialize, Clone, Default)]
struct Storage {
    max_keys: Option<usize>,
    eviction_sample_size: Option<usize>,
    eviction_ratio: Option<f64>,
}

#[derive(Debug, Deserialize, Clone, Default)]
struct Expiration {
    sample_limit: Option<usize>,
    rerun_threshold: Option<f64>,
    sweep_interval_ms: Option<u64>,
}

// Config
pub static mut SERVER_CONFIG: Option<Config> = None;

// Flipped by the CLI, independently of the config file.
static LOG_REQUEST: AtomicBool = AtomicBool::new(false);

lazy_static! {
    pub static ref LOGGER: slog::Logger = {
        let decorator = slog_term::PlainSyncDecorator::new(io::stdout());
        let drain = slog_term::FullFormat::new(decorator).build();
        let drain = drain
            .filter_level(slog::Level::from_usize(log_level()).unwrap_or(slog::Level::Info))
            .fuse();
        slog::Logger::root(drain, o!())
    };
}

pub fn set_global_config(config: Config) {
    unsafe {
        SERVER_CONFIG.replace(config);
    }
}

pub fn set_log_request(enabled: bool) {
    if enabled {
        LOG_REQUEST.store(true, Ordering::Relaxed);
    }
}

pub fn config_host_or_default() -> String {
    unsafe {
        if let Some(c) = &SERVER_CONFIG {
            if let Some(s) = c.server.as_ref().and_then(|s| s.host.clone()) {
                return s;
            }
        }
    }

    "0.0.0.0".to_owned()
}

pub fn config_port_or_default() -> u16 {
    unsafe {
        if let Some(c) = &SERVER_CONFIG {
            if let Some(p) = c.server.as_ref().and_then(|s| s.port) {
                return p;
            }
        }
    }

    DEFAULT_PORT
}

pub fn config_log_request_or_default() -> bool {
    if LOG_REQUEST.load(Ordering::Relaxed) {
        return true;
    }
    unsafe {
        if let Some(c) = &SERVER_CONFIG {
            if let Some(l) = c.server.as_ref().and_then(|s| s.log_request) {
                return l;
            }
        }
    }

    false
}

fn log_level_str() -> String {
    unsafe {
        if let Some(c) = &SERVER_CONFIG {
            if let Some(l) = c.server.as_ref().and_then(|s| s.log_level.clone()) {
                return l;
            }
        }
    }
    "info".to_owned()
}

pub fn log_level() -> usize {
    let level_str = log_level_str();
    match level_str.as_str() {
        "off" => 0,
        "critical" => 1,
        "error" => 2,
        "warning" => 3,
        "info" => 4,
        "debug" => 5,
        "trace" => 6,
        _ => 4,
    }
}

pub fn config_max_keys_or_default() -> usize {
    unsafe {
        if let Some(c) = &SERVER_CONFIG {
            if let Some(n) = c.storage.as_ref().and_then(|s| s.max_keys) {
                return n;
            }
        }
    }

    // default hard cap on live keys
    100
}

pub fn config_eviction_sample_size_or_default() -> usize {
    unsafe {
        if let Some(c) = &SERVER_CONFIG {
            if let Some(n) = c.storage.as_ref().and_then(|s| s.eviction_sample_size) {
                return n;
            }
        }
    }

    // default keys examined per eviction attempt
    5
}

/// Reserved; the eviction engine currently removes exactly one
/// victim per call regardless of this ratio.
pub fn config_eviction_ratio_or_default() -> f64 {
    unsafe {
        if let Some(c) = &SERVER_CONFIG {
            if let Some(r) = c.storage.as_ref().and_then(|s| s.eviction_ratio) {
                return r;
            }
        }
    }

    0.40
}

pub fn config_sweep_sample_limit_or_default() -> usize {
    unsafe {
        if let Some(c) = &SERVER_CONFIG {
            if let Some(n) = c.expiration.as_ref().and_then(|e| e.sample_limit) {
                return n;
            }
        }
    }

    // default keys-with-expiry examined per sweep pass
    20
}

pub fn config_sweep_rerun_threshold_or_default() -> f64 {
    unsafe {
        if let Some(c) = &SERVER_CONFIG {
            if let Some(t) = c.expiration.as_ref().and_then(|e| e.rerun_threshold) {
                return t;
            }
        }
    }

    // default expired fraction above which a sweep pass reruns
    0.25
}

pub fn config_sweep_interval_or_default() -> u64 {
    unsafe {
        if let Some(c) = &SERVER_CONFIG {
            if let Some(ms) = c.expiration.as_ref().and_then(|e| e.sweep_interval_ms) {
                return ms;
            }
        }
    }

    // default sweep cadence in ms
    100
}

pub fn config_local_pool_number() -> usize {
    // default use 8 localset pool to handle connections
    8
}

pub fn config_max_connection() -> usize {
    // default max concurrent connections
    10000
}
