//! Host backend configuration.
//!
//! Defaults come from the environment, read once per process:
//!
//! - `STRIDEFFT_HOST_THREADS`: worker threads for batched execution
//!   (defaults to the number of CPUs with the `parallel` feature, else `1`)
//! - `STRIDEFFT_DEBUG`: `1`/`true`/`yes`/`on` enables per-enqueue logging
//!
//! Unparsable values fall back to the defaults. [`set_host_threads`]
//! overrides the thread count for backends created afterwards.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

pub const THREADS_ENV: &str = "STRIDEFFT_HOST_THREADS";
pub const DEBUG_ENV: &str = "STRIDEFFT_DEBUG";

/// `0` means no override.
static HOST_THREADS_OVERRIDE: AtomicUsize = AtomicUsize::new(0);
static ENV_CONFIG: OnceLock<HostConfig> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostConfig {
    pub threads: usize,
    pub debug: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            debug: false,
        }
    }
}

impl HostConfig {
    /// Read the environment now, ignoring the process-wide cache.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let threads = std::env::var(THREADS_ENV)
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|&t| t > 0)
            .unwrap_or(defaults.threads);
        let debug = std::env::var(DEBUG_ENV)
            .map(|v| parse_flag(&v))
            .unwrap_or(defaults.debug);
        Self { threads, debug }
    }

    /// Environment defaults with programmatic overrides applied.
    pub fn global() -> Self {
        let mut config = *ENV_CONFIG.get_or_init(Self::from_env);
        let threads = HOST_THREADS_OVERRIDE.load(Ordering::Relaxed);
        if threads != 0 {
            config.threads = threads;
        }
        config
    }
}

/// Override the host thread count. Passing `0` reverts to the default.
pub fn set_host_threads(threads: usize) {
    HOST_THREADS_OVERRIDE.store(threads, Ordering::Relaxed);
}

fn default_threads() -> usize {
    #[cfg(feature = "parallel")]
    {
        num_cpus::get().max(1)
    }
    #[cfg(not(feature = "parallel"))]
    {
        1
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
