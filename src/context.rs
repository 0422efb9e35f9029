//! Shared server state handed to every session (spec.md §4.1, §4.2).
//!
//! A fresh [`ServerContext`] is built once at startup and again on every
//! SIGHUP reload; each already-running session keeps the `Arc` it was
//! spawned with; only sessions accepted after the reload see the new one.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::config::Config;
use crate::store::RecordStore;

/// Everything a [`crate::session::Session`] needs to answer queries and
/// directives: the loaded configuration, the open record store, and the
/// process-wide child-slot accounting `-status` reports on.
pub struct ServerContext {
    config: Config,
    store: Mutex<RecordStore>,
    vendor: String,
    start_time: Instant,
    active_children: AtomicU32,
    next_session_id: AtomicU32,
}

impl ServerContext {
    pub fn new(config: Config, store: RecordStore, vendor: impl Into<String>) -> Self {
        ServerContext {
            config,
            store: Mutex::new(store),
            vendor: vendor.into(),
            start_time: Instant::now(),
            active_children: AtomicU32::new(0),
            next_session_id: AtomicU32::new(1),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Mutex<RecordStore> {
        &self.store
    }

    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// True when this instance carries no punt referrals, i.e. it has no
    /// upstream to punt to and sits at the root of the referral hierarchy
    /// (spec.md §4.4).
    pub fn is_root(&self) -> bool {
        self.config.punt_referrals.is_empty()
    }

    pub fn active_children(&self) -> u32 {
        self.active_children.load(Ordering::Acquire)
    }

    /// Claims one child slot if `max-children` (0 meaning unbounded) is not
    /// already saturated. Returns whether the slot was granted.
    pub fn acquire_child_slot(&self) -> bool {
        let ceiling = self.config.main.max_children;
        loop {
            let current = self.active_children.load(Ordering::Acquire);
            if ceiling != 0 && current >= ceiling {
                return false;
            }
            if self
                .active_children
                .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return true;
            }
        }
    }

    pub fn release_child_slot(&self) {
        self.active_children.fetch_sub(1, Ordering::AcqRel);
    }

    /// A process-unique, monotonically increasing id for spool filenames and
    /// tracing spans.
    pub fn next_session_id(&self) -> u64 {
        self.next_session_id.fetch_add(1, Ordering::Relaxed) as u64
    }
}
