//! Shared hub state threaded through connections, handlers, and the
//! janitor.

use std::sync::Arc;

use crate::config::Config;
use crate::session::SessionRegistry;
use crate::stats::{FeedbackLog, StatsStore};

/// Everything a connection or HTTP handler needs, behind one `Arc`.
pub struct Hub {
    /// Validated configuration the hub was started with.
    pub config: Config,
    /// Live sessions and the device→session index.
    pub registry: SessionRegistry,
    /// Persisted usage counters.
    pub stats: StatsStore,
    /// Persisted feedback log.
    pub feedback: FeedbackLog,
}

impl Hub {
    /// Assemble the hub from its configuration.
    pub fn new(config: Config) -> Arc<Self> {
        let stats = StatsStore::load(config.hub.data_dir.join("stats.json"));
        let feedback = FeedbackLog::new(config.hub.data_dir.join("feedback.json"));
        Arc::new(Self {
            config,
            registry: SessionRegistry::new(),
            stats,
            feedback,
        })
    }
}
