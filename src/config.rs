//! Engine configuration.

use std::time::Duration;

/// Default interval between reconcile ticks.
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(30);

/// Title given to safety-net threads.
pub const DEFAULT_THREAD_TITLE: &str = "New Chat";

/// Configuration for the sync engine.
///
/// Use the builder-style setters to customize behavior.
///
/// # Example
///
/// ```ignore
/// use threadsync::config::EngineConfig;
///
/// let config = EngineConfig::default()
///     .with_store_base_url("https://api.example.com")
///     .with_reconcile_interval(std::time::Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL of the authoritative record store
    pub store_base_url: String,
    /// Base URL of the agent streaming backend
    pub agent_base_url: String,
    /// Interval between periodic reconcile ticks
    pub reconcile_interval: Duration,
    /// Title used when the safety net creates a default thread
    pub default_thread_title: String,
    /// Maximum length of last-message previews, in bytes
    pub preview_max_chars: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store_base_url: "http://localhost:8080".to_string(),
            agent_base_url: "http://localhost:8080".to_string(),
            reconcile_interval: DEFAULT_RECONCILE_INTERVAL,
            default_thread_title: DEFAULT_THREAD_TITLE.to_string(),
            preview_max_chars: 80,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store_base_url(mut self, url: impl Into<String>) -> Self {
        self.store_base_url = url.into();
        self
    }

    pub fn with_agent_base_url(mut self, url: impl Into<String>) -> Self {
        self.agent_base_url = url.into();
        self
    }

    pub fn with_reconcile_interval(mut self, interval: Duration) -> Self {
        self.reconcile_interval = interval;
        self
    }

    pub fn with_default_thread_title(mut self, title: impl Into<String>) -> Self {
        self.default_thread_title = title.into();
        self
    }

    pub fn with_preview_max_chars(mut self, max: usize) -> Self {
        self.preview_max_chars = max;
        self
    }
}
