//! Tracking configuration and runtime settings

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Collection endpoint for the `__utm.gif` beacon protocol
pub const DEFAULT_ENDPOINT: &str = "http://www.google-analytics.com/__utm.gif";

/// Session-scoped tracking parameters shared by every request of a tracker.
///
/// Fields left as `None` are simply omitted from the beacon.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AnalyticsConfig {
    /// Account identifier, e.g. `UA-12345-1`
    pub tracking_code: String,

    /// Sent as the `User-Agent` header of every beacon
    #[serde(default)]
    pub user_agent: Option<String>,

    /// `language-REGION`, e.g. `en-US`
    #[serde(default)]
    pub user_language: Option<String>,

    /// `WIDTHxHEIGHT`
    #[serde(default)]
    pub screen_resolution: Option<String>,

    /// Comma-joined per-display bit depths
    #[serde(default)]
    pub color_depth: Option<String>,

    #[serde(default = "default_encoding")]
    pub encoding: Option<String>,

    #[serde(default)]
    pub flash_version: Option<String>,

    /// Identifies the current visit; regenerated by `reset_session`
    #[serde(default = "random_id")]
    pub session_id: u32,

    /// Identifies the visitor across sessions
    #[serde(default = "random_id")]
    pub visitor_id: u32,
}

impl AnalyticsConfig {
    /// Create a config for the given account with fresh random identifiers
    pub fn new(tracking_code: impl Into<String>) -> Self {
        Self {
            tracking_code: tracking_code.into(),
            user_agent: None,
            user_language: None,
            screen_resolution: None,
            color_depth: None,
            encoding: default_encoding(),
            flash_version: None,
            session_id: random_id(),
            visitor_id: random_id(),
        }
    }

    /// Replace the random visitor id with one that is stable for this machine
    pub fn with_machine_visitor_id(mut self) -> Self {
        self.visitor_id = crate::visitor::machine_visitor_id(&self.tracking_code);
        self
    }
}

fn default_encoding() -> Option<String> {
    Some("UTF-8".to_string())
}

/// Random positive 31-bit identifier, the range GA cookies accept
pub(crate) fn random_id() -> u32 {
    rand::thread_rng().gen_range(1..=0x7fff_ffff)
}

/// Runtime behaviour of a tracker
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TrackerSettings {
    /// Whether tracking requests are dispatched at all (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Dispatch on the background runtime instead of blocking (default: true)
    #[serde(default = "default_true")]
    pub asynchronous: bool,

    /// Debug mode - log beacons instead of sending them (default: false)
    #[serde(default)]
    pub debug: bool,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Upper bound for a whole beacon round trip, redirects included
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            asynchronous: true,
            debug: false,
            endpoint: default_endpoint(),
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            max_redirects: default_max_redirects(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_connect_timeout_ms() -> u64 {
    2_000
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

fn default_max_redirects() -> usize {
    10
}

impl TrackerSettings {
    /// Default settings with environment variable overrides applied
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        apply_env_overrides(&mut settings);
        settings
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Apply environment variable overrides
fn apply_env_overrides(settings: &mut TrackerSettings) {
    // GA_TRACKER_DISABLED=1 disables tracking
    if env::var("GA_TRACKER_DISABLED").is_ok() {
        settings.enabled = false;
        return;
    }

    // DO_NOT_TRACK=1 (universal opt-out)
    if env::var("DO_NOT_TRACK").is_ok() {
        settings.enabled = false;
        return;
    }

    if env::var("GA_TRACKER_DEBUG").is_ok() {
        settings.debug = true;
    }

    if env::var("GA_TRACKER_SYNC").is_ok() {
        settings.asynchronous = false;
    }

    if let Ok(endpoint) = env::var("GA_TRACKER_ENDPOINT") {
        if !endpoint.trim().is_empty() {
            settings.endpoint = endpoint.trim().to_string();
        }
    }

    // Auto-disable in CI unless explicitly enabled
    if is_ci() && env::var("GA_TRACKER_IN_CI").is_err() {
        settings.enabled = false;
    }
}

/// Check if running in CI environment
fn is_ci() -> bool {
    env::var("CI").is_ok()
        || env::var("CONTINUOUS_INTEGRATION").is_ok()
        || env::var("GITHUB_ACTIONS").is_ok()
        || env::var("GITLAB_CI").is_ok()
        || env::var("CIRCLECI").is_ok()
        || env::var("TRAVIS").is_ok()
}
