//! Wire-protocol versions and the URL builders that implement them

mod v4_7_2;

use serde::{Deserialize, Serialize};

use crate::config::AnalyticsConfig;
use crate::error::Result;
use crate::request::RequestData;

pub use v4_7_2::GoogleAnalyticsV4_7_2;

/// Turns config and request data into a beacon URL for one protocol version.
///
/// Implementations own the session-cookie state of the tracker that holds
/// them. They must reject requests they cannot encode instead of producing a
/// malformed beacon.
pub trait UrlBuilder: Send {
    fn version(&self) -> ProtocolVersion;

    /// Build the full beacon URL, endpoint included
    fn build_url(&mut self, config: &AnalyticsConfig, request: &RequestData) -> Result<String>;

    /// Start a new logical session on the next built URL.
    ///
    /// Regenerates `config.session_id`; other config fields stay as they are.
    fn reset_session(&mut self, config: &mut AnalyticsConfig);
}

/// Supported wire-protocol versions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum ProtocolVersion {
    #[default]
    V4_7_2,
}

impl ProtocolVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolVersion::V4_7_2 => "4.7.2",
        }
    }

    /// Create the builder for this version, posting beacons to `endpoint`
    pub fn builder(self, endpoint: &str) -> Box<dyn UrlBuilder> {
        match self {
            ProtocolVersion::V4_7_2 => Box::new(GoogleAnalyticsV4_7_2::new(endpoint)),
        }
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
