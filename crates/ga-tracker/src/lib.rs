//! # ga-tracker
//!
//! Fire-and-forget Google Analytics tracking for desktop applications.
//!
//! Page views and events are turned into `__utm.gif` beacons and sent with
//! an HTTP GET, by default on a background runtime so the caller never
//! waits on the network.
//!
//! ## Guarantees
//!
//! - **Fail Fast on Bad Input**: missing page URLs or event fields are
//!   reported to the caller before anything is sent
//! - **Fail Gracefully on Delivery**: HTTP errors and bad status codes are
//!   logged, never returned, never panic
//! - **Best Effort**: no retries, no queueing across restarts, no ordering
//!   between background requests
//! - **Clean Exit**: `Tracker::shutdown` drains in-flight requests
//!
//! ## Opt-Out
//!
//! `TrackerSettings::from_env()` honours:
//!
//! ```bash
//! export GA_TRACKER_DISABLED=1
//! export DO_NOT_TRACK=1
//! # log beacons instead of sending them
//! export GA_TRACKER_DEBUG=1
//! ```

pub mod config;
pub mod dispatch;
pub mod environment;
pub mod error;
pub mod protocol;
pub mod request;
pub mod tracker;
pub mod visitor;

pub use config::{AnalyticsConfig, TrackerSettings};
pub use dispatch::{DispatchStats, HttpClient, ReqwestHttpClient};
pub use environment::{populate_from_system, DesktopProfile};
pub use error::{Result, TrackerError};
pub use protocol::{ProtocolVersion, UrlBuilder};
pub use request::{Referral, RequestData};
pub use tracker::{Tracker, TrackerBuilder};
