//! Main tracker

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::config::{AnalyticsConfig, TrackerSettings};
use crate::dispatch::{Beacon, DispatchStats, Dispatcher, HttpClient, ReqwestHttpClient};
use crate::error::{Result, TrackerError};
use crate::protocol::{ProtocolVersion, UrlBuilder};
use crate::request::RequestData;

/// Referrer site used by `track_page_view` when no host name is given
const DEFAULT_REFERRER_SITE: &str = "localhost";

/// Config and builder, locked together while a URL is built
struct TrackingState {
    config: AnalyticsConfig,
    builder: Box<dyn UrlBuilder>,
}

/// Sends page views and events as tracking beacons.
///
/// Every tracking method validates its input and builds the beacon URL
/// before returning, so argument errors always surface to the caller. What
/// happens to the HTTP request afterwards is only visible in the logs and
/// in [`Tracker::stats`].
///
/// ```rust,no_run
/// use ga_tracker::{AnalyticsConfig, ProtocolVersion, Tracker};
///
/// let tracker = Tracker::new(AnalyticsConfig::new("UA-12345-1"), ProtocolVersion::V4_7_2)?;
/// tracker.track_page_view("/home", Some("Home"), Some("example.com"))?;
/// tracker.track_event("video", "play", Some("intro"), Some(1))?;
/// tracker.shutdown(std::time::Duration::from_secs(2));
/// # Ok::<(), ga_tracker::TrackerError>(())
/// ```
pub struct Tracker {
    version: ProtocolVersion,
    enabled: AtomicBool,
    asynchronous: AtomicBool,
    state: Mutex<TrackingState>,
    dispatcher: Dispatcher,
}

impl Tracker {
    /// Create a tracker with default settings and the reqwest HTTP client
    pub fn new(config: AnalyticsConfig, version: ProtocolVersion) -> Result<Self> {
        Self::builder(config).version(version).build()
    }

    pub fn builder(config: AnalyticsConfig) -> TrackerBuilder {
        TrackerBuilder {
            config,
            version: ProtocolVersion::default(),
            settings: TrackerSettings::default(),
            http_client: None,
        }
    }

    /// Track a page view referred from the root of its own host
    pub fn track_page_view(
        &self,
        url: &str,
        title: Option<&str>,
        host: Option<&str>,
    ) -> Result<()> {
        let host = host.filter(|h| !h.trim().is_empty());
        let site = host.unwrap_or(DEFAULT_REFERRER_SITE);
        self.track_page_view_from_referrer(url, title, host, site, "/")
    }

    /// Track a page view that followed a link from `referrer_site`
    pub fn track_page_view_from_referrer(
        &self,
        url: &str,
        title: Option<&str>,
        host: Option<&str>,
        referrer_site: &str,
        referrer_page: &str,
    ) -> Result<()> {
        required("referrer site", referrer_site)?;
        let data = page_view_data(url, title, host)?.with_referrer(referrer_site, referrer_page);
        self.make_custom_request(data)
    }

    /// Track a page view that came from a search engine
    pub fn track_page_view_from_search(
        &self,
        url: &str,
        title: Option<&str>,
        host: Option<&str>,
        search_source: &str,
        search_keywords: &str,
    ) -> Result<()> {
        required("search source", search_source)?;
        let data =
            page_view_data(url, title, host)?.with_search_referrer(search_source, search_keywords);
        self.make_custom_request(data)
    }

    /// Track an event. Category and action are required.
    pub fn track_event(
        &self,
        category: &str,
        action: &str,
        label: Option<&str>,
        value: Option<i32>,
    ) -> Result<()> {
        if category.trim().is_empty() {
            return Err(TrackerError::InvalidArgument(
                "event category cannot be empty".to_string(),
            ));
        }
        if action.trim().is_empty() {
            return Err(TrackerError::InvalidArgument(
                "event action cannot be empty".to_string(),
            ));
        }

        let mut data = RequestData::event(category, action);
        data.event_label = label.map(str::to_string);
        data.event_value = value;
        self.make_custom_request(data)
    }

    /// Build and dispatch a beacon for arbitrary request data.
    ///
    /// A disabled tracker accepts and drops every request. Otherwise invalid
    /// data fails with `InvalidRequest` before anything is sent, whatever the
    /// dispatch mode.
    pub fn make_custom_request(&self, data: RequestData) -> Result<()> {
        if !self.is_enabled() {
            tracing::debug!("tracking disabled, dropping request");
            return Ok(());
        }

        if self.dispatcher.is_shut_down() {
            return Err(TrackerError::NotInitialized("tracker has been shut down"));
        }
        data.validate()?;

        let beacon = {
            let mut state = self.lock_state();
            let TrackingState { config, builder } = &mut *state;
            Beacon {
                url: builder.build_url(config, &data)?,
                user_agent: config.user_agent.clone(),
            }
        };

        if self.is_asynchronous() {
            self.dispatcher.dispatch_async(beacon)
        } else {
            self.dispatcher.dispatch_sync(beacon)
        }
    }

    /// Build the beacon URL for `data` without sending it
    pub fn build_url(&self, data: &RequestData) -> Result<String> {
        let mut state = self.lock_state();
        let TrackingState { config, builder } = &mut *state;
        builder.build_url(config, data)
    }

    /// Start a new session on the next tracking request
    pub fn reset_session(&self) {
        let mut state = self.lock_state();
        let TrackingState { config, builder } = &mut *state;
        builder.reset_session(config);
        tracing::debug!(session_id = config.session_id, "tracking session reset");
    }

    /// Snapshot of the current config
    pub fn config(&self) -> AnalyticsConfig {
        self.lock_state().config.clone()
    }

    /// Mutate the config; takes effect on the next built URL
    pub fn update_config(&self, update: impl FnOnce(&mut AnalyticsConfig)) {
        update(&mut self.lock_state().config);
    }

    pub fn protocol_version(&self) -> ProtocolVersion {
        self.version
    }

    /// Set if requests are dispatched in the background (true by default)
    pub fn set_asynchronous(&self, asynchronous: bool) {
        self.asynchronous.store(asynchronous, Ordering::Relaxed);
    }

    pub fn is_asynchronous(&self) -> bool {
        self.asynchronous.load(Ordering::Relaxed)
    }

    /// Set if tracking requests are dispatched at all (true by default)
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Delivery counters since the tracker was created
    pub fn stats(&self) -> DispatchStats {
        self.dispatcher.stats()
    }

    /// Wait up to `timeout` for background requests; true if all finished
    pub fn flush(&self, timeout: Duration) -> bool {
        self.dispatcher.drain(timeout)
    }

    /// Wait up to `timeout` for background requests, then stop dispatching.
    ///
    /// Blocks the calling thread. Returns false if requests were still in
    /// flight when the timeout elapsed; those are abandoned.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        self.dispatcher.shutdown(timeout)
    }

    fn lock_state(&self) -> MutexGuard<'_, TrackingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn page_view_data(url: &str, title: Option<&str>, host: Option<&str>) -> Result<RequestData> {
    if url.trim().is_empty() {
        return Err(TrackerError::InvalidArgument(
            "page URL cannot be empty, the beacon would not be tracked".to_string(),
        ));
    }

    let mut data = RequestData::page_view(url);
    data.page_title = title.map(str::to_string);
    data.host_name = host.map(str::to_string);
    Ok(data)
}

fn required(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(TrackerError::InvalidArgument(format!("{name} cannot be empty")));
    }
    Ok(())
}

/// Configures and starts a [`Tracker`]
pub struct TrackerBuilder {
    config: AnalyticsConfig,
    version: ProtocolVersion,
    settings: TrackerSettings,
    http_client: Option<Arc<dyn HttpClient>>,
}

impl TrackerBuilder {
    pub fn version(mut self, version: ProtocolVersion) -> Self {
        self.version = version;
        self
    }

    pub fn settings(mut self, settings: TrackerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Replace the reqwest client, e.g. with a test double
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn build(self) -> Result<Tracker> {
        let client = match self.http_client {
            Some(client) => client,
            None => Arc::new(ReqwestHttpClient::new(&self.settings)?),
        };
        let dispatcher = Dispatcher::new(client, self.settings.debug)?;
        let builder = self.version.builder(&self.settings.endpoint);

        tracing::debug!(
            version = %self.version,
            endpoint = %self.settings.endpoint,
            enabled = self.settings.enabled,
            asynchronous = self.settings.asynchronous,
            "tracker created"
        );

        Ok(Tracker {
            version: self.version,
            enabled: AtomicBool::new(self.settings.enabled),
            asynchronous: AtomicBool::new(self.settings.asynchronous),
            state: Mutex::new(TrackingState {
                config: self.config,
                builder,
            }),
            dispatcher,
        })
    }
}
