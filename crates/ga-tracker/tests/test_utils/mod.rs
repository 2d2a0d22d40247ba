// HTTP test doubles and query helpers shared by the integration tests
//
// Each test binary only uses part of this module.
#![allow(dead_code)]

use async_trait::async_trait;
use ga_tracker::{AnalyticsConfig, HttpClient, Tracker, TrackerSettings};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A request seen by a test double
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub url: String,
    pub user_agent: Option<String>,
}

/// Answers every GET with a fixed status after an optional delay.
///
/// Requests are recorded once the delay has elapsed, so an empty record
/// means the simulated call has not completed yet.
pub struct RecordingClient {
    status: u16,
    delay: Duration,
    seen: Mutex<Vec<SeenRequest>>,
}

impl RecordingClient {
    pub fn new(status: u16) -> Arc<Self> {
        Self::slow(status, Duration::ZERO)
    }

    pub fn slow(status: u16, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            status,
            delay,
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn last_url(&self) -> String {
        self.requests()
            .last()
            .map(|r| r.url.clone())
            .expect("no request recorded")
    }
}

#[async_trait]
impl HttpClient for RecordingClient {
    async fn get(&self, url: &str, user_agent: Option<&str>) -> anyhow::Result<u16> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.seen.lock().unwrap().push(SeenRequest {
            url: url.to_string(),
            user_agent: user_agent.map(str::to_string),
        });
        Ok(self.status)
    }
}

/// Fails every GET as if the network were down
pub struct UnreachableClient;

#[async_trait]
impl HttpClient for UnreachableClient {
    async fn get(&self, url: &str, _user_agent: Option<&str>) -> anyhow::Result<u16> {
        anyhow::bail!("dns error: failed to lookup address for {url}")
    }
}

/// Route tracker logs to the test output; `RUST_LOG=ga_tracker=debug` shows beacons
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn test_config() -> AnalyticsConfig {
    let mut config = AnalyticsConfig::new("UA-12345-1");
    config.user_agent = Some("TestApp/1.0".to_string());
    config.user_language = Some("en-US".to_string());
    config.screen_resolution = Some("1920x1080".to_string());
    config.color_depth = Some("24".to_string());
    config
}

pub fn tracker_with(client: Arc<dyn HttpClient>, asynchronous: bool) -> Tracker {
    let settings = TrackerSettings {
        asynchronous,
        endpoint: "http://localhost/__utm.gif".to_string(),
        ..TrackerSettings::default()
    };

    Tracker::builder(test_config())
        .settings(settings)
        .http_client(client)
        .build()
        .unwrap()
}

/// Decoded query parameters of a beacon URL, in order
pub fn params(url: &str) -> Vec<(String, String)> {
    url::Url::parse(url)
        .unwrap()
        .query_pairs()
        .into_owned()
        .collect()
}

pub fn param(url: &str, key: &str) -> Option<String> {
    params(url)
        .into_iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v)
}

pub fn count_param(url: &str, key: &str) -> usize {
    params(url).iter().filter(|(k, _)| k == key).count()
}
