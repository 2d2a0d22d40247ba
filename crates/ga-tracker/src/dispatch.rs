//! Beacon delivery
//!
//! Each tracker owns a small dedicated tokio runtime. Beacons are sent as
//! one task each, either awaited by the caller (synchronous mode) or left
//! running in the background. Delivery problems are logged and counted,
//! never returned to the caller.

use async_trait::async_trait;
use reqwest::Client;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::{Handle, Runtime};

use crate::config::TrackerSettings;
use crate::error::{Result, TrackerError};

/// Seam for the HTTP GET that delivers a beacon
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Perform a GET, following redirects, and return the final status code
    async fn get(&self, url: &str, user_agent: Option<&str>) -> anyhow::Result<u16>;
}

/// `HttpClient` backed by reqwest
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    /// Build a client with the timeouts and redirect limit from `settings`
    pub fn new(settings: &TrackerSettings) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout())
            .timeout(settings.request_timeout())
            .redirect(reqwest::redirect::Policy::limited(settings.max_redirects))
            .build()
            .map_err(|e| TrackerError::HttpClient(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str, user_agent: Option<&str>) -> anyhow::Result<u16> {
        let mut request = self.client.get(url);
        if let Some(user_agent) = user_agent {
            request = request.header(reqwest::header::USER_AGENT, user_agent);
        }

        let response = request.send().await?;
        Ok(response.status().as_u16())
    }
}

/// A fully built tracking request ready to be sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Beacon {
    pub url: String,
    pub user_agent: Option<String>,
}

/// Delivery counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    /// Beacons answered with a 2xx status
    pub delivered: u64,
    /// Beacons answered with any other status
    pub rejected: u64,
    /// Beacons that never got a response (DNS, connect, timeout...)
    pub failed: u64,
    /// Beacons logged instead of sent in debug mode
    pub skipped: u64,
}

#[derive(Default)]
struct Counters {
    delivered: AtomicU64,
    rejected: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

/// Number of beacons currently being sent
#[derive(Default)]
struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

impl InFlight {
    fn enter(self: &Arc<Self>) -> InFlightGuard {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        InFlightGuard(Arc::clone(self))
    }

    fn current(&self) -> usize {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until nothing is in flight; false if `timeout` elapsed first
    fn wait_idle(&self, timeout: Duration) -> bool {
        let count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        let (count, _) = self
            .idle
            .wait_timeout_while(count, timeout, |count| *count > 0)
            .unwrap_or_else(PoisonError::into_inner);
        *count == 0
    }
}

/// Decrements the in-flight count when the task finishes, panics included
struct InFlightGuard(Arc<InFlight>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut count = self.0.count.lock().unwrap_or_else(PoisonError::into_inner);
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.0.idle.notify_all();
        }
    }
}

/// Sends beacons on a runtime owned by one tracker
pub struct Dispatcher {
    client: Arc<dyn HttpClient>,
    runtime: Mutex<Option<Runtime>>,
    in_flight: Arc<InFlight>,
    counters: Arc<Counters>,
    debug: bool,
}

impl Dispatcher {
    /// Start the dispatch runtime.
    ///
    /// In debug mode beacons are logged and never handed to `client`.
    pub fn new(client: Arc<dyn HttpClient>, debug: bool) -> Result<Self> {
        // Tracking stays in the background: one worker, no OS priority control
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("ga-dispatch")
            .enable_all()
            .build()?;

        Ok(Self {
            client,
            runtime: Mutex::new(Some(runtime)),
            in_flight: Arc::new(InFlight::default()),
            counters: Arc::new(Counters::default()),
            debug,
        })
    }

    /// Send in the background and return immediately
    pub fn dispatch_async(&self, beacon: Beacon) -> Result<()> {
        let handle = self.handle()?;
        let guard = self.in_flight.enter();
        let delivery = deliver(
            Arc::clone(&self.client),
            Arc::clone(&self.counters),
            beacon,
            self.debug,
        );

        handle.spawn(async move {
            delivery.await;
            drop(guard);
        });
        Ok(())
    }

    /// Send and block the calling thread until the request completes.
    ///
    /// Safe to call from inside another runtime: the request runs on the
    /// dispatch runtime while the caller waits on a channel.
    pub fn dispatch_sync(&self, beacon: Beacon) -> Result<()> {
        let handle = self.handle()?;
        let guard = self.in_flight.enter();
        let delivery = deliver(
            Arc::clone(&self.client),
            Arc::clone(&self.counters),
            beacon,
            self.debug,
        );
        let (done_tx, done_rx) = mpsc::channel();

        handle.spawn(async move {
            delivery.await;
            drop(guard);
            let _ = done_tx.send(());
        });

        if done_rx.recv().is_err() {
            tracing::debug!("dispatch runtime stopped before the beacon completed");
        }
        Ok(())
    }

    pub fn stats(&self) -> DispatchStats {
        self.counters.snapshot()
    }

    /// Beacons spawned but not finished yet
    pub fn in_flight(&self) -> usize {
        self.in_flight.current()
    }

    /// Wait up to `timeout` for in-flight beacons; true if all finished
    pub fn drain(&self, timeout: Duration) -> bool {
        self.in_flight.wait_idle(timeout)
    }

    /// Drain, then stop the runtime. Later dispatches fail with
    /// `TrackerError::NotInitialized`.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        let drained = self.drain(timeout);
        if !drained {
            tracing::warn!(
                pending = self.in_flight(),
                "shutting down with tracking requests still in flight"
            );
        }

        let runtime = self
            .runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(runtime) = runtime {
            runtime.shutdown_background();
        }
        drained
    }

    pub fn is_shut_down(&self) -> bool {
        self.runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    fn handle(&self) -> Result<Handle> {
        self.runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|runtime| runtime.handle().clone())
            .ok_or(TrackerError::NotInitialized("dispatcher has been shut down"))
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        // Never blocks, so dropping inside an async context is fine
        let runtime = self
            .runtime
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(runtime) = runtime {
            runtime.shutdown_background();
        }
    }
}

async fn deliver(
    client: Arc<dyn HttpClient>,
    counters: Arc<Counters>,
    beacon: Beacon,
    debug: bool,
) {
    if debug {
        counters.skipped.fetch_add(1, Ordering::Relaxed);
        tracing::info!(url = %beacon.url, "debug mode, tracking request not sent");
        return;
    }

    match client.get(&beacon.url, beacon.user_agent.as_deref()).await {
        Ok(status) if (200..300).contains(&status) => {
            counters.delivered.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(url = %beacon.url, status, "tracking request delivered");
        }
        Ok(status) => {
            counters.rejected.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(url = %beacon.url, status, "tracking request rejected");
        }
        Err(error) => {
            counters.failed.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(url = %beacon.url, error = %error, "tracking request failed");
        }
    }
}
