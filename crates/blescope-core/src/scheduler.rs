//! Timer-driven tick loop.
//!
//! A [`Poller`] owns the [`DeviceRegistry`] and a [`SnapshotSource`]. Every
//! poll interval it fetches one snapshot, bounded by the fetch timeout, runs
//! the registry tick and publishes an immutable [`RegistryView`] on a
//! `watch` channel. Ticks never overlap: a slow fetch delays the next tick.
//! Fetch failures are logged and turned into an ageing-only tick.
//!
//! Tests call [`Poller::poll_once`] directly with a chosen clock.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::config::Config;
use crate::registry::{DeviceRegistry, RegistryView, TickReport};
use crate::source::{SnapshotSource, SourceError};

/// Receiving side of the published registry view.
pub type ViewReceiver = watch::Receiver<Arc<RegistryView>>;

/// Drives a registry from a snapshot source.
#[derive(Debug)]
pub struct Poller<S> {
    registry: DeviceRegistry,
    source: S,
    poll_interval: Duration,
    fetch_timeout: Duration,
    publisher: watch::Sender<Arc<RegistryView>>,
}

impl<S: SnapshotSource> Poller<S> {
    /// Create a poller and the receiver its views are published on.
    pub fn new(
        registry: DeviceRegistry,
        source: S,
        poll_interval: Duration,
        fetch_timeout: Duration,
    ) -> (Self, ViewReceiver) {
        let (publisher, receiver) = watch::channel(Arc::new(registry.view()));
        let poller = Self {
            registry,
            source,
            poll_interval,
            fetch_timeout,
            publisher,
        };
        (poller, receiver)
    }

    /// Poller with registry and timing taken from `config`.
    pub fn from_config(config: &Config, source: S) -> (Self, ViewReceiver) {
        Self::new(
            DeviceRegistry::new(config),
            source,
            config.feed.poll_interval(),
            config.feed.fetch_timeout(),
        )
    }

    /// Another receiver for the published views.
    #[must_use]
    pub fn subscribe(&self) -> ViewReceiver {
        self.publisher.subscribe()
    }

    /// The registry driven by this poller.
    #[must_use]
    pub const fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Fetch once, tick the registry at `now` and publish the result.
    pub async fn poll_once(&mut self, now: DateTime<Utc>) -> TickReport {
        let report = match self.fetch().await {
            Ok(snapshot) => self.registry.tick(&snapshot, now),
            Err(e) => {
                warn!(error = %e, "Feed fetch failed, ageing previously active devices");
                self.registry.tick_unavailable(now)
            }
        };
        self.publisher.send_replace(Arc::new(self.registry.view()));
        report
    }

    async fn fetch(&mut self) -> Result<crate::observation::Snapshot, SourceError> {
        tokio::time::timeout(self.fetch_timeout, self.source.fetch())
            .await
            .unwrap_or_else(|_| {
                Err(SourceError::Timeout {
                    timeout_ms: u64::try_from(self.fetch_timeout.as_millis()).unwrap_or(u64::MAX),
                })
            })
    }

    /// Tick every poll interval until `shutdown` resolves, then return the
    /// registry.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) -> DeviceRegistry {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(
            interval_ms = self.poll_interval.as_millis(),
            timeout_ms = self.fetch_timeout.as_millis(),
            "Poller started"
        );

        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => break,
                _ = interval.tick() => {
                    self.poll_once(Utc::now()).await;
                }
            }
        }

        info!(ticks = self.registry.tick_count(), "Poller stopped");
        self.registry
    }
}
