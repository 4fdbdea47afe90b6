//! Application state shared across handlers.
//!
//! Handlers never touch the registry. They read the latest immutable view the
//! poller published and the latest wardriving state.

use std::sync::Arc;
use std::time::Instant;

use blescope_core::{Config, FingerprintMatcher, RegistryView, ViewReceiver};
use tokio::sync::watch;

use crate::feed::{unconfigured_wardriving, WardrivingReceiver, WardrivingState};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    devices: ViewReceiver,
    wardriving: WardrivingReceiver,
    matcher: FingerprintMatcher,
    timeline_capacity: usize,
    started_at: Instant,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(config: &Config, devices: ViewReceiver, wardriving: WardrivingReceiver) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                devices,
                wardriving,
                matcher: FingerprintMatcher::new(config.fingerprint.rules.clone()),
                timeline_capacity: config.registry.timeline_capacity,
                started_at: Instant::now(),
            }),
        }
    }

    /// State serving a fixed view, without any pollers.
    #[must_use]
    pub fn from_view(config: &Config, view: RegistryView) -> Self {
        let (_, devices) = watch::channel(Arc::new(view));
        Self::new(config, devices, unconfigured_wardriving())
    }

    /// Latest published registry view.
    #[must_use]
    pub fn view(&self) -> Arc<RegistryView> {
        Arc::clone(&self.inner.devices.borrow())
    }

    /// Latest published wardriving state.
    #[must_use]
    pub fn wardriving(&self) -> Arc<WardrivingState> {
        Arc::clone(&self.inner.wardriving.borrow())
    }

    /// Matcher used to enrich wardriving entries.
    #[must_use]
    pub fn matcher(&self) -> &FingerprintMatcher {
        &self.inner.matcher
    }

    /// Number of ticks the timeline retains.
    #[must_use]
    pub fn timeline_capacity(&self) -> usize {
        self.inner.timeline_capacity
    }

    /// Seconds since the state was created.
    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.inner.started_at.elapsed().as_secs()
    }
}
