//! # blescope-core
//!
//! Signal inference core for the blescope BLE beacon monitor.
//!
//! This crate provides:
//! - Kalman smoothing of noisy signal strength samples
//! - Movement confidence scoring from smoothed history
//! - Proximity zones, liveness and heuristic device fingerprinting
//! - A per-tick device registry and the polling loop that drives it
//! - Configuration management
//!
//! ## Architecture
//!
//! Per tick a [`Snapshot`] flows through the pipeline owned by the
//! [`DeviceRegistry`]:
//!
//! ```text
//! snapshot -> smoother -> history -> movement -> proximity -> liveness -> fingerprint -> DeviceRecord
//! ```
//!
//! - [`smoother`] - Scalar Kalman filter per address
//! - [`history`] - Bounded FIFO of raw and smoothed samples per address
//! - [`movement`] - Weighted movement score over the smoothed window
//! - [`proximity`] - Zone classification and signal histogram
//! - [`liveness`] - Last-seen timeout check
//! - [`fingerprint`] - Prioritised identification rules
//! - [`manufacturer`] - Manufacturer normalisation and vendor service table
//! - [`observation`] - Lenient parsing of the feed payload
//! - [`registry`] - Orchestration, eviction and the active-count timeline
//! - [`source`] - Snapshot source abstraction
//! - [`scheduler`] - Timer-driven polling loop
//! - [`wardriving`] - Read-only capture log view
//! - [`config`] - Application configuration loading, saving, and validation
//! - [`error`] - Unified error types for the crate

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod history;
pub mod liveness;
pub mod manufacturer;
pub mod movement;
pub mod observation;
pub mod proximity;
pub mod registry;
pub mod scheduler;
pub mod smoother;
pub mod source;
pub mod wardriving;

// Re-export primary types for convenience
pub use config::{Config, ConfigError, ConfigResult};
pub use error::{BlescopeError, Result};
pub use fingerprint::{Category, FingerprintMatcher, FingerprintResult, FingerprintRule, Threat};
pub use history::{HistoryBuffer, HistoryEntry, HistoryStore};
pub use liveness::{is_live, LivenessTracker};
pub use manufacturer::{normalize_manufacturer, NormalizedManufacturer};
pub use movement::{Direction, MovementEstimator, MovementMetrics, Velocity};
pub use observation::{is_valid_address, normalize_address, RawObservation, ServiceId, Snapshot};
pub use proximity::{classify, HistogramBin, ProximityResult, Zone};
pub use registry::{DeviceRecord, DeviceRegistry, RegistryView, SortKey, TickReport, TimelinePoint};
pub use scheduler::{Poller, ViewReceiver};
pub use smoother::{KalmanFilter, SignalSmoother};
pub use source::{ScriptedSource, SnapshotSource, SourceError, StaticSource};
pub use wardriving::{WardrivingDataset, WardrivingEntry};
