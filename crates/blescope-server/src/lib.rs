//! # blescope-server
//!
//! HTTP daemon library for the blescope BLE beacon monitor.
//!
//! This library provides the feed clients, the API handlers and the shared
//! state the handlers read from.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

pub mod api;
pub mod feed;
pub mod logging;
pub mod state;

pub use api::create_router;
pub use feed::{HttpSource, WardrivingPoller};
pub use state::AppState;
