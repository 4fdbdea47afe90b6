//! Where snapshots come from.
//!
//! The registry never talks to the network. A [`SnapshotSource`] produces one
//! [`Snapshot`] per tick and the scheduler hands it over. The server crate
//! implements the trait over HTTP; tests drive the registry with a
//! [`ScriptedSource`].

use std::collections::VecDeque;
use std::future::Future;

use thiserror::Error;

use crate::observation::Snapshot;

/// Why a fetch produced no snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The feed could not be reached or answered with an error status.
    #[error("data feed unavailable: {message}")]
    Unavailable {
        /// Transport or status detail.
        message: String,
    },

    /// The feed did not answer in time.
    #[error("data feed did not answer within {timeout_ms} ms")]
    Timeout {
        /// Configured fetch timeout.
        timeout_ms: u64,
    },

    /// The body was not a JSON object keyed by address.
    #[error("malformed feed payload: {message}")]
    Malformed {
        /// Parser detail.
        message: String,
    },
}

/// Produces one snapshot per tick.
pub trait SnapshotSource: Send {
    /// Fetch the current snapshot.
    fn fetch(&mut self) -> impl Future<Output = Result<Snapshot, SourceError>> + Send;
}

/// Replays a fixed sequence of fetch outcomes, then reports the feed as
/// unavailable.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    outcomes: VecDeque<Result<Snapshot, SourceError>>,
}

impl ScriptedSource {
    /// Source replaying `outcomes` in order.
    pub fn new(outcomes: impl IntoIterator<Item = Result<Snapshot, SourceError>>) -> Self {
        Self {
            outcomes: outcomes.into_iter().collect(),
        }
    }

    /// Queue another outcome.
    pub fn push(&mut self, outcome: Result<Snapshot, SourceError>) {
        self.outcomes.push_back(outcome);
    }

    /// Outcomes not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.outcomes.len()
    }
}

impl SnapshotSource for ScriptedSource {
    async fn fetch(&mut self) -> Result<Snapshot, SourceError> {
        self.outcomes.pop_front().unwrap_or_else(|| {
            Err(SourceError::Unavailable {
                message: "script exhausted".to_string(),
            })
        })
    }
}

/// Returns the same snapshot on every fetch.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    snapshot: Snapshot,
}

impl StaticSource {
    /// Source that always yields `snapshot`.
    #[must_use]
    pub const fn new(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }
}

impl SnapshotSource for StaticSource {
    async fn fetch(&mut self) -> Result<Snapshot, SourceError> {
        Ok(self.snapshot.clone())
    }
}
