//! HTTP clients for the scanner's JSON endpoints.
//!
//! [`HttpSource`] feeds the registry poller with the live
//! `address -> observation` mapping. [`WardrivingPoller`] refreshes the
//! cumulative capture log on its own, slower cadence and publishes it on a
//! `watch` channel for the API handlers.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use blescope_core::config::FeedConfig;
use blescope_core::{Snapshot, SnapshotSource, SourceError, WardrivingDataset};
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use url::Url;

/// A reqwest client bound to one feed URL.
#[derive(Debug, Clone)]
pub struct FeedClient {
    client: reqwest::Client,
    url: Url,
    timeout: Duration,
}

impl FeedClient {
    /// Build a client for `url` whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Unavailable`] if the URL does not parse or the
    /// HTTP client cannot be constructed.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, SourceError> {
        let url = Url::parse(url).map_err(|e| SourceError::Unavailable {
            message: format!("invalid feed URL '{url}': {e}"),
        })?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Unavailable {
                message: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            url,
            timeout,
        })
    }

    /// The endpoint this client fetches.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// GET the endpoint and return the body.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Timeout`] when the request outlives the client
    /// timeout and [`SourceError::Unavailable`] on transport errors or a
    /// non-success status.
    pub async fn get_text(&self) -> Result<String, SourceError> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| self.classify(&e))?;

        response.text().await.map_err(|e| self.classify(&e))
    }

    fn classify(&self, err: &reqwest::Error) -> SourceError {
        if err.is_timeout() {
            SourceError::Timeout {
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }
        } else {
            SourceError::Unavailable {
                message: err.to_string(),
            }
        }
    }
}

/// Live observation feed over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: FeedClient,
}

impl HttpSource {
    /// Source polling `url`.
    ///
    /// # Errors
    ///
    /// See [`FeedClient::new`].
    pub fn new(url: &str, timeout: Duration) -> Result<Self, SourceError> {
        Ok(Self {
            client: FeedClient::new(url, timeout)?,
        })
    }

    /// Source for the configured live feed.
    ///
    /// # Errors
    ///
    /// See [`FeedClient::new`].
    pub fn from_config(feed: &FeedConfig) -> Result<Self, SourceError> {
        Self::new(&feed.url, feed.fetch_timeout())
    }
}

impl SnapshotSource for HttpSource {
    async fn fetch(&mut self) -> Result<Snapshot, SourceError> {
        let body = self.client.get_text().await?;
        let snapshot = Snapshot::from_json_str(&body)?;
        debug!(devices = snapshot.len(), "Fetched feed snapshot");
        Ok(snapshot)
    }
}

/// Last known wardriving dataset as seen by the API.
#[derive(Debug, Clone, Default)]
pub struct WardrivingState {
    /// Whether a wardriving URL is configured at all.
    pub configured: bool,
    /// Most recent successfully parsed dataset.
    pub dataset: WardrivingDataset,
    /// When `dataset` was fetched. `None` until the first success.
    pub fetched_at: Option<DateTime<Utc>>,
    /// Error of the most recent refresh, cleared on success.
    pub last_error: Option<SourceError>,
}

/// Receiving side of the published wardriving state.
pub type WardrivingReceiver = watch::Receiver<Arc<WardrivingState>>;

/// Receiver for a deployment without a wardriving feed.
#[must_use]
pub fn unconfigured_wardriving() -> WardrivingReceiver {
    watch::channel(Arc::new(WardrivingState::default())).1
}

/// Periodically refreshes the wardriving dataset.
#[derive(Debug)]
pub struct WardrivingPoller {
    client: FeedClient,
    interval: Duration,
    publisher: watch::Sender<Arc<WardrivingState>>,
}

impl WardrivingPoller {
    /// Poller for `client` and the receiver its state is published on.
    #[must_use]
    pub fn new(client: FeedClient, interval: Duration) -> (Self, WardrivingReceiver) {
        let initial = WardrivingState {
            configured: true,
            ..WardrivingState::default()
        };
        let (publisher, receiver) = watch::channel(Arc::new(initial));
        (
            Self {
                client,
                interval,
                publisher,
            },
            receiver,
        )
    }

    /// Poller for the configured wardriving URL, or `None` with an
    /// unconfigured receiver when no URL is set.
    ///
    /// # Errors
    ///
    /// See [`FeedClient::new`].
    pub fn from_config(feed: &FeedConfig) -> Result<(Option<Self>, WardrivingReceiver), SourceError> {
        match feed.wardriving_url.as_deref() {
            Some(url) => {
                let client = FeedClient::new(url, feed.fetch_timeout())?;
                let (poller, receiver) = Self::new(client, feed.wardriving_interval());
                Ok((Some(poller), receiver))
            }
            None => Ok((None, unconfigured_wardriving())),
        }
    }

    /// Fetch and publish once. A failed refresh keeps the previous dataset.
    ///
    /// # Errors
    ///
    /// Returns the fetch or parse error after recording it in the published
    /// state.
    pub async fn poll_once(&self) -> Result<usize, SourceError> {
        let outcome = match self.client.get_text().await {
            Ok(body) => WardrivingDataset::from_json_str(&body),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(dataset) => {
                let count = dataset.len();
                self.publisher.send_replace(Arc::new(WardrivingState {
                    configured: true,
                    dataset,
                    fetched_at: Some(Utc::now()),
                    last_error: None,
                }));
                debug!(entries = count, "Refreshed wardriving dataset");
                Ok(count)
            }
            Err(e) => {
                self.publisher.send_modify(|state| {
                    Arc::make_mut(state).last_error = Some(e.clone());
                });
                Err(e)
            }
        }
    }

    /// Refresh every interval until `shutdown` resolves.
    pub async fn run(self, shutdown: impl Future<Output = ()>) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(url = %self.client.url(), "Wardriving poller started");

        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => break,
                _ = interval.tick() => {
                    if let Err(e) = self.poll_once().await {
                        warn!(error = %e, "Wardriving refresh failed, keeping previous dataset");
                    }
                }
            }
        }

        info!("Wardriving poller stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::Router;
    use tokio::net::TcpListener;

    const FEED: &str = r#"{
        "aa:bb:cc:dd:ee:ff": { "rssi": -52, "name": "Tile", "manuf": "Tile, Inc.", "up_time": 1.0 }
    }"#;

    const LOG: &str = r#"{
        "1": { "addr": "AA:BB:CC:DD:EE:FF", "rssi": -70, "manuf": "Tile, Inc.", "up_time": 1.0 }
    }"#;

    async fn serve(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });
        format!("http://{addr}")
    }

    async fn unused_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}/feed")
    }

    #[test]
    fn test_rejects_invalid_url() {
        let err = FeedClient::new("not a url", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, SourceError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn test_http_source_parses_feed() {
        let base = serve(Router::new().route("/feed", get(|| async { FEED }))).await;
        let mut source = HttpSource::new(&format!("{base}/feed"), Duration::from_secs(2)).unwrap();

        let snapshot = source.fetch().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.get("AA:BB:CC:DD:EE:FF").is_some());
    }

    #[tokio::test]
    async fn test_http_source_reports_malformed_body() {
        let base = serve(Router::new().route("/feed", get(|| async { "<html>" }))).await;
        let mut source = HttpSource::new(&format!("{base}/feed"), Duration::from_secs(2)).unwrap();

        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, SourceError::Malformed { .. }));
    }

    #[tokio::test]
    async fn test_http_source_reports_error_status() {
        let base = serve(Router::new()).await;
        let mut source = HttpSource::new(&format!("{base}/missing"), Duration::from_secs(2)).unwrap();

        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, SourceError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn test_http_source_unreachable() {
        let mut source = HttpSource::new(&unused_url().await, Duration::from_secs(2)).unwrap();
        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, SourceError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn test_wardriving_poller_keeps_dataset_on_failure() {
        let base = serve(Router::new().route("/log", get(|| async { LOG }))).await;
        let client = FeedClient::new(&format!("{base}/log"), Duration::from_secs(2)).unwrap();
        let (poller, receiver) = WardrivingPoller::new(client, Duration::from_secs(10));

        assert!(receiver.borrow().configured);
        assert_eq!(poller.poll_once().await.unwrap(), 1);
        assert_eq!(receiver.borrow().dataset.len(), 1);
        assert!(receiver.borrow().fetched_at.is_some());

        let failing = WardrivingPoller {
            client: FeedClient::new(&unused_url().await, Duration::from_secs(2)).unwrap(),
            interval: Duration::from_secs(10),
            publisher: poller.publisher,
        };
        assert!(failing.poll_once().await.is_err());
        let state = receiver.borrow().clone();
        assert_eq!(state.dataset.len(), 1);
        assert!(matches!(state.last_error, Some(SourceError::Unavailable { .. })));
    }

    #[test]
    fn test_unconfigured_wardriving() {
        let feed = FeedConfig::default();
        let (poller, receiver) = WardrivingPoller::from_config(&feed).unwrap();
        assert!(poller.is_none());
        assert!(!receiver.borrow().configured);
    }
}
