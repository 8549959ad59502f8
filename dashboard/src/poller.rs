//! Fixed interval polling of the market APIs.
//!
//! Each poller owns its snapshot and publishes it through a watch
//! channel. Pollers never share state with each other.

use anyhow::Result;
use async_trait::async_trait;
use chaos_common::{
    market::{MarketMovers, NewsItem, PriceSnapshot},
    time::now,
};
use chrono::{DateTime, Utc};
use log::{debug, trace, warn};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};

use crate::{
    contract::{token_amount_to_f64, TokenContract},
    market_api::MarketApi,
};

#[derive(Debug, Error)]
pub enum PollerError {
    #[error("poller is already running")]
    AlreadyRunning,
    #[error("poller is not running")]
    NotRunning,
}

/// Something a poller can fetch a fresh snapshot from
#[async_trait]
pub trait SnapshotSource: Send + Sync + 'static {
    type Snapshot: Clone + Send + Sync + 'static;

    fn name(&self) -> &str;

    async fn fetch(&self) -> Result<Self::Snapshot>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollSchedule {
    // Fetch once when started
    Once,
    // Fetch when started, then on every tick
    Every(Duration),
}

/// What to show after a failed fetch
#[derive(Debug, Clone, PartialEq)]
pub enum FailurePolicy<T> {
    RetainPrevious,
    Fallback(T),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PollState<T> {
    pub value: T,
    // At least one fetch has completed, successful or not
    pub loaded: bool,
    // Consecutive failures since the last success
    pub failures: u32,
    // Time of the last successful fetch
    pub updated_at: Option<DateTime<Utc>>,
}

impl<T> PollState<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            loaded: false,
            failures: 0,
            updated_at: None,
        }
    }
}

struct Shared<S: SnapshotSource> {
    source: S,
    policy: FailurePolicy<S::Snapshot>,
    state: watch::Sender<PollState<S::Snapshot>>,
}

impl<S: SnapshotSource> Shared<S> {
    async fn poll(&self) {
        trace!("Polling {}", self.source.name());
        match self.source.fetch().await {
            Ok(value) => {
                self.state.send_modify(|state| {
                    state.value = value;
                    state.loaded = true;
                    state.failures = 0;
                    state.updated_at = Some(now());
                });
            }
            Err(e) => {
                if log::log_enabled!(log::Level::Warn) {
                    warn!("Error fetching {}: {:#}", self.source.name(), e);
                }
                self.state.send_modify(|state| {
                    if let FailurePolicy::Fallback(fallback) = &self.policy {
                        state.value = fallback.clone();
                    }
                    state.loaded = true;
                    state.failures += 1;
                });
            }
        }
    }
}

/// Keeps one snapshot fresh on a schedule.
///
/// Stopping aborts the task at its current await point, so a fetch still
/// in flight never publishes afterwards.
pub struct SnapshotPoller<S: SnapshotSource> {
    shared: Arc<Shared<S>>,
    schedule: PollSchedule,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<S: SnapshotSource> SnapshotPoller<S> {
    pub fn new(
        source: S,
        schedule: PollSchedule,
        policy: FailurePolicy<S::Snapshot>,
        initial: S::Snapshot,
    ) -> Self {
        let (state, _) = watch::channel(PollState::new(initial));
        Self {
            shared: Arc::new(Shared {
                source,
                policy,
                state,
            }),
            schedule,
            task: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        self.shared.source.name()
    }

    pub fn schedule(&self) -> PollSchedule {
        self.schedule
    }

    pub async fn start(&self) -> Result<(), PollerError> {
        let mut task = self.task.lock().await;
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Err(PollerError::AlreadyRunning);
        }

        if log::log_enabled!(log::Level::Debug) {
            debug!("Starting {} poller ({:?})", self.name(), self.schedule);
        }

        let shared = Arc::clone(&self.shared);
        let schedule = self.schedule;
        *task = Some(tokio::spawn(async move {
            match schedule {
                PollSchedule::Once => shared.poll().await,
                PollSchedule::Every(period) => {
                    // first tick completes immediately
                    let mut ticker = interval(period);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    loop {
                        ticker.tick().await;
                        shared.poll().await;
                    }
                }
            }
        }));

        Ok(())
    }

    pub async fn stop(&self) -> Result<(), PollerError> {
        let handle = self
            .task
            .lock()
            .await
            .take()
            .ok_or(PollerError::NotRunning)?;

        if !handle.is_finished() {
            debug!("Stopping {} poller", self.name());
            handle.abort();
        }
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Fetch right now, outside of the schedule
    pub async fn refresh(&self) {
        self.shared.poll().await;
    }

    pub fn subscribe(&self) -> watch::Receiver<PollState<S::Snapshot>> {
        self.shared.state.subscribe()
    }

    pub fn current(&self) -> PollState<S::Snapshot> {
        self.shared.state.borrow().clone()
    }
}

impl<S: SnapshotSource> Drop for SnapshotPoller<S> {
    fn drop(&mut self) {
        if let Some(handle) = self.task.get_mut().take() {
            handle.abort();
        }
    }
}

pub struct TokenPriceSource {
    api: Arc<MarketApi>,
    token: String,
}

impl TokenPriceSource {
    pub fn new(api: Arc<MarketApi>, token: &str) -> Self {
        Self {
            api,
            token: token.to_owned(),
        }
    }
}

#[async_trait]
impl SnapshotSource for TokenPriceSource {
    type Snapshot = PriceSnapshot;

    fn name(&self) -> &str {
        "token price"
    }

    async fn fetch(&self) -> Result<PriceSnapshot> {
        self.api.fetch_token_price(&self.token).await
    }
}

pub struct MarketMoversSource {
    api: Arc<MarketApi>,
}

impl MarketMoversSource {
    pub fn new(api: Arc<MarketApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl SnapshotSource for MarketMoversSource {
    type Snapshot = MarketMovers;

    fn name(&self) -> &str {
        "market movers"
    }

    async fn fetch(&self) -> Result<MarketMovers> {
        self.api.fetch_market_movers().await
    }
}

pub struct NewsFeedSource {
    api: Arc<MarketApi>,
    limit: usize,
}

impl NewsFeedSource {
    pub fn new(api: Arc<MarketApi>, limit: usize) -> Self {
        Self { api, limit }
    }
}

#[async_trait]
impl SnapshotSource for NewsFeedSource {
    type Snapshot = Vec<NewsItem>;

    fn name(&self) -> &str {
        "crypto news"
    }

    async fn fetch(&self) -> Result<Vec<NewsItem>> {
        let mut news = self.api.fetch_crypto_news().await;
        news.truncate(self.limit);
        Ok(news)
    }
}

/// Token balance of one account, in whole tokens
pub struct TokenBalanceSource {
    contract: Arc<TokenContract>,
    owner: String,
}

impl TokenBalanceSource {
    pub fn new(contract: Arc<TokenContract>, owner: &str) -> Self {
        Self {
            contract,
            owner: owner.to_owned(),
        }
    }
}

#[async_trait]
impl SnapshotSource for TokenBalanceSource {
    type Snapshot = f64;

    fn name(&self) -> &str {
        "token balance"
    }

    async fn fetch(&self) -> Result<f64> {
        let balance = self.contract.balance_of(&self.owner).await?;
        Ok(token_amount_to_f64(balance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Counter {
        calls: AtomicU32,
    }

    #[async_trait]
    impl SnapshotSource for Counter {
        type Snapshot = u32;

        fn name(&self) -> &str {
            "counter"
        }

        async fn fetch(&self) -> Result<u32> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call % 2 == 0 {
                Err(anyhow!("even call"))
            } else {
                Ok(call)
            }
        }
    }

    fn counter() -> Counter {
        Counter {
            calls: AtomicU32::new(0),
        }
    }

    #[tokio::test]
    async fn test_refresh_retain_previous() {
        let poller = SnapshotPoller::new(counter(), PollSchedule::Once, FailurePolicy::RetainPrevious, 0);
        assert!(!poller.current().loaded);

        poller.refresh().await;
        assert_eq!(poller.current().value, 1);
        assert!(poller.current().updated_at.is_some());

        poller.refresh().await;
        let state = poller.current();
        assert_eq!(state.value, 1);
        assert_eq!(state.failures, 1);

        poller.refresh().await;
        assert_eq!(poller.current().value, 3);
        assert_eq!(poller.current().failures, 0);
    }

    #[tokio::test]
    async fn test_refresh_fallback() {
        let poller = SnapshotPoller::new(counter(), PollSchedule::Once, FailurePolicy::Fallback(42), 0);
        poller.refresh().await;
        assert_eq!(poller.current().value, 1);
        poller.refresh().await;
        assert_eq!(poller.current().value, 42);
        assert!(poller.current().loaded);
    }

    #[tokio::test]
    async fn test_start_stop() {
        let poller = SnapshotPoller::new(
            counter(),
            PollSchedule::Every(Duration::from_secs(3600)),
            FailurePolicy::RetainPrevious,
            0,
        );
        assert!(matches!(poller.stop().await, Err(PollerError::NotRunning)));

        let mut rx = poller.subscribe();
        poller.start().await.unwrap();
        assert!(matches!(poller.start().await, Err(PollerError::AlreadyRunning)));

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().value, 1);
        assert!(poller.is_running().await);

        poller.stop().await.unwrap();
        assert!(!poller.is_running().await);
    }
}
