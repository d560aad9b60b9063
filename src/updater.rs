//! The update loop keeping durable storage and the snapshot cache fresh.

use crate::core::cache::SnapshotCache;
use crate::core::error::{Result, UpdateError};
use crate::core::freshness::FreshnessEvaluator;
use crate::core::models::{Snapshot, UpdateTimestamp};
use crate::core::source::SourceFetcher;
use crate::core::storage::DurableStorage;
use crate::providers::util::with_deadline;
use crate::server::HttpServer;
use chrono::{SecondsFormat, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// What a successful cycle published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub update: UpdateTimestamp,
    /// Whether the data was fetched from the source rather than read back.
    pub fetched: bool,
    pub currencies: usize,
}

pub struct Updater {
    storage: Arc<dyn DurableStorage>,
    fetcher: SourceFetcher,
    freshness: FreshnessEvaluator,
    cache: Arc<SnapshotCache>,
    storage_deadline: Duration,
    retry_interval: Duration,
}

impl Updater {
    pub fn new(
        storage: Arc<dyn DurableStorage>,
        fetcher: SourceFetcher,
        freshness: FreshnessEvaluator,
        cache: Arc<SnapshotCache>,
    ) -> Self {
        Self {
            storage,
            fetcher,
            freshness,
            cache,
            storage_deadline: Duration::from_secs(10),
            retry_interval: Duration::from_secs(60),
        }
    }

    pub fn with_storage_deadline(mut self, deadline: Duration) -> Self {
        self.storage_deadline = deadline;
        self
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Runs update cycles until `shutdown` resolves.
    ///
    /// The HTTP server is started after the first cycle and supervised from
    /// then on: whenever it stops it is logged and restarted after the retry
    /// interval. Cycle failures are logged and retried after the retry
    /// interval; they never end the loop.
    pub async fn run(&self, server: HttpServer, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        let mut server = ServerTask::new(server, self.retry_interval);

        loop {
            let report = self.run_cycle().await;
            server.ensure_started();

            let wait = self.next_wait(&report);
            info!("Next update will occur after {:?}", wait);

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
            }
        }

        server.stop();
    }

    /// One pass: check freshness, fetch or read, publish to the cache.
    ///
    /// On any error the cache keeps its previous snapshot.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        self.storage_call("connect", self.storage.connect())
            .await
            .inspect_err(|e| error!(error = %e, "Cannot connect to storage to do data update"))?;

        let result = self.refresh().await;

        if let Err(e) = self
            .storage_call("disconnect", self.storage.disconnect())
            .await
        {
            error!(error = %e, "Cannot disconnect from storage after data update");
        }

        let (snapshot, fetched) = result?;
        let report = CycleReport {
            update: snapshot.update.clone(),
            fetched,
            currencies: snapshot.currencies.len(),
        };
        self.cache.set(snapshot).await;
        info!(
            update_id = report.update.id,
            currencies = report.currencies,
            "Data is now up to date"
        );
        Ok(report)
    }

    async fn refresh(&self) -> Result<(Snapshot, bool)> {
        info!("Checking latest update time");
        let latest = self
            .storage_call(
                "read latest update",
                self.storage.get_latest_update_datetime(),
            )
            .await
            .inspect_err(|e| error!(error = %e, "Cannot get latest update datetime"))?;

        let due = self
            .freshness
            .is_need_for_update(latest.as_ref())
            .unwrap_or_else(|e| {
                warn!(error = %e, "Cannot check stored update time, treating data as outdated");
                true
            });

        match latest {
            Some(latest) if !due => {
                debug!(update_id = latest.id, "Data is fresh, reading stored currencies");
                let currencies = self
                    .storage_call(
                        "read currencies",
                        self.storage.get_latest_currencies(latest.id),
                    )
                    .await
                    .inspect_err(|e| error!(error = %e, "Cannot get currencies from storage"))?;
                Ok((Snapshot::new(latest, currencies), false))
            }
            _ => {
                info!("Data is outdated, initializing update process");
                let currencies = self
                    .fetcher
                    .get_parsed_data()
                    .await
                    .inspect_err(|e| error!(error = %e, "Cannot get parsed data from source"))?;

                info!(count = currencies.len(), "Saving data");
                let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
                let update = self
                    .storage_call("insert update", self.storage.insert_update(&now, &currencies))
                    .await
                    .inspect_err(|e| error!(error = %e, "Cannot insert update into storage"))?;
                Ok((Snapshot::new(update, currencies), true))
            }
        }
    }

    fn next_wait(&self, report: &Result<CycleReport>) -> Duration {
        match report {
            Ok(report) => self
                .freshness
                .time_to_next_update(Some(&report.update))
                .unwrap_or_else(|e| {
                    error!(error = %e, "Cannot get time to next update");
                    self.retry_interval
                }),
            Err(_) => self.retry_interval,
        }
    }

    async fn storage_call<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let deadline = self.storage_deadline;
        with_deadline(deadline, call, || {
            UpdateError::Storage(format!("{operation} timed out after {deadline:?}"))
        })
        .await
    }
}

/// The supervised HTTP server.
struct ServerTask {
    server: HttpServer,
    restart_delay: Duration,
    handle: Option<JoinHandle<()>>,
}

impl ServerTask {
    fn new(server: HttpServer, restart_delay: Duration) -> Self {
        Self {
            server,
            restart_delay,
            handle: None,
        }
    }

    fn ensure_started(&mut self) {
        if self.handle.is_none() {
            self.handle = Some(tokio::spawn(supervise(
                self.server.clone(),
                self.restart_delay,
            )));
        }
    }

    fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Keeps `server` running until aborted. Each run is its own task so a panic
/// is reported like any other stop.
async fn supervise(server: HttpServer, restart_delay: Duration) {
    loop {
        debug!(addr = %server.addr(), "Starting HTTP server");
        let mut task = AbortOnDrop(tokio::spawn(server.clone().run()));
        match (&mut task.0).await {
            Ok(Ok(())) => warn!("HTTP server stopped"),
            Ok(Err(e)) => error!(error = ?e, "Cannot run HTTP server"),
            Err(e) => error!(error = %e, "HTTP server task failed"),
        }
        info!("Restarting HTTP server after {:?}", restart_delay);
        tokio::time::sleep(restart_delay).await;
    }
}

/// Aborting the supervisor must take the running server down with it.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}
