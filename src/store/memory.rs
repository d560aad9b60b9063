use crate::core::error::{Result, UpdateError};
use crate::core::models::{CurrencyRecord, UpdateTimestamp};
use crate::core::storage::DurableStorage;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Default)]
struct Tables {
    connected: bool,
    updates: BTreeMap<u64, UpdateTimestamp>,
    currencies: BTreeMap<u64, Vec<CurrencyRecord>>,
}

impl Tables {
    fn session(&mut self) -> Result<&mut Self> {
        if self.connected {
            Ok(self)
        } else {
            Err(UpdateError::Storage("not connected".to_string()))
        }
    }

    fn next_id(&self) -> u64 {
        self.updates.keys().next_back().map_or(1, |id| id + 1)
    }
}

/// In-memory storage with the same session semantics as the disk store.
///
/// Nothing survives the process. The `fail_*` switches make the matching
/// calls return a storage error, to exercise the updater's error paths.
#[derive(Default)]
pub struct MemoryStorage {
    tables: Mutex<Tables>,
    fail_connect: AtomicBool,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn update_count(&self) -> usize {
        self.tables.lock().await.updates.len()
    }

    pub async fn currency_count(&self, update_id: u64) -> usize {
        self.tables
            .lock()
            .await
            .currencies
            .get(&update_id)
            .map_or(0, Vec::len)
    }

    fn check(flag: &AtomicBool, operation: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(UpdateError::Storage(format!("{operation} failed")));
        }
        Ok(())
    }
}

#[async_trait]
impl DurableStorage for MemoryStorage {
    async fn connect(&self) -> Result<()> {
        Self::check(&self.fail_connect, "connect")?;
        self.tables.lock().await.connected = true;
        debug!("Memory storage connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.tables.lock().await.connected = false;
        debug!("Memory storage disconnected");
        Ok(())
    }

    async fn get_latest_update_datetime(&self) -> Result<Option<UpdateTimestamp>> {
        Self::check(&self.fail_reads, "read latest update")?;
        let mut tables = self.tables.lock().await;
        let tables = tables.session()?;
        Ok(tables.updates.values().next_back().cloned())
    }

    async fn insert_update_datetime(&self, timestamp: &str) -> Result<UpdateTimestamp> {
        Self::check(&self.fail_writes, "insert update")?;
        let mut tables = self.tables.lock().await;
        let tables = tables.session()?;
        let update = UpdateTimestamp {
            id: tables.next_id(),
            timestamp: timestamp.to_string(),
        };
        tables.updates.insert(update.id, update.clone());
        Ok(update)
    }

    async fn insert_currencies(&self, records: &[CurrencyRecord], update_id: u64) -> Result<()> {
        Self::check(&self.fail_writes, "insert currencies")?;
        let mut tables = self.tables.lock().await;
        let tables = tables.session()?;
        tables
            .currencies
            .entry(update_id)
            .or_default()
            .extend_from_slice(records);
        Ok(())
    }

    async fn get_latest_currencies(&self, update_id: u64) -> Result<Vec<CurrencyRecord>> {
        Self::check(&self.fail_reads, "read currencies")?;
        let mut tables = self.tables.lock().await;
        let tables = tables.session()?;
        Ok(tables
            .currencies
            .get(&update_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn insert_update(
        &self,
        timestamp: &str,
        records: &[CurrencyRecord],
    ) -> Result<UpdateTimestamp> {
        Self::check(&self.fail_writes, "insert update")?;
        let mut tables = self.tables.lock().await;
        let tables = tables.session()?;
        let update = UpdateTimestamp {
            id: tables.next_id(),
            timestamp: timestamp.to_string(),
        };
        tables.updates.insert(update.id, update.clone());
        tables.currencies.insert(update.id, records.to_vec());
        Ok(update)
    }
}
