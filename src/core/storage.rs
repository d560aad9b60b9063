//! Durable storage of update events and their currency records.

use crate::core::error::Result;
use crate::core::models::{CurrencyRecord, UpdateTimestamp};
use async_trait::async_trait;

/// A session-based durable store. Every call other than `connect` requires an
/// open session.
#[async_trait]
pub trait DurableStorage: Send + Sync {
    async fn connect(&self) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;

    /// The most recently inserted update, `None` when nothing is stored yet.
    async fn get_latest_update_datetime(&self) -> Result<Option<UpdateTimestamp>>;

    /// Records a new update event and returns it with its assigned id.
    async fn insert_update_datetime(&self, timestamp: &str) -> Result<UpdateTimestamp>;

    async fn insert_currencies(&self, records: &[CurrencyRecord], update_id: u64) -> Result<()>;

    async fn get_latest_currencies(&self, update_id: u64) -> Result<Vec<CurrencyRecord>>;

    /// Stores an update event together with its records.
    ///
    /// Stores that can write both atomically override this; the default runs
    /// the two inserts one after the other.
    async fn insert_update(
        &self,
        timestamp: &str,
        records: &[CurrencyRecord],
    ) -> Result<UpdateTimestamp> {
        let update = self.insert_update_datetime(timestamp).await?;
        self.insert_currencies(records, update.id).await?;
        Ok(update)
    }
}
