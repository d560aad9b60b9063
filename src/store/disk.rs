use crate::core::error::{Result, UpdateError};
use crate::core::models::{CurrencyRecord, UpdateTimestamp};
use crate::core::storage::DurableStorage;
use async_trait::async_trait;
use fjall::{Batch, Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

const UPDATES_PARTITION: &str = "updates";
const CURRENCIES_PARTITION: &str = "currencies";

struct Session {
    keyspace: Keyspace,
    updates: PartitionHandle,
    currencies: PartitionHandle,
}

impl Session {
    fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)
            .map_err(|e| UpdateError::storage(&format!("create {}", path.display()), e))?;
        let keyspace = Config::new(path)
            .open()
            .map_err(|e| UpdateError::storage("open keyspace", e))?;
        let updates = keyspace
            .open_partition(UPDATES_PARTITION, PartitionCreateOptions::default())
            .map_err(|e| UpdateError::storage("open updates partition", e))?;
        let currencies = keyspace
            .open_partition(CURRENCIES_PARTITION, PartitionCreateOptions::default())
            .map_err(|e| UpdateError::storage("open currencies partition", e))?;
        Ok(Self {
            keyspace,
            updates,
            currencies,
        })
    }

    fn latest_update(&self) -> Result<Option<UpdateTimestamp>> {
        match self
            .updates
            .last_key_value()
            .map_err(|e| UpdateError::storage("read latest update", e))?
        {
            Some((_, value)) => Ok(Some(
                serde_json::from_slice(&value)
                    .map_err(|e| UpdateError::storage("decode update", e))?,
            )),
            None => Ok(None),
        }
    }

    fn next_update(&self, timestamp: &str) -> Result<UpdateTimestamp> {
        let id = self.latest_update()?.map_or(1, |latest| latest.id + 1);
        Ok(UpdateTimestamp {
            id,
            timestamp: timestamp.to_string(),
        })
    }

    fn stage_update(&self, batch: &mut Batch, update: &UpdateTimestamp) -> Result<()> {
        let value =
            serde_json::to_vec(update).map_err(|e| UpdateError::storage("encode update", e))?;
        batch.insert(&self.updates, update_key(update.id), value);
        Ok(())
    }

    fn stage_currencies(
        &self,
        batch: &mut Batch,
        records: &[CurrencyRecord],
        update_id: u64,
    ) -> Result<()> {
        for (position, record) in records.iter().enumerate() {
            let position = u32::try_from(position)
                .map_err(|e| UpdateError::storage("too many currencies", e))?;
            let value = serde_json::to_vec(record)
                .map_err(|e| UpdateError::storage("encode currency", e))?;
            batch.insert(&self.currencies, currency_key(update_id, position), value);
        }
        Ok(())
    }
}

/// Big-endian ids keep the partitions ordered by insertion.
fn update_key(id: u64) -> Vec<u8> {
    id.to_be_bytes().to_vec()
}

fn currency_key(update_id: u64, position: u32) -> Vec<u8> {
    let mut key = update_key(update_id);
    key.extend_from_slice(&position.to_be_bytes());
    key
}

/// Durable storage on a fjall keyspace.
///
/// The keyspace is opened on the first `connect` and kept for the lifetime of
/// the storage; `disconnect` flushes it to disk and ends the session, so calls
/// fail until the next `connect`. Fjall calls block, so they run on tokio's
/// blocking pool and a caller's deadline can expire while one is stalled.
pub struct FjallStorage {
    path: PathBuf,
    state: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
    session: Option<Session>,
    connected: bool,
}

impl FjallStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// Runs `operation` on the blocking pool. The state lock travels with it,
    /// so an abandoned call still finishes before the next one starts.
    async fn blocking<T>(
        &self,
        operation: impl FnOnce(&mut State) -> Result<T> + Send + 'static,
    ) -> Result<T>
    where
        T: Send + 'static,
    {
        let mut state = Arc::clone(&self.state).lock_owned().await;
        tokio::task::spawn_blocking(move || operation(&mut state))
            .await
            .map_err(|e| UpdateError::storage("storage task", e))?
    }

    async fn with_session<T>(
        &self,
        operation: impl FnOnce(&Session) -> Result<T> + Send + 'static,
    ) -> Result<T>
    where
        T: Send + 'static,
    {
        self.blocking(move |state| match &state.session {
            Some(session) if state.connected => operation(session),
            _ => Err(UpdateError::Storage("not connected".to_string())),
        })
        .await
    }
}

#[async_trait]
impl DurableStorage for FjallStorage {
    async fn connect(&self) -> Result<()> {
        let path = self.path.clone();
        self.blocking(move |state| {
            if state.session.is_none() {
                debug!(path = %path.display(), "Opening keyspace");
                state.session = Some(Session::open(&path)?);
            }
            state.connected = true;
            Ok(())
        })
        .await
    }

    async fn disconnect(&self) -> Result<()> {
        self.blocking(|state| {
            if !state.connected {
                return Ok(());
            }
            state.connected = false;
            if let Some(session) = &state.session {
                session
                    .keyspace
                    .persist(PersistMode::SyncAll)
                    .map_err(|e| UpdateError::storage("persist keyspace", e))?;
            }
            debug!("Storage session closed");
            Ok(())
        })
        .await
    }

    async fn get_latest_update_datetime(&self) -> Result<Option<UpdateTimestamp>> {
        self.with_session(Session::latest_update).await
    }

    async fn insert_update_datetime(&self, timestamp: &str) -> Result<UpdateTimestamp> {
        let timestamp = timestamp.to_string();
        self.with_session(move |session| {
            let update = session.next_update(&timestamp)?;
            let mut batch = session.keyspace.batch();
            session.stage_update(&mut batch, &update)?;
            batch
                .commit()
                .map_err(|e| UpdateError::storage("insert update", e))?;
            Ok(update)
        })
        .await
    }

    async fn insert_currencies(&self, records: &[CurrencyRecord], update_id: u64) -> Result<()> {
        let records = records.to_vec();
        self.with_session(move |session| {
            let mut batch = session.keyspace.batch();
            session.stage_currencies(&mut batch, &records, update_id)?;
            batch
                .commit()
                .map_err(|e| UpdateError::storage("insert currencies", e))
        })
        .await
    }

    async fn get_latest_currencies(&self, update_id: u64) -> Result<Vec<CurrencyRecord>> {
        self.with_session(move |session| {
            session
                .currencies
                .prefix(update_key(update_id))
                .map(|entry| {
                    let (_, value) =
                        entry.map_err(|e| UpdateError::storage("read currencies", e))?;
                    serde_json::from_slice(&value)
                        .map_err(|e| UpdateError::storage("decode currency", e))
                })
                .collect()
        })
        .await
    }

    /// Writes the update and all of its records in one atomic batch.
    async fn insert_update(
        &self,
        timestamp: &str,
        records: &[CurrencyRecord],
    ) -> Result<UpdateTimestamp> {
        let timestamp = timestamp.to_string();
        let records = records.to_vec();
        self.with_session(move |session| {
            let update = session.next_update(&timestamp)?;
            let mut batch = session.keyspace.batch();
            session.stage_update(&mut batch, &update)?;
            session.stage_currencies(&mut batch, &records, update.id)?;
            batch
                .commit()
                .map_err(|e| UpdateError::storage("insert update", e))?;
            debug!(update_id = update.id, count = records.len(), "Stored update");
            Ok(update)
        })
        .await
    }
}
