//! Retrieves the feed and turns it into currency records.

use crate::core::error::{Result, UpdateError};
use crate::core::models::CurrencyRecord;
use crate::core::{normalize, parser};
use crate::providers::util::with_deadline;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Where the raw feed bytes come from.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn fetch_bytes(&self) -> Result<Vec<u8>>;
}

pub struct SourceFetcher {
    source: Box<dyn FeedSource>,
    deadline: Duration,
}

impl SourceFetcher {
    pub fn new(source: Box<dyn FeedSource>, deadline: Duration) -> Self {
        Self { source, deadline }
    }

    /// Fetches, repairs and parses the feed. Either every entry parses or
    /// nothing is returned.
    #[instrument(name = "GetParsedData", skip(self), fields(source = self.source.name()))]
    pub async fn get_parsed_data(&self) -> Result<Vec<CurrencyRecord>> {
        info!("Getting new data");
        let deadline = self.deadline;
        let mut data = with_deadline(deadline, self.source.fetch_bytes(), || {
            UpdateError::SourceUnavailable(format!("no feed within {deadline:?}"))
        })
        .await?;
        debug!(bytes = data.len(), "Received feed");

        normalize::repair(&mut data).map_err(|e| UpdateError::Normalization(e.to_string()))?;

        info!("Parsing data");
        parser::parse(&data)
    }
}
