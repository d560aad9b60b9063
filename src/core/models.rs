//! Records stored, cached and served by the daemon.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One exchange rate entry of the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyRecord {
    /// Fixed-width numeric code, e.g. `"036"`.
    pub num_code: String,
    /// Letter code, e.g. `"AUD"`.
    pub char_code: String,
    /// Number of units `value` applies to.
    pub multiplier: u32,
    pub name: String,
    pub value: Decimal,
}

/// One update event recorded by durable storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateTimestamp {
    /// Assigned on insert, strictly increasing in insertion order.
    pub id: u64,
    /// RFC 3339 date-time with offset.
    pub timestamp: String,
}

/// The timestamp and records currently served to readers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub update: UpdateTimestamp,
    pub currencies: Vec<CurrencyRecord>,
}

impl Snapshot {
    pub fn new(update: UpdateTimestamp, currencies: Vec<CurrencyRecord>) -> Self {
        Self { update, currencies }
    }
}
