pub mod file;
pub mod util;
pub mod web;

use crate::core::config::{SourceConfig, SourceKind};
use crate::core::source::FeedSource;
use anyhow::{Context, Result};
use file::FileSource;
use web::WebSource;

/// Builds the one feed source selected by the configuration.
pub fn feed_source(config: &SourceConfig) -> Result<Box<dyn FeedSource>> {
    match config.kind {
        SourceKind::File => {
            let path = config
                .file_path
                .as_deref()
                .context("source.file_path is required for a file source")?;
            Ok(Box::new(FileSource::new(path)))
        }
        SourceKind::Web => Ok(Box::new(WebSource::new(&config.url)?)),
    }
}
