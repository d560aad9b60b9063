use crate::core::error::{Result, UpdateError};
use crate::core::source::FeedSource;
use crate::providers::util::with_retry;
use async_trait::async_trait;
use tracing::debug;

const USER_AGENT: &str = concat!("ratekeeper/", env!("CARGO_PKG_VERSION"));

/// Downloads the feed over HTTP.
pub struct WebSource {
    url: String,
    client: reqwest::Client,
}

impl WebSource {
    pub fn new(url: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(WebSource {
            url: url.to_string(),
            client,
        })
    }
}

#[async_trait]
impl FeedSource for WebSource {
    fn name(&self) -> &'static str {
        "web"
    }

    async fn fetch_bytes(&self) -> Result<Vec<u8>> {
        debug!("Requesting feed from {}", self.url);

        let response = with_retry(|| async { self.client.get(&self.url).send().await }, 3, 500)
            .await
            .map_err(|e| UpdateError::source(&format!("request {}", self.url), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpdateError::SourceUnavailable(format!(
                "{} answered {status}",
                self.url
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| UpdateError::source(&format!("read body of {}", self.url), e))?;
        debug!(bytes = body.len(), "Received feed");
        Ok(body.to_vec())
    }
}
