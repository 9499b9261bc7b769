//! Remote image retrieval for `<img src="http…">` references.
//!
//! Runs on the blocking render thread, so the blocking reqwest client is
//! used directly. Some image hosts reject clients without a browser-looking
//! user agent, hence the hardcoded one.

use std::time::Duration;

use bytes::Bytes;
use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing::debug;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http client could not be built: {0}")]
    Client(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("server answered {status} for {url}")]
    Status { status: u16, url: String },
}

pub struct RemoteFetcher {
    timeout: Duration,
    client: OnceCell<reqwest::blocking::Client>,
}

impl RemoteFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            client: OnceCell::new(),
        }
    }

    /// Download `url` and return the raw body. The client is built on first
    /// use, which must happen on a blocking thread.
    pub fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        let client = self.client.get_or_try_init(|| {
            reqwest::blocking::Client::builder()
                .timeout(self.timeout)
                .user_agent(USER_AGENT)
                .build()
                .map_err(|err| FetchError::Client(err.to_string()))
        })?;

        debug!(url, "fetching remote image");
        let response = client
            .get(url)
            .send()
            .map_err(|err| FetchError::Request(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response
            .bytes()
            .map_err(|err| FetchError::Request(err.to_string()))
    }
}
