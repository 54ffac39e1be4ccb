//! # Block Webhook
//!
//! POSTs the JSON form of every accepted block to a configured URL. Requests
//! run on the tokio runtime and never hold up the ledger; failures are logged
//! and dropped.

use qc_01_ledger::{Block, BlockHook};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;
use tracing::{debug, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("invalid webhook URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

pub struct WebhookBlockHook {
    client: Client,
    url: Url,
    runtime: Handle,
}

impl WebhookBlockHook {
    pub fn new(url: &str, runtime: Handle) -> Result<Self, WebhookError> {
        let url = Url::parse(url).map_err(|e| WebhookError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(WebhookError::InvalidUrl {
                url: url.to_string(),
                reason: "scheme must be http or https".to_string(),
            });
        }
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            url,
            runtime,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl BlockHook for WebhookBlockHook {
    fn on_block_saved(&self, chain_id: &str, block: &Block) {
        let body = match block.to_json() {
            Ok(body) => body,
            Err(e) => {
                warn!(chain_id, height = block.height, error = %e, "[node] cannot encode block for webhook");
                return;
            }
        };

        let request = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        let chain_id = chain_id.to_string();
        let height = block.height;

        self.runtime.spawn(async move {
            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(chain_id = %chain_id, height, "[node] block webhook delivered");
                }
                Ok(response) => {
                    warn!(chain_id = %chain_id, height, status = %response.status(), "[node] block webhook rejected");
                }
                Err(e) => {
                    warn!(chain_id = %chain_id, height, error = %e, "[node] block webhook failed");
                }
            }
        });
    }
}
