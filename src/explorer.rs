use std::time::Duration;

use alloy::primitives::{Address, TxHash};
use eyre::WrapErr;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::ExplorerSettings;

const MAX_ATTEMPTS: usize = 5;
const RETRY_DELAY: Duration = Duration::from_secs(3);

#[derive(Serialize, Debug)]
struct SourceCodeQuery<'a> {
    module: &'static str,
    action: &'static str,
    address: Address,
    apikey: &'a str,
}

/// Etherscan-compatible API client for one network.
///
/// Connection and body failures are retried. An HTTP error status is returned
/// immediately.
pub struct ExplorerClient {
    http: Client,
    settings: ExplorerSettings,
    max_attempts: usize,
    retry_delay: Duration,
}

impl ExplorerClient {
    pub fn new(settings: ExplorerSettings) -> Self {
        Self {
            http: Client::new(),
            settings,
            max_attempts: MAX_ATTEMPTS,
            retry_delay: RETRY_DELAY,
        }
    }

    pub fn with_retries(mut self, max_attempts: usize, retry_delay: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.retry_delay = retry_delay;
        self
    }

    async fn get_once(&self, query: &impl Serialize) -> reqwest::Result<String> {
        self.http
            .get(&self.settings.chain.api_url)
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }

    async fn get(&self, query: &impl Serialize) -> eyre::Result<String> {
        let mut attempt = 1;

        loop {
            match self.get_once(query).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_status() => {
                    return Err(e).wrap_err("Explorer API rejected the request");
                }
                Err(e) if attempt >= self.max_attempts => {
                    return Err(e).wrap_err(format!(
                        "Explorer API unreachable after {attempt} attempts"
                    ));
                }
                Err(e) => {
                    tracing::warn!("Explorer request failed (attempt {attempt}): {e}");
                    tokio::time::sleep(self.retry_delay).await;
                    attempt += 1;
                }
            }
        }
    }

    pub async fn source_code(&self, address: Address) -> eyre::Result<SourceCodeEntry> {
        tracing::info!(
            "Querying {} for the source of {address}",
            self.settings.chain.api_url
        );

        let query = SourceCodeQuery {
            module: "contract",
            action: "getsourcecode",
            address,
            apikey: &self.settings.api_key,
        };

        let response = self.get(&query).await?;

        parse_source_code(&response)
    }
}

pub fn tx_url(browser_url: &str, hash: TxHash) -> String {
    format!("{}/tx/{hash}", browser_url.trim_end_matches('/'))
}

pub fn address_url(browser_url: &str, address: Address) -> String {
    format!("{}/address/{address}", browser_url.trim_end_matches('/'))
}

#[derive(Deserialize, Debug)]
struct ApiResponse {
    status: String,
    message: String,
    result: serde_json::Value,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "PascalCase", default)]
pub struct SourceCodeEntry {
    pub source_code: String,
    pub contract_name: String,
    pub compiler_version: String,
}

impl SourceCodeEntry {
    pub fn is_verified(&self) -> bool {
        !self.source_code.trim().is_empty()
    }
}

/// Parses a `module=contract&action=getsourcecode` response into its first entry.
pub fn parse_source_code(response_text: &str) -> eyre::Result<SourceCodeEntry> {
    let response: ApiResponse = serde_json::from_str(response_text)?;

    if response.status != "1" {
        let detail = response
            .result
            .as_str()
            .map(str::to_owned)
            .unwrap_or_else(|| response.result.to_string());
        eyre::bail!("Explorer API error ({}): {detail}", response.message);
    }

    let entries: Vec<SourceCodeEntry> = serde_json::from_value(response.result)?;
    entries
        .into_iter()
        .next()
        .ok_or_else(|| eyre::eyre!("Explorer API returned no source code entry"))
}
