use std::{collections::BTreeMap, path::Path, str::FromStr};

use alloy::signers::local::PrivateKeySigner;
use reqwest::Url;
use serde::Deserialize;

use crate::constants::{CONFIG_FILE_PATH, DEV_ACCOUNT_KEY};

const EMBEDDED_CONFIG: &str = include_str!("../data/config.toml");

#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Config {
    pub default_network: String,
    pub networks: BTreeMap<String, NetworkConfig>,
    pub etherscan: EtherscanConfig,
}

/// One entry of the `NETWORKS` table. Secrets are never stored here, only the
/// names of the environment variables holding them.
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct NetworkConfig {
    pub url: Option<String>,
    pub url_env: Option<String>,
    pub chain_id: Option<u64>,
    /// Fixed gas price in wei. Switches the network to legacy transactions.
    pub gas_price: Option<u64>,
    /// Fixed gas limit. Skips `eth_estimateGas`.
    pub gas_limit: Option<u64>,
    pub account_env: Option<String>,
    #[serde(default)]
    pub dev_account: bool,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct EtherscanConfig {
    pub api_key_env: String,
    #[serde(default)]
    pub api_key_networks: Vec<String>,
    #[serde(default)]
    pub custom_chains: Vec<CustomChain>,
}

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct CustomChain {
    pub network: String,
    pub chain_id: u64,
    pub api_url: String,
    pub browser_url: String,
}

/// A network with every environment variable substituted and parsed.
#[derive(Clone, Debug)]
pub struct NetworkProfile {
    pub name: String,
    pub rpc_url: Url,
    pub chain_id: Option<u64>,
    pub gas_price: Option<u128>,
    pub gas_limit: Option<u64>,
    pub signer: PrivateKeySigner,
    pub explorer: Option<CustomChain>,
}

impl NetworkProfile {
    pub fn is_local(&self) -> bool {
        matches!(self.rpc_url.host_str(), Some("localhost" | "127.0.0.1"))
    }
}

/// Explorer endpoints plus the API key, for commands that only talk to the explorer.
#[derive(Clone, Debug)]
pub struct ExplorerSettings {
    pub chain: CustomChain,
    pub api_key: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown network: {0}")]
    UnknownNetwork(String),
    #[error("Missing environment variable: {0}")]
    MissingEnv(String),
    #[error("Network {0} has neither URL nor URL_ENV")]
    MissingUrl(String),
    #[error("Network {0} has no account configured")]
    MissingAccount(String),
    #[error("Invalid RPC URL for network {network}: {reason}")]
    InvalidUrl { network: String, reason: String },
    #[error("Invalid private key in {0}")]
    InvalidKey(String),
    #[error("Network {0} has no explorer configured")]
    NoExplorer(String),
}

/// Reads a variable from the process environment, treating empty values as unset.
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

impl Config {
    async fn read_from_file(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let cfg_str = tokio::fs::read_to_string(path).await?;
        Ok(toml::from_str(&cfg_str)?)
    }

    pub fn embedded() -> eyre::Result<Self> {
        Ok(toml::from_str(EMBEDDED_CONFIG)?)
    }

    /// An explicit path must exist. Without one, `data/config.toml` is used when
    /// present and the copy compiled into the binary otherwise.
    pub async fn read(path: Option<&Path>) -> eyre::Result<Self> {
        if let Some(path) = path {
            return Self::read_from_file(path).await;
        }

        if tokio::fs::try_exists(CONFIG_FILE_PATH).await? {
            tracing::debug!("Reading config from {CONFIG_FILE_PATH}");
            return Self::read_from_file(CONFIG_FILE_PATH).await;
        }

        Self::embedded()
    }

    pub fn network(&self, name: &str) -> Result<&NetworkConfig, ConfigError> {
        self.networks
            .get(name)
            .ok_or_else(|| ConfigError::UnknownNetwork(name.to_owned()))
    }

    pub fn custom_chain(&self, name: &str) -> Option<&CustomChain> {
        self.etherscan
            .custom_chains
            .iter()
            .find(|chain| chain.network == name)
    }

    pub fn resolve_network(
        &self,
        name: &str,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<NetworkProfile, ConfigError> {
        let network = self.network(name)?;
        let require = |key: &str| env(key).ok_or_else(|| ConfigError::MissingEnv(key.to_owned()));

        let raw_url = match (&network.url_env, &network.url) {
            (Some(key), _) => require(key)?,
            (None, Some(url)) => url.clone(),
            (None, None) => return Err(ConfigError::MissingUrl(name.to_owned())),
        };
        let rpc_url = Url::parse(raw_url.trim()).map_err(|e| ConfigError::InvalidUrl {
            network: name.to_owned(),
            reason: e.to_string(),
        })?;

        let signer = match (&network.account_env, network.dev_account) {
            (Some(key), _) => PrivateKeySigner::from_str(require(key)?.trim())
                .map_err(|_| ConfigError::InvalidKey(key.clone()))?,
            (None, true) => PrivateKeySigner::from_str(DEV_ACCOUNT_KEY)
                .map_err(|_| ConfigError::InvalidKey("dev account".to_owned()))?,
            (None, false) => return Err(ConfigError::MissingAccount(name.to_owned())),
        };

        Ok(NetworkProfile {
            name: name.to_owned(),
            rpc_url,
            chain_id: network.chain_id,
            gas_price: network.gas_price.map(u128::from),
            gas_limit: network.gas_limit,
            signer,
            explorer: self.custom_chain(name).cloned(),
        })
    }

    pub fn resolve_explorer(
        &self,
        name: &str,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<ExplorerSettings, ConfigError> {
        self.network(name)?;

        let chain = self
            .custom_chain(name)
            .cloned()
            .ok_or_else(|| ConfigError::NoExplorer(name.to_owned()))?;

        if !self.etherscan.api_key_networks.iter().any(|n| n == name) {
            return Err(ConfigError::NoExplorer(name.to_owned()));
        }

        let key = &self.etherscan.api_key_env;
        let api_key = env(key).ok_or_else(|| ConfigError::MissingEnv(key.clone()))?;

        Ok(ExplorerSettings { chain, api_key })
    }
}
