use alloy::primitives::{address, Address};

// Deployed on opBNB; the same address is reused on the other networks.
pub const LOCKER_ADDRESS: Address = address!("F32E20dE2ec3e7630dDe035012789a82aEa3e600");
pub const LOCKER_INTERFACE_NAME: &str = "OpToolsLockerV1";

// FILES
pub const CONFIG_FILE_PATH: &str = "data/config.toml";
pub const LOGS_DIR: &str = "logs";
pub const LOG_FILE_PREFIX: &str = "locker-admin";

// Account #0 of local dev nodes (anvil, hardhat node).
pub const DEV_ACCOUNT_KEY: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

// RPC transport: only rate-limited responses are retried.
pub const RPC_MAX_RATE_LIMIT_RETRIES: u32 = 10;
pub const RPC_INITIAL_BACKOFF_MS: u64 = 2;
pub const RPC_COMPUTE_UNITS_PER_SECOND: u64 = 500;
