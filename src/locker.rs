use std::time::Duration;

use alloy::{
    network::{Ethereum, EthereumWallet, NetworkWallet, TransactionBuilder},
    primitives::{Address, Bytes, U256},
    providers::{Provider, RootProvider},
    rpc::{
        client::ClientBuilder,
        types::{TransactionReceipt, TransactionRequest},
    },
    sol,
    sol_types::SolCall,
    transports::{http::Http, layers::RetryBackoffLayer, Transport},
};
use alloy_chains::Chain;

use OpToolsLockerV1::setDepositsEnabledCall;

use crate::{
    config::NetworkProfile,
    constants::{
        LOCKER_INTERFACE_NAME, RPC_COMPUTE_UNITS_PER_SECOND, RPC_INITIAL_BACKOFF_MS,
        RPC_MAX_RATE_LIMIT_RETRIES,
    },
    explorer,
};

sol! {
    #[derive(Debug, PartialEq, Eq)]
    interface OpToolsLockerV1 {
        function setDepositsEnabled(bool enabled) external;
    }
}

/// The locker interface bound to an already-deployed address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LockerHandle {
    pub address: Address,
    pub interface_name: &'static str,
}

impl LockerHandle {
    pub fn attach(address: Address) -> Self {
        Self {
            address,
            interface_name: LOCKER_INTERFACE_NAME,
        }
    }

    pub fn set_deposits_enabled_input(&self, enabled: bool) -> Bytes {
        setDepositsEnabledCall { enabled }.abi_encode().into()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GasPricing {
    /// Legacy transaction with a fixed price in wei.
    Fixed(u128),
    Eip1559 {
        max_fee_per_gas: u128,
        max_priority_fee_per_gas: u128,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaitOptions {
    pub confirmations: u64,
    /// `None` waits for as long as the network takes.
    pub timeout: Option<Duration>,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            confirmations: 1,
            timeout: None,
        }
    }
}

/// Unsigned request with everything but the gas limit filled in.
pub fn build_request(
    from: Address,
    to: Address,
    input: Bytes,
    chain_id: u64,
    nonce: u64,
    pricing: GasPricing,
) -> TransactionRequest {
    let tx_request = TransactionRequest::default()
        .with_from(from)
        .with_to(to)
        .with_input(input)
        .with_value(U256::ZERO)
        .with_nonce(nonce)
        .with_chain_id(chain_id);

    match pricing {
        GasPricing::Fixed(gas_price) => tx_request.with_gas_price(gas_price),
        GasPricing::Eip1559 {
            max_fee_per_gas,
            max_priority_fee_per_gas,
        } => tx_request
            .with_max_fee_per_gas(max_fee_per_gas)
            .with_max_priority_fee_per_gas(max_priority_fee_per_gas),
    }
}

pub fn check_chain_id(expected: Option<u64>, reported: u64) -> eyre::Result<u64> {
    match expected {
        Some(expected) if expected != reported => {
            eyre::bail!("RPC reports chain id {reported}, network is configured for {expected}")
        }
        _ => Ok(reported),
    }
}

pub async fn resolve_chain_id<P, T>(provider: P, expected: Option<u64>) -> eyre::Result<u64>
where
    P: Provider<T, Ethereum>,
    T: Transport + Clone,
{
    let reported = provider.get_chain_id().await?;
    let chain_id = check_chain_id(expected, reported)?;
    tracing::info!("Connected to {}", Chain::from_id(chain_id));

    Ok(chain_id)
}

pub async fn gas_pricing<P, T>(provider: P, fixed: Option<u128>) -> eyre::Result<GasPricing>
where
    P: Provider<T, Ethereum>,
    T: Transport + Clone,
{
    if let Some(gas_price) = fixed {
        return Ok(GasPricing::Fixed(gas_price));
    }

    let fees = provider.estimate_eip1559_fees(None).await?;
    Ok(GasPricing::Eip1559 {
        max_fee_per_gas: fees.max_fee_per_gas,
        max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
    })
}

pub async fn send_transaction<P, T, W>(
    provider: P,
    wallet: &W,
    profile: &NetworkProfile,
    to: Address,
    input: Bytes,
    wait: WaitOptions,
) -> eyre::Result<TransactionReceipt>
where
    P: Provider<T, Ethereum>,
    T: Transport + Clone,
    W: NetworkWallet<Ethereum>,
{
    let chain_id = resolve_chain_id(&provider, profile.chain_id).await?;
    let pricing = gas_pricing(&provider, profile.gas_price).await?;
    let from = wallet.default_signer_address();

    let nonce = provider.get_transaction_count(from).await?;

    let mut tx_request = build_request(from, to, input, chain_id, nonce, pricing);

    let gas_limit = match profile.gas_limit {
        Some(gas_limit) => gas_limit.into(),
        None => provider.estimate_gas(&tx_request).await?,
    };
    tx_request.set_gas_limit(gas_limit);

    let signed_transaction = tx_request.build(wallet).await?;
    let pending_tx = provider.send_tx_envelope(signed_transaction).await?;
    tracing::info!("Transaction submitted: {}", pending_tx.tx_hash());

    let receipt = pending_tx
        .with_required_confirmations(wait.confirmations)
        .with_timeout(wait.timeout)
        .get_receipt()
        .await?;

    let location = match &profile.explorer {
        Some(chain) => explorer::tx_url(&chain.browser_url, receipt.transaction_hash),
        None => receipt.transaction_hash.to_string(),
    };

    if !receipt.status() {
        eyre::bail!("Transaction reverted: {location}");
    }

    tracing::info!("Transaction successful: {location}");

    Ok(receipt)
}

pub async fn set_deposits_enabled<P, T, W>(
    provider: P,
    wallet: &W,
    profile: &NetworkProfile,
    locker: LockerHandle,
    enabled: bool,
    wait: WaitOptions,
) -> eyre::Result<TransactionReceipt>
where
    P: Provider<T, Ethereum>,
    T: Transport + Clone,
    W: NetworkWallet<Ethereum>,
{
    tracing::info!("Locker attached at {}", locker.address);
    tracing::debug!("Bound {} on {}", locker.interface_name, profile.name);

    let input = locker.set_deposits_enabled_input(enabled);
    let receipt = send_transaction(provider, wallet, profile, locker.address, input, wait).await?;

    if enabled {
        tracing::info!("Deposits have been enabled!");
    } else {
        tracing::info!("Deposits have been disabled!");
    }

    Ok(receipt)
}

/// Connects to the profile's RPC endpoint and submits a single `setDepositsEnabled` call.
pub async fn run_set_deposits_enabled(
    profile: &NetworkProfile,
    locker: LockerHandle,
    enabled: bool,
    wait: WaitOptions,
) -> eyre::Result<TransactionReceipt> {
    let retry_layer = RetryBackoffLayer::new(
        RPC_MAX_RATE_LIMIT_RETRIES,
        RPC_INITIAL_BACKOFF_MS,
        RPC_COMPUTE_UNITS_PER_SECOND,
    );
    let client = ClientBuilder::default()
        .layer(retry_layer)
        .transport(Http::new(profile.rpc_url.clone()), profile.is_local());
    let provider = RootProvider::<_, Ethereum>::new(client);

    let wallet = EthereumWallet::new(profile.signer.clone());

    set_deposits_enabled(&provider, &wallet, profile, locker, enabled, wait).await
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use alloy::{
        node_bindings::{Anvil, AnvilInstance},
        primitives::{address, keccak256},
        signers::local::PrivateKeySigner,
    };

    use super::*;
    use crate::constants::{DEV_ACCOUNT_KEY, LOCKER_ADDRESS};

    const FROM: Address = address!("1111111111111111111111111111111111111111");

    #[test]
    fn attach_binds_locker_interface() {
        let locker = LockerHandle::attach(LOCKER_ADDRESS);

        assert_eq!(locker.interface_name, "OpToolsLockerV1");
        assert_eq!(
            locker.address.to_string(),
            "0xF32E20dE2ec3e7630dDe035012789a82aEa3e600"
        );
    }

    #[test]
    fn set_deposits_enabled_calldata() {
        let locker = LockerHandle::attach(LOCKER_ADDRESS);
        let input = locker.set_deposits_enabled_input(true);

        let selector = &keccak256("setDepositsEnabled(bool)")[..4];
        assert_eq!(&input[..4], selector);
        assert_eq!(input.len(), 4 + 32);
        assert!(input[4..35].iter().all(|b| *b == 0));
        assert_eq!(input[35], 1);

        let decoded = setDepositsEnabledCall::abi_decode(&input, true).unwrap();
        assert!(decoded.enabled);

        let disabled = locker.set_deposits_enabled_input(false);
        assert_eq!(disabled[35], 0);
    }

    #[test]
    fn fixed_gas_price_builds_legacy_request() {
        let locker = LockerHandle::attach(LOCKER_ADDRESS);
        let request = build_request(
            FROM,
            locker.address,
            locker.set_deposits_enabled_input(true),
            204,
            7,
            GasPricing::Fixed(20_000_000_000),
        );

        assert_eq!(request.to, Some(LOCKER_ADDRESS.into()));
        assert_eq!(request.from, Some(FROM));
        assert_eq!(request.chain_id, Some(204));
        assert_eq!(request.nonce, Some(7));
        assert_eq!(request.gas_price, Some(20_000_000_000));
        assert_eq!(request.max_fee_per_gas, None);
        assert_eq!(
            request.input.input().cloned(),
            Some(locker.set_deposits_enabled_input(true))
        );
    }

    #[test]
    fn estimated_fees_build_eip1559_request() {
        let request = build_request(
            FROM,
            LOCKER_ADDRESS,
            Bytes::new(),
            1,
            0,
            GasPricing::Eip1559 {
                max_fee_per_gas: 30,
                max_priority_fee_per_gas: 2,
            },
        );

        assert_eq!(request.gas_price, None);
        assert_eq!(request.max_fee_per_gas, Some(30));
        assert_eq!(request.max_priority_fee_per_gas, Some(2));
    }

    #[test]
    fn chain_id_must_match_configuration() {
        assert_eq!(check_chain_id(Some(204), 204).unwrap(), 204);
        assert_eq!(check_chain_id(None, 5).unwrap(), 5);
        assert!(check_chain_id(Some(204), 56).is_err());
    }

    #[test]
    fn default_wait_is_one_confirmation_without_timeout() {
        let wait = WaitOptions::default();
        assert_eq!(wait.confirmations, 1);
        assert_eq!(wait.timeout, None);
    }

    // Stores calldata word 1 in slot 0 and the selector in slot 1.
    const RECORDING_LOCKER: &str = "0x60043560005560003560e01c60015500";
    // PUSH1 0 PUSH1 0 REVERT
    const REVERTING_LOCKER: &str = "0x60006000fd";

    fn spawn_anvil() -> Option<AnvilInstance> {
        match Anvil::new().try_spawn() {
            Ok(anvil) => Some(anvil),
            Err(e) => {
                eprintln!("anvil unavailable, skipping: {e}");
                None
            }
        }
    }

    fn anvil_profile(anvil: &AnvilInstance) -> NetworkProfile {
        NetworkProfile {
            name: "anvil".to_owned(),
            rpc_url: anvil.endpoint_url(),
            chain_id: Some(anvil.chain_id()),
            gas_price: None,
            gas_limit: None,
            signer: PrivateKeySigner::from_str(DEV_ACCOUNT_KEY).unwrap(),
            explorer: None,
        }
    }

    async fn install_code<P, T>(provider: &P, address: Address, code: &str)
    where
        P: Provider<T, Ethereum>,
        T: Transport + Clone,
    {
        let code = Bytes::from_str(code).unwrap();
        provider
            .raw_request::<_, ()>("anvil_setCode".into(), (address, code))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn set_deposits_enabled_mines_single_call() {
        let Some(anvil) = spawn_anvil() else { return };
        let provider = RootProvider::<_, Ethereum>::new_http(anvil.endpoint_url());
        install_code(&provider, LOCKER_ADDRESS, RECORDING_LOCKER).await;

        let profile = anvil_profile(&anvil);
        let sender = profile.signer.address();
        assert_eq!(sender, anvil.addresses()[0]);

        let receipt = run_set_deposits_enabled(
            &profile,
            LockerHandle::attach(LOCKER_ADDRESS),
            true,
            WaitOptions::default(),
        )
        .await
        .unwrap();

        assert!(receipt.status());
        assert_eq!(receipt.to, Some(LOCKER_ADDRESS));
        assert_eq!(provider.get_transaction_count(sender).await.unwrap(), 1);

        let enabled = provider
            .get_storage_at(LOCKER_ADDRESS, U256::ZERO)
            .await
            .unwrap();
        let selector = provider
            .get_storage_at(LOCKER_ADDRESS, U256::from(1))
            .await
            .unwrap();
        assert_eq!(enabled, U256::from(1));
        assert_eq!(
            selector,
            U256::from(u32::from_be_bytes(setDepositsEnabledCall::SELECTOR))
        );
    }

    #[tokio::test]
    async fn reverted_receipt_is_an_error() {
        let Some(anvil) = spawn_anvil() else { return };
        let provider = RootProvider::<_, Ethereum>::new_http(anvil.endpoint_url());
        install_code(&provider, LOCKER_ADDRESS, REVERTING_LOCKER).await;

        // A fixed limit gets the call past estimation and onto the chain.
        let profile = NetworkProfile {
            gas_limit: Some(100_000),
            ..anvil_profile(&anvil)
        };
        let sender = profile.signer.address();

        let err = run_set_deposits_enabled(
            &profile,
            LockerHandle::attach(LOCKER_ADDRESS),
            true,
            WaitOptions::default(),
        )
        .await
        .unwrap_err();

        assert!(err.to_string().starts_with("Transaction reverted"), "{err}");
        assert_eq!(provider.get_transaction_count(sender).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn chain_id_mismatch_submits_nothing() {
        let Some(anvil) = spawn_anvil() else { return };
        let provider = RootProvider::<_, Ethereum>::new_http(anvil.endpoint_url());
        install_code(&provider, LOCKER_ADDRESS, RECORDING_LOCKER).await;

        let profile = NetworkProfile {
            chain_id: Some(204),
            ..anvil_profile(&anvil)
        };
        let sender = profile.signer.address();

        let err = run_set_deposits_enabled(
            &profile,
            LockerHandle::attach(LOCKER_ADDRESS),
            true,
            WaitOptions::default(),
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("configured for 204"), "{err}");
        assert_eq!(provider.get_transaction_count(sender).await.unwrap(), 0);
        assert_eq!(
            provider
                .get_storage_at(LOCKER_ADDRESS, U256::ZERO)
                .await
                .unwrap(),
            U256::ZERO
        );
    }
}
