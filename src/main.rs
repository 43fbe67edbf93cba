use std::process::ExitCode;

use alloy_chains::Chain;
use clap::Parser;

use cli::{Cli, Command};
use config::{process_env, Config};
use explorer::ExplorerClient;
use locker::{run_set_deposits_enabled, LockerHandle};
use logger::init_default_logger;

mod cli;
mod config;
mod constants;
mod explorer;
mod locker;
mod logger;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let _guard = init_default_logger();

    ExitCode::from(exit_status(run(cli, process_env).await))
}

fn exit_status(result: eyre::Result<()>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!("{e:?}");
            1
        }
    }
}

async fn run(cli: Cli, env: impl Fn(&str) -> Option<String>) -> eyre::Result<()> {
    let config = Config::read(cli.config.as_deref()).await?;
    let network = cli
        .network
        .unwrap_or_else(|| config.default_network.clone());

    match cli.command {
        Command::SetDepositsEnabled(args) => {
            let profile = config.resolve_network(&network, env)?;
            let locker = LockerHandle::attach(args.locker);

            run_set_deposits_enabled(&profile, locker, args.enabled, args.wait_options()).await?;
        }
        Command::Networks => print_networks(&config),
        Command::VerifyStatus { locker } => {
            let settings = config.resolve_explorer(&network, env)?;
            let link = explorer::address_url(&settings.chain.browser_url, locker);
            let entry = ExplorerClient::new(settings).source_code(locker).await?;

            if entry.is_verified() {
                tracing::info!(
                    "{} is verified as {} ({}): {link}",
                    locker,
                    entry.contract_name,
                    entry.compiler_version
                );
            } else {
                tracing::warn!("{locker} is not verified on {network}: {link}");
            }
        }
    }

    Ok(())
}

fn print_networks(config: &Config) {
    for (name, network) in &config.networks {
        let marker = if *name == config.default_network { "*" } else { " " };
        let chain = network
            .chain_id
            .or_else(|| config.custom_chain(name).map(|chain| chain.chain_id))
            .map(|id| Chain::from_id(id).to_string())
            .unwrap_or_else(|| "from node".to_owned());
        let url = network
            .url_env
            .as_ref()
            .map(|key| format!("${key}"))
            .or_else(|| network.url.clone())
            .unwrap_or_default();
        let gas_price = network
            .gas_price
            .map(|price| format!("{price} wei"))
            .unwrap_or_else(|| "estimated".to_owned());
        let explorer = config
            .custom_chain(name)
            .map(|chain| chain.browser_url.as_str())
            .unwrap_or("-");

        println!("{marker} {name:<16} chain: {chain:<12} gas: {gas_price:<18} rpc: {url:<24} explorer: {explorer}");
    }
}
