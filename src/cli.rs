use std::{path::PathBuf, time::Duration};

use alloy::primitives::Address;
use clap::{ArgAction, Args, Parser, Subcommand};

use crate::{constants::LOCKER_ADDRESS, locker::WaitOptions};

/// Administration of deployed OpToolsLockerV1 contracts.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Network profile to use. Falls back to DEFAULT_NETWORK from the config.
    #[arg(short, long, env = "LOCKER_NETWORK", global = true)]
    pub network: Option<String>,

    /// Config file. Defaults to data/config.toml, or the built-in config if absent.
    #[arg(short, long, env = "LOCKER_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send a single setDepositsEnabled transaction and wait for it to be mined.
    SetDepositsEnabled(SetDepositsEnabledArgs),
    /// List configured network profiles.
    Networks,
    /// Ask the network's block explorer whether the locker source is verified.
    VerifyStatus {
        #[arg(long, default_value_t = LOCKER_ADDRESS)]
        locker: Address,
    },
}

#[derive(Args, Debug)]
pub struct SetDepositsEnabledArgs {
    #[arg(long, default_value_t = LOCKER_ADDRESS)]
    pub locker: Address,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub enabled: bool,

    /// Blocks to wait for after inclusion.
    #[arg(long, default_value_t = 1)]
    pub confirmations: u64,

    /// Give up waiting for the receipt after this many seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

impl SetDepositsEnabledArgs {
    pub fn wait_options(&self) -> WaitOptions {
        WaitOptions {
            confirmations: self.confirmations,
            timeout: self.timeout_secs.map(Duration::from_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::address;
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn set_deposits_enabled_defaults() {
        let cli = Cli::try_parse_from(["locker-admin", "set-deposits-enabled"]).unwrap();

        let Command::SetDepositsEnabled(args) = cli.command else {
            panic!("unexpected command");
        };
        assert_eq!(args.locker, LOCKER_ADDRESS);
        assert!(args.enabled);
        assert_eq!(args.wait_options(), WaitOptions::default());
    }

    #[test]
    fn set_deposits_enabled_overrides() {
        let cli = Cli::try_parse_from([
            "locker-admin",
            "--network",
            "opbnb",
            "set-deposits-enabled",
            "--locker",
            "0x1111111111111111111111111111111111111111",
            "--enabled",
            "false",
            "--confirmations",
            "3",
            "--timeout-secs",
            "120",
        ])
        .unwrap();

        assert_eq!(cli.network.as_deref(), Some("opbnb"));
        let Command::SetDepositsEnabled(args) = cli.command else {
            panic!("unexpected command");
        };
        assert_eq!(
            args.locker,
            address!("1111111111111111111111111111111111111111")
        );
        assert!(!args.enabled);
        assert_eq!(
            args.wait_options(),
            WaitOptions {
                confirmations: 3,
                timeout: Some(Duration::from_secs(120)),
            }
        );
    }

    #[test]
    fn malformed_locker_address_is_rejected() {
        let result = Cli::try_parse_from([
            "locker-admin",
            "set-deposits-enabled",
            "--locker",
            "0x1234",
        ]);

        assert!(result.is_err());
    }
}
