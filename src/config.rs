use crate::{
    deployment::{
        DEPLOYMENTS_ROOT,
        DeploymentStore,
    },
    indexer_client::DEFAULT_SUBGRAPH_URL,
    wallets::{
        self,
        WalletSource,
    },
};
use alloy::primitives::{
    Address,
    address,
};
use clap::{
    Parser,
    Subcommand,
    ValueEnum,
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use std::{
    fmt,
    path::PathBuf,
    time::Duration,
};
use tracing::debug;
use url::Url;

pub const DEFAULT_CONTRACT_ADDRESS: Address =
    address!("e482752Bb054A78858953892B8EDcF1039060fE1");
pub const DEFAULT_HARDHAT_RPC_URL: &str = "http://127.0.0.1:8545";
pub const DEFAULT_MAINNET_RPC_URL: &str = "https://eth.merkle.io";
pub const DEFAULT_SEPOLIA_RPC_URL: &str = "https://sepolia.drpc.org";
pub const DEFAULT_POLL_MS: u64 = 2000;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, ValueEnum)]
pub enum Network {
    Hardhat,
    Mainnet,
    Sepolia,
}

impl Network {
    pub const ALL: [Network; 3] = [Network::Hardhat, Network::Mainnet, Network::Sepolia];

    pub fn chain_id(self) -> u64 {
        match self {
            Network::Hardhat => 31337,
            Network::Mainnet => 1,
            Network::Sepolia => 11_155_111,
        }
    }

    pub fn dir_name(self) -> &'static str {
        match self {
            Network::Hardhat => "hardhat",
            Network::Mainnet => "mainnet",
            Network::Sepolia => "sepolia",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Network::Hardhat => "Hardhat",
            Network::Mainnet => "Ethereum",
            Network::Sepolia => "Sepolia",
        };
        write!(f, "{name}")
    }
}

/// Everything needed to talk to the contract on one network.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NetworkTarget {
    pub network: Network,
    pub rpc_url: Url,
    pub contract: Address,
}

#[derive(Parser, Debug)]
#[command(version, about = "Terminal client for the Lucky Money red packet contract")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Network to connect to on startup. `n` cycles networks at runtime.
    #[arg(long, value_enum, default_value_t = Network::Hardhat)]
    pub network: Network,

    /// Overrides the RPC endpoint of the startup network.
    #[arg(long, env = "LUCKY_MONEY_RPC_URL")]
    pub rpc_url: Option<Url>,

    #[arg(long, env = "HARDHAT_RPC_URL", default_value = DEFAULT_HARDHAT_RPC_URL)]
    pub hardhat_rpc_url: Url,

    #[arg(long, env = "MAINNET_RPC_URL", default_value = DEFAULT_MAINNET_RPC_URL)]
    pub mainnet_rpc_url: Url,

    #[arg(long, env = "SEPOLIA_RPC_URL", default_value = DEFAULT_SEPOLIA_RPC_URL)]
    pub sepolia_rpc_url: Url,

    #[arg(long, env = "LUCKY_MONEY_SUBGRAPH_URL", default_value = DEFAULT_SUBGRAPH_URL)]
    pub subgraph_url: Url,

    /// Contract address on the startup network. Defaults to the recorded
    /// deployment, then to the built-in address.
    #[arg(long)]
    pub contract: Option<Address>,

    #[arg(long, default_value = DEPLOYMENTS_ROOT)]
    pub deployments_dir: PathBuf,

    /// Keystore name inside `--wallet-dir`.
    #[arg(long, conflicts_with = "private_key")]
    pub wallet: Option<String>,

    #[arg(long)]
    pub wallet_dir: Option<String>,

    /// Raw hex key, meant for local development accounts.
    #[arg(long, env = "LUCKY_MONEY_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,

    #[arg(long, default_value_t = DEFAULT_POLL_MS, value_parser = clap::value_parser!(u64).range(100..))]
    pub poll_ms: u64,

    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    pub confirmations: u64,

    #[arg(long, default_value = "logs")]
    pub log_dir: PathBuf,
}

#[derive(Subcommand, Clone, Debug, Eq, PartialEq)]
pub enum Command {
    /// Remember a contract address for `--network` and exit.
    RecordDeployment { address: Address },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub network: Network,
    pub rpc_override: Option<Url>,
    pub hardhat_rpc_url: Url,
    pub mainnet_rpc_url: Url,
    pub sepolia_rpc_url: Url,
    pub subgraph_url: Url,
    pub contract_override: Option<Address>,
    pub deployments_dir: PathBuf,
    pub wallet: WalletSource,
    pub poll_interval: Duration,
    pub confirmations: u64,
    pub log_dir: PathBuf,
}

impl AppConfig {
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let wallet = match (cli.wallet, cli.private_key) {
            (Some(_), Some(_)) => {
                return Err(eyre!("--wallet and --private-key are mutually exclusive"));
            }
            (Some(name), None) => WalletSource::Keystore {
                name,
                dir: wallets::resolve_wallet_dir(cli.wallet_dir.as_deref())?,
            },
            (None, Some(secret)) => WalletSource::PrivateKey(secret),
            (None, None) => WalletSource::None,
        };
        Ok(Self {
            network: cli.network,
            rpc_override: cli.rpc_url,
            hardhat_rpc_url: cli.hardhat_rpc_url,
            mainnet_rpc_url: cli.mainnet_rpc_url,
            sepolia_rpc_url: cli.sepolia_rpc_url,
            subgraph_url: cli.subgraph_url,
            contract_override: cli.contract,
            deployments_dir: cli.deployments_dir,
            wallet,
            poll_interval: Duration::from_millis(cli.poll_ms),
            confirmations: cli.confirmations,
            log_dir: cli.log_dir,
        })
    }

    /// Overrides given on the command line only apply to the startup network.
    pub fn rpc_url(&self, network: Network) -> Url {
        if network == self.network
            && let Some(url) = &self.rpc_override
        {
            return url.clone();
        }
        match network {
            Network::Hardhat => self.hardhat_rpc_url.clone(),
            Network::Mainnet => self.mainnet_rpc_url.clone(),
            Network::Sepolia => self.sepolia_rpc_url.clone(),
        }
    }

    pub fn contract(&self, network: Network) -> Result<Address> {
        if network == self.network
            && let Some(contract) = self.contract_override
        {
            return Ok(contract);
        }
        let store = DeploymentStore::new(&self.deployments_dir, network);
        match store.load()? {
            Some(record) => {
                debug!(%network, path = %store.path().display(), "using recorded deployment");
                record.contract()
            }
            None => Ok(DEFAULT_CONTRACT_ADDRESS),
        }
    }

    pub fn target(&self, network: Network) -> Result<NetworkTarget> {
        Ok(NetworkTarget {
            network,
            rpc_url: self.rpc_url(network),
            contract: self.contract(network)?,
        })
    }

    /// All networks, starting with the startup one, in switching order.
    pub fn targets(&self) -> Result<Vec<NetworkTarget>> {
        let start = Network::ALL
            .iter()
            .position(|n| *n == self.network)
            .unwrap_or_default();
        Network::ALL
            .iter()
            .cycle()
            .skip(start)
            .take(Network::ALL.len())
            .map(|network| self.target(*network))
            .collect()
    }
}
