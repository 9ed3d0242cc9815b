use crate::config::Network;
use alloy::primitives::Address;
use chrono::Utc;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
    str::FromStr,
};

pub const DEPLOYMENTS_ROOT: &str = ".deployments";
const DEPLOYMENT_FILE: &str = "deployment.json";

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub recorded_at: String,
    pub contract_address: String,
    pub network_url: String,
    #[serde(default)]
    pub subgraph_url: Option<String>,
}

impl DeploymentRecord {
    pub fn new(contract: Address, network_url: &str, subgraph_url: Option<&str>) -> Self {
        Self {
            recorded_at: Utc::now().to_rfc3339(),
            contract_address: contract.to_checksum(None),
            network_url: network_url.to_string(),
            subgraph_url: subgraph_url.map(str::to_string),
        }
    }

    pub fn contract(&self) -> Result<Address> {
        Address::from_str(&self.contract_address).map_err(|e| {
            eyre!(
                "Invalid contract address '{}' in deployment record: {e}",
                self.contract_address
            )
        })
    }
}

/// Last known deployment for one network, kept at `<root>/<network>/deployment.json`.
#[derive(Debug)]
pub struct DeploymentStore {
    path: PathBuf,
}

impl DeploymentStore {
    pub fn new(root: impl AsRef<Path>, network: Network) -> Self {
        let path = root.as_ref().join(network.dir_name()).join(DEPLOYMENT_FILE);
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<DeploymentRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = fs::read(&self.path).wrap_err_with(|| {
            format!("Failed to read deployment record {}", self.path.display())
        })?;
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        let record = serde_json::from_slice::<DeploymentRecord>(&data).wrap_err_with(|| {
            format!("Failed to parse deployment record {}", self.path.display())
        })?;
        Ok(Some(record))
    }

    pub fn save(&self, record: &DeploymentRecord) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).wrap_err_with(|| {
                format!("Failed to create deployment directory {}", dir.display())
            })?;
        }
        let json = serde_json::to_vec_pretty(record)
            .wrap_err("Failed to serialize deployment record")?;
        fs::write(&self.path, json).wrap_err("Failed to write deployment record")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use alloy::primitives::address;
    use tempdir::TempDir;

    #[test]
    fn store__load_without_file_is_none() {
        let root = TempDir::new("deployments").unwrap();
        let store = DeploymentStore::new(root.path(), Network::Sepolia);
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn store__save_then_load_returns_record() {
        // given
        let root = TempDir::new("deployments").unwrap();
        let store = DeploymentStore::new(root.path(), Network::Hardhat);
        let contract = address!("5FbDB2315678afecb367f032d93F642f64180aa3");
        let record =
            DeploymentRecord::new(contract, "http://127.0.0.1:8545", Some("http://graph"));

        // when
        store.save(&record).unwrap();
        let loaded = store.load().unwrap().unwrap();

        // then
        assert_eq!(store.path(), root.path().join("hardhat").join("deployment.json"));
        assert_eq!(loaded, record);
        assert_eq!(loaded.contract().unwrap(), contract);
    }

    #[test]
    fn store__networks_do_not_share_records() {
        let root = TempDir::new("deployments").unwrap();
        let record = DeploymentRecord::new(Address::repeat_byte(1), "http://rpc", None);
        DeploymentStore::new(root.path(), Network::Sepolia)
            .save(&record)
            .unwrap();

        assert!(DeploymentStore::new(root.path(), Network::Mainnet)
            .load()
            .unwrap()
            .is_none());
    }

    #[test]
    fn store__malformed_file_is_an_error() {
        let root = TempDir::new("deployments").unwrap();
        let store = DeploymentStore::new(root.path(), Network::Mainnet);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "not json").unwrap();
        assert!(store.load().is_err());
    }

    #[test]
    fn record__invalid_address_is_reported() {
        let record = DeploymentRecord {
            recorded_at: "now".into(),
            contract_address: "0x1234".into(),
            network_url: "http://rpc".into(),
            subgraph_url: None,
        };
        assert!(record.contract().is_err());
    }
}
