use alloy::signers::local::PrivateKeySigner;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use eth_keystore::decrypt_key;
use rpassword::prompt_password;
use std::{
    fmt,
    fs,
    path::{
        Path,
        PathBuf,
    },
};
use tracing::info;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WalletDescriptor {
    pub name: String,
    pub path: PathBuf,
}

impl WalletDescriptor {
    pub fn new(name: impl Into<String>, path: PathBuf) -> Self {
        Self {
            name: name.into(),
            path,
        }
    }
}

/// Where the signing key comes from.
#[derive(Clone, Default, Eq, PartialEq)]
pub enum WalletSource {
    /// Read-only: the client can display nothing beyond the connect screen.
    #[default]
    None,
    Keystore { name: String, dir: PathBuf },
    PrivateKey(String),
}

impl fmt::Debug for WalletSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalletSource::None => write!(f, "None"),
            WalletSource::Keystore { name, dir } => f
                .debug_struct("Keystore")
                .field("name", name)
                .field("dir", dir)
                .finish(),
            WalletSource::PrivateKey(_) => write!(f, "PrivateKey(<redacted>)"),
        }
    }
}

pub fn default_wallet_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").wrap_err("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".lucky-money").join("keystores"))
}

pub fn resolve_wallet_dir(dir: Option<&str>) -> Result<PathBuf> {
    match dir {
        Some(raw) => {
            let expanded = shellexpand::tilde(raw);
            Ok(PathBuf::from(expanded.into_owned()))
        }
        None => default_wallet_dir(),
    }
}

/// Web3 secret-storage files: `*.json`, or extensionless files as written by
/// geth and `cast wallet import`.
pub fn list_wallets(dir: &Path) -> Result<Vec<WalletDescriptor>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut wallets = Vec::new();
    for entry in fs::read_dir(dir).wrap_err("Failed to read keystore directory")? {
        let entry = entry.wrap_err("Failed to read keystore entry")?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        match path.extension().and_then(|ext| ext.to_str()) {
            None | Some("json") => {}
            Some(_) => continue,
        }
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| eyre!("Invalid keystore filename {:?}", path))?
            .to_owned();
        if name.starts_with('.') {
            continue;
        }
        wallets.push(WalletDescriptor::new(name, path));
    }
    wallets.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(wallets)
}

pub fn find_wallet(dir: &Path, name: &str) -> Result<WalletDescriptor> {
    let wallets = list_wallets(dir)?;
    wallets
        .into_iter()
        .find(|w| w.name == name)
        .ok_or_else(|| eyre!("Wallet '{name}' not found in {}", dir.to_string_lossy()))
}

pub fn unlock_wallet(descriptor: &WalletDescriptor) -> Result<PrivateKeySigner> {
    let prompt = format!("Enter password for wallet '{}': ", descriptor.name);
    let password = prompt_password(prompt).wrap_err("Failed to read wallet password")?;

    let secret = decrypt_key(&descriptor.path, password.as_bytes())
        .map_err(|_| eyre!("Invalid password for wallet '{}'", descriptor.name))?;

    PrivateKeySigner::from_slice(&secret).map_err(|_| {
        eyre!(
            "Wallet '{}' contained unsupported key material",
            descriptor.name
        )
    })
}

/// Parses a hex private key, with or without the `0x` prefix.
pub fn signer_from_hex(secret: &str) -> Result<PrivateKeySigner> {
    let trimmed = secret.trim();
    let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = hex::decode(trimmed).map_err(|_| eyre!("Private key is not valid hex"))?;
    PrivateKeySigner::from_slice(&bytes).map_err(|_| eyre!("Private key is out of range"))
}

pub fn load_signer(source: &WalletSource) -> Result<Option<PrivateKeySigner>> {
    let signer = match source {
        WalletSource::None => return Ok(None),
        WalletSource::Keystore { name, dir } => {
            let descriptor = find_wallet(dir, name)?;
            unlock_wallet(&descriptor)?
        }
        WalletSource::PrivateKey(secret) => signer_from_hex(secret)?,
    };
    info!(address = %signer.address(), "wallet unlocked");
    Ok(Some(signer))
}
