use crate::error::{Error, Result};
use serde::*;
use serde_json::from_str;
use std::path::{Path, PathBuf};

pub const DEFAULT_NFT_IDS: [&str; 3] = ["137", "138", "139"];
pub const DEFAULT_GAS_LIMIT: u64 = 1_000_000;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pub http_listen: String,
    pub provider: ProviderConfig,
    pub chain: Chain,
    pub admin: AdminConfig,
    pub uploads: UploadsConfig,
    /// Shared bearer secret for the gated routes.
    pub api_token: String,
    /// Eligible token set used when a request does not name one.
    pub default_nft_ids: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_listen: "127.0.0.1:8080".to_string(),
            provider: ProviderConfig::default(),
            chain: Chain::default(),
            admin: AdminConfig::default(),
            uploads: UploadsConfig::default(),
            api_token: String::new(),
            default_nft_ids: DEFAULT_NFT_IDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ProviderConfig {
    pub endpoint: String,
    #[serde(rename = "apiKey")]
    pub api_key: String,
    /// NFT collection whose holders enter the raffle.
    #[serde(rename = "nftContract")]
    pub nft_contract: String,
    /// http request timeout, seconds
    pub timeout: Option<u64>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://polygon-mainnet.g.alchemy.com/nft/v3".to_string(),
            api_key: String::new(),
            nft_contract: String::new(),
            timeout: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Chain {
    pub name: String,
    #[serde(rename = "chainId")]
    pub chain_id: String,
    pub endpoint: String,
    /// Raffle contract address.
    pub raffle: String,
    #[serde(rename = "gasLimit")]
    pub gas_limit: u64,
    pub timeout: Option<u64>,
}

impl Default for Chain {
    fn default() -> Self {
        Self {
            name: "sepolia".to_string(),
            chain_id: "11155111".to_string(),
            endpoint: String::new(),
            raffle: String::new(),
            gas_limit: DEFAULT_GAS_LIMIT,
            timeout: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct AdminConfig {
    pub address: String,
    pub secret: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Fs,
    Redis,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct UploadsConfig {
    pub backend: StoreBackend,
    pub dir: PathBuf,
    /// Read when nothing has been uploaded yet.
    pub fallback_csv: Option<PathBuf>,
    pub redis: String,
    /// Largest accepted upload, bytes.
    pub max_bytes: usize,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Fs,
            dir: PathBuf::from("data/uploads"),
            fallback_csv: None,
            redis: "redis://127.0.0.1:6379/0".to_string(),
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl Config {
    pub fn parse_from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        use std::fs::read_to_string;
        let confstr = read_to_string(file.as_ref())?;
        Ok(from_str(&confstr)?)
    }

    /// Reads the config file when it exists, then applies `.env` and
    /// environment overrides.
    pub fn load<P: AsRef<Path>>(file: P) -> Result<Self> {
        let mut config = if file.as_ref().exists() {
            Self::parse_from_file(file)?
        } else {
            log::warn!("config file {:?} not found, using defaults", file.as_ref());
            Self::default()
        };
        dotenv::dotenv().ok();
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn apply_env<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |target: &mut String, key: &str| {
            if let Some(v) = var(key).filter(|v| !v.is_empty()) {
                *target = v;
            }
        };
        set(&mut self.provider.api_key, "ALCHEMY_API_KEY");
        set(&mut self.provider.nft_contract, "CONTRACT_ADDRESS");
        set(&mut self.chain.raffle, "RAFFLE_CONTRACT_ADDRESS");
        set(&mut self.chain.endpoint, "ALCHEMY_RAFFLE_RPC_URL");
        set(&mut self.admin.address, "ADMIN_ADDRESS");
        set(&mut self.admin.secret, "ADMIN_SECRET");
        set(&mut self.api_token, "DISCORD_API_KEY");
        set(&mut self.http_listen, "HTTP_LISTEN");
    }

    pub fn show() {
        let de: Self = Default::default();
        match serde_json::to_string_pretty(&de) {
            Ok(s) => println!("{}", s),
            Err(e) => log::error!("failed to render config template: {}", e),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.chain.endpoint.is_empty() {
            return Err(Error::Config("missing RPC URL".to_string()));
        }
        if self.chain.raffle.is_empty() {
            return Err(Error::Config("missing raffle contract address".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: Config = from_str(r#"{"http_listen":"0.0.0.0:9000","chain":{"raffle":"0x01"}}"#).unwrap();
        assert_eq!(config.http_listen, "0.0.0.0:9000");
        assert_eq!(config.chain.raffle, "0x01");
        assert_eq!(config.chain.gas_limit, DEFAULT_GAS_LIMIT);
        assert_eq!(config.default_nft_ids, vec!["137", "138", "139"]);
        assert_eq!(config.uploads.backend, StoreBackend::Fs);
        assert_eq!(config.uploads.max_bytes, DEFAULT_MAX_UPLOAD_BYTES);
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = Config::default();
        config.provider.api_key = "from-file".to_string();
        let env: HashMap<&str, &str> = [
            ("ALCHEMY_API_KEY", "from-env"),
            ("DISCORD_API_KEY", "secret"),
            ("ADMIN_ADDRESS", ""),
        ]
        .into_iter()
        .collect();
        config.admin.address = "0xadmin".to_string();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.provider.api_key, "from-env");
        assert_eq!(config.api_token, "secret");
        assert_eq!(config.admin.address, "0xadmin");
    }

    #[test]
    fn validate_requires_chain_settings() {
        let mut config = Config::default();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
        config.chain.endpoint = "http://localhost:8545".to_string();
        config.chain.raffle = "0x01".to_string();
        assert!(config.validate().is_ok());
    }
}
