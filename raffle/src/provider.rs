use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use log::debug;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::time::Duration;

/// Source of NFT ownership records.
#[allow(async_fn_in_trait)]
pub trait OwnershipProvider {
    /// Owner addresses of `token_id`, one per ownership record.
    async fn owners_for_token(&self, token_id: &str) -> Result<Vec<String>>;
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct OwnersPage {
    #[serde(default)]
    owners: Vec<String>,
    page_key: Option<String>,
}

/// Alchemy NFT API v3 client.
#[derive(Debug, Clone)]
pub struct AlchemyClient {
    client: Client,
    endpoint: String,
    api_key: String,
    contract: String,
}

impl AlchemyClient {
    pub fn setup(config: &ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout.unwrap_or(30)))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            contract: config.nft_contract.clone(),
        })
    }

    fn owners_url(&self, token_id: &str, page_key: Option<&str>) -> Result<Url> {
        let base = format!("{}/{}/getOwnersForNFT", self.endpoint, self.api_key);
        let mut url = Url::parse(&base).map_err(|e| Error::Config(format!("invalid provider endpoint: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("contractAddress", &self.contract)
            .append_pair("tokenId", token_id);
        if let Some(key) = page_key {
            url.query_pairs_mut().append_pair("pageKey", key);
        }
        Ok(url)
    }
}

impl OwnershipProvider for AlchemyClient {
    async fn owners_for_token(&self, token_id: &str) -> Result<Vec<String>> {
        if self.api_key.is_empty() || self.contract.is_empty() {
            return Err(Error::Config("missing API key or contract address".to_string()));
        }

        let mut owners = Vec::new();
        let mut page_key: Option<String> = None;
        loop {
            let url = self.owners_url(token_id, page_key.as_deref())?;
            let res = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| Error::Fetch(format!("request failed for NFT ID: {}: {}", token_id, e)))?;
            if !res.status().is_success() {
                return Err(Error::Fetch(format!(
                    "HTTP error! status: {} for NFT ID: {}",
                    res.status().as_u16(),
                    token_id
                )));
            }
            let page: OwnersPage = res
                .json()
                .await
                .map_err(|e| Error::Fetch(format!("invalid owners response for NFT ID: {}: {}", token_id, e)))?;
            debug!("token {} page owners {}", token_id, page.owners.len());
            owners.extend(page.owners);
            match page.page_key {
                Some(key) if !key.is_empty() => page_key = Some(key),
                _ => break,
            }
        }
        Ok(owners)
    }
}
