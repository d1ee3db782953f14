use crate::config::Config;
use crate::error::{Error, Result};
use crate::utils::{extract_keypair_from_str, parse_address, u256_to_hex};
use log::{debug, info};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use web3::{
    self,
    api::Eth,
    contract::{
        tokens::{Detokenize, Tokenizable, Tokenize},
        Contract, Error as ContractError, Options,
    },
    ethabi::Token,
    signing::SecretKey,
    transports::Http,
    types::{Address, H256, U256},
};

const RAFFLE_ABI: &[u8] = include_bytes!("../abi/NftRaffle.abi");

/// A raffle as stored by the contract.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RaffleRecord {
    pub number_of_entries: u64,
    pub commitment_hash: String,
    pub month: String,
    pub is_active: bool,
    pub created_at: u64,
    pub winner_index: u64,
    pub winner_address: Address,
    pub nft_ids: Vec<String>,
}

impl RaffleRecord {
    pub fn has_winner(&self) -> bool {
        !self.winner_address.is_zero()
    }

    /// `raffles(id)` yields 7 values, `getRaffleDetails(id)` adds `nftIds`.
    fn from_token(tokens: Vec<Token>) -> std::result::Result<Self, ContractError> {
        if tokens.len() != 7 && tokens.len() != 8 {
            return Err(ContractError::InvalidOutputType(format!(
                "Expected 7 or 8 elements, got a list of length {}: {:?}",
                tokens.len(),
                tokens
            )));
        }
        let mut it = tokens.into_iter();
        let mut next = || it.next().ok_or_else(|| ContractError::InvalidOutputType("missing field".into()));

        let number_of_entries = to_u64(U256::from_token(next()?)?)?;
        let commitment_hash = u256_to_hex(U256::from_token(next()?)?);
        let month = String::from_token(next()?)?;
        let is_active = bool::from_token(next()?)?;
        let created_at = to_u64(U256::from_token(next()?)?)?;
        let winner_index = to_u64(U256::from_token(next()?)?)?;
        let winner_address = Address::from_token(next()?)?;
        let nft_ids = match next() {
            Ok(token) => Vec::<String>::from_token(token)?,
            Err(_) => Vec::new(),
        };

        Ok(RaffleRecord {
            number_of_entries,
            commitment_hash,
            month,
            is_active,
            created_at,
            winner_index,
            winner_address,
            nft_ids,
        })
    }
}

impl Detokenize for RaffleRecord {
    fn from_tokens(tokens: Vec<Token>) -> std::result::Result<Self, ContractError> {
        RaffleRecord::from_token(unwrap_tuple(tokens))
    }
}

/// `getWinnerByRaffleId(id)` output.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WinnerRecord {
    pub winner_address: Address,
    pub winner_index: u64,
    pub month: String,
    pub has_winner: bool,
}

impl Detokenize for WinnerRecord {
    fn from_tokens(tokens: Vec<Token>) -> std::result::Result<Self, ContractError> {
        let tokens = unwrap_tuple(tokens);
        if tokens.len() != 4 {
            return Err(ContractError::InvalidOutputType(format!(
                "Expected 4 elements, got a list of length {}: {:?}",
                tokens.len(),
                tokens
            )));
        }
        let mut it = tokens.into_iter();
        let mut next = || it.next().ok_or_else(|| ContractError::InvalidOutputType("missing field".into()));
        Ok(WinnerRecord {
            winner_address: Address::from_token(next()?)?,
            winner_index: to_u64(U256::from_token(next()?)?)?,
            month: String::from_token(next()?)?,
            has_winner: bool::from_token(next()?)?,
        })
    }
}

/// Struct-returning getters come back as a single tuple token.
fn unwrap_tuple(mut tokens: Vec<Token>) -> Vec<Token> {
    if tokens.len() == 1 && matches!(tokens[0], Token::Tuple(_)) {
        if let Some(Token::Tuple(inner)) = tokens.pop() {
            return inner;
        }
    }
    tokens
}

fn to_u64(v: U256) -> std::result::Result<u64, ContractError> {
    u64::try_from(v).map_err(|_| ContractError::InvalidOutputType(format!("{} does not fit in u64", v)))
}

#[derive(Debug, Clone, Default)]
pub struct StartRaffleData {
    pub nft_ids: Vec<String>,
    pub month: String,
}

impl Tokenize for StartRaffleData {
    fn into_tokens(self) -> Vec<Token> {
        vec![self.nft_ids.into_token(), self.month.into_token()]
    }
}

/// Read and write access to the raffle contract.
#[allow(async_fn_in_trait)]
pub trait RaffleChain {
    async fn raffle_counter(&self) -> Result<u64>;
    async fn raffle(&self, raffle_id: u64) -> Result<RaffleRecord>;
    async fn winner_by_raffle_id(&self, raffle_id: u64) -> Result<WinnerRecord>;
    async fn raffle_details(&self, raffle_id: u64) -> Result<RaffleRecord>;
    /// Submits `startRaffle` and returns the transaction hash without waiting
    /// for it to be mined.
    async fn start_raffle(&self, data: StartRaffleData) -> Result<H256>;
}

#[derive(Debug, Clone)]
pub struct RaffleContract {
    pub eth: Eth<Http>,
    contract: Contract<Http>,
    admin_sk: Option<SecretKey>,
    admin_addr: Option<Address>,
    gas: u64,
}

impl RaffleContract {
    pub fn setup(config: &Config) -> Result<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.chain.timeout.unwrap_or(30)))
            .build()?;
        let url = Url::parse(config.chain.endpoint.as_str())
            .map_err(|e| Error::Config(format!("invalid RPC URL: {}", e)))?;
        let transport = Http::with_client(client, url);
        let eth = web3::Web3::new(transport).eth();
        let contr_addr = parse_address(&config.chain.raffle)?;
        let contract = Contract::from_json(eth.clone(), contr_addr, RAFFLE_ABI)?;

        let (admin_sk, admin_addr) = if config.admin.secret.is_empty() {
            (None, None)
        } else {
            let (sk, addr) = extract_keypair_from_str(&config.admin.secret)?;
            if !config.admin.address.is_empty() && parse_address(&config.admin.address)? != addr {
                return Err(Error::Config(
                    "admin secret does not belong to the configured admin address".to_string(),
                ));
            }
            (Some(sk), Some(addr))
        };

        Ok(Self {
            eth,
            contract,
            admin_sk,
            admin_addr,
            gas: config.chain.gas_limit,
        })
    }

    pub fn address(&self) -> Address {
        self.contract.address()
    }

    pub async fn chain_id(&self) -> Result<U256> {
        Ok(self.eth.chain_id().await?)
    }

    async fn query<R: Detokenize, P: Tokenize>(&self, func: &str, params: P) -> Result<R> {
        debug!("query {} on {:?}", func, self.contract.address());
        Ok(self
            .contract
            .query(func, params, None, Options::default(), None)
            .await?)
    }
}

impl RaffleChain for RaffleContract {
    async fn raffle_counter(&self) -> Result<u64> {
        let counter: U256 = self.query("raffleCounter", ()).await?;
        Ok(to_u64(counter)?)
    }

    async fn raffle(&self, raffle_id: u64) -> Result<RaffleRecord> {
        self.query("raffles", U256::from(raffle_id)).await
    }

    async fn winner_by_raffle_id(&self, raffle_id: u64) -> Result<WinnerRecord> {
        self.query("getWinnerByRaffleId", U256::from(raffle_id)).await
    }

    async fn raffle_details(&self, raffle_id: u64) -> Result<RaffleRecord> {
        self.query("getRaffleDetails", U256::from(raffle_id)).await
    }

    async fn start_raffle(&self, data: StartRaffleData) -> Result<H256> {
        let sk = self
            .admin_sk
            .as_ref()
            .ok_or_else(|| Error::Config("missing admin secret".to_string()))?;
        let opt = Options {
            gas: Some(self.gas.into()),
            ..Default::default()
        };
        info!(
            "startRaffle month:{}, nft_ids:{:?}, from:{:?}, gas:{}",
            data.month, data.nft_ids, self.admin_addr, self.gas
        );
        let hash = self.contract.signed_call("startRaffle", data, opt, sk).await?;
        info!("startRaffle transaction sent, tx:{:?}", hash);
        Ok(hash)
    }
}
