use actix_web::{web, App, HttpServer};
use clap::{Parser, Subcommand};
use log::{info, warn};
use raffle::{
    api::{self, AppState},
    config::Config,
    contract::{RaffleChain, RaffleContract, StartRaffleData},
    entries,
    error::Error,
    provider::AlchemyClient,
    store, winners,
};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about=None)]
pub(crate) struct Cli {
    /// Config file
    #[clap(short = 'c', long = "config", default_value = "config.json")]
    pub(crate) config: PathBuf,

    #[clap(subcommand)]
    pub(crate) command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API (default)
    Serve,

    /// Aggregate raffle entries and print the commitment hash
    Entries {
        /// eligible token ids, comma separated; the configured set if omitted
        #[clap(long, value_delimiter = ',')]
        nft_ids: Vec<String>,

        /// shuffle the printed entry list
        #[clap(long)]
        shuffle: bool,
    },

    /// Verify a published commitment hash
    Verify {
        /// published commitment hash
        #[clap(long)]
        hash: String,

        /// re-derive entries from these token ids
        #[clap(long, value_delimiter = ',')]
        nft_ids: Vec<String>,

        /// verify these entries instead
        #[clap(long, value_delimiter = ',')]
        entries: Vec<String>,
    },

    /// List past raffle winners
    Winners,

    /// Show the winner of the latest raffle
    Winner,

    /// Submit a startRaffle transaction with the admin key
    StartRaffle {
        /// raffle month label
        #[clap(long)]
        month: String,

        /// eligible token ids, comma separated
        #[clap(long, value_delimiter = ',', required = true)]
        nft_ids: Vec<String>,
    },

    /// Print a config template
    Config,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn some_if_any(v: Vec<String>) -> Option<Vec<String>> {
    if v.is_empty() {
        None
    } else {
        Some(v)
    }
}

impl Cli {
    pub(crate) fn parse_args() -> Self {
        Cli::parse()
    }

    pub(crate) async fn run(self) -> anyhow::Result<()> {
        let command = self.command.unwrap_or(Commands::Serve);
        if let Commands::Config = command {
            Config::show();
            return Ok(());
        }

        let config = Config::load(&self.config)?;
        match command {
            Commands::Serve => Self::serve(config).await,
            Commands::Entries { nft_ids, shuffle } => {
                let provider = AlchemyClient::setup(&config.provider)?;
                let nft_ids = some_if_any(nft_ids).unwrap_or_else(|| config.default_nft_ids.clone());
                print_json(&entries::aggregate(&provider, &nft_ids, shuffle).await?)
            }
            Commands::Verify { hash, nft_ids, entries } => {
                let provider = AlchemyClient::setup(&config.provider)?;
                let v = entries::verify(&provider, some_if_any(nft_ids), some_if_any(entries), &hash).await?;
                print_json(&v)
            }
            Commands::Winners => {
                let chain = RaffleContract::setup(&config)?;
                print_json(&winners::past_winners(&chain).await?)
            }
            Commands::Winner => {
                let chain = RaffleContract::setup(&config)?;
                print_json(&winners::latest_winner(&chain).await?)
            }
            Commands::StartRaffle { month, nft_ids } => {
                let chain = RaffleContract::setup(&config)?;
                let hash = chain.start_raffle(StartRaffleData { nft_ids, month }).await?;
                println!("{:?}", hash);
                Ok(())
            }
            Commands::Config => Ok(()),
        }
    }

    /// Chain id must match the config; an unreachable RPC only warns.
    async fn check_chain(chain: &RaffleContract, config: &Config) -> Result<(), Error> {
        let chain_id = match chain.chain_id().await {
            Ok(id) => id,
            Err(e) => {
                warn!("chain {} unreachable: {}", config.chain.endpoint, e);
                return Ok(());
            }
        };
        if !config.chain.chain_id.is_empty() && chain_id.to_string() != config.chain.chain_id {
            return Err(Error::CheckChainErr {
                expected: config.chain.chain_id.clone(),
                actual: chain_id.to_string(),
            });
        }
        info!(
            "chain_name:{:?}, chain_id:{:?}, endpoint:{:?}, raffles:{:?}, raffle:{:?}",
            config.chain.name,
            chain_id,
            config.chain.endpoint,
            chain.raffle_counter().await.ok(),
            chain.address()
        );
        Ok(())
    }

    async fn serve(config: Config) -> anyhow::Result<()> {
        let provider = AlchemyClient::setup(&config.provider)?;
        let chain = RaffleContract::setup(&config)?;
        Self::check_chain(&chain, &config).await?;
        let store = store::open(&config.uploads)?;
        let listen = config.http_listen.clone();
        info!("listening on {}, uploads:{:?}", listen, config.uploads.backend);

        let data = web::Data::new(AppState {
            config,
            provider,
            chain,
            store,
        });
        HttpServer::new(move || {
            App::new()
                .app_data(data.clone())
                .configure(api::configure::<AlchemyClient, RaffleContract>)
                .default_service(web::route().to(api::notfound))
        })
        .bind(listen)?
        .run()
        .await?;
        Ok(())
    }
}
