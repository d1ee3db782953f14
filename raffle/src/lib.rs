pub mod api;
pub mod config;
pub mod contract;
pub mod entries;
pub mod error;
pub mod identity;
pub mod provider;
pub mod store;
pub mod utils;
pub mod winners;

pub use crate::{
    config::Config,
    contract::{RaffleChain, RaffleContract, RaffleRecord, StartRaffleData},
    entries::{aggregate, commitment_hash, verify, EntriesReport, OwnerCount, Verification},
    error::{Error, Result},
    provider::{AlchemyClient, OwnershipProvider},
};
