use crate::contract::{RaffleChain, RaffleRecord};
use crate::error::{Error, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use web3::types::Address;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PastWinner {
    pub raffle_id: u64,
    pub winner_address: Address,
    pub winner_index: u64,
    pub month: String,
    pub commitment_hash: String,
    pub nft_ids: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LatestWinner {
    pub winner_address: Address,
    pub month: String,
    pub number_of_entries: u64,
    pub created_at: u64,
    pub is_active: bool,
}

impl From<RaffleRecord> for LatestWinner {
    fn from(r: RaffleRecord) -> Self {
        Self {
            winner_address: r.winner_address,
            month: r.month,
            number_of_entries: r.number_of_entries,
            created_at: r.created_at,
            is_active: r.is_active,
        }
    }
}

/// Walks raffle ids `1..=raffleCounter` and keeps the ones with a winner.
pub async fn past_winners<C: RaffleChain>(chain: &C) -> Result<Vec<PastWinner>> {
    let counter = chain.raffle_counter().await?;
    let mut winners = Vec::new();
    for raffle_id in 1..=counter {
        let winner = chain.winner_by_raffle_id(raffle_id).await?;
        if !winner.has_winner || winner.winner_address.is_zero() {
            debug!("raffle {} has no winner yet", raffle_id);
            continue;
        }
        let details = chain.raffle_details(raffle_id).await?;
        winners.push(PastWinner {
            raffle_id,
            winner_address: winner.winner_address,
            winner_index: winner.winner_index,
            month: details.month,
            commitment_hash: details.commitment_hash,
            nft_ids: details.nft_ids,
        });
    }
    info!("raffles:{}, winners:{}", counter, winners.len());
    Ok(winners)
}

/// Winner of the most recent raffle.
pub async fn latest_winner<C: RaffleChain>(chain: &C) -> Result<LatestWinner> {
    let counter = chain.raffle_counter().await?;
    if counter == 0 {
        return Err(Error::NotFound("No raffles have been created yet".to_string()));
    }
    let raffle = chain.raffle(counter).await?;
    if !raffle.has_winner() {
        return Err(Error::NotFound("No winner yet".to_string()));
    }
    info!("raffle {} winner {:?}", counter, raffle.winner_address);
    Ok(raffle.into())
}
