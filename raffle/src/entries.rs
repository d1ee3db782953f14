//! Raffle entries: aggregation of NFT owners, the commitment hash published
//! with each raffle and its verification.

use crate::error::{Error, Result};
use crate::provider::OwnershipProvider;
use log::{debug, info};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

const PREVIEW_LEN: usize = 5;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OwnerCount {
    pub address: String,
    pub nft_count: u64,
    pub token_ids: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EntriesReport {
    pub total_entries: u64,
    pub commitment_hash: String,
    pub entries: Vec<String>,
    pub owner_counts: Vec<OwnerCount>,
}

/// Lowercase hex SHA-256 of the sorted entries concatenated with no separator.
pub fn commitment_hash<S: AsRef<str>>(entries: &[S]) -> String {
    let mut sorted: Vec<&str> = entries.iter().map(|e| e.as_ref()).collect();
    sorted.sort_unstable();
    let mut hasher = Sha256::new();
    for entry in sorted {
        hasher.update(entry.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Folds owners into per-address counts, keeping first-seen order for ties.
#[derive(Debug, Default)]
struct OwnerTally {
    counts: Vec<OwnerCount>,
    index: HashMap<String, usize>,
}

impl OwnerTally {
    fn add(&mut self, owner: &str, token_id: &str) {
        match self.index.get(owner) {
            Some(&i) => {
                let oc = &mut self.counts[i];
                oc.nft_count += 1;
                oc.token_ids.push(token_id.to_string());
            }
            None => {
                self.index.insert(owner.to_string(), self.counts.len());
                self.counts.push(OwnerCount {
                    address: owner.to_string(),
                    nft_count: 1,
                    token_ids: vec![token_id.to_string()],
                });
            }
        }
    }

    fn into_sorted(mut self) -> Vec<OwnerCount> {
        self.counts.sort_by(|a, b| b.nft_count.cmp(&a.nft_count));
        self.counts
    }
}

/// One entry per ownership record, in token order. Any lookup failure aborts.
pub async fn fetch_entries<P, S>(provider: &P, token_ids: &[S]) -> Result<Vec<String>>
where
    P: OwnershipProvider,
    S: AsRef<str>,
{
    let mut entries = Vec::new();
    for token_id in token_ids {
        let owners = provider.owners_for_token(token_id.as_ref()).await?;
        entries.extend(owners);
    }
    Ok(entries)
}

pub async fn aggregate<P, S>(provider: &P, token_ids: &[S], shuffle: bool) -> Result<EntriesReport>
where
    P: OwnershipProvider,
    S: AsRef<str>,
{
    let mut entries = Vec::new();
    let mut tally = OwnerTally::default();
    for token_id in token_ids {
        let token_id = token_id.as_ref();
        for owner in provider.owners_for_token(token_id).await? {
            tally.add(&owner, token_id);
            entries.push(owner);
        }
    }

    let commitment_hash = commitment_hash(&entries);
    if shuffle {
        entries.shuffle(&mut rand::thread_rng());
    }
    let owner_counts = tally.into_sorted();
    let total_entries: u64 = owner_counts.iter().map(|oc| oc.nft_count).sum();

    debug!("owner counts: {:?}", owner_counts);
    info!(
        "tokens:{}, owners:{}, total_entries:{}, shuffled:{}, commitment:{}",
        token_ids.len(),
        owner_counts.len(),
        total_entries,
        shuffle,
        commitment_hash
    );

    Ok(EntriesReport {
        total_entries,
        commitment_hash,
        entries,
        owner_counts,
    })
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyMethod {
    #[serde(rename = "nft-fetch")]
    NftFetch,
    #[serde(rename = "provided-entries")]
    ProvidedEntries,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    pub is_valid: bool,
    pub calculated_hash: String,
    pub provided_hash: String,
    pub entries_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nft_ids: Option<Vec<String>>,
    pub method: VerifyMethod,
    pub message: String,
    pub entries_preview: Vec<String>,
}

fn normalize_hash(hash: &str) -> String {
    let hash = hash.trim();
    let hash = hash
        .strip_prefix("0x")
        .or_else(|| hash.strip_prefix("0X"))
        .unwrap_or(hash);
    hash.to_ascii_lowercase()
}

/// Compares entries against a published hash. A `0x` prefix and letter case
/// on the published hash are ignored.
pub fn verify_entries(
    entries: &[String],
    provided_hash: &str,
    method: VerifyMethod,
    nft_ids: Option<Vec<String>>,
) -> Verification {
    let calculated_hash = commitment_hash(entries);
    let is_valid = calculated_hash == normalize_hash(provided_hash);
    let message = if is_valid {
        format!(
            "Hash verification PASSED - Data integrity confirmed for {} entries",
            entries.len()
        )
    } else {
        "Hash verification FAILED - Data may have changed".to_string()
    };

    info!(
        "verification method:{:?}, entries:{}, calculated:{}, provided:{}, valid:{}",
        method,
        entries.len(),
        calculated_hash,
        provided_hash,
        is_valid
    );

    Verification {
        is_valid,
        calculated_hash,
        provided_hash: provided_hash.to_string(),
        entries_count: entries.len(),
        nft_ids,
        method,
        message,
        entries_preview: entries.iter().take(PREVIEW_LEN).cloned().collect(),
    }
}

/// Token ids take precedence over caller-provided entries.
pub async fn verify<P: OwnershipProvider>(
    provider: &P,
    nft_ids: Option<Vec<String>>,
    entries: Option<Vec<String>>,
    provided_hash: &str,
) -> Result<Verification> {
    if provided_hash.trim().is_empty() {
        return Err(Error::BadRequest("commitmentHash is required".to_string()));
    }

    match (nft_ids.filter(|ids| !ids.is_empty()), entries.filter(|e| !e.is_empty())) {
        (Some(ids), _) => {
            let fetched = fetch_entries(provider, &ids)
                .await
                .map_err(|e| match e {
                    Error::Config(_) => e,
                    e => Error::Fetch(format!("Failed to fetch NFT data: {}", e)),
                })?;
            if fetched.is_empty() {
                return Err(Error::NotFound("No entries found to verify against".to_string()));
            }
            Ok(verify_entries(&fetched, provided_hash, VerifyMethod::NftFetch, Some(ids)))
        }
        (None, Some(entries)) => Ok(verify_entries(
            &entries,
            provided_hash,
            VerifyMethod::ProvidedEntries,
            None,
        )),
        (None, None) => Err(Error::BadRequest("Either nftIds or entries array is required".to_string())),
    }
}
