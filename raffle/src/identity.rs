use crate::error::{Error, Result};
use crate::store::BlobStore;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const HANDLE_COLUMN: &str = "What is your Discord handle? - Discord Display Name";
pub const ADDRESS_COLUMN: &str = "At which Ethereum address would you like to receive the NFT?";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub discord_name: String,
    pub eth_address: String,
}

/// Finds the row whose address column matches `address`, ignoring case.
pub fn find_by_address(csv_data: &[u8], address: &str) -> Result<Identity> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(csv_data);
    let headers = reader.headers()?.clone();
    let position = |name: &str| headers.iter().position(|h| h.trim() == name);
    let (handle_idx, address_idx) = match (position(HANDLE_COLUMN), position(ADDRESS_COLUMN)) {
        (Some(h), Some(a)) => (h, a),
        _ => return Err(Error::Internal("CSV is missing the expected columns".to_string())),
    };

    let wanted = address.trim().to_lowercase();
    for record in reader.records() {
        let record = record?;
        let Some(addr) = record.get(address_idx) else {
            continue;
        };
        if addr.trim().to_lowercase() == wanted {
            return Ok(Identity {
                discord_name: record.get(handle_idx).unwrap_or_default().to_string(),
                eth_address: addr.to_string(),
            });
        }
    }
    Err(Error::NotFound("Address not found".to_string()))
}

/// Looks `address` up in the latest upload, or in `fallback` when nothing
/// has been uploaded.
pub fn lookup(store: &dyn BlobStore, fallback: Option<&Path>, address: &str) -> Result<Identity> {
    let data = match store.latest()? {
        Some(data) => data,
        None => match fallback {
            Some(path) if path.exists() => std::fs::read(path)?,
            _ => return Err(Error::NotFound("No identity CSV has been uploaded".to_string())),
        },
    };
    find_by_address(&data, address)
}
