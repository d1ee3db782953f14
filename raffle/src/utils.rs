use crate::error::{Error, Result};
use sha3::{Digest, Keccak256};
use std::str::FromStr;
use web3::types::{Address, H256, U256};

#[inline(always)]
pub fn extract_keypair_from_str(sk_str: &str) -> Result<(secp256k1::SecretKey, Address)> {
    let sk = secp256k1::SecretKey::from_str(sk_str.trim().trim_start_matches("0x"))
        .map_err(|e| Error::Config(format!("invalid admin secret: {}", e)))?;
    let s = secp256k1::Secp256k1::signing_only();
    let pk = secp256k1::PublicKey::from_secret_key(&s, &sk);
    let mut res = [0u8; 64];
    res.copy_from_slice(&pk.serialize_uncompressed()[1..65]);
    let addr = Address::from(H256::from_slice(Keccak256::digest(res).as_slice()));
    Ok((sk, addr))
}

pub fn parse_address(s: &str) -> Result<Address> {
    Address::from_str(s.trim()).map_err(|e| Error::Config(format!("invalid address {:?}: {}", s, e)))
}

/// `0x` followed by the 64-digit big-endian hex of `value`.
pub fn u256_to_hex(value: U256) -> String {
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    format!("0x{}", hex::encode(buf))
}

/// Checks an `Authorization` header against the shared secret. An unset
/// secret rejects every request.
pub fn check_bearer(header: Option<&str>, token: &str) -> Result<()> {
    if token.is_empty() {
        return Err(Error::Unauthorized);
    }
    match header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(given) if given == token => Ok(()),
        _ => Err(Error::Unauthorized),
    }
}
