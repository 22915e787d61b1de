//! Canonical encode/decode of chain points and output references to TEXT
//! storage keys.
//!
//! The layout is fixed: a 64-char lowercase hex hash followed immediately by
//! the decimal slot (or output index). Origin encodes with an empty hash, so
//! the stored key is just `"0"`. Decoding never panics — a malformed key is
//! an [`IndexError::Codec`].

use crate::error::IndexError;
use crate::point::{ChainPoint, OutputRef};

/// Length of a hex-encoded block header or transaction hash.
const HASH_LEN: usize = 64;

/// Encode a chain point as `hash ++ decimal(slot)`.
pub fn encode_point(point: &ChainPoint) -> String {
    format!("{}{}", point.hash, point.slot)
}

/// Decode a chain point from its merged storage key.
pub fn decode_point(key: &str) -> Result<ChainPoint, IndexError> {
    if key.len() < HASH_LEN {
        // Only the origin sentinel is allowed to be short.
        return match key {
            "" | "0" => Ok(ChainPoint::origin()),
            other => Err(IndexError::Codec(format!("malformed point key: {other:?}"))),
        };
    }
    let (hash, slot) = key.split_at(HASH_LEN);
    if !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(IndexError::Codec(format!(
            "point key has non-hex hash: {hash:?}"
        )));
    }
    let slot: u64 = slot
        .parse()
        .map_err(|_| IndexError::Codec(format!("point key has bad slot: {slot:?}")))?;
    Ok(ChainPoint::new(slot, hash))
}

/// Encode an output reference as `tx_hash ++ decimal(index)`.
pub fn encode_output_ref(reference: &OutputRef) -> String {
    format!("{}{}", reference.tx_hash, reference.index)
}

/// Decode an output reference from its merged storage key.
pub fn decode_output_ref(key: &str) -> Result<OutputRef, IndexError> {
    if key.len() <= HASH_LEN {
        return Err(IndexError::Codec(format!(
            "malformed output reference key: {key:?}"
        )));
    }
    let (hash, index) = key.split_at(HASH_LEN);
    if !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(IndexError::Codec(format!(
            "output reference has non-hex tx hash: {hash:?}"
        )));
    }
    let index: u32 = index
        .parse()
        .map_err(|_| IndexError::Codec(format!("output reference has bad index: {index:?}")))?;
    Ok(OutputRef::new(hash, index))
}
