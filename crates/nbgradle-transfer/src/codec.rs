//! Byte-level encoding used for everything that crosses the process boundary.

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Hard upper bound for any payload we will attempt to decode.
///
/// A corrupted length prefix must fail the decode instead of requesting an
/// enormous allocation.
pub const TRANSFER_PAYLOAD_LIMIT_BYTES: usize = 256 * 1024 * 1024;

fn options() -> impl Options + Copy {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
}

fn options_limited() -> impl Options + Copy {
    options().with_limit(TRANSFER_PAYLOAD_LIMIT_BYTES as u64)
}

pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, bincode::Error> {
    options().serialize(value)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, bincode::Error> {
    options_limited().deserialize(bytes)
}
