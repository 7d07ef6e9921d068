//! AR record codec.
//!
//! - [`field`] - column placement and extraction primitives
//! - [`model`] - batch context and recipient entries
//! - [`layout`] - outbound line layout ([`Record`])
//! - [`encode`] - batch encoder
//! - [`decode`] - return-file decoder
//! - [`tracking`] - tracking-number verification digit
//! - [`reasons`] - discharge / return reason codes

pub mod decode;
pub mod encode;
pub mod field;
pub mod layout;
pub mod model;
pub mod reasons;
pub mod tracking;

pub use decode::{
    DecodedBatch, DecodedDetail, DecodedHeader, DecodedTrailer, decode_file, decode_lines,
    decode_str,
};
pub use encode::BatchEncoder;
pub use layout::{DetailRecord, Record, SummaryRecord};
pub use model::{BatchContext, BatchContract, Operation, RecipientEntry, TrailerMode};
pub use tracking::{ObjectIdentifier, verification_digit};

use crate::error::Result;

/// Encode a batch in one call
///
/// Fails on the first invalid entry; no payload is produced in that case.
pub fn encode_batch(
    context: BatchContext,
    contract: BatchContract,
    entries: impl IntoIterator<Item = RecipientEntry>,
) -> Result<Vec<u8>> {
    let mut encoder = BatchEncoder::begin(context, contract)?;
    for entry in entries {
        encoder.append_detail(entry)?;
    }
    Ok(encoder.finish())
}
