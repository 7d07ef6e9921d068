//! Return-file decoder (the file the postal service sends back).
//!
//! Markers: `0` header, `1` detail, `2` trailer. Lines with any other
//! marker are skipped. Malformed fields decode to empty text or `None`;
//! no single line can make the whole decode fail.

use super::field::{date_at, number_at, text_at};
use super::reasons;
use crate::error::{Result, StagingError};
use crate::utils::decode_text;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Header marker in return files
pub const HEADER_MARKER: u64 = 0;
/// Detail marker in return files
pub const DETAIL_MARKER: u64 = 1;
/// Trailer marker in return files
pub const TRAILER_MARKER: u64 = 2;

/// Return-file header
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedHeader {
    /// Client code
    pub client_code: Option<u64>,
    /// Filler (columns 6–20)
    pub filler: String,
    /// Client name
    pub client_name: String,
    /// Movement date, `DD/MM/YYYY`
    pub movement_date: Option<String>,
    /// Generation date, `DD/MM/YYYY`
    pub generation_date: Option<String>,
    /// Second filler
    pub filler2: String,
    /// File sequence number
    pub file_sequence: Option<u64>,
    /// Record sequence number
    pub record_sequence: Option<u64>,
}

/// Return-file detail: the delivery outcome of one object
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedDetail {
    /// Client code
    pub client_code: Option<u64>,
    /// Client identifier literal
    pub client_identifier: String,
    /// Object acronym
    pub object_acronym: String,
    /// Object number (tracking number with verification digit)
    pub object_number: Option<u64>,
    /// Origin country
    pub origin_country: String,
    /// Content
    pub content: String,
    /// AR delivery date, `DD/MM/YYYY`
    pub delivery_date: Option<String>,
    /// Discharge code
    pub discharge_code: String,
    /// Discharge description
    pub discharge_description: String,
    /// Object lot
    pub object_lot: String,
    /// Name of whoever received the object
    pub receiver_name: String,
    /// Identity document of the receiver
    pub receiver_id: String,
    /// Return reason code
    pub return_reason: String,
    /// Return reason description
    pub return_description: String,
    /// Filler
    pub filler: String,
    /// File sequence number
    pub file_sequence: Option<u64>,
    /// Record sequence number
    pub record_sequence: Option<u64>,
}

/// Return-file trailer
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedTrailer {
    /// Client code
    pub client_code: Option<u64>,
    /// Filler (columns 6–20)
    pub filler: String,
    /// Client name
    pub client_name: String,
    /// Number of records in the file
    pub record_count: Option<u64>,
    /// Second filler
    pub filler2: String,
    /// File sequence number
    pub file_sequence: Option<u64>,
    /// Record sequence number
    pub record_sequence: Option<u64>,
}

/// A decoded return file
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedBatch {
    /// Last header line seen
    pub header: Option<DecodedHeader>,
    /// Details in file order
    pub details: Vec<DecodedDetail>,
    /// Last trailer line seen
    pub trailer: Option<DecodedTrailer>,
}

/// Decode return-file lines
pub fn decode_lines<I, S>(lines: I) -> DecodedBatch
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut batch = DecodedBatch::default();
    let mut skipped = 0usize;

    for line in lines {
        let line = line.as_ref();
        match number_at(line, 1, 1) {
            Some(HEADER_MARKER) => batch.header = Some(decode_header(line)),
            Some(DETAIL_MARKER) => batch.details.push(decode_detail(line)),
            Some(TRAILER_MARKER) => batch.trailer = Some(decode_trailer(line)),
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        tracing::debug!(skipped, "skipped lines with unknown record type");
    }
    batch
}

/// Decode a whole return file held in memory
pub fn decode_str(text: &str) -> DecodedBatch {
    decode_lines(text.lines())
}

/// Read and decode a return file
///
/// Fails only when the file cannot be read.
pub fn decode_file(path: impl AsRef<Path>) -> Result<DecodedBatch> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| StagingError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(decode_str(&decode_text(&bytes)))
}

fn decode_header(line: &str) -> DecodedHeader {
    DecodedHeader {
        client_code: number_at(line, 2, 4),
        filler: text_at(line, 6, 15),
        client_name: text_at(line, 21, 40),
        movement_date: date_at(line, 61),
        generation_date: date_at(line, 69),
        filler2: text_at(line, 77, 83),
        file_sequence: number_at(line, 160, 5),
        record_sequence: number_at(line, 165, 6),
    }
}

fn decode_detail(line: &str) -> DecodedDetail {
    let discharge_code = text_at(line, 95, 2);
    let return_reason = text_at(line, 157, 2);

    DecodedDetail {
        client_code: number_at(line, 2, 4),
        client_identifier: text_at(line, 6, 8),
        object_acronym: text_at(line, 14, 2),
        object_number: number_at(line, 16, 9),
        origin_country: text_at(line, 25, 2),
        content: text_at(line, 27, 60),
        delivery_date: date_at(line, 87),
        discharge_description: reasons::lookup(&discharge_code),
        discharge_code,
        object_lot: text_at(line, 97, 8),
        receiver_name: text_at(line, 105, 40),
        receiver_id: text_at(line, 145, 12),
        return_description: reasons::lookup(&return_reason),
        return_reason,
        filler: text_at(line, 159, 1),
        file_sequence: number_at(line, 160, 5),
        record_sequence: number_at(line, 165, 6),
    }
}

fn decode_trailer(line: &str) -> DecodedTrailer {
    DecodedTrailer {
        client_code: number_at(line, 2, 4),
        filler: text_at(line, 6, 15),
        client_name: text_at(line, 21, 40),
        record_count: number_at(line, 61, 6),
        filler2: text_at(line, 67, 93),
        file_sequence: number_at(line, 160, 5),
        record_sequence: number_at(line, 165, 6),
    }
}
