//! Outbound AR file layout (the file sent to the postal service).
//!
//! Markers: `8` header, `9` detail, `7` trailer. Every line ends with the
//! shipment number (259–263) and the record sequence number (264–270).

use super::field::{Line, number_at, parse_date, text_at};
use super::model::Operation;
use super::tracking::ORIGIN_COUNTRY;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Header marker in outbound files
pub const HEADER_MARKER: char = '8';
/// Detail marker in outbound files
pub const DETAIL_MARKER: char = '9';
/// Trailer marker in outbound files
pub const TRAILER_MARKER: char = '7';

/// Header and trailer share one layout
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRecord {
    /// Client code
    pub client_code: u32,
    /// Client name (normalized)
    pub client_name: String,
    /// File generation date
    pub generated_on: NaiveDate,
    /// Number of records the line accounts for
    pub record_count: u32,
    /// Shipment number
    pub shipment: u32,
    /// Record sequence number
    pub sequence: u32,
}

/// One recipient line
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailRecord {
    /// Client code
    pub client_code: u32,
    /// Client identifier literal
    pub client_identifier: String,
    /// Object acronym
    pub object_acronym: String,
    /// Tracking base number
    pub tracking_number: u32,
    /// Verification digit of `tracking_number`
    pub verification_digit: u8,
    /// Include or exclude
    pub operation: Operation,
    /// Free content
    pub free_content: String,
    /// Recipient name
    pub recipient_name: String,
    /// Composed address line
    pub address: String,
    /// City
    pub city: String,
    /// State
    pub state: String,
    /// Postal code, 8 digits
    pub postal_code: String,
    /// Shipment number
    pub shipment: u32,
    /// Record sequence number
    pub sequence: u32,
}

/// A single line of an outbound AR file
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Record {
    /// First line
    Header(SummaryRecord),
    /// One per recipient
    Detail(DetailRecord),
    /// Optional closing line
    Trailer(SummaryRecord),
}

impl Record {
    /// Record sequence number
    pub fn sequence(&self) -> u32 {
        match self {
            Record::Header(r) | Record::Trailer(r) => r.sequence,
            Record::Detail(d) => d.sequence,
        }
    }

    /// Render the 270-column line
    pub fn render(&self) -> String {
        let mut line = Line::new();
        match self {
            Record::Header(r) => render_summary(&mut line, HEADER_MARKER, r),
            Record::Trailer(r) => render_summary(&mut line, TRAILER_MARKER, r),
            Record::Detail(d) => {
                line.text(DETAIL_MARKER, 1, 1)
                    .zeros(d.client_code, 2, 5)
                    .text(&d.client_identifier, 6, 13)
                    .text(&d.object_acronym, 14, 15)
                    .zeros(format!("{:08}{}", d.tracking_number, d.verification_digit), 16, 24)
                    .text(ORIGIN_COUNTRY, 25, 26)
                    .text(d.operation.code(), 27, 30)
                    .text(&d.free_content, 31, 90)
                    .text(&d.recipient_name, 91, 130)
                    .text(&d.address, 131, 210)
                    .text(&d.city, 211, 240)
                    .text(&d.state, 241, 242)
                    .zeros(&d.postal_code, 243, 250)
                    .filler(251, 258)
                    .zeros(d.shipment, 259, 263)
                    .zeros(d.sequence, 264, 270);
            }
        }
        line.to_string()
    }

    /// Parse an outbound line back into a record
    ///
    /// Returns `None` for unknown markers or malformed numeric fields.
    pub fn parse(line: &str) -> Option<Record> {
        match line.chars().next()? {
            HEADER_MARKER => parse_summary(line).map(Record::Header),
            TRAILER_MARKER => parse_summary(line).map(Record::Trailer),
            DETAIL_MARKER => {
                let tracking = text_at(line, 16, 9);
                let (number, digit) = tracking.split_at_checked(8)?;
                Some(Record::Detail(DetailRecord {
                    client_code: u32::try_from(number_at(line, 2, 4)?).ok()?,
                    client_identifier: text_at(line, 6, 8),
                    object_acronym: text_at(line, 14, 2),
                    tracking_number: number.parse().ok()?,
                    verification_digit: digit.parse().ok()?,
                    operation: Operation::from_code(text_at(line, 27, 4).parse().ok()?)?,
                    free_content: text_at(line, 31, 60),
                    recipient_name: text_at(line, 91, 40),
                    address: text_at(line, 131, 80),
                    city: text_at(line, 211, 30),
                    state: text_at(line, 241, 2),
                    postal_code: text_at(line, 243, 8),
                    shipment: u32::try_from(number_at(line, 259, 5)?).ok()?,
                    sequence: u32::try_from(number_at(line, 264, 7)?).ok()?,
                }))
            }
            _ => None,
        }
    }
}

fn render_summary(line: &mut Line, marker: char, r: &SummaryRecord) {
    line.text(marker, 1, 1)
        .zeros(r.client_code, 2, 5)
        .filler(6, 20)
        .text(&r.client_name, 21, 60)
        .text(r.generated_on.format("%Y%m%d"), 61, 68)
        .zeros(r.record_count, 69, 74)
        .filler(75, 258)
        .zeros(r.shipment, 259, 263)
        .zeros(r.sequence, 264, 270);
}

fn parse_summary(line: &str) -> Option<SummaryRecord> {
    Some(SummaryRecord {
        client_code: u32::try_from(number_at(line, 2, 4)?).ok()?,
        client_name: text_at(line, 21, 40),
        generated_on: parse_date(&text_at(line, 61, 8))?,
        record_count: u32::try_from(number_at(line, 69, 6)?).ok()?,
        shipment: u32::try_from(number_at(line, 259, 5)?).ok()?,
        sequence: u32::try_from(number_at(line, 264, 7)?).ok()?,
    })
}
