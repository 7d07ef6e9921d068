//! Batch encoder: context + recipients → byte-exact AR payload.

use super::layout::{DetailRecord, Record, SummaryRecord};
use super::model::{
    BatchContext, BatchContract, MAX_BATCH_LINES, MAX_TRACKING_BASE, RecipientEntry, TrailerMode,
    normalize_text,
};
use super::tracking::verification_digit;
use crate::document::digits_only;
use crate::error::{EncodingError, Result};
use crate::utils::encode_latin1;

/// Encodes one batch.
///
/// The context is validated once in [`begin`](Self::begin) and never
/// changes afterwards. Each [`append_detail`](Self::append_detail) validates
/// its entry before anything is recorded, so a failed call leaves the
/// encoder as it was.
///
/// # Examples
///
/// ```
/// use ar_courier::record::{BatchContext, BatchContract, BatchEncoder, RecipientEntry};
/// use chrono::NaiveDate;
///
/// # fn main() -> ar_courier::Result<()> {
/// let context = BatchContext {
///     client_acronym: "PMX".into(),
///     client_code: "123".into(),
///     client_name: "Prefeitura Municipal".into(),
///     client_identifier: "PMX00001".into(),
///     object_acronym: "YY".into(),
///     tracking_base: 42,
///     shipment: 15,
///     free_content: String::new(),
///     created_on: NaiveDate::from_ymd_opt(2024, 3, 7).unwrap(),
/// };
///
/// let mut encoder = BatchEncoder::begin(context, BatchContract::default())?;
/// encoder.append_detail(RecipientEntry {
///     name: "Maria da Conceição".into(),
///     document: "529.982.247-25".into(),
///     street: "Rua das Flores".into(),
///     number: "120".into(),
///     complement: None,
///     neighborhood: "Centro".into(),
///     city: "São Paulo".into(),
///     state: "SP".into(),
///     postal_code: "01310-100".into(),
/// })?;
///
/// let payload = encoder.finish();
/// assert_eq!(payload.len(), 270 * 2 + 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct BatchEncoder {
    context: BatchContext,
    contract: BatchContract,
    details: Vec<DetailRecord>,
}

impl BatchEncoder {
    /// Start a batch
    pub fn begin(context: BatchContext, contract: BatchContract) -> Result<Self> {
        context.validate()?;
        Ok(Self {
            context,
            contract,
            details: Vec::new(),
        })
    }

    /// The batch context
    pub fn context(&self) -> &BatchContext {
        &self.context
    }

    /// Number of details appended so far
    pub fn detail_count(&self) -> usize {
        self.details.len()
    }

    /// Add a recipient line
    ///
    /// Consecutive details take consecutive tracking numbers starting at
    /// the context's `tracking_base`. A detail that would push the line
    /// count (header and trailer included) past what the summary records can
    /// hold is refused.
    pub fn append_detail(&mut self, entry: RecipientEntry) -> Result<()> {
        entry.validate()?;
        check_line_capacity(self.details.len() as u64 + 1)?;

        let offset = u32::try_from(self.details.len()).unwrap_or(u32::MAX);
        let tracking_number = self
            .context
            .tracking_base
            .checked_add(offset)
            .filter(|n| *n <= MAX_TRACKING_BASE)
            .ok_or_else(|| EncodingError::InvalidField {
                field: "tracking_base",
                value: self.context.tracking_base.to_string(),
                reason: format!("tracking range exhausted after {} objects", offset),
            })?;
        let verification_digit = verification_digit(&tracking_number.to_string())?;

        let detail = DetailRecord {
            client_code: self.context.client_code_number(),
            client_identifier: normalize_text(&self.context.client_identifier),
            object_acronym: normalize_text(&self.context.object_acronym),
            tracking_number,
            verification_digit,
            operation: self.contract.operation,
            free_content: normalize_text(&self.context.free_content),
            recipient_name: normalize_text(&entry.name),
            address: normalize_text(&entry.address_line()),
            city: normalize_text(&entry.city),
            state: normalize_text(&entry.state),
            postal_code: format!("{:0>8}", digits_only(&entry.postal_code)),
            shipment: self.context.shipment,
            sequence: self.next_sequence(),
        };

        tracing::debug!(
            sequence = detail.sequence,
            tracking_number = detail.tracking_number,
            "appended AR detail"
        );
        self.details.push(detail);
        Ok(())
    }

    /// Header line: counts the header plus every detail
    pub fn header(&self) -> SummaryRecord {
        self.summary(self.line_count_without_trailer(), 1)
    }

    /// Trailer line: counts every line including itself
    ///
    /// Available whatever the contract's [`TrailerMode`]; only
    /// [`finish`](Self::finish) honors the mode.
    pub fn trailer(&self) -> SummaryRecord {
        let total = self.line_count_without_trailer() + 1;
        self.summary(total, total)
    }

    /// All records in file order
    pub fn records(&self) -> Vec<Record> {
        let mut records = Vec::with_capacity(self.details.len() + 2);
        records.push(Record::Header(self.header()));
        records.extend(self.details.iter().cloned().map(Record::Detail));
        if self.contract.trailer == TrailerMode::Emit {
            records.push(Record::Trailer(self.trailer()));
        }
        records
    }

    /// Render every line, `\n`-separated, one byte per column
    pub fn finish(self) -> Vec<u8> {
        let text = self
            .records()
            .iter()
            .map(Record::render)
            .collect::<Vec<_>>()
            .join("\n");

        tracing::info!(
            client_code = %self.context.client_code,
            shipment = self.context.shipment,
            details = self.details.len(),
            trailer = self.contract.trailer == TrailerMode::Emit,
            "encoded AR batch"
        );
        encode_latin1(&text)
    }

    fn next_sequence(&self) -> u32 {
        self.line_count_without_trailer() + 1
    }

    fn line_count_without_trailer(&self) -> u32 {
        u32::try_from(self.details.len())
            .unwrap_or(u32::MAX)
            .saturating_add(1)
    }

    fn summary(&self, record_count: u32, sequence: u32) -> SummaryRecord {
        SummaryRecord {
            client_code: self.context.client_code_number(),
            client_name: normalize_text(&self.context.client_name),
            generated_on: self.context.created_on,
            record_count,
            shipment: self.context.shipment,
            sequence,
        }
    }
}

/// Refuse a batch of `details` details whose header and trailer would
/// overflow the record count column
fn check_line_capacity(details: u64) -> Result<()> {
    let lines = details + 2;
    if lines > u64::from(MAX_BATCH_LINES) {
        return Err(EncodingError::InvalidField {
            field: "record_count",
            value: lines.to_string(),
            reason: format!("a batch holds at most {MAX_BATCH_LINES} lines"),
        }
        .into());
    }
    Ok(())
}
