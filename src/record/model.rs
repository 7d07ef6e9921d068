//! Batch input types: the batch context and its recipients.

use crate::document::{DocumentKind, digits_only, validate_document};
use crate::error::{EncodingError, Error, Result};
use crate::utils::strip_diacritics;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Largest tracking base that fits the 8-digit range
pub const MAX_TRACKING_BASE: u32 = 99_999_999;

/// Largest shipment number that fits the 5-column field
pub const MAX_SHIPMENT: u32 = 99_999;

/// Most lines one batch may hold, trailer included
///
/// Bounded by the 6-column record count of the summary lines; the 7-column
/// sequence number never reaches it.
pub const MAX_BATCH_LINES: u32 = 999_999;

/// One recipient of an AR letter
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientEntry {
    /// Recipient name
    pub name: String,
    /// CPF or CNPJ, formatted or bare
    pub document: String,
    /// Street
    pub street: String,
    /// House number
    pub number: String,
    /// Complement (apartment, block...)
    #[serde(default)]
    pub complement: Option<String>,
    /// Neighborhood
    pub neighborhood: String,
    /// City
    pub city: String,
    /// State, two letters
    pub state: String,
    /// Postal code (CEP), formatted or bare
    pub postal_code: String,
}

impl RecipientEntry {
    /// Check the document checksum and the fields the detail layout requires
    pub fn validate(&self) -> Result<()> {
        if !validate_document(&self.document) {
            return Err(Error::InvalidDocument {
                document: self.document.clone(),
                kind: DocumentKind::detect(&self.document),
            });
        }

        require("recipient", "name", &self.name)?;
        require("recipient", "street", &self.street)?;
        require("recipient", "city", &self.city)?;
        require("recipient", "state", &self.state)?;

        if self.state.trim().chars().count() != 2 {
            return Err(EncodingError::InvalidField {
                field: "state",
                value: self.state.clone(),
                reason: "expected a two-letter state".to_string(),
            }
            .into());
        }

        let cep = digits_only(&self.postal_code);
        if cep.is_empty() || cep.len() > 8 {
            return Err(EncodingError::InvalidField {
                field: "postal_code",
                value: self.postal_code.clone(),
                reason: "expected up to 8 digits".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// `street number [complement] neighborhood city`, single-spaced
    ///
    /// Empty parts (including an empty complement) are left out.
    pub fn address_line(&self) -> String {
        [
            self.street.as_str(),
            self.number.as_str(),
            self.complement.as_deref().unwrap_or(""),
            self.neighborhood.as_str(),
            self.city.as_str(),
        ]
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }
}

/// Batch-level values shared by every line of one file
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchContext {
    /// Client acronym used in the staged file name
    pub client_acronym: String,
    /// Client code assigned by the postal service (up to 4 digits)
    pub client_code: String,
    /// Client name printed in the header
    pub client_name: String,
    /// Client identifier literal assigned by the postal service
    pub client_identifier: String,
    /// Object acronym (postal type), e.g. `YY`
    pub object_acronym: String,
    /// First tracking number of the batch, without verification digit
    pub tracking_base: u32,
    /// Shipment (batch) number
    pub shipment: u32,
    /// Free content field
    #[serde(default)]
    pub free_content: String,
    /// File generation date
    pub created_on: NaiveDate,
}

impl BatchContext {
    /// Check every field the header and detail layouts require
    pub fn validate(&self) -> Result<()> {
        require("batch context", "client_acronym", &self.client_acronym)?;
        require("batch context", "client_code", &self.client_code)?;
        require("batch context", "client_name", &self.client_name)?;
        require("batch context", "client_identifier", &self.client_identifier)?;
        require("batch context", "object_acronym", &self.object_acronym)?;

        let code = self.client_code.trim();
        if code.len() > 4 || !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(EncodingError::InvalidField {
                field: "client_code",
                value: self.client_code.clone(),
                reason: "expected up to 4 digits".to_string(),
            }
            .into());
        }
        if self.tracking_base > MAX_TRACKING_BASE {
            return Err(EncodingError::InvalidField {
                field: "tracking_base",
                value: self.tracking_base.to_string(),
                reason: "expected up to 8 digits".to_string(),
            }
            .into());
        }
        if self.shipment > MAX_SHIPMENT {
            return Err(EncodingError::InvalidField {
                field: "shipment",
                value: self.shipment.to_string(),
                reason: "expected up to 5 digits".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Client code as a number (valid after [`validate`](Self::validate))
    pub(crate) fn client_code_number(&self) -> u32 {
        self.client_code.trim().parse().unwrap_or_default()
    }
}

/// Operation requested for every detail of a batch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Register the objects (code 1101)
    #[default]
    Include,
    /// Withdraw the objects (code 1102)
    Exclude,
}

impl Operation {
    /// Layout code for this operation
    pub fn code(&self) -> u16 {
        match self {
            Operation::Include => 1101,
            Operation::Exclude => 1102,
        }
    }

    /// Operation for a layout code
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1101 => Some(Operation::Include),
            1102 => Some(Operation::Exclude),
            _ => None,
        }
    }
}

/// Whether the encoder writes a trailer line
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrailerMode {
    /// Header and details only
    #[default]
    Omit,
    /// Header, details and a closing trailer
    Emit,
}

/// Options the caller selects for one batch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchContract {
    /// Operation code written on every detail
    #[serde(default)]
    pub operation: Operation,
    /// Trailer emission
    #[serde(default)]
    pub trailer: TrailerMode,
}

/// Normalize free text for the layout: trim, strip diacritics, uppercase
pub(crate) fn normalize_text(input: &str) -> String {
    strip_diacritics(input.trim()).to_uppercase()
}

fn require(record: &'static str, field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(EncodingError::MissingField { record, field }.into());
    }
    Ok(())
}
