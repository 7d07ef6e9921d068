//! Tracking-number verification digit.
//!
//! The postal service hands out ranges of 8-digit object numbers; the
//! sender computes the ninth (verification) digit. The full object
//! identifier is `{acronym}{number}{digit}BR`, e.g. `YY000000425BR`.

use crate::error::EncodingError;
use std::fmt;

/// Weights aligned with the 8 digits of the tracking base
pub const TRACKING_WEIGHTS: [u32; 8] = [8, 6, 4, 2, 3, 5, 9, 7];

/// Origin suffix of every object identifier
pub const ORIGIN_COUNTRY: &str = "BR";

/// Compute the verification digit of a 1–8 digit tracking number.
///
/// The number is left-padded with zeros to 8 digits.
///
/// ```
/// use ar_courier::record::tracking::verification_digit;
///
/// assert_eq!(verification_digit("00000042").unwrap(), 5);
/// assert_eq!(verification_digit("8").unwrap(), 0);
/// ```
pub fn verification_digit(number: &str) -> Result<u8, EncodingError> {
    if number.is_empty() || number.len() > 8 || !number.chars().all(|c| c.is_ascii_digit()) {
        return Err(EncodingError::InvalidField {
            field: "tracking_number",
            value: number.to_string(),
            reason: "expected 1 to 8 digits".to_string(),
        });
    }

    let padded = format!("{number:0>8}");
    let sum: u32 = padded
        .chars()
        .filter_map(|c| c.to_digit(10))
        .zip(TRACKING_WEIGHTS)
        .map(|(d, w)| d * w)
        .sum();

    let digit = match sum % 11 {
        0 => 5,
        1 => 0,
        r => 11 - r,
    };
    // 11 - r for r in 2..=10 is at most 9
    Ok(digit as u8)
}

/// A postal object identifier (`YY000000425BR`)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectIdentifier {
    /// Object acronym (two letters)
    pub acronym: String,
    /// Tracking base number
    pub number: u32,
    /// Verification digit
    pub digit: u8,
}

impl ObjectIdentifier {
    /// Build the identifier for `number`, computing its verification digit
    pub fn new(acronym: impl Into<String>, number: u32) -> Result<Self, EncodingError> {
        let digit = verification_digit(&number.to_string())?;
        Ok(Self {
            acronym: acronym.into().to_uppercase(),
            number,
            digit,
        })
    }

    /// The 9-digit tracking number (base + digit) written on detail lines
    pub fn tracking_number(&self) -> String {
        format!("{:08}{}", self.number, self.digit)
    }
}

impl fmt::Display for ObjectIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.acronym,
            self.tracking_number(),
            ORIGIN_COUNTRY
        )
    }
}
