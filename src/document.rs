//! CPF / CNPJ document validation
//!
//! Brazilian taxpayer numbers carry two modulo-11 check digits. A CPF has
//! 11 digits, a CNPJ has 14. Inputs may be formatted (`529.982.247-25`);
//! everything that is not an ASCII digit is ignored.

use serde::{Deserialize, Serialize};
use std::fmt;

const CPF_LEN: usize = 11;
const CNPJ_LEN: usize = 14;

/// At most two padding expansions: `< 11 → 11` and `11 < n < 14 → 14`.
const MAX_PAD_EXPANSIONS: usize = 2;

const CNPJ_FIRST_WEIGHTS: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
const CNPJ_SECOND_WEIGHTS: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

/// Kind of taxpayer document, guessed from the number of digits
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// Individual taxpayer (11 digits)
    Cpf,
    /// Company taxpayer (14 digits)
    Cnpj,
    /// Neither length
    Unknown,
}

impl DocumentKind {
    /// Guess the document kind from the digits contained in `document`
    pub fn detect(document: &str) -> Self {
        match digits_only(document).len() {
            CPF_LEN => DocumentKind::Cpf,
            CNPJ_LEN => DocumentKind::Cnpj,
            _ => DocumentKind::Unknown,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::Cpf => f.write_str("CPF"),
            DocumentKind::Cnpj => f.write_str("CNPJ"),
            DocumentKind::Unknown => f.write_str("CPF/CNPJ"),
        }
    }
}

/// Keep only ASCII digits
pub fn digits_only(input: &str) -> String {
    input.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Validate a CPF or CNPJ.
///
/// Short inputs are right-padded with zeros: fewer than 11 digits are padded
/// to 11, 12 or 13 digits are padded to 14. Anything longer than 14 digits is
/// rejected.
///
/// # Examples
///
/// ```
/// use ar_courier::document::validate_document;
///
/// assert!(validate_document("529.982.247-25"));
/// assert!(validate_document("11.222.333/0001-81"));
/// assert!(!validate_document("111.111.111-11"));
/// ```
#[must_use]
pub fn validate_document(document: &str) -> bool {
    let mut digits = digits_only(document);

    for _ in 0..=MAX_PAD_EXPANSIONS {
        match digits.len() {
            CPF_LEN => return validate_cpf(&digits),
            CNPJ_LEN => return validate_cnpj(&digits),
            n if n < CPF_LEN => pad_right(&mut digits, CPF_LEN),
            n if n < CNPJ_LEN => pad_right(&mut digits, CNPJ_LEN),
            _ => return false,
        }
    }

    false
}

/// Validate an 11-digit CPF (formatting characters are ignored)
#[must_use]
pub fn validate_cpf(cpf: &str) -> bool {
    let Some(digits) = parse_digits(cpf, CPF_LEN) else {
        return false;
    };
    if all_same(&digits) {
        return false;
    }

    let first_weights: Vec<u32> = (2..=10).rev().collect();
    let second_weights: Vec<u32> = (2..=11).rev().collect();

    check_digit(&digits[..9], &first_weights) == digits[9]
        && check_digit(&digits[..10], &second_weights) == digits[10]
}

/// Validate a 14-digit CNPJ (formatting characters are ignored)
#[must_use]
pub fn validate_cnpj(cnpj: &str) -> bool {
    let Some(digits) = parse_digits(cnpj, CNPJ_LEN) else {
        return false;
    };
    if all_same(&digits) {
        return false;
    }

    check_digit(&digits[..12], &CNPJ_FIRST_WEIGHTS) == digits[12]
        && check_digit(&digits[..13], &CNPJ_SECOND_WEIGHTS) == digits[13]
}

/// Format a digit string with a `#` placeholder mask.
///
/// Without an explicit mask the length picks one: 14 → CNPJ, 11 → CPF,
/// 8 → CEP. Unknown lengths are returned unchanged.
///
/// ```
/// use ar_courier::document::format_with_mask;
///
/// assert_eq!(format_with_mask("52998224725", None), "529.982.247-25");
/// assert_eq!(format_with_mask("01310100", None), "01310-100");
/// assert_eq!(format_with_mask("11987654321", Some("(##) #####-####")), "(11) 98765-4321");
/// ```
pub fn format_with_mask(input: &str, mask: Option<&str>) -> String {
    let digits = digits_only(input);
    let mask = match mask {
        Some(m) => m,
        None => match digits.len() {
            CNPJ_LEN => "##.###.###/####-##",
            CPF_LEN => "###.###.###-##",
            8 => "#####-###",
            _ => return digits,
        },
    };

    let mut source = digits.chars();
    mask.chars()
        .map(|c| match c {
            '#' => source.next().unwrap_or('#'),
            other => other,
        })
        .collect()
}

fn pad_right(digits: &mut String, len: usize) {
    while digits.len() < len {
        digits.push('0');
    }
}

fn parse_digits(input: &str, expected: usize) -> Option<Vec<u32>> {
    let digits: Vec<u32> = input.chars().filter_map(|c| c.to_digit(10)).collect();
    (digits.len() == expected).then_some(digits)
}

fn all_same(digits: &[u32]) -> bool {
    digits.windows(2).all(|w| w[0] == w[1])
}

fn check_digit(digits: &[u32], weights: &[u32]) -> u32 {
    let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
    match sum % 11 {
        r if r < 2 => 0,
        r => 11 - r,
    }
}
