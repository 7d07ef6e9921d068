//! Column placement and extraction on fixed-width lines.
//!
//! Column ranges are 1-indexed and inclusive, as in the postal layout
//! documents: a field on columns `2..=5` is four characters wide.

use chrono::NaiveDate;
use std::fmt;

/// Width of every AR line
pub const LINE_WIDTH: usize = 270;

/// How a value is fitted into its column range
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Justify {
    /// Left-justified, padded with spaces (text fields)
    Left,
    /// Right-justified, padded with zeros (numeric and identifier fields)
    Zero,
}

/// Fit `value` into `width` columns: uppercase, truncate, pad.
///
/// ```
/// use ar_courier::record::field::{fit, Justify};
///
/// assert_eq!(fit("AB", 5, Justify::Left), "AB   ");
/// assert_eq!(fit(7, 5, Justify::Zero), "00007");
/// assert_eq!(fit("abcdefghij", 4, Justify::Left), "ABCD");
/// ```
pub fn fit(value: impl fmt::Display, width: usize, justify: Justify) -> String {
    let text: String = value.to_string().to_uppercase().chars().take(width).collect();
    let fill = width - text.chars().count();
    match justify {
        Justify::Left => format!("{text}{}", " ".repeat(fill)),
        Justify::Zero => format!("{}{text}", "0".repeat(fill)),
    }
}

/// One 270-column line under construction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Line {
    cells: Vec<char>,
}

impl Default for Line {
    fn default() -> Self {
        Self::new()
    }
}

impl Line {
    /// A blank (all spaces) line
    pub fn new() -> Self {
        Self {
            cells: vec![' '; LINE_WIDTH],
        }
    }

    /// Place `value` on columns `from..=until`.
    ///
    /// Ranges past the end of the line are clipped.
    pub fn place(&mut self, value: impl fmt::Display, from: usize, until: usize, justify: Justify) {
        let until = until.min(LINE_WIDTH);
        if from == 0 || from > until {
            return;
        }
        let width = until - from + 1;
        for (cell, c) in self.cells[from - 1..until]
            .iter_mut()
            .zip(fit(value, width, justify).chars())
        {
            *cell = c;
        }
    }

    /// Place a left-justified text field
    pub fn text(&mut self, value: impl fmt::Display, from: usize, until: usize) -> &mut Self {
        self.place(value, from, until, Justify::Left);
        self
    }

    /// Place a right-justified, zero-filled field
    pub fn zeros(&mut self, value: impl fmt::Display, from: usize, until: usize) -> &mut Self {
        self.place(value, from, until, Justify::Zero);
        self
    }

    /// Fill `from..=until` with zeros
    pub fn filler(&mut self, from: usize, until: usize) -> &mut Self {
        self.place(0, from, until, Justify::Zero);
        self
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.cells.iter().try_for_each(|c| write!(f, "{c}"))
    }
}

/// Trimmed text starting at 1-indexed column `from`, `len` characters long.
///
/// Lines shorter than the requested range yield whatever is present
/// (possibly an empty string).
pub fn text_at(line: &str, from: usize, len: usize) -> String {
    line.chars()
        .skip(from.saturating_sub(1))
        .take(len)
        .collect::<String>()
        .trim()
        .to_string()
}

/// Numeric field; `None` when the columns do not hold an integer
pub fn number_at(line: &str, from: usize, len: usize) -> Option<u64> {
    text_at(line, from, len).parse().ok()
}

/// `YYYYMMDD` field rendered as `DD/MM/YYYY`; `None` when not a date
pub fn date_at(line: &str, from: usize) -> Option<String> {
    parse_date(&text_at(line, from, 8)).map(|d| d.format("%d/%m/%Y").to_string())
}

/// Parse a compact `YYYYMMDD` date
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y%m%d").ok()
}
