//! # idv-mrz — Machine-Readable Zone Parser
//!
//! Pure parser and checksum validator for the MRZ strip on identity
//! documents, per ICAO 9303. Two layouts are accepted:
//!
//! - **TD3**: two 44-character lines (passport booklets)
//! - **TD1**: three 30-character lines (identity cards)
//!
//! Anything else — wrong line count, wrong line length, characters
//! outside `A–Z0–9<` — is rejected with [`MrzParseError`] before any
//! field is sliced, so a partially populated [`MrzInfo`] can never
//! escape this crate.
//!
//! ## Determinism
//!
//! [`extract_mrz_info`] is a pure function: identical input always
//! yields an identical result, and checksum mismatches are reported as
//! boolean flags in [`MrzValidation`] rather than errors. A document
//! with a damaged check digit still parses — it just fails validation.

use serde::{Deserialize, Serialize};

mod checksum;
mod parse;

pub use checksum::check_digit;

/// Line length of the TD3 (passport) layout.
const TD3_LINE_LEN: usize = 44;
/// Line length of the TD1 (identity card) layout.
const TD1_LINE_LEN: usize = 30;

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Per-field checksum outcome of an MRZ parse.
///
/// `overall` is the conjunction of the five component flags — it is
/// `true` only when every component flag is `true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MrzValidation {
    /// Structural plausibility: numeric dates, recognised sex marker,
    /// alphabetic document type.
    pub format: bool,
    /// Document number check digit matched.
    pub document_number_checksum: bool,
    /// Date-of-birth check digit matched.
    pub birth_date_checksum: bool,
    /// Date-of-expiry check digit matched.
    pub expiry_date_checksum: bool,
    /// Composite (final) check digit matched.
    pub composite_checksum: bool,
    /// Conjunction of all component flags.
    pub overall: bool,
}

impl MrzValidation {
    /// Assemble a validation record, deriving `overall` from the
    /// component flags so the two can never disagree.
    pub(crate) fn from_flags(
        format: bool,
        document_number_checksum: bool,
        birth_date_checksum: bool,
        expiry_date_checksum: bool,
        composite_checksum: bool,
    ) -> Self {
        Self {
            format,
            document_number_checksum,
            birth_date_checksum,
            expiry_date_checksum,
            composite_checksum,
            overall: format
                && document_number_checksum
                && birth_date_checksum
                && expiry_date_checksum
                && composite_checksum,
        }
    }
}

/// Structured fields extracted from an MRZ, with filler characters
/// stripped. Dates are the raw `YYMMDD` strings from the zone.
///
/// Immutable once produced; derived purely from the input text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MrzInfo {
    /// Document type code (`P` for passports, `I`/`ID` for cards).
    pub document_type: String,
    /// Three-letter issuing state or organisation code.
    pub issuing_country: String,
    /// Document number with trailing fillers removed.
    pub document_number: String,
    /// Three-letter nationality code.
    pub nationality: String,
    /// Date of birth, `YYMMDD`.
    pub date_of_birth: String,
    /// Date of expiry, `YYMMDD`.
    pub date_of_expiry: String,
    /// `M`, `F`, or empty when the zone carries the filler.
    pub sex: String,
    /// Primary identifier (surname).
    pub surname: String,
    /// Secondary identifier (given names, space separated).
    pub given_names: String,
    /// Checksum outcome for every protected field.
    pub validation: MrzValidation,
}

/// Rejection of malformed MRZ text. Always local and never retried —
/// a scanner that produced this payload has to rescan.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MrzParseError {
    /// Neither two nor three non-empty lines.
    #[error("expected 2 or 3 MRZ lines, found {found}")]
    WrongLineCount {
        /// Number of non-empty lines in the input.
        found: usize,
    },
    /// A line does not match the layout's fixed width.
    #[error("MRZ line {line} must be {expected} characters, found {found}")]
    WrongLineLength {
        /// One-based line number.
        line: usize,
        /// Required width for the detected layout.
        expected: usize,
        /// Actual width.
        found: usize,
    },
    /// A character outside the MRZ alphabet `A–Z0–9<`.
    #[error("illegal character {ch:?} at line {line}, column {column}")]
    IllegalCharacter {
        /// One-based line number.
        line: usize,
        /// One-based column number.
        column: usize,
        /// The offending character.
        ch: char,
    },
    /// A date string that cannot be converted to `YYMMDD`.
    #[error("cannot convert {input:?} to YYMMDD")]
    InvalidDate {
        /// The rejected input.
        input: String,
    },
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Parse and validate raw MRZ text.
///
/// The input may separate lines with `\n` or `\r\n`; blank lines are
/// ignored. Two lines select the TD3 layout, three lines TD1.
pub fn extract_mrz_info(raw: &str) -> Result<MrzInfo, MrzParseError> {
    let lines: Vec<&str> = raw
        .lines()
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.is_empty())
        .collect();

    let expected = match lines.len() {
        2 => TD3_LINE_LEN,
        3 => TD1_LINE_LEN,
        found => return Err(MrzParseError::WrongLineCount { found }),
    };

    for (idx, line) in lines.iter().enumerate() {
        if line.len() != expected {
            return Err(MrzParseError::WrongLineLength {
                line: idx + 1,
                expected,
                found: line.len(),
            });
        }
        for (col, ch) in line.char_indices() {
            if !matches!(ch, 'A'..='Z' | '0'..='9' | '<') {
                return Err(MrzParseError::IllegalCharacter {
                    line: idx + 1,
                    column: col + 1,
                    ch,
                });
            }
        }
    }

    Ok(match lines.as_slice() {
        [l1, l2] => parse::parse_td3(l1, l2),
        [l1, l2, l3] => parse::parse_td1(l1, l2, l3),
        _ => unreachable!("line count checked above"),
    })
}

/// Convert a scanner-supplied date to the MRZ `YYMMDD` form.
///
/// Accepts `YYMMDD` (returned as-is) and ISO `YYYY-MM-DD`. Everything
/// else is rejected — fabricating a date here would poison the BAC key
/// derivation downstream.
pub fn format_date_to_yymmdd(input: &str) -> Result<String, MrzParseError> {
    let reject = || MrzParseError::InvalidDate {
        input: input.to_string(),
    };

    if input.len() == 6 && input.bytes().all(|c| c.is_ascii_digit()) {
        return Ok(input.to_string());
    }

    let parts: Vec<&str> = input.split('-').collect();
    match parts.as_slice() {
        [year, month, day]
            if year.len() == 4
                && month.len() == 2
                && day.len() == 2
                && parts.iter().all(|p| p.bytes().all(|c| c.is_ascii_digit())) =>
        {
            Ok(format!("{}{month}{day}", &year[2..]))
        }
        _ => Err(reject()),
    }
}
