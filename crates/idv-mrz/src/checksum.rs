//! ICAO 9303 check digit computation.
//!
//! The check digit over a field is the weighted sum of its character
//! values modulo 10, with the weight cycle (7, 3, 1):
//!
//! ```text
//! value('0'..='9') = 0..=9
//! value('A'..='Z') = 10..=35
//! value('<')       = 0
//! ```
//!
//! Composite check digits are computed over the concatenation of
//! field+check-digit substrings; the caller assembles the input, this
//! module only does the arithmetic.

/// Numeric value of an MRZ character, or `None` for characters outside
/// the MRZ alphabet `A–Z0–9<`.
pub(crate) fn char_value(c: u8) -> Option<u32> {
    match c {
        b'0'..=b'9' => Some(u32::from(c - b'0')),
        b'A'..=b'Z' => Some(u32::from(c - b'A') + 10),
        b'<' => Some(0),
        _ => None,
    }
}

/// Compute the ICAO 9303 check digit for a field.
///
/// The field must contain only MRZ-alphabet characters; the parser
/// validates the alphabet before slicing, so this is an internal
/// invariant rather than a runtime error.
pub fn check_digit(field: &str) -> u32 {
    const WEIGHTS: [u32; 3] = [7, 3, 1];
    field
        .bytes()
        .enumerate()
        .map(|(i, c)| char_value(c).unwrap_or(0) * WEIGHTS[i % 3])
        .sum::<u32>()
        % 10
}

/// Compare a field against its embedded check digit character.
///
/// A non-numeric check digit position (for example `<` where a document
/// omits the field entirely) never matches.
pub(crate) fn checksum_matches(field: &str, digit: u8) -> bool {
    digit.is_ascii_digit() && check_digit(field) == u32::from(digit - b'0')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_values_match_icao_table() {
        assert_eq!(char_value(b'0'), Some(0));
        assert_eq!(char_value(b'9'), Some(9));
        assert_eq!(char_value(b'A'), Some(10));
        assert_eq!(char_value(b'Z'), Some(35));
        assert_eq!(char_value(b'<'), Some(0));
        assert_eq!(char_value(b'a'), None);
        assert_eq!(char_value(b' '), None);
    }

    #[test]
    fn icao_worked_example() {
        // ICAO 9303 part 3 worked example: "520727" has check digit 3.
        assert_eq!(check_digit("520727"), 3);
    }

    #[test]
    fn document_number_example() {
        // From the specimen passport of the standard.
        assert_eq!(check_digit("L898902C3"), 6);
    }

    #[test]
    fn filler_contributes_zero() {
        assert_eq!(check_digit("<<<<<<"), 0);
        assert_eq!(check_digit("1<"), check_digit("1"));
    }

    #[test]
    fn checksum_matches_rejects_non_digit() {
        assert!(checksum_matches("520727", b'3'));
        assert!(!checksum_matches("520727", b'<'));
        assert!(!checksum_matches("520727", b'4'));
    }
}
