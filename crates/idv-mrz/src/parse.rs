//! Fixed-offset field slicing for the TD1 and TD3 layouts.
//!
//! Offsets follow ICAO 9303 part 4 (TD1) and part 5 (TD3). The caller
//! has already verified line counts, line lengths and the MRZ alphabet,
//! so slicing here is infallible; only the checksum comparisons can
//! still fail, and those are reported as validation flags rather than
//! errors.

use crate::checksum::checksum_matches;
use crate::{MrzInfo, MrzValidation};

/// Strip filler characters from a fixed-width field.
fn unfill(field: &str) -> String {
    field.trim_matches('<').to_string()
}

/// Split a name field into surname and given names on the `<<`
/// separator, converting single fillers to spaces.
fn split_names(field: &str) -> (String, String) {
    let (surname, given) = match field.find("<<") {
        Some(idx) => (&field[..idx], &field[idx + 2..]),
        None => (field, ""),
    };
    (
        surname.replace('<', " ").trim().to_string(),
        given.replace('<', " ").trim().to_string(),
    )
}

/// The sex position carries `M`, `F` or the filler for "unspecified".
fn parse_sex(field: &str) -> String {
    match field {
        "<" => String::new(),
        other => other.to_string(),
    }
}

/// Structural plausibility of the sliced fields. Checksum mismatches are
/// reported separately; this flag covers the parts no check digit
/// protects.
fn format_ok(document_type: &str, birth: &str, expiry: &str, sex: &str) -> bool {
    document_type.bytes().next().is_some_and(|c| c.is_ascii_uppercase())
        && birth.bytes().all(|c| c.is_ascii_digit())
        && expiry.bytes().all(|c| c.is_ascii_digit())
        && matches!(sex, "" | "M" | "F")
}

/// Parse a two-line 44-character TD3 (passport booklet) MRZ.
pub(crate) fn parse_td3(line1: &str, line2: &str) -> MrzInfo {
    let document_type = unfill(&line1[0..2]);
    let issuing_country = unfill(&line1[2..5]);
    let (surname, given_names) = split_names(&line1[5..44]);

    let document_number = unfill(&line2[0..9]);
    let nationality = unfill(&line2[10..13]);
    let date_of_birth = line2[13..19].to_string();
    let sex = parse_sex(&line2[20..21]);
    let date_of_expiry = line2[21..27].to_string();

    let document_number_checksum = checksum_matches(&line2[0..9], line2.as_bytes()[9]);
    let birth_date_checksum = checksum_matches(&line2[13..19], line2.as_bytes()[19]);
    let expiry_date_checksum = checksum_matches(&line2[21..27], line2.as_bytes()[27]);

    // Composite: document number + check, birth + check, expiry + check,
    // personal number + check (ICAO 9303-5 final check digit).
    let composite = format!("{}{}{}", &line2[0..10], &line2[13..20], &line2[21..43]);
    let composite_checksum = checksum_matches(&composite, line2.as_bytes()[43]);

    let format = format_ok(&document_type, &date_of_birth, &date_of_expiry, &sex);
    let validation = MrzValidation::from_flags(
        format,
        document_number_checksum,
        birth_date_checksum,
        expiry_date_checksum,
        composite_checksum,
    );

    MrzInfo {
        document_type,
        issuing_country,
        document_number,
        nationality,
        date_of_birth,
        date_of_expiry,
        sex,
        surname,
        given_names,
        validation,
    }
}

/// Parse a three-line 30-character TD1 (identity card) MRZ.
pub(crate) fn parse_td1(line1: &str, line2: &str, line3: &str) -> MrzInfo {
    let document_type = unfill(&line1[0..2]);
    let issuing_country = unfill(&line1[2..5]);
    let document_number = unfill(&line1[5..14]);

    let date_of_birth = line2[0..6].to_string();
    let sex = parse_sex(&line2[7..8]);
    let date_of_expiry = line2[8..14].to_string();
    let nationality = unfill(&line2[15..18]);
    let (surname, given_names) = split_names(line3);

    let document_number_checksum = checksum_matches(&line1[5..14], line1.as_bytes()[14]);
    let birth_date_checksum = checksum_matches(&line2[0..6], line2.as_bytes()[6]);
    let expiry_date_checksum = checksum_matches(&line2[8..14], line2.as_bytes()[14]);

    // Composite: upper line positions 6-30, middle line 1-7, 9-15 and
    // 19-29 (ICAO 9303-4 final check digit at middle position 30).
    let composite = format!(
        "{}{}{}{}",
        &line1[5..30],
        &line2[0..7],
        &line2[8..15],
        &line2[18..29]
    );
    let composite_checksum = checksum_matches(&composite, line2.as_bytes()[29]);

    let format = format_ok(&document_type, &date_of_birth, &date_of_expiry, &sex);
    let validation = MrzValidation::from_flags(
        format,
        document_number_checksum,
        birth_date_checksum,
        expiry_date_checksum,
        composite_checksum,
    );

    MrzInfo {
        document_type,
        issuing_country,
        document_number,
        nationality,
        date_of_birth,
        date_of_expiry,
        sex,
        surname,
        given_names,
        validation,
    }
}
