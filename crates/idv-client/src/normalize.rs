//! Scan-result normalizer.
//!
//! Maps the scanner capability's raw payload into the canonical
//! [`ScanResult`]. Plain MRZ text goes through the parser; structured
//! chip data maps field by field, substituting the explicit
//! [`UNKNOWN`] sentinel for anything the chip session did not supply.
//! Callers must not assume an unretrieved field (nationality, checksum
//! flags) is populated or valid — the sentinel keeps that visible.

use idv_core::document::{DocumentCategory, DocumentData, SignerCertMetadata, UNKNOWN};
use idv_core::scan::{ChipRead, RawScan, ScanResult};
use idv_mrz::{extract_mrz_info, MrzParseError};
use uuid::Uuid;

/// Normalize a raw scanner payload into the canonical result shape.
pub fn normalize_scan(raw: RawScan) -> Result<ScanResult, MrzParseError> {
    match raw {
        RawScan::Text { mrz } => extract_mrz_info(&mrz).map(|info| ScanResult::Mrz { info }),
        RawScan::Chip { read } => Ok(ScanResult::Nfc {
            document: document_from_chip(read),
        }),
        RawScan::Qr { payload } => Ok(ScanResult::Qr { payload }),
    }
}

/// Map a chip session onto the canonical document shape.
///
/// Per-field checksum flags stay `None`: the chip interface does not
/// re-expose the printed check digits, and fabricating "valid" flags
/// would mask genuine validation outcomes.
fn document_from_chip(read: ChipRead) -> DocumentData {
    let category = match read.document_type.as_deref() {
        Some(t) if t.starts_with('I') => DocumentCategory::IdCard,
        _ => DocumentCategory::Passport,
    };
    let signer_cert = read
        .authority_key_identifier
        .map(|authority_key_identifier| SignerCertMetadata {
            authority_key_identifier,
            subject_key_identifier: None,
            signature_algorithm: None,
        });

    let or_unknown = |field: Option<String>| field.unwrap_or_else(|| UNKNOWN.to_string());

    DocumentData {
        id: Uuid::new_v4().to_string(),
        category,
        mock: false,
        document_number: or_unknown(read.document_number),
        date_of_birth: or_unknown(read.date_of_birth),
        date_of_expiry: or_unknown(read.date_of_expiry),
        issuing_country: or_unknown(read.issuing_country),
        nationality: or_unknown(read.nationality),
        mrz_validation: None,
        signer_cert,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use idv_core::scan::ScanMode;

    const SAMPLE_TD3: &str = "P<UTOERIKSSON<<ANNA<MARIA<<<<<<<<<<<<<<<<<<<\nL898902C36UTO7408122F1204159ZE184226B<<<<<10";

    #[test]
    fn text_payload_goes_through_the_parser() {
        let result = normalize_scan(RawScan::Text {
            mrz: SAMPLE_TD3.into(),
        })
        .unwrap();
        match result {
            ScanResult::Mrz { info } => {
                assert_eq!(info.document_number, "L898902C3");
                assert!(info.validation.overall);
            }
            other => panic!("expected mrz result, got {other:?}"),
        }
    }

    #[test]
    fn malformed_text_is_a_parse_error() {
        let err = normalize_scan(RawScan::Text {
            mrz: "not an mrz".into(),
        })
        .unwrap_err();
        assert!(matches!(err, MrzParseError::WrongLineCount { .. }));
    }

    #[test]
    fn chip_fields_map_and_absences_become_sentinels() {
        let result = normalize_scan(RawScan::Chip {
            read: ChipRead {
                document_number: Some("L898902C3".into()),
                date_of_birth: Some("740812".into()),
                date_of_expiry: Some("120415".into()),
                issuing_country: Some("UTO".into()),
                nationality: None,
                document_type: Some("P".into()),
                authority_key_identifier: Some("aabbcc".into()),
            },
        })
        .unwrap();
        match result {
            ScanResult::Nfc { document } => {
                assert_eq!(document.document_number, "L898902C3");
                assert_eq!(document.nationality, UNKNOWN);
                assert_eq!(document.category, DocumentCategory::Passport);
                assert!(document.mrz_validation.is_none());
                assert_eq!(
                    document.signer_cert.unwrap().authority_key_identifier,
                    "aabbcc"
                );
            }
            other => panic!("expected nfc result, got {other:?}"),
        }
    }

    #[test]
    fn chip_identity_card_type_maps_to_id_card() {
        let result = normalize_scan(RawScan::Chip {
            read: ChipRead {
                document_type: Some("ID".into()),
                ..ChipRead::default()
            },
        })
        .unwrap();
        match result {
            ScanResult::Nfc { document } => {
                assert_eq!(document.category, DocumentCategory::IdCard);
                assert_eq!(document.document_number, UNKNOWN);
                assert!(document.signer_cert.is_none());
            }
            other => panic!("expected nfc result, got {other:?}"),
        }
    }

    #[test]
    fn qr_payload_passes_through_opaque() {
        let result = normalize_scan(RawScan::Qr {
            payload: "qr-blob".into(),
        })
        .unwrap();
        assert_eq!(result.mode(), ScanMode::Qr);
        match result {
            ScanResult::Qr { payload } => assert_eq!(payload, "qr-blob"),
            other => panic!("expected qr result, got {other:?}"),
        }
    }
}
