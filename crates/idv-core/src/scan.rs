//! Scan request and result shapes.
//!
//! A scanner capability accepts [`ScanOpts`] and yields a [`RawScan`]
//! — whatever the driver produced, untouched. The client's normalizer
//! turns a raw payload into the canonical [`ScanResult`], whose variant
//! tag and payload type always agree by construction.

use serde::{Deserialize, Serialize};

use crate::document::DocumentData;
use idv_mrz::MrzInfo;

/// Scanner acquisition mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// Optical read of the printed machine-readable zone.
    Mrz,
    /// Secure-chip session over NFC.
    Nfc,
    /// QR payload scan.
    Qr,
}

impl ScanMode {
    /// Canonical lowercase tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mrz => "mrz",
            Self::Nfc => "nfc",
            Self::Qr => "qr",
        }
    }
}

/// Options for one scanner session.
///
/// The NFC variant carries the Basic Access Control key material (the
/// chip refuses to talk without document number, birth and expiry
/// dates) plus the protocol toggles exposed by the native driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ScanOpts {
    /// Optical MRZ scan.
    Mrz,
    /// Secure-chip read.
    Nfc {
        /// BAC key: document number as printed in the MRZ.
        document_number: String,
        /// BAC key: date of birth, `YYMMDD`.
        date_of_birth: String,
        /// BAC key: date of expiry, `YYMMDD`.
        date_of_expiry: String,
        /// Card access number, for documents that support PACE-CAN.
        #[serde(skip_serializing_if = "Option::is_none")]
        can_number: Option<String>,
        /// Skip the PACE handshake and go straight to BAC.
        #[serde(default)]
        skip_pace: bool,
        /// Skip chip authentication.
        #[serde(default)]
        skip_ca: bool,
        /// Driver extended-length APDU mode.
        #[serde(default)]
        extended_mode: bool,
    },
    /// QR scan.
    Qr,
}

impl ScanOpts {
    /// The mode this request targets.
    pub fn mode(&self) -> ScanMode {
        match self {
            Self::Mrz => ScanMode::Mrz,
            Self::Nfc { .. } => ScanMode::Nfc,
            Self::Qr => ScanMode::Qr,
        }
    }
}

/// Fields a secure-chip session produced. Every field is optional —
/// chips differ in which data groups they expose, and the normalizer
/// is responsible for substituting explicit sentinels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChipRead {
    pub document_number: Option<String>,
    pub date_of_birth: Option<String>,
    pub date_of_expiry: Option<String>,
    pub issuing_country: Option<String>,
    pub nationality: Option<String>,
    pub document_type: Option<String>,
    /// Parsed signer-certificate metadata from the chip's SOD, when
    /// the driver extracted it.
    pub authority_key_identifier: Option<String>,
}

/// Raw payload as produced by the scanner capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RawScan {
    /// Optical MRZ text, unparsed.
    Text { mrz: String },
    /// Structured secure-chip fields.
    Chip { read: ChipRead },
    /// Opaque QR payload.
    Qr { payload: String },
}

/// Canonical scan result. Exactly one variant per scan; the tag and
/// the payload type cannot disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ScanResult {
    /// Parsed and checksum-validated MRZ fields.
    Mrz { info: MrzInfo },
    /// Canonical document data from a chip session.
    Nfc { document: DocumentData },
    /// Opaque QR payload, passed through.
    Qr { payload: String },
}

impl ScanResult {
    /// The mode that produced this result.
    pub fn mode(&self) -> ScanMode {
        match self {
            Self::Mrz { .. } => ScanMode::Mrz,
            Self::Nfc { .. } => ScanMode::Nfc,
            Self::Qr { .. } => ScanMode::Qr,
        }
    }
}

/// Progress report forwarded from a long-running operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Human-oriented step name (`"fetching_data"`, `"proving"`, ...).
    pub step: String,
    /// Percent complete, when the backend reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_opts_mode_matches_variant() {
        assert_eq!(ScanOpts::Mrz.mode(), ScanMode::Mrz);
        assert_eq!(ScanOpts::Qr.mode(), ScanMode::Qr);
        let nfc = ScanOpts::Nfc {
            document_number: "L898902C3".into(),
            date_of_birth: "740812".into(),
            date_of_expiry: "120415".into(),
            can_number: None,
            skip_pace: false,
            skip_ca: false,
            extended_mode: false,
        };
        assert_eq!(nfc.mode(), ScanMode::Nfc);
    }

    #[test]
    fn scan_opts_nfc_serde_defaults_toggles() {
        let json = r#"{"mode":"nfc","document_number":"L898902C3","date_of_birth":"740812","date_of_expiry":"120415"}"#;
        let opts: ScanOpts = serde_json::from_str(json).unwrap();
        match opts {
            ScanOpts::Nfc {
                skip_pace,
                skip_ca,
                extended_mode,
                can_number,
                ..
            } => {
                assert!(!skip_pace && !skip_ca && !extended_mode);
                assert!(can_number.is_none());
            }
            other => panic!("expected nfc, got {other:?}"),
        }
    }

    #[test]
    fn raw_scan_tagged_serde() {
        let raw = RawScan::Qr {
            payload: "opaque".into(),
        };
        let json = serde_json::to_string(&raw).unwrap();
        assert!(json.contains(r#""kind":"qr""#));
        let back: RawScan = serde_json::from_str(&json).unwrap();
        assert_eq!(raw, back);
    }
}
