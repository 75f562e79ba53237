//! Canonical document model.
//!
//! One shape for document data regardless of how it was acquired
//! (camera MRZ read or secure-chip session). Fields a source did not
//! supply hold the explicit [`UNKNOWN`] sentinel — never a fabricated
//! plausible value — so downstream code can tell "absent" from "read".

use serde::{Deserialize, Serialize};

use idv_mrz::MrzValidation;

/// Sentinel for a field the acquiring capability did not supply.
pub const UNKNOWN: &str = "UNKNOWN";

/// Document category recorded in the catalog and proving snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentCategory {
    /// TD3 passport booklet.
    Passport,
    /// TD1 identity card.
    IdCard,
}

impl DocumentCategory {
    /// Canonical snake_case tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passport => "passport",
            Self::IdCard => "id_card",
        }
    }
}

impl std::fmt::Display for DocumentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parsed metadata of the document signer certificate read from the
/// chip. Proof generation requires this — a document without it cannot
/// enter the proving pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerCertMetadata {
    /// Authority key identifier of the issuing CSCA, hex encoded.
    pub authority_key_identifier: String,
    /// Subject key identifier, when present on the certificate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_key_identifier: Option<String>,
    /// Signature algorithm OID string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_algorithm: Option<String>,
}

/// Canonical document data held by the documents capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentData {
    /// Catalog identifier.
    pub id: String,
    /// Passport or identity card.
    pub category: DocumentCategory,
    /// Whether this is a mock document (development builds only).
    pub mock: bool,
    /// Document number, or [`UNKNOWN`].
    pub document_number: String,
    /// Date of birth `YYMMDD`, or [`UNKNOWN`].
    pub date_of_birth: String,
    /// Date of expiry `YYMMDD`, or [`UNKNOWN`].
    pub date_of_expiry: String,
    /// Three-letter issuing state, or [`UNKNOWN`].
    pub issuing_country: String,
    /// Three-letter nationality, or [`UNKNOWN`].
    pub nationality: String,
    /// Per-field checksum flags when the data came through an MRZ
    /// parse. Chip reads leave this `None`: the chip interface does
    /// not re-expose the printed check digits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mrz_validation: Option<MrzValidation>,
    /// Parsed signer-certificate metadata; required for proving.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signer_cert: Option<SignerCertMetadata>,
}

impl DocumentData {
    /// Whether proof generation can start from this document.
    pub fn has_signer_cert(&self) -> bool {
        self.signer_cert.is_some()
    }
}

/// Catalog entry for one stored document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Catalog identifier.
    pub id: String,
    /// Passport or identity card.
    pub category: DocumentCategory,
    /// Whether this is a mock document.
    pub mock: bool,
    /// Whether the document completed on-chain registration.
    pub registered: bool,
}

/// The set of stored documents plus the active selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentCatalog {
    /// All stored documents, insertion ordered.
    pub documents: Vec<DocumentMetadata>,
    /// Identifier of the selected document, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected: Option<String>,
}

impl DocumentCatalog {
    /// Metadata of the selected document, if a selection exists and
    /// still resolves.
    pub fn selected_document(&self) -> Option<&DocumentMetadata> {
        let id = self.selected.as_deref()?;
        self.documents.iter().find(|d| d.id == id)
    }

    /// Whether any stored document is registered and not a mock.
    pub fn has_valid_registered_document(&self) -> bool {
        self.documents.iter().any(|d| d.registered && !d.mock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(id: &str, registered: bool, mock: bool) -> DocumentMetadata {
        DocumentMetadata {
            id: id.to_string(),
            category: DocumentCategory::Passport,
            mock,
            registered,
        }
    }

    #[test]
    fn selected_document_resolves_by_id() {
        let catalog = DocumentCatalog {
            documents: vec![metadata("a", false, false), metadata("b", true, false)],
            selected: Some("b".into()),
        };
        assert_eq!(catalog.selected_document().unwrap().id, "b");
    }

    #[test]
    fn dangling_selection_resolves_to_none() {
        let catalog = DocumentCatalog {
            documents: vec![metadata("a", false, false)],
            selected: Some("gone".into()),
        };
        assert!(catalog.selected_document().is_none());
    }

    #[test]
    fn mock_documents_are_never_valid_registrations() {
        let catalog = DocumentCatalog {
            documents: vec![metadata("a", true, true)],
            selected: None,
        };
        assert!(!catalog.has_valid_registered_document());
    }

    #[test]
    fn document_data_serde_skips_absent_optionals() {
        let doc = DocumentData {
            id: "a".into(),
            category: DocumentCategory::IdCard,
            mock: false,
            document_number: UNKNOWN.into(),
            date_of_birth: "740812".into(),
            date_of_expiry: "120415".into(),
            issuing_country: "UTO".into(),
            nationality: UNKNOWN.into(),
            mrz_validation: None,
            signer_cert: None,
        };
        let json = serde_json::to_string(&doc).unwrap();
        assert!(!json.contains("signer_cert"));
        let back: DocumentData = serde_json::from_str(&json).unwrap();
        assert_eq!(doc, back);
        assert!(!back.has_signer_cert());
    }
}
