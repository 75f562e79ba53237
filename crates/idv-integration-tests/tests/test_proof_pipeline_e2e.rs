//! End-to-end pipeline test: scan → validate → prove → history.
//!
//! Wires the client façade, the proving machine and the history store
//! together over mock capabilities and walks one successful proof
//! session the way the mobile app does: the user scans a passport,
//! the document is validated, the machine fetches prerequisites and
//! drives the prover, and the session lands in history as `SUCCESS`.

use std::sync::Arc;

use serde_json::json;

use idv_client::{create_client, AdapterSet, Client, EventKind, EventPayload};
use idv_core::adapters::{NetworkCapability, WsEvent};
use idv_core::cancel::CancellationToken;
use idv_core::config::Config;
use idv_core::document::{DocumentCategory, DocumentData, SignerCertMetadata};
use idv_core::mock::{MockAuth, MockCrypto, MockDocuments, MockHttp, MockScanner, MockWs, TestClock};
use idv_core::proof::ProofRequestKind;
use idv_core::scan::{RawScan, ScanOpts, ScanResult};
use idv_history::{
    HistoryConfig, MemoryHistoryDatabase, NewProofHistoryEntry, ProofHistoryStore, ProofStatus,
};
use idv_proving::{ProvingMachine, ProvingPhase};

const SAMPLE_TD3: &str = "P<UTOERIKSSON<<ANNA<MARIA<<<<<<<<<<<<<<<<<<<\nL898902C36UTO7408122F1204159ZE184226B<<<<<10";

fn passport() -> DocumentData {
    DocumentData {
        id: "doc-1".into(),
        category: DocumentCategory::Passport,
        mock: false,
        document_number: "L898902C3".into(),
        date_of_birth: "740812".into(),
        date_of_expiry: "120415".into(),
        issuing_country: "UTO".into(),
        nationality: "UTO".into(),
        mrz_validation: None,
        signer_cert: Some(SignerCertMetadata {
            authority_key_identifier: "aabbcc".into(),
            subject_key_identifier: None,
            signature_algorithm: None,
        }),
    }
}

fn build_client(ws: Arc<MockWs>) -> Client {
    create_client(
        Config::default(),
        AdapterSet {
            scanner: Some(Arc::new(MockScanner::returning(RawScan::Text {
                mrz: SAMPLE_TD3.into(),
            }))),
            network: Some(NetworkCapability {
                http: Arc::new(MockHttp::with_response(json!({ "csca_root": "aa" }))),
                ws,
            }),
            crypto: Some(Arc::new(MockCrypto)),
            auth: Some(Arc::new(MockAuth::with_key("deadbeef"))),
            documents: Some(Arc::new(MockDocuments::with_selected(passport()))),
            storage: None,
            analytics: None,
            clock: None,
        },
    )
    .unwrap()
}

fn new_entry(session: &str) -> NewProofHistoryEntry {
    NewProofHistoryEntry {
        session_id: session.into(),
        app_name: "Demo Verifier".into(),
        endpoint_type: "https".into(),
        disclosures: r#"{"date_of_birth":true}"#.into(),
        logo_base64: None,
        user_id: "user-1".into(),
        user_id_type: "uuid".into(),
    }
}

#[tokio::test]
async fn successful_session_flows_from_scan_to_history() {
    let ws = Arc::new(MockWs::scripted(vec![
        WsEvent::Message(json!({ "type": "progress", "step": "witness", "percent": 30 }).to_string()),
        WsEvent::Message(json!({ "type": "result", "ok": true }).to_string()),
    ]));
    let client = build_client(ws);

    let states = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = states.clone();
    let _sub = client.on(EventKind::State, move |payload| {
        if let EventPayload::State(state) = payload {
            sink.lock().push(state.clone());
        }
    });

    // Scan and validate the document.
    let scan = client
        .scan_document(&ScanOpts::Mrz, &CancellationToken::new())
        .await
        .unwrap();
    match &scan {
        ScanResult::Mrz { info } => assert_eq!(info.document_number, "L898902C3"),
        other => panic!("expected mrz scan, got {other:?}"),
    }
    assert!(client.validate_document(&scan).ok);

    // Record the session, then prove.
    let store = ProofHistoryStore::new(
        HistoryConfig::default(),
        Arc::new(MemoryHistoryDatabase::new()),
        Arc::new(MockWs::scripted(vec![])),
        Arc::new(TestClock::at(1_000_000)),
    );
    let entry = store.add_entry(new_entry("sess-1")).await.unwrap();
    assert_eq!(entry.status, ProofStatus::Pending);

    let machine = ProvingMachine::init(
        client.clone(),
        ProofRequestKind::Register,
        CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(
        machine.start_fetching_data().await.unwrap(),
        ProvingPhase::GeneratingProof
    );
    let outcome = machine
        .generate_proof(json!({ "disclosures": { "date_of_birth": true } }), None)
        .await
        .unwrap();
    assert!(outcome.ok);
    assert_eq!(machine.phase(), ProvingPhase::Completed);

    // Settle the history record from the outcome.
    assert!(store
        .update_status("sess-1", ProofStatus::Success, None, None)
        .await
        .unwrap());
    assert_eq!(store.entries()[0].status, ProofStatus::Success);

    assert_eq!(
        *states.lock(),
        vec!["fetching_data", "generating_proof", "completed"]
    );
}

#[tokio::test]
async fn remote_rejection_lands_in_history_as_failure() {
    let ws = Arc::new(MockWs::scripted(vec![WsEvent::Message(
        json!({ "type": "result", "ok": false, "reason": "invalid commitment" }).to_string(),
    )]));
    let client = build_client(ws);

    let store = ProofHistoryStore::new(
        HistoryConfig::default(),
        Arc::new(MemoryHistoryDatabase::new()),
        Arc::new(MockWs::scripted(vec![])),
        Arc::new(TestClock::at(1_000_000)),
    );
    store.add_entry(new_entry("sess-2")).await.unwrap();

    let machine = ProvingMachine::init(
        client,
        ProofRequestKind::Disclose,
        CancellationToken::new(),
    )
    .await
    .unwrap();
    machine.start_fetching_data().await.unwrap();
    let outcome = machine.generate_proof(json!({}), None).await.unwrap();
    assert!(!outcome.ok);

    store
        .update_status(
            "sess-2",
            ProofStatus::Failure,
            outcome.reason.as_deref(),
            Some("prover rejected the request"),
        )
        .await
        .unwrap();

    let entry = &store.entries()[0];
    assert_eq!(entry.status, ProofStatus::Failure);
    assert_eq!(entry.error_code.as_deref(), Some("PROOF_FAILED"));

    // The terminal status cannot be overwritten by a late relay frame.
    assert!(!store
        .update_status("sess-2", ProofStatus::Success, None, None)
        .await
        .unwrap());
    assert_eq!(store.entries()[0].status, ProofStatus::Failure);
}
