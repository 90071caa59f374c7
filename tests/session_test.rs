//! Integration tests for pagination sessions.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use pagination::error::ComputeError;
use pagination::model::{DocumentData, DocumentEvent, DocumentStatus, Page, StatusState};
use pagination::{
    PageRulesBackend, PaginationSession, SessionManifest, SessionOptions, SourceLibrary,
    StatusBackend, StopToken,
};

fn create_session(backend: Arc<dyn StatusBackend>, options: SessionOptions) -> PaginationSession {
    let mut library = SourceLibrary::new();
    library.add_document("ORD-100_20240105.tif", 3);
    library.add_document("ENC-9.tif", 2);
    PaginationSession::new(Arc::new(library), backend, options)
}

#[test]
fn test_split_source_into_documents() {
    let mut session = create_session(Arc::new(PageRulesBackend::new()), SessionOptions::default());
    let source = session.open_source("ORD-100_20240105.tif").unwrap();

    let unit = session.copy_pages(source, &[2]).unwrap();
    let split = session.create_document("ORD-100_20240105.tif");
    session.paste(&unit, Some((split, 0))).unwrap();
    session.remove_page(source, 2).unwrap();

    assert!(session.wait_idle(Duration::from_secs(5)));
    let names: Vec<_> = session.documents().iter().map(|d| d.name().to_string()).collect();
    assert_eq!(names, vec!["ORD-100_20240105.tif", "ORD-100_20240105 (2).tif"]);

    let split_doc = session.document(split).unwrap();
    assert_eq!(split_doc.page(0).unwrap().source_page_number(), 3);
    let state = split_doc.status();
    let status = state.status().unwrap();
    assert_eq!(status.orders()[0].id, "ORD-100");
    assert!(!status.data_error());

    assert!(session.shutdown());
}

#[test]
fn test_document_events_fire_on_controller_thread() {
    let mut session = create_session(Arc::new(PageRulesBackend::new()), SessionOptions::default());
    let id = session.create_document("out.tif");
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let controller = thread::current().id();

    session
        .edit(id, |doc| {
            doc.subscribe(move |event| {
                assert_eq!(thread::current().id(), controller);
                sink.lock().unwrap().push(event.clone());
            });
            Ok(())
        })
        .unwrap();
    session.add_page(id, Page::from_source("ENC-9.tif", 1)).unwrap();
    assert!(session.wait_idle(Duration::from_secs(5)));

    let events = events.lock().unwrap();
    assert_eq!(
        *events,
        vec![
            DocumentEvent::ModifiedChanged { modified: true },
            DocumentEvent::DataChanged { page_count: 1 },
            DocumentEvent::StatusUpdated,
        ]
    );
    drop(events);
    session.shutdown();
}

#[test]
fn test_paste_drops_pages_after_missing_source() {
    let mut session = create_session(Arc::new(PageRulesBackend::new()), SessionOptions::default());
    let unit = pagination::ClipboardTransferUnit::from_entries(vec![
        pagination::ClipboardEntry::page("ENC-9.tif", 1, false),
        pagination::ClipboardEntry::DocumentBoundary,
        pagination::ClipboardEntry::page("ENC-9.tif", 2, true),
        pagination::ClipboardEntry::page("gone.tif", 1, false),
        pagination::ClipboardEntry::page("ENC-9.tif", 1, false),
    ]);

    let result = session.paste(&unit, None).unwrap();
    assert_eq!(result.pages, 2);
    assert_eq!(result.created.len(), 2);
    assert_eq!(session.document(result.created[1]).unwrap().page_count(), 1);
    assert!(session.document(result.created[1]).unwrap().page(0).unwrap().deleted);
    session.shutdown();
}

#[test]
fn test_shutdown_abandons_uncooperative_worker() {
    let release = Arc::new(Mutex::new(()));
    let held = release.lock().unwrap();
    let gate = Arc::clone(&release);
    let backend: Arc<dyn StatusBackend> = Arc::new(
        move |_: &DocumentData, _: &StopToken| -> Result<DocumentStatus, ComputeError> {
            let _open = gate.lock().unwrap();
            DocumentStatus::builder()
                .data_text("{}")
                .build()
                .map_err(|e| ComputeError::invalid_data(e.to_string()))
        },
    );
    let options = SessionOptions::new().with_stop_timeout(Duration::from_millis(100));
    let mut session = create_session(backend, options);
    session.open_source("ENC-9.tif").unwrap();

    let started = Instant::now();
    assert!(!session.shutdown());
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(session.manager().live_workers(), 1);

    drop(held);
    let deadline = Instant::now() + Duration::from_secs(5);
    while session.manager().live_workers() > 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(session.manager().live_workers(), 0);
}

#[test]
fn test_manifest_session_statuses() {
    let manifest: SessionManifest = r#"{
        "sources": [
            { "name": "ORD-1.tif", "pages": 2 },
            { "name": "ORD-2.tif", "pages": 1 }
        ],
        "documents": [
            { "name": "mixed.tif", "pages": ["ORD-1.tif:1", "ORD-2.tif:1"] },
            { "name": "gone.tif", "pages": [{ "source": "ORD-1.tif", "page": 2, "deleted": true }] }
        ],
        "options": { "stop_timeout_ms": 1000 }
    }"#
    .parse()
    .unwrap();

    let (mut session, ids) = manifest
        .build_session(Arc::new(PageRulesBackend::new()))
        .unwrap();
    assert!(session.wait_idle(Duration::from_secs(5)));

    let mixed = session.document(ids[0]).unwrap().status();
    assert!(mixed.status().unwrap().prompt_for_duplicate_orders());

    match session.document(ids[1]).unwrap().status() {
        StatusState::Ready(status) => {
            assert!(status.data_error());
            assert!(matches!(
                status.failure(),
                Some(ComputeError::InvalidData { .. })
            ));
        }
        other => panic!("unexpected status state: {:?}", other),
    }
    assert!(session.shutdown());
}
