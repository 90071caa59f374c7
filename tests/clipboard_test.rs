//! Integration tests for clipboard transfer units.

use std::collections::BTreeSet;

use pagination::clipboard::{ClipboardEntry, ClipboardTransferUnit};
use pagination::model::{OutputDocument, Page};
use pagination::provider::{PageProvider, PageRequest, SourceLibrary};

fn create_library() -> SourceLibrary {
    let mut library = SourceLibrary::new();
    library.add_document("scan-a.tif", 3);
    library.add_document("scan-b.tif", 2);
    library
}

/// Decoded entries as (source, page number, deleted); boundaries as `None`.
fn describe(decoded: Vec<(Option<Page>, bool)>) -> Vec<Option<(String, u32, bool)>> {
    decoded
        .into_iter()
        .map(|(page, deleted)| {
            page.map(|p| (p.source_document().to_string(), p.source_page_number(), deleted))
        })
        .collect()
}

#[test]
fn test_round_trip_with_boundaries() {
    let library = create_library();
    let mut pages = library.pages("scan-a.tif", PageRequest::All);
    pages.extend(library.pages("scan-b.tif", PageRequest::All));
    let flags = [false, true, false, false, true];

    let unit = ClipboardTransferUnit::encode(
        pages.iter().zip(flags.iter().copied()),
        &BTreeSet::from([0, 3, 5]),
    );
    let decoded = describe(unit.decode_with(&library).collect());

    assert_eq!(
        decoded,
        vec![
            None,
            Some(("scan-a.tif".to_string(), 1, false)),
            Some(("scan-a.tif".to_string(), 2, true)),
            Some(("scan-a.tif".to_string(), 3, false)),
            None,
            Some(("scan-b.tif".to_string(), 1, false)),
            Some(("scan-b.tif".to_string(), 2, true)),
            None,
        ]
    );
}

#[test]
fn test_round_trip_re_encodes_equal() {
    let library = create_library();
    let pages = library.pages("scan-b.tif", PageRequest::All);
    let unit = ClipboardTransferUnit::encode(
        pages.iter().map(|p| (p, true)),
        &BTreeSet::from([1]),
    );

    let decoded: Vec<_> = unit.decode_with(&library).collect();
    let mut again = Vec::new();
    for (page, deleted) in &decoded {
        match page {
            Some(page) => again.push(ClipboardEntry::page(
                page.source_document(),
                page.source_page_number(),
                *deleted,
            )),
            None => again.push(ClipboardEntry::DocumentBoundary),
        }
    }
    assert_eq!(ClipboardTransferUnit::from_entries(again), unit);
}

#[test]
fn test_truncates_at_missing_source() {
    let library = create_library();
    let unit = ClipboardTransferUnit::from_entries(vec![
        ClipboardEntry::page("scan-a.tif", 1, false),
        ClipboardEntry::page("scan-a.tif", 2, false),
        ClipboardEntry::page("missing", 1, false),
        ClipboardEntry::page("scan-b.tif", 1, false),
        ClipboardEntry::page("scan-b.tif", 2, false),
    ]);

    let decoded = describe(unit.decode_with(&library).collect());
    assert_eq!(decoded.len(), 2);
    assert_eq!(decoded[1], Some(("scan-a.tif".to_string(), 2, false)));
}

#[test]
fn test_truncates_after_source_removed() {
    let mut library = create_library();
    let pages = library.pages("scan-a.tif", PageRequest::All);
    let doc = OutputDocument::with_pages("out.tif", pages);
    let unit = ClipboardTransferUnit::from_documents([&doc]);

    library.add_document("scan-a.tif", 1);
    let decoded = describe(unit.decode_with(&library).collect());
    assert_eq!(decoded, vec![None, Some(("scan-a.tif".to_string(), 1, false))]);

    library.remove_document("scan-a.tif");
    assert_eq!(unit.decode_with(&library).count(), 1);
}

#[test]
fn test_decoded_pages_are_new_instances() {
    let library = create_library();
    let original = library.resolve("scan-a.tif", 2).unwrap();
    let unit = ClipboardTransferUnit::encode([(&original, false)], &BTreeSet::new());

    let (page, _) = unit.decode_with(&library).next().unwrap();
    let page = page.unwrap();
    assert!(page.same_source(&original));
    assert_ne!(page.instance_id(), original.instance_id());
}

#[test]
fn test_clipboard_text_round_trip() {
    let library = create_library();
    let pages = library.pages("scan-b.tif", PageRequest::All);
    let unit = ClipboardTransferUnit::encode(pages.iter().map(|p| (p, false)), &BTreeSet::from([2]));

    let text = unit.to_clipboard_text().unwrap();
    assert!(text.contains("pagination/pages+json"));
    assert_eq!(ClipboardTransferUnit::from_clipboard_text(&text).unwrap(), unit);
}

#[test]
fn test_rejects_foreign_clipboard_text() {
    assert!(ClipboardTransferUnit::from_clipboard_text("hello").is_err());
    assert!(ClipboardTransferUnit::from_clipboard_text(
        r#"{"format":"text/plain","version":1,"entries":[]}"#
    )
    .is_err());
}
