//! Pagination session: output documents, naming, clipboard and status workers.
//!
//! The session is owned by the controller thread. Every edit goes through it
//! so the edited document's status is invalidated and a worker is requested
//! for it. Workers never touch the session; their results arrive through
//! [`PaginationSession::pump`].

use crate::clipboard::ClipboardTransferUnit;
use crate::error::{Error, Result};
use crate::model::{DocumentId, OutputDocument, Page, Rotation};
use crate::naming::NameAllocator;
use crate::options::SessionOptions;
use crate::provider::{PageProvider, PageRequest};
use crate::status::{ScheduleOutcome, StatusBackend, StatusEvent, StatusScheduler, ThreadManager};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

/// Pages applied by [`PaginationSession::paste`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PasteResult {
    /// Pages placed, across the target and new documents
    pub pages: usize,

    /// Pages inserted into the target document
    pub inserted: usize,

    /// Documents created for groups after a boundary
    pub created: Vec<DocumentId>,
}

impl PasteResult {
    /// Check if nothing was pasted.
    pub fn is_empty(&self) -> bool {
        self.pages == 0
    }
}

/// A set of output documents under construction.
pub struct PaginationSession {
    options: SessionOptions,
    provider: Arc<dyn PageProvider>,
    names: NameAllocator,
    documents: Vec<OutputDocument>,
    scheduler: StatusScheduler,
    shut_down: bool,
}

impl PaginationSession {
    /// Create an empty session.
    pub fn new(
        provider: Arc<dyn PageProvider>,
        backend: Arc<dyn StatusBackend>,
        options: SessionOptions,
    ) -> Self {
        Self {
            names: options.name_allocator(),
            options,
            provider,
            documents: Vec::new(),
            scheduler: StatusScheduler::new(backend),
            shut_down: false,
        }
    }

    /// Session options.
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Output name allocator.
    pub fn names(&self) -> &NameAllocator {
        &self.names
    }

    /// Mutable access to the name allocator, e.g. to claim names on disk.
    pub fn names_mut(&mut self) -> &mut NameAllocator {
        &mut self.names
    }

    /// Worker coordinator.
    pub fn manager(&self) -> &ThreadManager {
        self.scheduler.manager()
    }

    /// Documents in creation order.
    pub fn documents(&self) -> &[OutputDocument] {
        &self.documents
    }

    /// Look up a document.
    pub fn document(&self, id: DocumentId) -> Result<&OutputDocument> {
        self.documents
            .iter()
            .find(|doc| doc.id() == id)
            .ok_or_else(|| Error::DocumentNotFound(id.to_string()))
    }

    fn document_mut(&mut self, id: DocumentId) -> Result<&mut OutputDocument> {
        self.documents
            .iter_mut()
            .find(|doc| doc.id() == id)
            .ok_or_else(|| Error::DocumentNotFound(id.to_string()))
    }

    /// Create an empty document with a unique name derived from `candidate`.
    pub fn create_document(&mut self, candidate: &str) -> DocumentId {
        let name = self.names.allocate(candidate);
        let doc = OutputDocument::new(name);
        let id = doc.id();
        self.documents.push(doc);
        id
    }

    /// Create a document holding `pages` and request its status.
    pub fn create_document_with(&mut self, candidate: &str, pages: Vec<Page>) -> DocumentId {
        let name = self.names.allocate(candidate);
        let doc = OutputDocument::with_pages(name, pages);
        let id = doc.id();
        if !doc.is_empty() {
            doc.status_slot().invalidate();
            if !self.shut_down {
                self.scheduler.request(&doc);
            }
        }
        self.documents.push(doc);
        id
    }

    /// Create a document from every page of a source document.
    pub fn open_source(&mut self, source: &str) -> Result<DocumentId> {
        let pages = self.provider.pages(source, PageRequest::All);
        if pages.is_empty() {
            return Err(Error::UnknownSource(source.to_string()));
        }
        Ok(self.create_document_with(source, pages))
    }

    /// Remove a document. Its name stays claimed.
    pub fn remove_document(&mut self, id: DocumentId) -> Result<OutputDocument> {
        let index = self
            .documents
            .iter()
            .position(|doc| doc.id() == id)
            .ok_or_else(|| Error::DocumentNotFound(id.to_string()))?;
        Ok(self.documents.remove(index))
    }

    /// Apply `edit` to a document and request its status if it changed.
    pub fn edit<T>(
        &mut self,
        id: DocumentId,
        edit: impl FnOnce(&mut OutputDocument) -> Result<T>,
    ) -> Result<T> {
        let doc = self
            .documents
            .iter_mut()
            .find(|doc| doc.id() == id)
            .ok_or_else(|| Error::DocumentNotFound(id.to_string()))?;
        let before = doc.status_slot().revision();
        let value = edit(doc)?;
        if doc.status_slot().revision() != before && !self.shut_down {
            self.scheduler.request(doc);
        }
        Ok(value)
    }

    /// Append a page to a document.
    pub fn add_page(&mut self, id: DocumentId, page: Page) -> Result<()> {
        self.edit(id, |doc| {
            doc.add_page(page);
            Ok(())
        })
    }

    /// Insert a page into a document before `index`.
    pub fn insert_page(&mut self, id: DocumentId, page: Page, index: usize) -> Result<()> {
        self.edit(id, |doc| doc.insert_page(page, index))
    }

    /// Remove a page from a document.
    pub fn remove_page(&mut self, id: DocumentId, index: usize) -> Result<Page> {
        self.edit(id, |doc| doc.remove_page(index))
    }

    /// Set the deleted flag of a page.
    pub fn set_deleted(&mut self, id: DocumentId, index: usize, deleted: bool) -> Result<()> {
        self.edit(id, |doc| doc.set_deleted(index, deleted))
    }

    /// Rotate a page.
    pub fn set_rotation(&mut self, id: DocumentId, index: usize, rotation: Rotation) -> Result<()> {
        self.edit(id, |doc| doc.set_rotation(index, rotation))
    }

    /// Copy whole documents, each pasting back as its own document.
    pub fn copy(&self, ids: &[DocumentId]) -> Result<ClipboardTransferUnit> {
        let docs = ids
            .iter()
            .map(|&id| self.document(id))
            .collect::<Result<Vec<_>>>()?;
        Ok(ClipboardTransferUnit::from_documents(docs))
    }

    /// Copy selected pages of one document, without boundaries.
    pub fn copy_pages(&self, id: DocumentId, indices: &[usize]) -> Result<ClipboardTransferUnit> {
        let doc = self.document(id)?;
        let pages = indices
            .iter()
            .map(|&i| {
                doc.page(i)
                    .map(|page| (page, page.deleted))
                    .ok_or(Error::PageOutOfRange(i, doc.page_count()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(ClipboardTransferUnit::encode(pages, &BTreeSet::new()))
    }

    /// Paste a transfer unit.
    ///
    /// Pages before the first boundary go into `target` at the given index
    /// (or into a new document when there is no target). Each boundary starts
    /// a new document named after its first page's source. A page that no
    /// longer resolves ends the paste quietly; what came before it is kept.
    pub fn paste(
        &mut self,
        unit: &ClipboardTransferUnit,
        target: Option<(DocumentId, usize)>,
    ) -> Result<PasteResult> {
        if let Some((id, index)) = target {
            let len = self.document(id)?.page_count();
            if index > len {
                return Err(Error::PageOutOfRange(index, len));
            }
        }

        let mut result = PasteResult::default();
        let mut groups: Vec<Vec<Page>> = vec![Vec::new()];
        for (page, deleted) in unit.decode_with(self.provider.as_ref()) {
            match page {
                Some(mut page) => {
                    page.deleted = deleted;
                    result.pages += 1;
                    if let Some(group) = groups.last_mut() {
                        group.push(page);
                    }
                }
                None => groups.push(Vec::new()),
            }
        }

        let mut groups = groups.into_iter();
        let leading = groups.next().unwrap_or_default();

        match target {
            Some((id, index)) if !leading.is_empty() => {
                result.inserted = leading.len();
                self.edit(id, |doc| {
                    for (offset, page) in leading.into_iter().enumerate() {
                        doc.insert_page(page, index + offset)?;
                    }
                    Ok(())
                })?;
            }
            Some(_) => {}
            None => {
                if let Some(id) = self.create_from_group(leading) {
                    result.created.push(id);
                }
            }
        }
        for group in groups {
            if let Some(id) = self.create_from_group(group) {
                result.created.push(id);
            }
        }

        log::debug!(
            "pasted {} page(s) into target and created {} document(s)",
            result.inserted,
            result.created.len()
        );
        Ok(result)
    }

    fn create_from_group(&mut self, pages: Vec<Page>) -> Option<DocumentId> {
        let candidate = pages.first()?.source_document().to_string();
        Some(self.create_document_with(&candidate, pages))
    }

    /// Ask for a document's status to be recomputed.
    pub fn request_status(&mut self, id: DocumentId) -> Result<ScheduleOutcome> {
        let doc = self
            .documents
            .iter()
            .find(|doc| doc.id() == id)
            .ok_or_else(|| Error::DocumentNotFound(id.to_string()))?;
        doc.status_slot().invalidate();
        if self.shut_down {
            return Ok(ScheduleOutcome::Refused);
        }
        Ok(self.scheduler.request(doc))
    }

    /// Apply finished worker reports and notify document subscribers.
    pub fn pump(&mut self) -> Vec<StatusEvent> {
        let events = self.scheduler.pump();
        self.notify(&events);
        events
    }

    /// Block until every worker finished or `timeout` passed.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let (events, idle) = self.scheduler.wait_idle(timeout);
        self.notify(&events);
        idle
    }

    fn notify(&mut self, events: &[StatusEvent]) {
        for event in events {
            if let StatusEvent::Completed { applied: true, .. } = event {
                if let Ok(doc) = self.document_mut(event.document()) {
                    doc.notify_status_updated();
                }
            }
        }
    }

    /// Number of documents with a running worker.
    pub fn busy_documents(&self) -> usize {
        self.scheduler.in_flight()
    }

    /// Stop every status worker, waiting at most the configured timeout.
    ///
    /// Returns true iff all workers drained in time. A timeout is logged and
    /// the session may still be dropped. Later calls return true at once.
    pub fn shutdown(&mut self) -> bool {
        if self.shut_down {
            return true;
        }
        self.shut_down = true;
        let drained = self.scheduler.shutdown(self.options.stop_timeout);
        let events = self.scheduler.pump();
        self.notify(&events);
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DocumentEvent;
    use crate::provider::SourceLibrary;
    use crate::status::PageRulesBackend;
    use std::sync::Mutex;

    fn session() -> PaginationSession {
        let mut library = SourceLibrary::new();
        library.add_document("scan.tif", 4);
        library.add_document("ORD-5.tif", 2);
        PaginationSession::new(
            Arc::new(library),
            Arc::new(PageRulesBackend::new()),
            SessionOptions::new().with_stop_timeout(Duration::from_secs(2)),
        )
    }

    #[test]
    fn test_open_source_names_and_status() {
        let mut session = session();
        let a = session.open_source("scan.tif").unwrap();
        let b = session.open_source("scan.tif").unwrap();

        assert_eq!(session.document(a).unwrap().name(), "scan.tif");
        assert_eq!(session.document(b).unwrap().name(), "scan (2).tif");
        assert!(session.wait_idle(Duration::from_secs(5)));
        assert!(session.document(a).unwrap().status().status().is_some());
        assert!(session.shutdown());
    }

    #[test]
    fn test_open_unknown_source() {
        let mut session = session();
        assert!(matches!(
            session.open_source("nope.tif"),
            Err(Error::UnknownSource(_))
        ));
    }

    #[test]
    fn test_edit_requests_status_and_notifies() {
        let mut session = session();
        let id = session.create_document("out.tif");
        let updates = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&updates);
        session
            .edit(id, |doc| {
                doc.subscribe(move |e| {
                    if *e == DocumentEvent::StatusUpdated {
                        *sink.lock().unwrap() += 1;
                    }
                });
                Ok(())
            })
            .unwrap();

        session
            .add_page(id, Page::from_source("ORD-5.tif", 1))
            .unwrap();
        assert!(session.wait_idle(Duration::from_secs(5)));
        assert_eq!(*updates.lock().unwrap(), 1);

        let status = session.document(id).unwrap().status();
        assert_eq!(status.status().unwrap().orders()[0].id, "ORD-5");
        session.shutdown();
    }

    #[test]
    fn test_copy_and_paste_documents() {
        let mut session = session();
        let a = session.open_source("scan.tif").unwrap();
        session.set_deleted(a, 1, true).unwrap();
        let b = session.open_source("ORD-5.tif").unwrap();

        let unit = session.copy(&[a, b]).unwrap();
        let result = session.paste(&unit, None).unwrap();

        assert_eq!(result.inserted, 0);
        assert_eq!(result.created.len(), 2);
        let first = session.document(result.created[0]).unwrap();
        assert_eq!(first.name(), "scan (2).tif");
        assert_eq!(first.page_count(), 4);
        assert!(first.page(1).unwrap().deleted);
        assert_eq!(
            session.document(result.created[1]).unwrap().name(),
            "ORD-5 (2).tif"
        );
        session.shutdown();
    }

    #[test]
    fn test_paste_into_target() {
        let mut session = session();
        let a = session.open_source("scan.tif").unwrap();
        let b = session.open_source("ORD-5.tif").unwrap();

        let unit = session.copy_pages(b, &[1, 0]).unwrap();
        let result = session.paste(&unit, Some((a, 1))).unwrap();
        assert_eq!(result.inserted, 2);
        assert!(result.created.is_empty());

        let numbers: Vec<(String, u32)> = session
            .document(a)
            .unwrap()
            .pages()
            .iter()
            .map(|p| (p.source_document().to_string(), p.source_page_number()))
            .collect();
        assert_eq!(numbers[1], ("ORD-5.tif".to_string(), 2));
        assert_eq!(numbers[2], ("ORD-5.tif".to_string(), 1));
        assert_eq!(numbers.len(), 6);
        session.shutdown();
    }

    #[test]
    fn test_paste_target_out_of_range() {
        let mut session = session();
        let a = session.open_source("scan.tif").unwrap();
        let unit = session.copy_pages(a, &[0]).unwrap();
        assert!(matches!(
            session.paste(&unit, Some((a, 9))),
            Err(Error::PageOutOfRange(9, 4))
        ));
        session.shutdown();
    }

    #[test]
    fn test_shutdown_refuses_new_work() {
        let mut session = session();
        let id = session.create_document("out.tif");
        assert!(session.shutdown());
        assert!(session.shutdown());
        session
            .add_page(id, Page::from_source("scan.tif", 1))
            .unwrap();
        assert!(session.document(id).unwrap().status().is_pending());
    }
}
