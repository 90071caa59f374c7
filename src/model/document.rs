//! Output document types.

use super::events::{ChangeNotifier, DocumentEvent, SubscriptionId};
use super::page::{Page, PageSnapshot, Rotation};
use super::status::{StatusSlot, StatusState};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_DOCUMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of an output document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(u64);

impl DocumentId {
    fn next() -> Self {
        Self(NEXT_DOCUMENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc#{}", self.0)
    }
}

/// An ordered group of pages that will become one output file.
///
/// Index 0 is page 1 of the output. Every edit marks the status pending and
/// notifies subscribers. Edits are controller-thread only: the type is not
/// `Sync`-shared anywhere, and background workers receive a
/// [`DocumentData`] snapshot instead of the document itself.
#[derive(Debug)]
pub struct OutputDocument {
    id: DocumentId,
    name: String,
    pages: Vec<Page>,
    modified: bool,
    status: Arc<StatusSlot>,
    notifier: ChangeNotifier<DocumentEvent>,
}

impl OutputDocument {
    /// Create an empty output document.
    ///
    /// The name should come from a [`NameAllocator`](crate::naming::NameAllocator).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: DocumentId::next(),
            name: name.into(),
            pages: Vec::new(),
            modified: false,
            status: Arc::new(StatusSlot::new()),
            notifier: ChangeNotifier::new(),
        }
    }

    /// Create a document holding `pages` in order.
    pub fn with_pages(name: impl Into<String>, pages: Vec<Page>) -> Self {
        let mut doc = Self::new(name);
        doc.pages = pages;
        doc
    }

    /// Document id.
    pub fn id(&self) -> DocumentId {
        self.id
    }

    /// Output name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pages in output order.
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Get a page by index (0-indexed).
    pub fn page(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)
    }

    /// Number of pages.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Check if the document has no pages.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Whether the document was edited since it was created or last saved.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Append a page.
    pub fn add_page(&mut self, page: Page) {
        self.pages.push(page);
        self.data_changed();
    }

    /// Insert a page before `index`; `index == page_count()` appends.
    pub fn insert_page(&mut self, page: Page, index: usize) -> Result<()> {
        if index > self.pages.len() {
            return Err(Error::PageOutOfRange(index, self.pages.len()));
        }
        self.pages.insert(index, page);
        self.data_changed();
        Ok(())
    }

    /// Remove and return the page at `index`.
    pub fn remove_page(&mut self, index: usize) -> Result<Page> {
        if index >= self.pages.len() {
            return Err(Error::PageOutOfRange(index, self.pages.len()));
        }
        let page = self.pages.remove(index);
        self.data_changed();
        Ok(page)
    }

    /// Move the page at `from` so that it ends up at `to`.
    pub fn move_page(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.pages.len();
        if from >= len {
            return Err(Error::PageOutOfRange(from, len));
        }
        if to >= len {
            return Err(Error::PageOutOfRange(to, len));
        }
        if from != to {
            let page = self.pages.remove(from);
            self.pages.insert(to, page);
            self.data_changed();
        }
        Ok(())
    }

    /// Set the deleted flag of a page.
    pub fn set_deleted(&mut self, index: usize, deleted: bool) -> Result<()> {
        let len = self.pages.len();
        let page = self
            .pages
            .get_mut(index)
            .ok_or(Error::PageOutOfRange(index, len))?;
        if page.deleted != deleted {
            page.deleted = deleted;
            self.data_changed();
        }
        Ok(())
    }

    /// Set the rotation of a page.
    pub fn set_rotation(&mut self, index: usize, rotation: Rotation) -> Result<()> {
        let len = self.pages.len();
        let page = self
            .pages
            .get_mut(index)
            .ok_or(Error::PageOutOfRange(index, len))?;
        if page.rotation != rotation {
            page.rotation = rotation;
            self.data_changed();
        }
        Ok(())
    }

    /// Clear the modified flag, e.g. after the document was written out.
    pub fn mark_saved(&mut self) {
        self.set_modified(false);
    }

    /// Current status state.
    pub fn status(&self) -> StatusState {
        self.status.state()
    }

    /// Shared status slot, written by background workers.
    pub fn status_slot(&self) -> &Arc<StatusSlot> {
        &self.status
    }

    /// Capture the document for a background computation.
    pub fn snapshot(&self) -> DocumentData {
        DocumentData {
            id: self.id,
            name: self.name.clone(),
            pages: self.pages.iter().map(Page::snapshot).collect(),
        }
    }

    /// Register a change callback.
    pub fn subscribe(
        &mut self,
        callback: impl FnMut(&DocumentEvent) + Send + 'static,
    ) -> SubscriptionId {
        self.notifier.subscribe(callback)
    }

    /// Remove a change callback.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }

    pub(crate) fn notify_status_updated(&mut self) {
        self.notifier.notify(&DocumentEvent::StatusUpdated);
    }

    fn data_changed(&mut self) {
        self.status.invalidate();
        self.set_modified(true);
        let page_count = self.pages.len();
        self.notifier
            .notify(&DocumentEvent::DataChanged { page_count });
    }

    fn set_modified(&mut self, modified: bool) {
        if self.modified != modified {
            self.modified = modified;
            self.notifier
                .notify(&DocumentEvent::ModifiedChanged { modified });
        }
    }
}

/// Snapshot of an output document taken on the controller thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentData {
    /// Document the snapshot was taken from
    pub id: DocumentId,

    /// Output name at snapshot time
    pub name: String,

    /// Pages in output order
    pub pages: Vec<PageSnapshot>,
}

impl DocumentData {
    /// Number of pages not marked deleted.
    pub fn live_page_count(&self) -> usize {
        self.pages.iter().filter(|p| !p.deleted).count()
    }
}
