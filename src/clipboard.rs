//! Clipboard transfer of pages across output documents.
//!
//! A [`ClipboardTransferUnit`] records pages by source identity, never by
//! instance, so units built in different sessions compare equal whenever they
//! describe the same pages and document groupings.
//!
//! # Example
//!
//! ```
//! use pagination::clipboard::ClipboardTransferUnit;
//! use pagination::provider::{PageProvider, SourceLibrary};
//! use std::collections::BTreeSet;
//!
//! let mut library = SourceLibrary::new();
//! library.add_document("scan.tif", 2);
//!
//! let pages = library.pages("scan.tif", pagination::provider::PageRequest::All);
//! let unit = ClipboardTransferUnit::encode(
//!     pages.iter().map(|p| (p, p.deleted)),
//!     &BTreeSet::from([1]),
//! );
//!
//! let pasted: Vec<_> = unit.decode(|doc, n| library.resolve(doc, n)).collect();
//! assert_eq!(pasted.len(), 3); // page, boundary, page
//! ```

use crate::error::{Error, Result};
use crate::model::{OutputDocument, Page};
use crate::provider::PageProvider;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::iter::FusedIterator;
use std::slice;

/// Format marker written into clipboard text.
pub const CLIPBOARD_FORMAT: &str = "pagination/pages+json";

const CLIPBOARD_VERSION: u32 = 1;

/// One entry of a transfer unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClipboardEntry {
    /// A new output document starts here
    DocumentBoundary,

    /// A page, by source identity
    Page {
        /// Source document name
        source_document: String,
        /// Page number within the source (1-indexed)
        page_number: u32,
        /// Deleted flag of the copied page
        deleted: bool,
    },
}

impl ClipboardEntry {
    /// Build a page entry.
    pub fn page(source_document: impl Into<String>, page_number: u32, deleted: bool) -> Self {
        ClipboardEntry::Page {
            source_document: source_document.into(),
            page_number,
            deleted,
        }
    }

    /// Check if this entry is a document boundary.
    pub fn is_boundary(&self) -> bool {
        matches!(self, ClipboardEntry::DocumentBoundary)
    }
}

/// Ordered pages and document boundaries placed on the clipboard.
///
/// Equality and hashing are entry-wise and order-sensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClipboardTransferUnit {
    entries: Vec<ClipboardEntry>,
}

#[derive(Serialize, Deserialize)]
struct ClipboardEnvelope {
    format: String,
    version: u32,
    entries: Vec<ClipboardEntry>,
}

impl ClipboardTransferUnit {
    /// Wrap raw entries.
    pub fn from_entries(entries: Vec<ClipboardEntry>) -> Self {
        Self { entries }
    }

    /// Encode pages with their deleted flags.
    ///
    /// A boundary is emitted before the page at each position in
    /// `boundaries`; position `n` (the page count) puts one at the end.
    /// Positions past the end are ignored.
    pub fn encode<'a, I>(pages: I, boundaries: &BTreeSet<usize>) -> Self
    where
        I: IntoIterator<Item = (&'a Page, bool)>,
    {
        let mut entries = Vec::new();
        let mut count = 0;
        for (index, (page, deleted)) in pages.into_iter().enumerate() {
            if boundaries.contains(&index) {
                entries.push(ClipboardEntry::DocumentBoundary);
            }
            entries.push(ClipboardEntry::page(
                page.source_document(),
                page.source_page_number(),
                deleted,
            ));
            count = index + 1;
        }
        if boundaries.contains(&count) {
            entries.push(ClipboardEntry::DocumentBoundary);
        }
        Self { entries }
    }

    /// Encode whole documents; each one starts with a boundary so it pastes
    /// as a document of its own.
    pub fn from_documents<'a, I>(documents: I) -> Self
    where
        I: IntoIterator<Item = &'a OutputDocument>,
    {
        let mut entries = Vec::new();
        for doc in documents {
            entries.push(ClipboardEntry::DocumentBoundary);
            entries.extend(doc.pages().iter().map(|page| {
                ClipboardEntry::page(
                    page.source_document(),
                    page.source_page_number(),
                    page.deleted,
                )
            }));
        }
        Self { entries }
    }

    /// Decode lazily, resolving each page entry through `resolver`.
    ///
    /// Boundaries yield `(None, false)`. The first page that cannot be
    /// resolved ends the sequence: later entries are dropped silently.
    pub fn decode<R>(&self, resolver: R) -> ClipboardDecoder<'_, R>
    where
        R: FnMut(&str, u32) -> Option<Page>,
    {
        ClipboardDecoder {
            entries: self.entries.iter(),
            resolver,
            done: false,
        }
    }

    /// Decode against a [`PageProvider`].
    pub fn decode_with<'a, P>(
        &'a self,
        provider: &'a P,
    ) -> ClipboardDecoder<'a, impl FnMut(&str, u32) -> Option<Page> + 'a>
    where
        P: PageProvider + ?Sized,
    {
        self.decode(move |doc, n| provider.resolve(doc, n))
    }

    /// All entries in order.
    pub fn entries(&self) -> &[ClipboardEntry] {
        &self.entries
    }

    /// Number of entries, boundaries included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the unit carries nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of page entries.
    pub fn page_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_boundary()).count()
    }

    /// Entries split at boundaries. The first group holds the pages before
    /// the first boundary and may be empty.
    pub fn groups(&self) -> Vec<&[ClipboardEntry]> {
        self.entries.split(ClipboardEntry::is_boundary).collect()
    }

    /// Serialize to clipboard text.
    pub fn to_clipboard_text(&self) -> Result<String> {
        let envelope = ClipboardEnvelope {
            format: CLIPBOARD_FORMAT.to_string(),
            version: CLIPBOARD_VERSION,
            entries: self.entries.clone(),
        };
        Ok(serde_json::to_string(&envelope)?)
    }

    /// Parse clipboard text written by [`to_clipboard_text`](Self::to_clipboard_text).
    pub fn from_clipboard_text(text: &str) -> Result<Self> {
        let envelope: ClipboardEnvelope = serde_json::from_str(text)
            .map_err(|e| Error::ClipboardFormat(format!("not a page transfer: {}", e)))?;
        if envelope.format != CLIPBOARD_FORMAT {
            return Err(Error::ClipboardFormat(format!(
                "unexpected format {:?}",
                envelope.format
            )));
        }
        if envelope.version > CLIPBOARD_VERSION {
            return Err(Error::ClipboardFormat(format!(
                "unsupported version {}",
                envelope.version
            )));
        }
        Ok(Self {
            entries: envelope.entries,
        })
    }
}

/// Lazy decoder returned by [`ClipboardTransferUnit::decode`].
pub struct ClipboardDecoder<'a, R> {
    entries: slice::Iter<'a, ClipboardEntry>,
    resolver: R,
    done: bool,
}

impl<R> Iterator for ClipboardDecoder<'_, R>
where
    R: FnMut(&str, u32) -> Option<Page>,
{
    type Item = (Option<Page>, bool);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = match self.entries.next() {
            None => None,
            Some(ClipboardEntry::DocumentBoundary) => Some((None, false)),
            Some(ClipboardEntry::Page {
                source_document,
                page_number,
                deleted,
            }) => match (self.resolver)(source_document.as_str(), *page_number) {
                Some(page) => Some((Some(page), *deleted)),
                None => {
                    log::debug!(
                        "clipboard page {}:{} no longer resolves; dropping the rest of the paste",
                        source_document,
                        page_number
                    );
                    None
                }
            },
        };
        if item.is_none() {
            self.done = true;
        }
        item
    }
}

impl<R> FusedIterator for ClipboardDecoder<'_, R> where R: FnMut(&str, u32) -> Option<Page> {}
