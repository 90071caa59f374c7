//! Source page lookup.
//!
//! Loading source files and decoding their pages happens elsewhere; this
//! crate only needs to turn `(document, page number)` into fresh [`Page`]
//! instances.

use crate::error::{Error, Result};
use crate::model::{Page, SourcePage};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Which pages of a source document to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRequest {
    /// Every page, in source order
    All,
    /// One page (1-indexed)
    Single(u32),
}

/// Supplies page instances for source documents.
pub trait PageProvider: Send + Sync {
    /// Fetch new page instances. Unknown documents or pages yield nothing.
    fn pages(&self, document: &str, request: PageRequest) -> Vec<Page>;

    /// Resolve one page, or `None` if it no longer exists.
    fn resolve(&self, document: &str, page_number: u32) -> Option<Page> {
        self.pages(document, PageRequest::Single(page_number))
            .into_iter()
            .next()
    }
}

/// In-memory set of known source documents and their page counts.
#[derive(Debug, Clone, Default)]
pub struct SourceLibrary {
    documents: BTreeMap<Arc<str>, u32>,
}

impl SourceLibrary {
    /// Create an empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a source document.
    pub fn add_document(&mut self, name: impl Into<Arc<str>>, page_count: u32) {
        self.documents.insert(name.into(), page_count);
    }

    /// Forget a source document, e.g. after its file went away.
    pub fn remove_document(&mut self, name: &str) -> bool {
        self.documents.remove(name).is_some()
    }

    /// Page count of a known source document.
    pub fn page_count(&self, name: &str) -> Result<u32> {
        self.documents
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownSource(name.to_string()))
    }

    /// Names of the known source documents.
    pub fn document_names(&self) -> impl Iterator<Item = &str> {
        self.documents.keys().map(|name| name.as_ref())
    }
}

impl PageProvider for SourceLibrary {
    fn pages(&self, document: &str, request: PageRequest) -> Vec<Page> {
        let Some((name, &count)) = self.documents.get_key_value(document) else {
            return Vec::new();
        };
        match request {
            PageRequest::All => (1..=count)
                .map(|n| Page::new(SourcePage::new(Arc::clone(name), n)))
                .collect(),
            PageRequest::Single(n) if (1..=count).contains(&n) => {
                vec![Page::new(SourcePage::new(Arc::clone(name), n))]
            }
            PageRequest::Single(_) => Vec::new(),
        }
    }
}
