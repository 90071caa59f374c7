//! # pagination
//!
//! Building output documents from pages of scanned source documents.
//!
//! Output documents are ordered lists of references to source pages. Every
//! edit marks the document's status pending and hands a snapshot to a
//! background worker, which validates it through a [`StatusBackend`] and
//! publishes the result. Pages travel between documents through a
//! clipboard codec, and every output document gets a unique name.
//!
//! ## Quick Start
//!
//! ```
//! use pagination::{PageRulesBackend, PaginationSession, SessionOptions, SourceLibrary};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! fn main() -> pagination::Result<()> {
//!     let mut library = SourceLibrary::new();
//!     library.add_document("ORD-1042.tif", 3);
//!
//!     let mut session = PaginationSession::new(
//!         Arc::new(library),
//!         Arc::new(PageRulesBackend::new()),
//!         SessionOptions::default(),
//!     );
//!     let doc = session.open_source("ORD-1042.tif")?;
//!     session.remove_page(doc, 2)?;
//!
//!     session.wait_idle(Duration::from_secs(5));
//!     let status = session.document(doc)?.status();
//!     println!("{}", status.status().map(|s| s.summary()).unwrap_or("pending"));
//!
//!     session.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Unique names**: `doc.tif`, `doc (2).tif`, ... never reused in a session
//! - **Clipboard transfer**: pages and document boundaries as JSON text
//! - **Background status**: one worker per document, stale results discarded
//! - **Bounded shutdown**: workers drain cooperatively or are abandoned after a timeout

pub mod clipboard;
pub mod error;
pub mod manifest;
pub mod model;
pub mod naming;
pub mod options;
pub mod provider;
pub mod session;
pub mod status;

// Re-export commonly used types
pub use clipboard::{ClipboardEntry, ClipboardTransferUnit, CLIPBOARD_FORMAT};
pub use error::{ComputeError, Error, Result};
pub use manifest::{DocumentSpec, PageSpec, SessionManifest, SourceSpec};
pub use model::{
    DocumentData, DocumentEvent, DocumentId, DocumentStatus, IdentifierEntry, OutputDocument,
    Page, Rotation, SourcePage, StatusState,
};
pub use naming::{GrowOnlySet, NameAllocator};
pub use options::{OptionOverrides, SessionOptions};
pub use provider::{PageProvider, PageRequest, SourceLibrary};
pub use session::{PaginationSession, PasteResult};
pub use status::{
    CoordinatorState, PageRulesBackend, StatusBackend, StatusScheduler, StopToken, ThreadManager,
    WorkerGuard,
};

use std::path::Path;
use std::sync::Arc;

/// Load a manifest file and build its session with the page rules backend.
///
/// # Example
///
/// ```no_run
/// use pagination::open_manifest;
///
/// let (mut session, ids) = open_manifest("session.json").unwrap();
/// println!("Documents: {}", ids.len());
/// session.shutdown();
/// ```
pub fn open_manifest<P: AsRef<Path>>(path: P) -> Result<(PaginationSession, Vec<DocumentId>)> {
    open_manifest_with_backend(path, Arc::new(PageRulesBackend::new()))
}

/// Load a manifest file and build its session with a custom backend.
pub fn open_manifest_with_backend<P: AsRef<Path>>(
    path: P,
    backend: Arc<dyn StatusBackend>,
) -> Result<(PaginationSession, Vec<DocumentId>)> {
    SessionManifest::from_path(path)?.build_session(backend)
}

/// Allocate unique names for `candidates`, avoiding `existing`.
///
/// # Example
///
/// ```
/// use pagination::allocate_names;
///
/// let names = allocate_names(["scan.tif", "scan.tif"], ["scan.tif"]);
/// assert_eq!(names, vec!["scan (2).tif", "scan (3).tif"]);
/// ```
pub fn allocate_names<I, E, S, T>(candidates: I, existing: E) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
    E: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    let mut names = NameAllocator::new();
    names.claim_existing(existing);
    candidates
        .into_iter()
        .map(|candidate| names.allocate(candidate.as_ref()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_names() {
        let names = allocate_names(["a.tif", "A.TIF", "b"], Vec::<String>::new());
        assert_eq!(names, vec!["a.tif", "A (2).TIF", "b"]);
    }

    #[test]
    fn test_open_manifest_missing_file() {
        let result = open_manifest("/nonexistent/session.json");
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
