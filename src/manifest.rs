//! JSON session manifests.
//!
//! A manifest lists the known source documents, the output documents to
//! build from their pages and optional session settings:
//!
//! ```json
//! {
//!   "sources": [{ "name": "ORD-12.tif", "pages": 3 }],
//!   "documents": [
//!     { "name": "out.tif", "pages": ["ORD-12.tif:1", { "source": "ORD-12.tif", "page": 3, "rotation": 90 }] }
//!   ],
//!   "options": { "stop_timeout_ms": 2000 }
//! }
//! ```

use crate::error::{Error, Result};
use crate::model::{DocumentId, Page, Rotation};
use crate::options::{OptionOverrides, SessionOptions};
use crate::provider::{PageProvider, SourceLibrary};
use crate::session::PaginationSession;
use crate::status::StatusBackend;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// A source document and its page count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    /// Source document name
    pub name: String,
    /// Number of pages
    pub pages: u32,
}

/// One page of an output document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageSpec {
    /// `"source:page"`
    Short(String),
    /// Page with flags
    Full {
        /// Source document name
        source: String,
        /// Page number in the source (1-indexed)
        page: u32,
        /// Marked deleted
        #[serde(default)]
        deleted: bool,
        /// Clockwise rotation in degrees
        #[serde(default)]
        rotation: i32,
    },
}

impl PageSpec {
    fn resolve(&self, provider: &dyn PageProvider) -> Result<Page> {
        let (source, number, deleted, degrees) = match self {
            PageSpec::Short(text) => {
                let (source, number) = text
                    .rsplit_once(':')
                    .ok_or_else(|| Error::Manifest(format!("expected \"source:page\", got {:?}", text)))?;
                let number = number
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| Error::Manifest(format!("invalid page number in {:?}", text)))?;
                (source, number, false, 0)
            }
            PageSpec::Full {
                source,
                page,
                deleted,
                rotation,
            } => (source.as_str(), *page, *deleted, *rotation),
        };

        let rotation = Rotation::from_degrees(degrees)
            .ok_or_else(|| Error::Manifest(format!("unsupported rotation {}", degrees)))?;
        let mut page = provider.resolve(source, number).ok_or_else(|| {
            Error::Manifest(format!("page {} of {:?} is not in the sources", number, source))
        })?;
        page.deleted = deleted;
        page.rotation = rotation;
        Ok(page)
    }
}

/// An output document to build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSpec {
    /// Candidate name; collisions get a numeric suffix
    pub name: String,
    /// Pages in output order
    #[serde(default)]
    pub pages: Vec<PageSpec>,
}

/// Parsed session manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionManifest {
    /// Known source documents
    pub sources: Vec<SourceSpec>,
    /// Output documents
    pub documents: Vec<DocumentSpec>,
    /// Session settings
    pub options: OptionOverrides,
}

impl SessionManifest {
    /// Read a manifest file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        text.parse()
    }

    /// Source library described by the manifest.
    pub fn library(&self) -> SourceLibrary {
        let mut library = SourceLibrary::new();
        for source in &self.sources {
            library.add_document(source.name.as_str(), source.pages);
        }
        library
    }

    /// Session options with the manifest's overrides applied.
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions::default().merge(&self.options)
    }

    /// Build a session holding the manifest's documents.
    ///
    /// Every document with pages gets a status computation requested. The
    /// returned ids follow manifest order.
    pub fn build_session(
        &self,
        backend: Arc<dyn StatusBackend>,
    ) -> Result<(PaginationSession, Vec<DocumentId>)> {
        let library = Arc::new(self.library());

        let mut documents = Vec::with_capacity(self.documents.len());
        for spec in &self.documents {
            let pages = spec
                .pages
                .iter()
                .map(|page| page.resolve(library.as_ref()))
                .collect::<Result<Vec<_>>>()?;
            documents.push((spec.name.as_str(), pages));
        }

        let mut session = PaginationSession::new(library, backend, self.session_options());
        let ids = documents
            .into_iter()
            .map(|(name, pages)| session.create_document_with(name, pages))
            .collect();
        log::debug!(
            "built session with {} source(s) and {} document(s)",
            self.sources.len(),
            self.documents.len()
        );
        Ok((session, ids))
    }
}

impl FromStr for SessionManifest {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Manifest(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::PageRulesBackend;
    use std::io::Write;
    use std::time::Duration;

    const MANIFEST: &str = r#"{
        "sources": [
            { "name": "ORD-12.tif", "pages": 3 },
            { "name": "scan:2024.tif", "pages": 1 }
        ],
        "documents": [
            { "name": "out.tif", "pages": ["ORD-12.tif:1", { "source": "ORD-12.tif", "page": 3, "rotation": 90, "deleted": true }] },
            { "name": "out.tif", "pages": ["scan:2024.tif:1"] },
            { "name": "empty.tif" }
        ],
        "options": { "stop_timeout_ms": 2000 }
    }"#;

    #[test]
    fn test_parse_manifest() {
        let manifest: SessionManifest = MANIFEST.parse().unwrap();
        assert_eq!(manifest.sources.len(), 2);
        assert_eq!(manifest.documents[0].pages.len(), 2);
        assert!(manifest.documents[2].pages.is_empty());
        assert_eq!(
            manifest.session_options().stop_timeout,
            Duration::from_millis(2000)
        );
    }

    #[test]
    fn test_build_session() {
        let manifest: SessionManifest = MANIFEST.parse().unwrap();
        let (mut session, ids) = manifest
            .build_session(Arc::new(PageRulesBackend::new()))
            .unwrap();

        assert_eq!(ids.len(), 3);
        let first = session.document(ids[0]).unwrap();
        assert_eq!(first.page(1).unwrap().rotation, Rotation::Cw90);
        assert!(first.page(1).unwrap().deleted);
        assert_eq!(session.document(ids[1]).unwrap().name(), "out (2).tif");
        assert_eq!(
            session.document(ids[1]).unwrap().page(0).unwrap().source_document(),
            "scan:2024.tif"
        );

        assert!(session.wait_idle(Duration::from_secs(5)));
        assert!(session.document(ids[0]).unwrap().status().status().is_some());
        assert!(session.shutdown());
    }

    #[test]
    fn test_unknown_page_is_manifest_error() {
        let manifest: SessionManifest = r#"{
            "sources": [{ "name": "a.tif", "pages": 1 }],
            "documents": [{ "name": "out.tif", "pages": ["a.tif:2"] }]
        }"#
        .parse()
        .unwrap();
        let err = manifest
            .build_session(Arc::new(PageRulesBackend::new()))
            .err()
            .unwrap();
        assert!(matches!(err, Error::Manifest(_)));
    }

    #[test]
    fn test_bad_rotation_and_short_form() {
        let library = {
            let mut library = SourceLibrary::new();
            library.add_document("a.tif", 1);
            library
        };
        let bad_rotation = PageSpec::Full {
            source: "a.tif".to_string(),
            page: 1,
            deleted: false,
            rotation: 45,
        };
        assert!(matches!(bad_rotation.resolve(&library), Err(Error::Manifest(_))));
        assert!(matches!(
            PageSpec::Short("a.tif".to_string()).resolve(&library),
            Err(Error::Manifest(_))
        ));
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MANIFEST.as_bytes()).unwrap();
        let manifest = SessionManifest::from_path(file.path()).unwrap();
        assert_eq!(manifest.documents.len(), 3);

        assert!(matches!(
            SessionManifest::from_path(file.path().with_extension("missing")),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            "{ not json".parse::<SessionManifest>(),
            Err(Error::Manifest(_))
        ));
    }
}
