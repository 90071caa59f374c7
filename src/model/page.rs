//! Page-level types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_PAGE_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// Identity of one page of one source document.
///
/// Two [`Page`] instances refer to the same underlying source page iff their
/// `SourcePage` values are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourcePage {
    document: Arc<str>,
    number: u32,
}

impl SourcePage {
    /// Create a source page reference (page numbers are 1-indexed).
    pub fn new(document: impl Into<Arc<str>>, number: u32) -> Self {
        Self {
            document: document.into(),
            number,
        }
    }

    /// Name of the source document.
    pub fn document(&self) -> &str {
        &self.document
    }

    /// Page number within the source document (1-indexed).
    pub fn number(&self) -> u32 {
        self.number
    }
}

impl fmt::Display for SourcePage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.document, self.number)
    }
}

/// Page rotation, always clockwise from the source orientation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rotation {
    /// Source orientation
    #[default]
    None,
    /// 90 degrees clockwise
    Cw90,
    /// 180 degrees
    Cw180,
    /// 270 degrees clockwise
    Cw270,
}

impl Rotation {
    /// Rotation in degrees (0, 90, 180, 270).
    pub fn degrees(self) -> u16 {
        match self {
            Rotation::None => 0,
            Rotation::Cw90 => 90,
            Rotation::Cw180 => 180,
            Rotation::Cw270 => 270,
        }
    }

    /// Build a rotation from degrees; any multiple of 90 is accepted.
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        if degrees % 90 != 0 {
            return None;
        }
        Some(match degrees.rem_euclid(360) {
            0 => Rotation::None,
            90 => Rotation::Cw90,
            180 => Rotation::Cw180,
            _ => Rotation::Cw270,
        })
    }

    /// Rotate a further 90 degrees clockwise.
    pub fn clockwise(self) -> Self {
        match self {
            Rotation::None => Rotation::Cw90,
            Rotation::Cw90 => Rotation::Cw180,
            Rotation::Cw180 => Rotation::Cw270,
            Rotation::Cw270 => Rotation::None,
        }
    }

    /// Rotate 90 degrees counter-clockwise.
    pub fn counter_clockwise(self) -> Self {
        match self {
            Rotation::None => Rotation::Cw270,
            Rotation::Cw90 => Rotation::None,
            Rotation::Cw180 => Rotation::Cw90,
            Rotation::Cw270 => Rotation::Cw180,
        }
    }

    /// Check if the page is turned away from its source orientation.
    pub fn is_rotated(self) -> bool {
        self != Rotation::None
    }
}

/// One appearance of a source page inside an output document.
///
/// The source identity never changes. Every appearance is its own instance
/// with its own deleted flag and rotation, so the same source page can sit in
/// several output documents at once. `Page` is deliberately not `Clone`; use
/// [`Page::duplicate`] to create another appearance.
#[derive(Debug)]
pub struct Page {
    source: SourcePage,
    instance: u64,

    /// Page is marked deleted but still shown in its document
    pub deleted: bool,

    /// Page rotation
    pub rotation: Rotation,
}

impl Page {
    /// Create a fresh appearance of a source page.
    pub fn new(source: SourcePage) -> Self {
        Self {
            source,
            instance: NEXT_PAGE_INSTANCE.fetch_add(1, Ordering::Relaxed),
            deleted: false,
            rotation: Rotation::None,
        }
    }

    /// Shorthand for `Page::new(SourcePage::new(document, number))`.
    pub fn from_source(document: impl Into<Arc<str>>, number: u32) -> Self {
        Self::new(SourcePage::new(document, number))
    }

    /// The immutable source identity.
    pub fn source(&self) -> &SourcePage {
        &self.source
    }

    /// Name of the source document.
    pub fn source_document(&self) -> &str {
        self.source.document()
    }

    /// Page number within the source document (1-indexed).
    pub fn source_page_number(&self) -> u32 {
        self.source.number()
    }

    /// Identifier of this appearance, unique within the process.
    pub fn instance_id(&self) -> u64 {
        self.instance
    }

    /// Check if both pages come from the same source page.
    pub fn same_source(&self, other: &Page) -> bool {
        self.source == other.source
    }

    /// Create a new appearance of the same source page with the same state.
    pub fn duplicate(&self) -> Self {
        Self {
            deleted: self.deleted,
            rotation: self.rotation,
            ..Self::new(self.source.clone())
        }
    }

    /// Capture the page state for a background computation.
    pub fn snapshot(&self) -> PageSnapshot {
        PageSnapshot {
            source_document: self.source.document().to_string(),
            page_number: self.source.number(),
            deleted: self.deleted,
            rotation: self.rotation,
        }
    }
}

/// Plain-data copy of a [`Page`] handed to status computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSnapshot {
    /// Name of the source document
    pub source_document: String,

    /// Page number within the source document (1-indexed)
    pub page_number: u32,

    /// Deleted flag at snapshot time
    pub deleted: bool,

    /// Rotation at snapshot time
    pub rotation: Rotation,
}
