//! Data model for paginated output documents.
//!
//! Pages reference a page of a source document and carry per-appearance
//! state. Output documents order those pages and own a status slot that
//! background workers fill in.

mod document;
mod events;
mod page;
mod status;

pub use document::{DocumentData, DocumentId, OutputDocument};
pub use events::{ChangeNotifier, DocumentEvent, SubscriptionId};
pub use page::{Page, PageSnapshot, Rotation, SourcePage};
pub use status::{
    DocumentStatus, IdentifierEntry, StatusBuilder, StatusPayload, StatusSlot, StatusState,
};
