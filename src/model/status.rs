//! Document validation status and its per-document slot.

use crate::error::{ComputeError, Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// An identifier extracted from a document, with an optional service date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IdentifierEntry {
    /// Identifier text (order number, encounter number, ...)
    pub id: String,

    /// Date associated with the identifier, when known
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

impl IdentifierEntry {
    /// Create an identifier without a date.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            date: None,
        }
    }

    /// Create an identifier with a date.
    pub fn with_date(id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            id: id.into(),
            date: Some(date),
        }
    }
}

/// Outcome carried by a status: computed data, or a captured failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusPayload {
    /// Stringized document data produced by the computation
    Data(String),

    /// Stringized error plus the failure it came from
    Error {
        /// Human-readable error text
        message: String,
        /// The captured failure
        failure: ComputeError,
    },
}

/// Immutable snapshot of an output document's validation state.
///
/// Exactly one of stringized data or stringized error is populated. The type
/// enforces this through [`StatusPayload`] and deserialization rejects records
/// that break it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StatusRecord", into = "StatusRecord")]
pub struct DocumentStatus {
    data_modified: bool,
    data_warning: bool,
    document_type_is_valid: bool,
    reprocess: Option<bool>,
    summary: String,
    orders: Vec<IdentifierEntry>,
    encounters: Vec<IdentifierEntry>,
    prompt_for_duplicate_orders: bool,
    prompt_for_duplicate_encounters: bool,
    payload: StatusPayload,
}

impl DocumentStatus {
    /// Start building a successful status.
    pub fn builder() -> StatusBuilder {
        StatusBuilder::default()
    }

    /// Build an errored status from a computation failure.
    pub fn from_failure(failure: ComputeError) -> Self {
        Self {
            data_modified: false,
            data_warning: false,
            document_type_is_valid: false,
            reprocess: None,
            summary: String::new(),
            orders: Vec::new(),
            encounters: Vec::new(),
            prompt_for_duplicate_orders: false,
            prompt_for_duplicate_encounters: false,
            payload: StatusPayload::Error {
                message: failure.to_string(),
                failure,
            },
        }
    }

    /// Document data was modified.
    pub fn data_modified(&self) -> bool {
        self.data_modified
    }

    /// Computation failed; the error fields are populated.
    pub fn data_error(&self) -> bool {
        matches!(self.payload, StatusPayload::Error { .. })
    }

    /// Validation raised warnings.
    pub fn data_warning(&self) -> bool {
        self.data_warning
    }

    /// The document type was recognized as valid.
    pub fn document_type_is_valid(&self) -> bool {
        self.document_type_is_valid
    }

    /// Explicit reprocess decision; `None` leaves it to pagination changes.
    pub fn reprocess(&self) -> Option<bool> {
        self.reprocess
    }

    /// Resolve the reprocess flag, deriving it with `derive` when unset.
    ///
    /// The derivation rule belongs to the caller.
    pub fn reprocess_or_else(&self, derive: impl FnOnce() -> bool) -> bool {
        self.reprocess.unwrap_or_else(derive)
    }

    /// Summary text.
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Order identifiers, in extraction order.
    pub fn orders(&self) -> &[IdentifierEntry] {
        &self.orders
    }

    /// Encounter identifiers, in extraction order.
    pub fn encounters(&self) -> &[IdentifierEntry] {
        &self.encounters
    }

    /// Whether the user must confirm duplicate orders.
    pub fn prompt_for_duplicate_orders(&self) -> bool {
        self.prompt_for_duplicate_orders
    }

    /// Whether the user must confirm duplicate encounters.
    pub fn prompt_for_duplicate_encounters(&self) -> bool {
        self.prompt_for_duplicate_encounters
    }

    /// The data or error payload.
    pub fn payload(&self) -> &StatusPayload {
        &self.payload
    }

    /// Stringized data, if the computation succeeded.
    pub fn stringized_data(&self) -> Option<&str> {
        match &self.payload {
            StatusPayload::Data(data) => Some(data),
            StatusPayload::Error { .. } => None,
        }
    }

    /// Stringized error, if the computation failed.
    pub fn stringized_error(&self) -> Option<&str> {
        match &self.payload {
            StatusPayload::Error { message, .. } => Some(message),
            StatusPayload::Data(_) => None,
        }
    }

    /// The captured failure, if the computation failed.
    pub fn failure(&self) -> Option<&ComputeError> {
        match &self.payload {
            StatusPayload::Error { failure, .. } => Some(failure),
            StatusPayload::Data(_) => None,
        }
    }

    /// Serialize to the textual status representation.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from the textual status representation.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Builder for successful [`DocumentStatus`] values.
#[derive(Debug, Clone, Default)]
pub struct StatusBuilder {
    data_modified: bool,
    data_warning: bool,
    document_type_is_valid: bool,
    reprocess: Option<bool>,
    summary: String,
    orders: Vec<IdentifierEntry>,
    encounters: Vec<IdentifierEntry>,
    prompt_for_duplicate_orders: bool,
    prompt_for_duplicate_encounters: bool,
    data: String,
}

impl StatusBuilder {
    /// Set the modified flag.
    pub fn modified(mut self, modified: bool) -> Self {
        self.data_modified = modified;
        self
    }

    /// Set the warning flag.
    pub fn warning(mut self, warning: bool) -> Self {
        self.data_warning = warning;
        self
    }

    /// Set document type validity.
    pub fn document_type_valid(mut self, valid: bool) -> Self {
        self.document_type_is_valid = valid;
        self
    }

    /// Set an explicit reprocess decision.
    pub fn reprocess(mut self, reprocess: Option<bool>) -> Self {
        self.reprocess = reprocess;
        self
    }

    /// Set the summary text.
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Append an order identifier.
    pub fn order(mut self, entry: IdentifierEntry) -> Self {
        self.orders.push(entry);
        self
    }

    /// Append an encounter identifier.
    pub fn encounter(mut self, entry: IdentifierEntry) -> Self {
        self.encounters.push(entry);
        self
    }

    /// Set both duplicate prompt flags.
    pub fn prompt_for_duplicates(mut self, orders: bool, encounters: bool) -> Self {
        self.prompt_for_duplicate_orders = orders;
        self.prompt_for_duplicate_encounters = encounters;
        self
    }

    /// Set the stringized data directly.
    pub fn data_text(mut self, data: impl Into<String>) -> Self {
        self.data = data.into();
        self
    }

    /// Stringize a serializable value as the status data.
    pub fn data<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self> {
        self.data = serde_json::to_string(value)?;
        Ok(self)
    }

    /// Finish the status; fails when no data was provided.
    pub fn build(self) -> Result<DocumentStatus> {
        if self.data.is_empty() {
            return Err(Error::InvalidStatus(
                "a successful status needs stringized data".into(),
            ));
        }
        Ok(DocumentStatus {
            data_modified: self.data_modified,
            data_warning: self.data_warning,
            document_type_is_valid: self.document_type_is_valid,
            reprocess: self.reprocess,
            summary: self.summary,
            orders: self.orders,
            encounters: self.encounters,
            prompt_for_duplicate_orders: self.prompt_for_duplicate_orders,
            prompt_for_duplicate_encounters: self.prompt_for_duplicate_encounters,
            payload: StatusPayload::Data(self.data),
        })
    }
}

/// Wire form of [`DocumentStatus`].
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct StatusRecord {
    data_modified: bool,
    data_error: bool,
    data_warning: bool,
    document_type_is_valid: bool,
    reprocess: Option<bool>,
    summary: String,
    orders: Vec<IdentifierEntry>,
    encounters: Vec<IdentifierEntry>,
    prompt_for_duplicate_orders: bool,
    prompt_for_duplicate_encounters: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stringized_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stringized_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exception: Option<ComputeError>,
}

impl From<DocumentStatus> for StatusRecord {
    fn from(status: DocumentStatus) -> Self {
        let data_error = status.data_error();
        let (stringized_data, stringized_error, exception) = match status.payload {
            StatusPayload::Data(data) => (Some(data), None, None),
            StatusPayload::Error { message, failure } => (None, Some(message), Some(failure)),
        };
        Self {
            data_modified: status.data_modified,
            data_error,
            data_warning: status.data_warning,
            document_type_is_valid: status.document_type_is_valid,
            reprocess: status.reprocess,
            summary: status.summary,
            orders: status.orders,
            encounters: status.encounters,
            prompt_for_duplicate_orders: status.prompt_for_duplicate_orders,
            prompt_for_duplicate_encounters: status.prompt_for_duplicate_encounters,
            stringized_data,
            stringized_error,
            exception,
        }
    }
}

impl TryFrom<StatusRecord> for DocumentStatus {
    type Error = Error;

    fn try_from(record: StatusRecord) -> Result<Self> {
        let data = record.stringized_data.filter(|s| !s.is_empty());
        let error = record.stringized_error.filter(|s| !s.is_empty());

        let payload = match (record.data_error, data, error, record.exception) {
            (true, None, Some(message), Some(failure)) => StatusPayload::Error { message, failure },
            (true, None, Some(_), None) => {
                return Err(Error::InvalidStatus(
                    "error status is missing its captured failure".into(),
                ))
            }
            (false, Some(data), None, None) => StatusPayload::Data(data),
            (true, _, _, _) => {
                return Err(Error::InvalidStatus(
                    "error status must carry only a stringized error".into(),
                ))
            }
            (false, _, _, _) => {
                return Err(Error::InvalidStatus(
                    "status must carry only stringized data".into(),
                ))
            }
        };

        Ok(Self {
            data_modified: record.data_modified,
            data_warning: record.data_warning,
            document_type_is_valid: record.document_type_is_valid,
            reprocess: record.reprocess,
            summary: record.summary,
            orders: record.orders,
            encounters: record.encounters,
            prompt_for_duplicate_orders: record.prompt_for_duplicate_orders,
            prompt_for_duplicate_encounters: record.prompt_for_duplicate_encounters,
            payload,
        })
    }
}

/// What an output document currently knows about its status.
#[derive(Debug, Clone, Default)]
pub enum StatusState {
    /// Never computed
    #[default]
    None,

    /// Invalidated by an edit; a computation is due
    Pending,

    /// Latest computed status
    Ready(Arc<DocumentStatus>),
}

impl StatusState {
    /// Check if a computation is due.
    pub fn is_pending(&self) -> bool {
        matches!(self, StatusState::Pending)
    }

    /// The computed status, if one is available.
    pub fn status(&self) -> Option<&Arc<DocumentStatus>> {
        match self {
            StatusState::Ready(status) => Some(status),
            _ => None,
        }
    }
}

/// Shared, revisioned holder of one document's [`StatusState`].
///
/// Readers always see a whole status: a new value replaces the old one under
/// the lock as a single pointer swap. Every invalidation bumps the revision,
/// and a worker may only publish for the revision it started on.
#[derive(Debug, Default)]
pub struct StatusSlot {
    inner: Mutex<SlotInner>,
}

#[derive(Debug, Default)]
struct SlotInner {
    revision: u64,
    state: StatusState,
}

impl StatusSlot {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SlotInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state.
    pub fn state(&self) -> StatusState {
        self.lock().state.clone()
    }

    /// Current revision.
    pub fn revision(&self) -> u64 {
        self.lock().revision
    }

    /// Mark the status pending and return the new revision.
    pub fn invalidate(&self) -> u64 {
        let mut inner = self.lock();
        inner.revision += 1;
        inner.state = StatusState::Pending;
        inner.revision
    }

    /// Store `status` if `revision` is still current.
    ///
    /// Returns false when a later edit already superseded the computation.
    pub fn publish(&self, revision: u64, status: DocumentStatus) -> bool {
        let status = Arc::new(status);
        let mut inner = self.lock();
        if inner.revision != revision {
            return false;
        }
        inner.state = StatusState::Ready(status);
        true
    }

    /// Forget any status.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.revision += 1;
        inner.state = StatusState::None;
    }
}
