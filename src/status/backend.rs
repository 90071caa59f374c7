//! Status computation backends.

use super::thread_manager::StopToken;
use crate::error::ComputeError;
use crate::model::{DocumentData, DocumentStatus, IdentifierEntry};
use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Duration;

/// Computes the validation status of one document snapshot.
///
/// Implementations may take seconds and may fail. Long computations should
/// call [`StopToken::check`] between stages so a shutdown does not have to
/// wait for them.
pub trait StatusBackend: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str {
        "status"
    }

    /// Compute the status for `data`.
    fn compute(&self, data: &DocumentData, stop: &StopToken)
        -> Result<DocumentStatus, ComputeError>;
}

impl<F> StatusBackend for F
where
    F: Fn(&DocumentData, &StopToken) -> Result<DocumentStatus, ComputeError> + Send + Sync,
{
    fn compute(
        &self,
        data: &DocumentData,
        stop: &StopToken,
    ) -> Result<DocumentStatus, ComputeError> {
        self(data, stop)
    }
}

/// Run `backend` and fold any failure into an errored status.
///
/// Panics are caught and captured as [`ComputeError::Panicked`]. Returns
/// `None` when the computation gave up because of a stop request.
pub fn compute_status<B>(backend: &B, data: &DocumentData, stop: &StopToken) -> Option<DocumentStatus>
where
    B: StatusBackend + ?Sized,
{
    let result = panic::catch_unwind(AssertUnwindSafe(|| backend.compute(data, stop)))
        .unwrap_or_else(|payload| {
            Err(ComputeError::Panicked {
                message: panic_message(payload.as_ref()),
            })
        });

    match result {
        Ok(status) => Some(status),
        Err(err) if err.is_cancelled() => None,
        Err(err) => {
            log::debug!(
                "{} computation for {:?} failed: {}",
                backend.name(),
                data.name,
                err
            );
            Some(DocumentStatus::from_failure(err))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Data blob stored by [`PageRulesBackend`].
#[derive(Debug, Serialize)]
struct RulesReport<'a> {
    document: &'a str,
    pages: usize,
    live_pages: usize,
    deleted_pages: usize,
    rotated_pages: usize,
    sources: Vec<&'a str>,
}

/// Staged validator working only from page references.
///
/// - an empty document, or one with every page deleted, is invalid data;
/// - order and encounter identifiers are read from source names such as
///   `ORD-1042_20240301.tif` or `ENC-77.pdf`;
/// - deleted or rotated pages raise a warning;
/// - pages out of source order, deleted or rotated mark the data modified;
/// - more than one distinct order (or encounter) asks for confirmation.
#[derive(Debug, Clone)]
pub struct PageRulesBackend {
    identifier_regex: Regex,
    stage_delay: Duration,
}

impl PageRulesBackend {
    /// Create the validator.
    pub fn new() -> Self {
        Self {
            identifier_regex: Regex::new(r"(?i)\b(ORD|ENC)-(\d+)(?:_(\d{8}))?")
                .expect("identifier pattern is valid"),
            stage_delay: Duration::ZERO,
        }
    }

    /// Pause between stages, simulating a slow rules service.
    pub fn with_stage_delay(mut self, delay: Duration) -> Self {
        self.stage_delay = delay;
        self
    }

    fn pause(&self, stop: &StopToken) -> Result<(), ComputeError> {
        if !self.stage_delay.is_zero() {
            thread::sleep(self.stage_delay);
        }
        stop.check()
    }

    fn extract_identifiers(&self, data: &DocumentData) -> (Vec<IdentifierEntry>, Vec<IdentifierEntry>) {
        let mut orders: Vec<IdentifierEntry> = Vec::new();
        let mut encounters: Vec<IdentifierEntry> = Vec::new();

        for page in data.pages.iter().filter(|p| !p.deleted) {
            for caps in self.identifier_regex.captures_iter(&page.source_document) {
                let id = format!("{}-{}", caps[1].to_uppercase(), &caps[2]);
                let date = caps
                    .get(3)
                    .and_then(|m| NaiveDate::parse_from_str(m.as_str(), "%Y%m%d").ok());
                let target = if caps[1].eq_ignore_ascii_case("ORD") {
                    &mut orders
                } else {
                    &mut encounters
                };
                if !target.iter().any(|e| e.id == id) {
                    target.push(IdentifierEntry { id, date });
                }
            }
        }
        (orders, encounters)
    }
}

impl Default for PageRulesBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBackend for PageRulesBackend {
    fn name(&self) -> &str {
        "page-rules"
    }

    fn compute(
        &self,
        data: &DocumentData,
        stop: &StopToken,
    ) -> Result<DocumentStatus, ComputeError> {
        let live_pages = data.live_page_count();
        if data.pages.is_empty() {
            return Err(ComputeError::invalid_data("document has no pages"));
        }
        if live_pages == 0 {
            return Err(ComputeError::invalid_data("every page is deleted"));
        }
        self.pause(stop)?;

        let (orders, encounters) = self.extract_identifiers(data);
        self.pause(stop)?;

        let deleted_pages = data.pages.len() - live_pages;
        let rotated_pages = data.pages.iter().filter(|p| p.rotation.is_rotated()).count();
        let in_source_order = data.pages.windows(2).all(|w| {
            w[0].source_document != w[1].source_document || w[0].page_number < w[1].page_number
        });

        let mut sources: Vec<&str> = Vec::new();
        for page in &data.pages {
            if !sources.contains(&page.source_document.as_str()) {
                sources.push(&page.source_document);
            }
        }

        let summary = format!(
            "{} of {} pages; {} order(s); {} encounter(s)",
            live_pages,
            data.pages.len(),
            orders.len(),
            encounters.len()
        );
        let report = RulesReport {
            document: &data.name,
            pages: data.pages.len(),
            live_pages,
            deleted_pages,
            rotated_pages,
            sources,
        };

        let mut builder = DocumentStatus::builder()
            .modified(!in_source_order || deleted_pages > 0 || rotated_pages > 0)
            .warning(deleted_pages > 0 || rotated_pages > 0)
            .document_type_valid(true)
            .summary(summary)
            .prompt_for_duplicates(orders.len() > 1, encounters.len() > 1)
            .data(&report)
            .map_err(|e| ComputeError::invalid_data(e.to_string()))?;
        for order in orders {
            builder = builder.order(order);
        }
        for encounter in encounters {
            builder = builder.encounter(encounter);
        }
        builder
            .build()
            .map_err(|e| ComputeError::invalid_data(e.to_string()))
    }
}
