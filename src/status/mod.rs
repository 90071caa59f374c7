//! Background computation of document status.
//!
//! Each edited output document gets its own worker thread. Workers are
//! registered with a [`ThreadManager`], compute from a snapshot through a
//! [`StatusBackend`], publish into the document's status slot and report back
//! to the controller thread over a channel.
//!
//! # Example
//!
//! ```
//! use pagination::model::{OutputDocument, Page};
//! use pagination::status::{PageRulesBackend, StatusScheduler};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let mut scheduler = StatusScheduler::new(Arc::new(PageRulesBackend::new()));
//! let mut doc = OutputDocument::new("ORD-7.tif");
//! doc.add_page(Page::from_source("ORD-7.tif", 1));
//!
//! scheduler.request(&doc);
//! let (_, idle) = scheduler.wait_idle(Duration::from_secs(5));
//! assert!(idle);
//! assert!(doc.status().status().is_some());
//! assert!(scheduler.shutdown(Duration::from_secs(1)));
//! ```

mod backend;
mod scheduler;
mod thread_manager;

pub use backend::{compute_status, PageRulesBackend, StatusBackend};
pub use scheduler::{ScheduleOutcome, StatusEvent, StatusScheduler};
pub use thread_manager::{
    CoordinatorState, StopToken, ThreadManager, WorkerGuard, DEFAULT_STOP_TIMEOUT,
};
