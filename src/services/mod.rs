//! Service layer for labharvest.
//!
//! Harvesting logic lives here, separated from UI concerns. The CLI drives it
//! and renders the events it emits.

pub mod pipeline;
pub mod reparse;

pub use pipeline::{
    CompletedJob, FailedJob, HarvestConfig, HarvestEvent, HarvestReport, HarvestService, JobError,
};
pub use reparse::ReparseService;
