//! Data models for labharvest.

mod job;
mod record;

pub use job::{Job, JobResult, PageResult, PageTask};
pub use record::{is_dnf_designation, Discipline, Record, SplitFields, DNF_DESIGNATIONS};
