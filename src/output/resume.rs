//! Skipping jobs that already have output.

use std::collections::HashSet;

/// Which requested jobs still need harvesting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResumePlan {
    /// In request order, without duplicates.
    pub pending: Vec<String>,
    /// Requested jobs whose output already exists.
    pub skipped: Vec<String>,
}

/// Drop completed and duplicate job ids while keeping request order.
pub fn filter_pending<I, S>(job_ids: I, completed: &HashSet<String>) -> ResumePlan
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut plan = ResumePlan::default();
    for id in job_ids {
        let id = id.as_ref().trim();
        if id.is_empty() || !seen.insert(id.to_string()) {
            continue;
        }
        if completed.contains(id) {
            plan.skipped.push(id.to_string());
        } else {
            plan.pending.push(id.to_string());
        }
    }
    plan
}
