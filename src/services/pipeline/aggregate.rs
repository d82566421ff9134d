//! Joining page results into a job result.

use crate::models::{Job, JobResult, PageResult};
use crate::scrapers::PageError;

use super::scheduler::PageOutcome;

/// All page results, or the lowest-numbered page failure.
///
/// One failed page fails the job, and the successful siblings are dropped.
pub fn collect_pages(outcomes: Vec<PageOutcome>) -> Result<Vec<PageResult>, PageError> {
    let mut outcomes = outcomes;
    outcomes.sort_by_key(|o| match o {
        Ok(page) => page.page_number,
        Err(e) => e.page(),
    });
    outcomes.into_iter().collect()
}

/// Concatenate page results by ascending page number. No deduplication.
pub fn aggregate(job: &Job, mut pages: Vec<PageResult>) -> JobResult {
    pages.sort_by_key(|p| p.page_number);
    JobResult {
        job_id: job.job_id.clone(),
        records: pages.into_iter().flat_map(|p| p.records).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;

    fn page(number: u32, names: &[&str]) -> PageResult {
        PageResult::new(
            number,
            names
                .iter()
                .map(|n| Record {
                    name: n.to_string(),
                    ..Record::for_job("abc123")
                })
                .collect(),
        )
    }

    fn names(result: &JobResult) -> Vec<&str> {
        result.records.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn aggregation_follows_page_order_not_arrival_order() {
        let job = Job::new("abc123", 3);
        let arrived = vec![page(3, &["E"]), page(1, &["A", "B"]), page(2, &["C", "D"])];

        let result = aggregate(&job, arrived);

        assert_eq!(names(&result), vec!["A", "B", "C", "D", "E"]);
        assert_eq!(result.job_id, "abc123");
    }

    #[test]
    fn empty_pages_and_duplicates_pass_through() {
        let job = Job::new("abc123", 3);
        let result = aggregate(&job, vec![page(1, &["A"]), page(2, &[]), page(3, &["A"])]);

        assert_eq!(names(&result), vec!["A", "A"]);
    }

    #[test]
    fn first_failure_in_page_order_wins() {
        let fail = |page: u32| {
            Err(PageError::Api {
                job_id: "abc123".to_string(),
                page,
                message: "HTTP 503".to_string(),
            })
        };
        let outcomes = vec![fail(3), Ok(page(1, &["A"])), fail(2)];

        let err = collect_pages(outcomes).unwrap_err();

        assert_eq!(err.page(), 2);
    }

    #[test]
    fn all_pages_collect() {
        let pages = collect_pages(vec![Ok(page(2, &["B"])), Ok(page(1, &["A"]))]).unwrap();

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].page_number, 1);
    }
}
