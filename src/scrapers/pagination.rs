//! Page-count discovery for the interactive results view.

use tracing::{debug, info, warn};

use super::error::DiscoveryError;
use super::extract::layout::{PAGINATION_BUTTON_SELECTOR, TABLE_READY_SELECTOR};
use super::retry::RetryPolicy;
use super::session::{PageSession, SessionError, SessionProvider};

/// Maximum page number from the pagination button labels.
///
/// The control ends with a "next" button, so the highest page is the
/// second-to-last label. Anything unexpected means a single page.
pub fn page_count_from_labels(labels: &[String]) -> u32 {
    if labels.len() < 2 {
        return 1;
    }
    labels[labels.len() - 2]
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|n| *n >= 1)
        .unwrap_or(1)
}

/// Open `url` (page 1 of `job_id`) and read its page count.
///
/// Waits up to `page_wait` for the table, then only `pagination_wait` for the
/// control, which single-page jobs never render. The session is closed
/// whether or not discovery succeeds.
pub async fn discover_page_count(
    provider: &dyn SessionProvider,
    job_id: &str,
    url: &str,
    policy: &RetryPolicy,
) -> Result<u32, DiscoveryError> {
    let mut session = provider
        .open(url)
        .await
        .map_err(|source| DiscoveryError::Session {
            job_id: job_id.to_string(),
            source,
        })?;

    let result = read_page_count(session.as_mut(), policy).await;

    if let Err(e) = session.close().await {
        debug!("{}: failed to close discovery session: {}", job_id, e);
    }

    let pages = result.map_err(|source| DiscoveryError::Session {
        job_id: job_id.to_string(),
        source,
    })?;
    info!("{}: {} page(s)", job_id, pages);
    Ok(pages)
}

async fn read_page_count(
    session: &mut dyn PageSession,
    policy: &RetryPolicy,
) -> Result<u32, SessionError> {
    if !session
        .wait_for(TABLE_READY_SELECTOR, policy.page_wait)
        .await?
    {
        warn!("No results table after {:?}, assuming one page", policy.page_wait);
        return Ok(1);
    }
    if !session
        .wait_for(PAGINATION_BUTTON_SELECTOR, policy.pagination_wait)
        .await?
    {
        debug!("No pagination control after {:?}", policy.pagination_wait);
        return Ok(1);
    }
    let labels = session.read_texts(PAGINATION_BUTTON_SELECTOR).await?;
    debug!("Pagination labels: {:?}", labels);
    Ok(page_count_from_labels(&labels))
}
