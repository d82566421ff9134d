//! Page- and discovery-level failures.

use thiserror::Error;

use super::extract::ExtractError;
use super::session::SessionError;

/// A page that could not be extracted. Fatal for the page's job.
#[derive(Debug, Clone, Error)]
pub enum PageError {
    #[error("{job_id} page {page}: gave up after {attempts} attempts: {cause}")]
    RetriesExhausted {
        job_id: String,
        page: u32,
        attempts: u32,
        cause: ExtractError,
    },

    #[error("{job_id} page {page}: {cause}")]
    Extraction {
        job_id: String,
        page: u32,
        cause: ExtractError,
    },

    #[error("{job_id} page {page}: session failed: {cause}")]
    Session {
        job_id: String,
        page: u32,
        cause: SessionError,
    },

    #[error("{job_id} page {page}: {message}")]
    Api {
        job_id: String,
        page: u32,
        message: String,
    },

    #[error("{job_id} page {page}: worker lost: {message}")]
    Lost {
        job_id: String,
        page: u32,
        message: String,
    },
}

impl PageError {
    pub fn job_id(&self) -> &str {
        match self {
            Self::RetriesExhausted { job_id, .. }
            | Self::Extraction { job_id, .. }
            | Self::Session { job_id, .. }
            | Self::Api { job_id, .. }
            | Self::Lost { job_id, .. } => job_id,
        }
    }

    pub fn page(&self) -> u32 {
        match self {
            Self::RetriesExhausted { page, .. }
            | Self::Extraction { page, .. }
            | Self::Session { page, .. }
            | Self::Api { page, .. }
            | Self::Lost { page, .. } => *page,
        }
    }
}

/// The page count of a job could not be determined.
#[derive(Debug, Clone, Error)]
pub enum DiscoveryError {
    #[error("{job_id}: could not open first page: {source}")]
    Session {
        job_id: String,
        #[source]
        source: SessionError,
    },

    #[error("{job_id}: {message}")]
    Api { job_id: String, message: String },
}

impl DiscoveryError {
    pub fn job_id(&self) -> &str {
        match self {
            Self::Session { job_id, .. } | Self::Api { job_id, .. } => job_id,
        }
    }
}
