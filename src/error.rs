//! Errors that end a run.
//!
//! Per-site reporting failures are not in here: they are
//! [`ReportingError`](crate::analytics::ReportingError)s and are handled inside
//! the site loop.

use crate::auth::AuthError;
use crate::sitemap::SitemapError;
use crate::storage::OutputError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FatalError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("HTTP client initialization error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error(transparent)]
    Sitemap(#[from] SitemapError),

    #[error(transparent)]
    Output(#[from] OutputError),
}

impl FatalError {
    /// Short category of the failure, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            FatalError::Auth(_) => "auth",
            FatalError::HttpClient(_) => "client",
            FatalError::Sitemap(SitemapError::Fetch { .. }) => "sitemap-fetch",
            FatalError::Sitemap(SitemapError::Decode { .. }) => "sitemap-decode",
            FatalError::Sitemap(SitemapError::Parse { .. }) => "sitemap-parse",
            FatalError::Output(_) => "output",
        }
    }
}
