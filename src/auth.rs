//! Credential resolution.
//!
//! The OAuth2 consent flow runs outside of queryprobe. This module only picks
//! up the access token that flow produced, either passed directly or stored in
//! a token file, and checks that it was issued for Search Console access.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The OAuth2 scope required for read access to search analytics data.
pub const SCOPE: &str = "https://www.googleapis.com/auth/webmasters.readonly";

/// The read-write scope, which also grants read access.
pub const SCOPE_FULL: &str = "https://www.googleapis.com/auth/webmasters";

#[derive(Error, Debug)]
pub enum AuthError {
    #[error(
        "No access token available. Pass --access-token, set QUERYPROBE_ACCESS_TOKEN or point --credentials-file at a token file"
    )]
    MissingCredentials,

    #[error("Credentials file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Failed to read credentials file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Credentials file {} is not a valid token file: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("The access token is empty")]
    EmptyToken,

    #[error("The access token was not granted the {} scope (granted: {})", SCOPE, .0)]
    ScopeMismatch(String),
}

/// A token file as written by an OAuth2 helper.
///
/// Only `access_token` is required. Refresh tokens and client secrets that may
/// sit next to it are ignored.
#[derive(Debug, Deserialize)]
pub struct TokenFile {
    pub access_token: String,
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenFile {
    pub fn load(path: &Path) -> Result<Self, AuthError> {
        if !path.exists() {
            return Err(AuthError::FileNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path).map_err(|source| AuthError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| AuthError::Malformed {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Scopes are space separated, as in the OAuth2 token response.
    pub fn grants_search_console(&self) -> bool {
        match &self.scope {
            None => true,
            Some(scope) => scope
                .split_whitespace()
                .any(|s| s == SCOPE || s == SCOPE_FULL),
        }
    }
}

/// Resolves the bearer token used for reporting API calls.
///
/// A token given directly wins over the token file.
pub fn resolve_access_token(
    access_token: Option<&str>,
    credentials_file: Option<&Path>,
) -> Result<String, AuthError> {
    if let Some(token) = access_token {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::EmptyToken);
        }
        return Ok(token.to_string());
    }

    let Some(path) = credentials_file else {
        return Err(AuthError::MissingCredentials);
    };

    let token_file = TokenFile::load(path)?;
    if !token_file.grants_search_console() {
        return Err(AuthError::ScopeMismatch(
            token_file.scope.unwrap_or_default(),
        ));
    }
    let token = token_file.access_token.trim();
    if token.is_empty() {
        return Err(AuthError::EmptyToken);
    }
    tracing::debug!(path = %path.display(), "Loaded access token from credentials file");
    Ok(token.to_string())
}
