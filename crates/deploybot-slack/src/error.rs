//! Error type for Slack Web API calls.

use thiserror::Error;

/// A failed Web API call.
///
/// `url` never carries the API token: it is replaced with `[hidden]`
/// before the error is built.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{cause} (method: {method}, url: {url})")]
pub struct WebApiError {
    pub method: String,
    pub url: String,
    pub cause: String,
}

impl WebApiError {
    pub fn new(method: &str, url: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            method: method.to_string(),
            url: url.into(),
            cause: cause.into(),
        }
    }
}
