//! Blocking client for `file://`, plain-path and `http(s)://` sources.

use crate::utils::config::DEFAULT_FETCH_TIMEOUT;
use crate::utils::error::FetchError;
use log::{debug, trace};
use reqwest::blocking::Client;
use std::path::Path;

/// Where a source string points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Location<'a> {
    Http(&'a str),
    File(&'a str),
}

fn locate(source: &str) -> Location<'_> {
    if source.starts_with("http://") || source.starts_with("https://") {
        Location::Http(source)
    } else if let Some(path) = source.strip_prefix("file://") {
        Location::File(path)
    } else {
        Location::File(source)
    }
}

/// Client that reads raw source text
pub struct SourceClient {
    client: Client,
}

impl SourceClient {
    /// Create a new client with the default timeout
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(DEFAULT_FETCH_TIMEOUT)
            .build()
            .map_err(FetchError::RequestFailed)?;

        Ok(Self { client })
    }

    /// Read the text behind a URL or path
    ///
    /// **Public** - every input of generation goes through here
    ///
    /// # Errors
    /// * `FetchError::RequestFailed` - HTTP transport failure
    /// * `FetchError::BadStatus` - non-success HTTP status
    /// * `FetchError::ReadFailed` - local file cannot be read
    /// * `FetchError::InvalidEncoding` - body is not UTF-8
    pub fn fetch_text(&self, source: &str) -> Result<String, FetchError> {
        debug!("Fetching: {}", source);

        match locate(source) {
            Location::File(path) => read_file(path),
            Location::Http(url) => {
                let response = self
                    .client
                    .get(url)
                    .send()
                    .map_err(FetchError::RequestFailed)?;

                if !response.status().is_success() {
                    return Err(FetchError::BadStatus {
                        url: url.to_string(),
                        status: response.status().as_u16(),
                    });
                }

                let bytes = response.bytes().map_err(FetchError::RequestFailed)?;
                trace!("Fetched {} bytes from {}", bytes.len(), url);
                String::from_utf8(bytes.to_vec())
                    .map_err(|_| FetchError::InvalidEncoding(url.to_string()))
            }
        }
    }

    /// Probe whether a source can be retrieved
    pub fn exists(&self, source: &str) -> bool {
        match locate(source) {
            Location::File(path) => Path::new(path).is_file(),
            Location::Http(url) => self
                .client
                .head(url)
                .send()
                .map(|r| r.status().is_success())
                .unwrap_or(false),
        }
    }
}

fn read_file(path: &str) -> Result<String, FetchError> {
    let bytes = std::fs::read(path).map_err(|source| FetchError::ReadFailed {
        path: path.to_string(),
        source,
    })?;
    String::from_utf8(bytes).map_err(|_| FetchError::InvalidEncoding(path.to_string()))
}
