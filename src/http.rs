//! Blocking HTTP transport.
//!
//! The downloader only talks to the network through [`Transport`], which lets
//! tests replace the platform with canned responses.
use reqwest::blocking::{Client, RequestBuilder};
use thiserror::Error;

use crate::config::HttpConfig;
use crate::error::{Error, Result};

/// Failure of a single HTTP exchange.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// The body ended early or could not be decoded. Worth retrying.
    #[error("Truncated response from {url}: {reason}")]
    Truncated { url: String, reason: String },

    /// The request could not be sent or no response arrived.
    #[error("Request to {url} failed: {reason}")]
    Request { url: String, reason: String },
}

impl TransportError {
    /// Whether a retry of the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::Truncated { .. })
    }

    /// HTTP status, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Minimal request surface used by the downloader.
///
/// Implementations return the complete response body.
pub trait Transport {
    fn get(&self, url: &str, headers: &[(&str, &str)]) -> std::result::Result<Vec<u8>, TransportError>;

    fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &serde_json::Value,
    ) -> std::result::Result<Vec<u8>, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get(&self, url: &str, headers: &[(&str, &str)]) -> std::result::Result<Vec<u8>, TransportError> {
        (**self).get(url, headers)
    }

    fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &serde_json::Value,
    ) -> std::result::Result<Vec<u8>, TransportError> {
        (**self).post_json(url, headers, body)
    }
}

/// [`Transport`] backed by `reqwest`'s blocking client.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Build a client from transport settings.
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let mut builder = Client::builder().user_agent(config.user_agent.as_str());
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| Error::Other(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    fn execute(
        &self,
        url: &str,
        request: RequestBuilder,
        headers: &[(&str, &str)],
    ) -> std::result::Result<Vec<u8>, TransportError> {
        let request = headers
            .iter()
            .fold(request, |req, (name, value)| req.header(*name, *value));

        let response = request.send().map_err(|e| TransportError::Request {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        // Read to completion; a connection dropped mid-body surfaces here.
        let body = response.bytes().map_err(|e| {
            if e.is_body() || e.is_decode() {
                TransportError::Truncated {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            } else {
                TransportError::Request {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;
        Ok(body.to_vec())
    }
}

impl Transport for HttpClient {
    fn get(&self, url: &str, headers: &[(&str, &str)]) -> std::result::Result<Vec<u8>, TransportError> {
        trace!("GET {}", url);
        self.execute(url, self.client.get(url), headers)
    }

    fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &serde_json::Value,
    ) -> std::result::Result<Vec<u8>, TransportError> {
        trace!("POST {}", url);
        self.execute(url, self.client.post(url).json(body), headers)
    }
}
