//! HTTP transport seam
//!
//! `HttpTransport` is the only thing the fetcher knows about the network.
//! Production uses a blocking `ureq` agent; tests script responses.

use std::io::Read;
use std::time::Duration;

use crate::constants::{MAX_IMAGE_BYTES, USER_AGENT};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("response body exceeds {limit} bytes")]
    BodyTooLarge { limit: u64 },
}

/// Any completed HTTP exchange, whatever the status
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn ok(body: impl Into<Vec<u8>>, content_type: Option<&str>) -> Self {
        Self {
            status: 200,
            content_type: content_type.map(str::to_string),
            body: body.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self { status, content_type: None, body: Vec::new() }
    }
}

pub trait HttpTransport: Send + Sync {
    fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, TransportError>;
}

// ============================================================================
// UREQ
// ============================================================================

pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new().user_agent(USER_AGENT).build(),
        }
    }

    fn into_response(resp: ureq::Response) -> Result<HttpResponse, TransportError> {
        let status = resp.status();
        let content_type = resp.header("Content-Type").map(str::to_string);

        let mut body = Vec::new();
        resp.into_reader()
            .take(MAX_IMAGE_BYTES + 1)
            .read_to_end(&mut body)?;

        if body.len() as u64 > MAX_IMAGE_BYTES {
            return Err(TransportError::BodyTooLarge { limit: MAX_IMAGE_BYTES });
        }

        Ok(HttpResponse { status, content_type, body })
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport for UreqTransport {
    fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, TransportError> {
        let response = self.agent
            .get(url)
            .timeout(timeout)
            .set("Accept", "image/*")
            .call();

        match response {
            Ok(resp) => Self::into_response(resp),
            // 4xx/5xx still carry a status the caller wants to see
            Err(ureq::Error::Status(_, resp)) => Self::into_response(resp),
            Err(ureq::Error::Transport(t)) => match t.kind() {
                ureq::ErrorKind::InvalidUrl | ureq::ErrorKind::UnknownScheme => {
                    Err(TransportError::InvalidUrl(t.to_string()))
                }
                _ => Err(TransportError::Network(t.to_string())),
            },
        }
    }
}
