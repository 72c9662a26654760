//! services/api/src/adapters/http_fetch.rs
//!
//! This module contains the outbound HTTP adapter used by the document strategies
//! and the PDF proxy. It implements the `DocumentFetcher` port from the `core` crate.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::header::{HeaderMap, ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_LENGTH, CONTENT_TYPE, ORIGIN};
use shelf_core::domain::{FetchedBody, ProbeResponse};
use shelf_core::ports::{DocumentFetcher, PortError, PortResult};
use std::time::Duration;
use tracing::debug;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `DocumentFetcher` with a shared `reqwest` client.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_bytes: usize,
}

impl ReqwestFetcher {
    /// Creates a new `ReqwestFetcher`. Bodies larger than `max_bytes` are refused.
    pub fn new(timeout: Duration, max_bytes: usize) -> PortResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(concat!("shelf-api/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PortError::Unexpected(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            timeout,
            max_bytes,
        })
    }

    /// An oversized body is an upstream problem, reported as 413 Payload Too Large.
    fn too_large(&self) -> PortError {
        PortError::HttpStatus {
            status: 413,
            detail: format!("document exceeds the {} byte limit", self.max_bytes),
        }
    }

    fn classify(&self, error: reqwest::Error) -> PortError {
        if error.is_timeout() {
            PortError::Timeout(u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX))
        } else if error.is_builder() {
            PortError::InvalidArgument(error.to_string())
        } else if error.is_decode() {
            PortError::Parse(error.to_string())
        } else {
            PortError::Network(error.to_string())
        }
    }
}

fn header(headers: &HeaderMap, name: reqwest::header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

//=========================================================================================
// `DocumentFetcher` Trait Implementation
//=========================================================================================

#[async_trait]
impl DocumentFetcher for ReqwestFetcher {
    async fn probe(&self, url: &str, origin: Option<&str>) -> PortResult<ProbeResponse> {
        let mut request = self.client.head(url);
        if let Some(origin) = origin {
            request = request.header(ORIGIN, origin);
        }
        let response = request.send().await.map_err(|e| self.classify(e))?;
        let headers = response.headers();
        Ok(ProbeResponse {
            status: response.status().as_u16(),
            content_type: header(headers, CONTENT_TYPE),
            allow_origin: header(headers, ACCESS_CONTROL_ALLOW_ORIGIN),
        })
    }

    async fn fetch(
        &self,
        url: &str,
        origin: Option<&str>,
        bearer_token: Option<&str>,
    ) -> PortResult<FetchedBody> {
        let mut request = self.client.get(url);
        if let Some(origin) = origin {
            request = request.header(ORIGIN, origin);
        }
        if let Some(token) = bearer_token {
            request = request.bearer_auth(token);
        }
        let mut response = request.send().await.map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PortError::from_status(
                status.as_u16(),
                status.canonical_reason().unwrap_or("unexpected status"),
            ));
        }

        let headers = response.headers();
        let content_type = header(headers, CONTENT_TYPE);
        let allow_origin = header(headers, ACCESS_CONTROL_ALLOW_ORIGIN);
        let declared_len = header(headers, CONTENT_LENGTH).and_then(|v| v.parse::<usize>().ok());
        if declared_len.is_some_and(|len| len > self.max_bytes) {
            return Err(self.too_large());
        }

        let mut buffer = BytesMut::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| self.classify(e))? {
            if buffer.len() + chunk.len() > self.max_bytes {
                return Err(self.too_large());
            }
            buffer.extend_from_slice(&chunk);
        }
        let bytes: Bytes = buffer.freeze();
        debug!(%url, size = bytes.len(), "Fetched document body.");

        Ok(FetchedBody {
            bytes,
            content_type,
            allow_origin,
        })
    }
}
