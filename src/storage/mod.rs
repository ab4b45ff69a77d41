//! # Object Storage Collaborator
//!
//! The sampling loop only needs one capability from the storage layer: read a
//! named object once and report lifecycle events of that single request while
//! doing so. `ObjectStore` captures that contract; `HttpObjectStore` is the
//! production implementation (anonymous path-style S3 GET over HTTP/1.1) and
//! tests plug in fakes.
//!
//! ## Request lifecycle events
//!
//! An implementation reports, through `RequestHooks`, in this order:
//!
//! 1. `connection_acquired`: a usable connection was taken from the pool or dialed
//! 2. `first_response_byte`: the first byte of the response arrived on the wire
//! 3. `request_complete`: response headers were handled, body not yet read
//!
//! Any subset may be skipped when the request fails part way through.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use crate::window::RequestIds;

pub mod http_store;
pub mod pool;

pub use http_store::HttpObjectStore;
pub use pool::{ConnectionPool, PoolConfig};

/// Response header carrying the primary request id.
pub const REQUEST_ID_HEADER: &str = "x-amz-request-id";

/// Response header carrying the extended (host) request id.
pub const EXTENDED_ID_HEADER: &str = "x-amz-id-2";

/// Container and key of the object under test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    pub container: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(container: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.container, self.key)
    }
}

/// Errors surfaced by an object store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid endpoint or object location: {0}")]
    InvalidLocation(String),

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{phase} timed out after {timeout:?}")]
    Timeout {
        phase: &'static str,
        timeout: Duration,
    },

    #[error("TLS handshake with {host} failed: {source}")]
    Tls {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TLS configuration error: {0}")]
    TlsConfig(#[from] rustls::Error),

    #[error("HTTP exchange failed: {0}")]
    Http(#[from] hyper::Error),

    #[error("failed to build request: {0}")]
    Request(#[from] ::http::Error),

    #[error("GET returned {status} (req-id: {}, x-amz-id-2: {})", .ids.request_id, .ids.extended_id)]
    Status {
        status: ::http::StatusCode,
        ids: RequestIds,
    },

    /// Failure injected by a non-HTTP store, such as a test double.
    #[error("{0}")]
    Other(String),
}

/// Observer for the lifecycle events of one request.
///
/// Implementations run inline on the issuing task, so they must stay cheap.
/// Every method defaults to a no-op.
pub trait RequestHooks: Send {
    /// A connection is ready to carry the request. `reused` is true when it
    /// came out of the idle pool rather than being dialed.
    fn connection_acquired(&mut self, _at: Instant, _reused: bool) {}

    /// The first response byte was read from the connection.
    fn first_response_byte(&mut self, _at: Instant) {}

    /// Status line and headers were processed; the body is still unread.
    fn request_complete(&mut self, _at: Instant, _ids: RequestIds) {}
}

/// Streaming body of a successful read.
#[async_trait]
pub trait ObjectBody: Send {
    /// Read the remaining body to the end and throw it away, returning the
    /// number of bytes read. Draining lets the connection go back to the pool.
    async fn drain(&mut self) -> Result<u64, StorageError>;
}

/// A store able to read one object at a time.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Issue one GET for `location`, reporting lifecycle events to `hooks`.
    ///
    /// Returns once headers are available; the body is left for the caller
    /// to drain. Non-success responses are returned as `StorageError::Status`.
    async fn get_object(
        &self,
        location: &ObjectLocation,
        hooks: &mut dyn RequestHooks,
    ) -> Result<Box<dyn ObjectBody>, StorageError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}
