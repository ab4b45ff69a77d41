//! Anonymous path-style S3 GET client on top of the shared connection pool.

use super::pool::{ConnectionPool, PooledConnection, Scheme, Target};
use super::{
    ObjectBody, ObjectLocation, ObjectStore, RequestHooks, StorageError, EXTENDED_ID_HEADER,
    REQUEST_ID_HEADER,
};
use crate::window::RequestIds;
use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderMap, HOST, USER_AGENT};
use http::{Method, Request};
use http_body_util::{BodyExt, Empty};
use hyper::body::Incoming;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

const USER_AGENT_VALUE: &str = concat!("get-latency-bench/", env!("CARGO_PKG_VERSION"));

/// Object store speaking plain HTTP/1.1 to an S3-compatible endpoint.
pub struct HttpObjectStore {
    base: Url,
    target: Target,
    pool: Arc<ConnectionPool>,
}

impl HttpObjectStore {
    /// Create a store for `endpoint` (`host` or `host:port`).
    ///
    /// The scheme follows the pool: `https` when it was built with TLS,
    /// `http` otherwise.
    pub fn new(endpoint: &str, pool: Arc<ConnectionPool>, secure: bool) -> Result<Self, StorageError> {
        let scheme = if secure { Scheme::Https } else { Scheme::Http };
        let base = Url::parse(&format!("{}://{}/", scheme.as_str(), endpoint))
            .map_err(|e| StorageError::InvalidLocation(format!("{}: {}", endpoint, e)))?;

        let host = base
            .host_str()
            .ok_or_else(|| StorageError::InvalidLocation(format!("{}: missing host", endpoint)))?
            .to_string();
        let port = base
            .port_or_known_default()
            .ok_or_else(|| StorageError::InvalidLocation(format!("{}: missing port", endpoint)))?;

        Ok(Self {
            base,
            target: Target { scheme, host, port },
            pool,
        })
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Path and query for `location`, with each key segment percent-encoded.
    pub fn request_path(&self, location: &ObjectLocation) -> Result<String, StorageError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| StorageError::InvalidLocation(self.base.to_string()))?
            .pop_if_empty()
            .push(&location.container)
            .extend(location.key.split('/'));

        Ok(url[url::Position::BeforePath..].to_string())
    }
}

fn request_ids(headers: &HeaderMap) -> RequestIds {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };

    RequestIds {
        request_id: header(REQUEST_ID_HEADER),
        extended_id: header(EXTENDED_ID_HEADER),
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn get_object(
        &self,
        location: &ObjectLocation,
        hooks: &mut dyn RequestHooks,
    ) -> Result<Box<dyn ObjectBody>, StorageError> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(self.request_path(location)?)
            .header(HOST, self.target.authority())
            .header(USER_AGENT, USER_AGENT_VALUE)
            .body(Empty::<Bytes>::new())?;

        let (mut conn, reused) = self.pool.checkout(&self.target).await?;
        conn.sender().ready().await?;
        hooks.connection_acquired(Instant::now(), reused);

        conn.probe().arm();
        let sent = conn.sender().send_request(request).await;
        if let Some(at) = conn.probe().take() {
            hooks.first_response_byte(at);
        }
        let response = sent?;

        let ids = request_ids(response.headers());
        hooks.request_complete(Instant::now(), ids.clone());

        let status = response.status();
        let mut body = HttpObjectBody {
            body: response.into_body(),
            conn: Some(conn),
            pool: Arc::clone(&self.pool),
        };

        if !status.is_success() {
            // Read the error document so the connection stays reusable.
            if let Err(e) = body.drain().await {
                debug!("Failed to drain error response: {}", e);
            }
            return Err(StorageError::Status { status, ids });
        }

        Ok(Box::new(body))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Response body still attached to its pooled connection.
struct HttpObjectBody {
    body: Incoming,
    conn: Option<PooledConnection>,
    pool: Arc<ConnectionPool>,
}

#[async_trait]
impl ObjectBody for HttpObjectBody {
    async fn drain(&mut self) -> Result<u64, StorageError> {
        let mut bytes = 0u64;
        while let Some(frame) = self.body.frame().await {
            match frame {
                Ok(frame) => {
                    if let Some(data) = frame.data_ref() {
                        bytes += data.len() as u64;
                    }
                }
                Err(e) => {
                    // A half-read connection cannot be reused.
                    self.conn = None;
                    return Err(e.into());
                }
            }
        }

        if let Some(conn) = self.conn.take() {
            self.pool.checkin(conn);
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::PoolConfig;
    use http::HeaderValue;

    fn store(endpoint: &str, secure: bool) -> HttpObjectStore {
        let pool = Arc::new(ConnectionPool::new(PoolConfig::default(), secure).unwrap());
        HttpObjectStore::new(endpoint, pool, secure).unwrap()
    }

    #[test]
    fn test_target_from_endpoint() {
        let plain = store("s3.eu-west-1.amazonaws.com", false);
        assert_eq!(plain.target().scheme, Scheme::Http);
        assert_eq!(plain.target().port, 80);

        let secure = store("s3.eu-west-1.amazonaws.com", true);
        assert_eq!(secure.target().scheme, Scheme::Https);
        assert_eq!(secure.target().port, 443);

        let custom = store("127.0.0.1:9000", false);
        assert_eq!(custom.target().host, "127.0.0.1");
        assert_eq!(custom.target().port, 9000);
    }

    #[test]
    fn test_request_path_encodes_key_segments() {
        let store = store("localhost:9000", false);
        let path = store
            .request_path(&ObjectLocation::new("bucket", "dir/my object.bin"))
            .unwrap();
        assert_eq!(path, "/bucket/dir/my%20object.bin");
    }

    #[test]
    fn test_invalid_endpoint_is_rejected() {
        let pool = Arc::new(ConnectionPool::new(PoolConfig::default(), false).unwrap());
        assert!(HttpObjectStore::new("bad host name", pool, false).is_err());
    }

    #[test]
    fn test_request_ids_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("4442587FB7D0A2F9"));
        headers.insert(EXTENDED_ID_HEADER, HeaderValue::from_static("vlR7PnpV2Ce81l0P"));

        let ids = request_ids(&headers);
        assert_eq!(ids.request_id, "4442587FB7D0A2F9");
        assert_eq!(ids.extended_id, "vlR7PnpV2Ce81l0P");

        assert_eq!(request_ids(&HeaderMap::new()), RequestIds::default());
    }
}
