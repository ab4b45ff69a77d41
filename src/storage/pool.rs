//! # Connection Pool
//!
//! A bounded pool of HTTP/1.1 client connections shared by every worker.
//!
//! Connections are dialed on demand, optionally wrapped in TLS, and handed to
//! exactly one request at a time. Once the response body is drained the
//! connection is checked back in and parked as idle, subject to:
//!
//! - a per-target idle cap (`max_idle_per_host`)
//! - a global idle cap (`max_idle`), which evicts the oldest idle connection
//! - an idle timeout, enforced lazily on every checkout and checkin
//!
//! Each connection carries a `FirstByteProbe` on its socket so the request
//! currently using it can learn when the first response byte arrived.

use super::StorageError;
use bytes::Bytes;
use http_body_util::Empty;
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use rustls::pki_types::ServerName;
use socket2::{SockRef, TcpKeepalive};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::debug;

/// Sizing and timeout knobs for the connection pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Upper bound on establishing a TCP connection
    pub dial_timeout: Duration,
    /// TCP keep-alive idle time set on every dialed socket
    pub keep_alive: Duration,
    /// Idle connections kept per target
    pub max_idle_per_host: usize,
    /// Idle connections kept across all targets
    pub max_idle: usize,
    /// Idle connections older than this are closed instead of reused
    pub idle_timeout: Duration,
    /// Upper bound on the TLS handshake
    pub handshake_timeout: Duration,
    /// Wait for `100 Continue` before sending a request body. Object reads
    /// carry no body, so this is never applied.
    pub expect_continue_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            dial_timeout: Duration::from_secs(15),
            keep_alive: Duration::from_secs(30),
            max_idle_per_host: 10,
            max_idle: 100,
            idle_timeout: Duration::from_secs(90),
            handshake_timeout: Duration::from_secs(10),
            expect_continue_timeout: Duration::from_secs(1),
        }
    }
}

/// URL scheme of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

/// A host the pool can dial.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
}

impl Target {
    /// `host:port`, as dialed and as sent in the `Host` header.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme.as_str(), self.host, self.port)
    }
}

/// Records when the first byte of a response is read off the socket.
///
/// The request owning the connection arms the probe right before sending;
/// the first non-empty read afterwards stamps the time and disarms it.
#[derive(Debug, Default)]
pub struct FirstByteProbe {
    armed: AtomicBool,
    seen_at: Mutex<Option<Instant>>,
}

impl FirstByteProbe {
    pub fn arm(&self) {
        *self.seen_at.lock() = None;
        self.armed.store(true, Ordering::Release);
    }

    fn observe(&self) {
        if self.armed.swap(false, Ordering::AcqRel) {
            *self.seen_at.lock() = Some(Instant::now());
        }
    }

    /// Disarm and return the recorded time, if any byte arrived.
    pub fn take(&self) -> Option<Instant> {
        self.armed.store(false, Ordering::Release);
        self.seen_at.lock().take()
    }
}

enum MaybeTlsStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

/// Socket wrapper that reports reads to a `FirstByteProbe`.
struct ProbedStream {
    inner: MaybeTlsStream,
    probe: Arc<FirstByteProbe>,
}

impl AsyncRead for ProbedStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let poll = match &mut this.inner {
            MaybeTlsStream::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            MaybeTlsStream::Tls(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
        };
        if matches!(poll, Poll::Ready(Ok(()))) && buf.filled().len() > before {
            this.probe.observe();
        }
        poll
    }
}

impl AsyncWrite for ProbedStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut self.get_mut().inner {
            MaybeTlsStream::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            MaybeTlsStream::Tls(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut self.get_mut().inner {
            MaybeTlsStream::Plain(stream) => Pin::new(stream).poll_flush(cx),
            MaybeTlsStream::Tls(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut self.get_mut().inner {
            MaybeTlsStream::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            MaybeTlsStream::Tls(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
        }
    }
}

/// A connection checked out of the pool, owned by one request at a time.
pub struct PooledConnection {
    sender: http1::SendRequest<Empty<Bytes>>,
    probe: Arc<FirstByteProbe>,
    target: Target,
}

impl PooledConnection {
    pub fn sender(&mut self) -> &mut http1::SendRequest<Empty<Bytes>> {
        &mut self.sender
    }

    pub fn probe(&self) -> &FirstByteProbe {
        &self.probe
    }

    fn is_usable(&self) -> bool {
        !self.sender.is_closed()
    }
}

struct IdleConnection {
    conn: PooledConnection,
    since: Instant,
}

#[derive(Default)]
struct IdleConnections {
    by_target: HashMap<Target, VecDeque<IdleConnection>>,
    total: usize,
}

impl IdleConnections {
    /// Most recently parked usable connection for `target`.
    fn pop(&mut self, target: &Target) -> Option<PooledConnection> {
        let queue = self.by_target.get_mut(target)?;
        let mut found = None;
        while let Some(entry) = queue.pop_back() {
            self.total -= 1;
            if entry.conn.is_usable() {
                found = Some(entry.conn);
                break;
            }
        }
        if queue.is_empty() {
            self.by_target.remove(target);
        }
        found
    }

    fn push(&mut self, conn: PooledConnection, max_per_target: usize, max_total: usize) -> bool {
        let parked = self.by_target.get(&conn.target).map_or(0, VecDeque::len);
        if max_total == 0 || parked >= max_per_target {
            return false;
        }
        while self.total >= max_total && self.total > 0 {
            self.evict_oldest();
        }
        self.by_target
            .entry(conn.target.clone())
            .or_default()
            .push_back(IdleConnection {
                conn,
                since: Instant::now(),
            });
        self.total += 1;
        true
    }

    fn evict_expired(&mut self, idle_timeout: Duration) {
        let now = Instant::now();
        let mut evicted = 0;
        self.by_target.retain(|_, queue| {
            let before = queue.len();
            queue.retain(|entry| {
                now.saturating_duration_since(entry.since) < idle_timeout && entry.conn.is_usable()
            });
            evicted += before - queue.len();
            !queue.is_empty()
        });
        self.total -= evicted;
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .by_target
            .iter()
            .filter_map(|(target, queue)| queue.front().map(|entry| (target.clone(), entry.since)))
            .min_by_key(|(_, since)| *since)
            .map(|(target, _)| target);

        if let Some(target) = oldest {
            if let Some(queue) = self.by_target.get_mut(&target) {
                queue.pop_front();
                self.total -= 1;
                if queue.is_empty() {
                    self.by_target.remove(&target);
                }
            }
        }
    }
}

/// Shared, bounded pool of client connections.
pub struct ConnectionPool {
    config: PoolConfig,
    tls: Option<TlsConnector>,
    idle: Mutex<IdleConnections>,
}

impl ConnectionPool {
    /// Build a pool. With `secure` set, a TLS connector trusting the Mozilla
    /// root set is prepared for `https` targets.
    pub fn new(config: PoolConfig, secure: bool) -> Result<Self, StorageError> {
        let tls = if secure {
            Some(build_tls_connector()?)
        } else {
            None
        };

        Ok(Self {
            config,
            tls,
            idle: Mutex::new(IdleConnections::default()),
        })
    }

    /// Number of connections currently parked.
    pub fn idle_count(&self) -> usize {
        self.idle.lock().total
    }

    /// Take an idle connection for `target`, or dial a new one.
    ///
    /// The returned flag is true when the connection was reused.
    pub async fn checkout(&self, target: &Target) -> Result<(PooledConnection, bool), StorageError> {
        let reused = {
            let mut idle = self.idle.lock();
            idle.evict_expired(self.config.idle_timeout);
            idle.pop(target)
        };

        match reused {
            Some(conn) => Ok((conn, true)),
            None => Ok((self.dial(target).await?, false)),
        }
    }

    /// Park a connection whose last response was fully read.
    pub fn checkin(&self, conn: PooledConnection) {
        if !conn.is_usable() {
            debug!("Dropping closed connection to {}", conn.target);
            return;
        }

        let mut idle = self.idle.lock();
        idle.evict_expired(self.config.idle_timeout);
        if !idle.push(conn, self.config.max_idle_per_host, self.config.max_idle) {
            debug!("Idle cap reached, closing connection");
        }
    }

    async fn dial(&self, target: &Target) -> Result<PooledConnection, StorageError> {
        let addr = target.authority();

        let stream = timeout(self.config.dial_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| StorageError::Timeout {
                phase: "dial",
                timeout: self.config.dial_timeout,
            })?
            .map_err(|source| StorageError::Connect {
                addr: addr.clone(),
                source,
            })?;

        configure_socket(&stream, self.config.keep_alive).map_err(|source| {
            StorageError::Connect {
                addr: addr.clone(),
                source,
            }
        })?;

        let inner = match target.scheme {
            Scheme::Http => MaybeTlsStream::Plain(stream),
            Scheme::Https => {
                let connector = self.tls.as_ref().ok_or_else(|| {
                    StorageError::InvalidLocation(format!(
                        "{} requires TLS but the pool was built without it",
                        target
                    ))
                })?;
                let server_name = ServerName::try_from(target.host.clone()).map_err(|e| {
                    StorageError::InvalidLocation(format!("{}: {}", target.host, e))
                })?;

                let tls = timeout(
                    self.config.handshake_timeout,
                    connector.connect(server_name, stream),
                )
                .await
                .map_err(|_| StorageError::Timeout {
                    phase: "TLS handshake",
                    timeout: self.config.handshake_timeout,
                })?
                .map_err(|source| StorageError::Tls {
                    host: target.host.clone(),
                    source,
                })?;
                MaybeTlsStream::Tls(Box::new(tls))
            }
        };

        let probe = Arc::new(FirstByteProbe::default());
        let io = TokioIo::new(ProbedStream {
            inner,
            probe: Arc::clone(&probe),
        });
        let (sender, connection) = http1::handshake(io).await?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                debug!("Connection to {} terminated: {}", addr, e);
            }
        });

        debug!("Dialed new connection to {}", target);
        Ok(PooledConnection {
            sender,
            probe,
            target: target.clone(),
        })
    }
}

fn configure_socket(stream: &TcpStream, keep_alive: Duration) -> io::Result<()> {
    stream.set_nodelay(true)?;
    let keepalive = TcpKeepalive::new().with_time(keep_alive);
    SockRef::from(stream).set_tcp_keepalive(&keepalive)
}

fn build_tls_connector() -> Result<TlsConnector, StorageError> {
    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()?
    .with_root_certificates(roots)
    .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(config)))
}
