use crate::{Error, Result};
use async_trait::async_trait;
use log::{error, info, warn};
use std::{fmt, io, time::Duration};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
    time,
};

/// How often and how patiently `Connection::ensure` tries to reach the display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total number of connection attempts before giving up.
    pub attempts: u32,
    /// Growth factor of the delay between two attempts.
    pub base: f64,
    /// Delay before the second attempt, later delays are `unit * base^n`.
    pub unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            base: 1.3,
            unit: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// The pause after the failed attempt with the zero based index `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        // A base below one would shrink the delays
        let factor = self.base.max(1.0).powi(exponent);
        Duration::try_from_secs_f64(self.unit.as_secs_f64() * factor).unwrap_or(Duration::MAX)
    }
}

/// Opens the byte stream a `Connection` talks through.
#[async_trait]
pub trait Connector: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    async fn connect(&self, hostport: &str) -> io::Result<Self::Stream>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, hostport: &str) -> io::Result<TcpStream> {
        let stream = TcpStream::connect(hostport).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

/// A lazily established, self healing stream to the display.
///
/// Nothing is opened until the first `read` or `write_all`. A transport error
/// that means the peer went away drops the stream, and the next call starts
/// over with a fresh round of connection attempts. Retries only ever happen
/// while connecting, a failed read or write is reported as is.
pub struct Connection<C: Connector = TcpConnector> {
    hostport: String,
    connector: C,
    policy: RetryPolicy,
    transport: Option<C::Stream>,
}

impl<C: Connector> fmt::Debug for Connection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("hostport", &self.hostport)
            .field("policy", &self.policy)
            .field("connected", &self.transport.is_some())
            .finish()
    }
}

impl Connection<TcpConnector> {
    pub fn new(hostport: impl Into<String>) -> Self {
        Self::with_connector(hostport, TcpConnector)
    }
}

impl<C: Connector> Connection<C> {
    pub fn with_connector(hostport: impl Into<String>, connector: C) -> Self {
        Self {
            hostport: hostport.into(),
            connector,
            policy: RetryPolicy::default(),
            transport: None,
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn hostport(&self) -> &str {
        &self.hostport
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Returns the open transport, connecting first if there is none.
    pub async fn ensure(&mut self) -> Result<&mut C::Stream> {
        let transport = match self.transport.take() {
            Some(transport) => transport,
            None => connect(&self.connector, &self.hostport, self.policy).await?,
        };
        Ok(self.transport.insert(transport))
    }

    /// Reads from the display. A read of zero bytes into a non empty buffer
    /// means the display hung up, the transport is dropped in that case.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let result = self.ensure().await?.read(buf).await;
        match result {
            Ok(0) if !buf.is_empty() => {
                warn!("Display at {} closed the connection", self.hostport);
                self.transport = None;
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) => Err(self.fail(e)),
        }
    }

    pub async fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        let result = self.ensure().await?.write_all(buf).await;
        result.map_err(|e| self.fail(e))
    }

    /// Drops the transport. Closing a connection that is not open does nothing.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(mut transport) = self.transport.take() {
            transport.shutdown().await.map_err(|source| Error::Io {
                hostport: self.hostport.clone(),
                source,
            })?;
            info!("Closed connection to display at {}", self.hostport);
        }
        Ok(())
    }

    fn fail(&mut self, source: io::Error) -> Error {
        if is_disconnect(&source) {
            warn!(
                "Lost connection to display at {}: {}",
                self.hostport, source
            );
            self.transport = None;
        }
        Error::Io {
            hostport: self.hostport.clone(),
            source,
        }
    }
}

/// Runs one round of connection attempts against `hostport`.
async fn connect<C: Connector>(
    connector: &C,
    hostport: &str,
    policy: RetryPolicy,
) -> Result<C::Stream> {
    let attempts = policy.attempts;
    let mut last_error = None;

    for attempt in 0..attempts {
        match connector.connect(hostport).await {
            Ok(stream) => {
                info!("Connected to display at {}", hostport);
                return Ok(stream);
            }
            Err(e) => {
                warn!(
                    "Failed to connect to display at {} (attempt {}/{}): {}",
                    hostport,
                    attempt + 1,
                    attempts,
                    e
                );
                last_error = Some(e);
            }
        }

        // Sleeping after the last attempt would only delay the error
        if attempt + 1 < attempts {
            time::sleep(policy.delay(attempt)).await;
        }
    }

    error!(
        "Giving up on display at {} after {} attempts",
        hostport, attempts
    );
    Err(Error::Connect {
        hostport: hostport.to_owned(),
        attempts,
        source: last_error
            .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "no attempts allowed")),
    })
}

fn is_disconnect(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
    )
}
