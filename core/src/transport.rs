//! The transport capability the pipeline calls to put requests on the wire.
//!
//! # Design
//! `Fitting` never touches sockets. It hands an `HttpRequest` to whatever
//! `Transport` it was built with and gets back either an `HttpResponse` or a
//! classified `TransportError`. The production implementation is
//! [`UreqTransport`](crate::UreqTransport); tests plug in stubs that record
//! what they were given.

use std::io::{self, Write};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse};

/// Issues prepared requests.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and read the whole response body.
    ///
    /// Transports may return non-2xx responses as data; the pipeline
    /// classifies them as protocol errors itself.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;

    /// Start `request` and hand back its body stream instead of a response.
    /// `request.body` is ignored.
    fn open_faucet(&self, request: HttpRequest) -> Result<Faucet, TransportError>;
}

type Completion = Box<dyn FnOnce() -> Result<u16, TransportError> + Send>;

/// Writable body stream of an in-flight request.
///
/// Call [`Faucet::finish`] to complete the body and wait for the remote
/// end's status code. Dropping an unfinished faucet abandons the request;
/// transports must not deliver the partial body as a complete one.
pub struct Faucet {
    url: String,
    writer: Option<Box<dyn Write + Send>>,
    completion: Option<Completion>,
}

impl Faucet {
    /// `writer` receives the body; `completion` runs after it is closed and
    /// reports the response status.
    pub fn new<W, F>(url: impl Into<String>, writer: W, completion: F) -> Self
    where
        W: Write + Send + 'static,
        F: FnOnce() -> Result<u16, TransportError> + Send + 'static,
    {
        Self {
            url: url.into(),
            writer: Some(Box::new(writer)),
            completion: Some(Box::new(completion)),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Flush and close the stream, then wait for the response status.
    pub fn finish(mut self) -> Result<u16, TransportError> {
        if let Some(mut writer) = self.writer.take() {
            writer
                .flush()
                .map_err(|e| TransportError::unknown("failed to flush faucet").with_source(e))?;
        }
        match self.completion.take() {
            Some(completion) => completion(),
            None => Err(TransportError::unknown("faucet already finished")),
        }
    }

    fn writer(&mut self) -> io::Result<&mut Box<dyn Write + Send>> {
        self.writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "faucet is closed"))
    }
}

impl Write for Faucet {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer()?.flush()
    }
}

impl Drop for Faucet {
    fn drop(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.flush();
        }
    }
}

impl std::fmt::Debug for Faucet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Faucet")
            .field("url", &self.url)
            .field("open", &self.writer.is_some())
            .finish()
    }
}

/// Settings for the built-in transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Deadline for a whole request, `None` to wait forever.
    pub timeout: Option<Duration>,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
            user_agent: concat!("pype/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl TransportConfig {
    /// Defaults overridden by `PYPE_TIMEOUT_MS` (`0` disables the deadline)
    /// and `PYPE_USER_AGENT`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(raw) = lookup("PYPE_TIMEOUT_MS") {
            match raw.trim().parse::<u64>() {
                Ok(0) => config.timeout = None,
                Ok(ms) => config.timeout = Some(Duration::from_millis(ms)),
                Err(e) => tracing::warn!(value = %raw, error = %e, "ignoring invalid PYPE_TIMEOUT_MS"),
            }
        }
        if let Some(agent) = lookup("PYPE_USER_AGENT").filter(|v| !v.trim().is_empty()) {
            config.user_agent = agent;
        }
        config
    }
}
