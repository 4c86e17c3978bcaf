//! Error types for the request pipeline.
//!
//! # Design
//! Two families live here. `FittingError` is the only error a caller ever
//! receives as `Err`: it is raised while validating a descriptor, before any
//! I/O happens. Everything that can go wrong afterwards is a `Failure`, which
//! the normalizer attaches to the returned envelope instead of propagating.
//! `TransportError` is what a `Transport` reports; its `TransportErrorKind`
//! drives the diagnostic the normalizer picks.

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors raised to the caller of `Fitting`.
#[derive(Debug, Error)]
pub enum FittingError {
    /// A required descriptor field (base path or method) is empty.
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    /// The method text does not name a supported HTTP method.
    #[error("unsupported HTTP method `{0}`")]
    UnsupportedMethod(String),

    /// The transport could not open an outgoing body stream.
    #[error("failed to open faucet: {0}")]
    Faucet(#[source] TransportError),
}

/// Classification a transport attaches to every failure it reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The transport gave up waiting within its own time budget.
    Timeout,
    /// TLS handshake or certificate failure.
    SecureChannel,
    /// The remote end answered with a non-success status.
    Protocol(Option<u16>),
    Unknown,
}

/// A failure reported by a `Transport`.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    pub fn secure_channel(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::SecureChannel, message)
    }

    pub fn protocol(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Protocol(status), message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Unknown, message)
    }

    /// Attach the underlying error so it shows up in the logged context.
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    /// Status code of a protocol error, when the transport could read one.
    pub fn status_code(&self) -> Option<u16> {
        match self.kind {
            TransportErrorKind::Protocol(status) => status,
            _ => None,
        }
    }
}

/// Coarse failure taxonomy used to pick a diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    SecureChannelFailure,
    ProtocolError,
    UnknownTransportFailure,
    GenericFailure,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Timeout => "timeout",
            FailureKind::SecureChannelFailure => "secure channel failure",
            FailureKind::ProtocolError => "protocol error",
            FailureKind::UnknownTransportFailure => "unknown transport failure",
            FailureKind::GenericFailure => "generic failure",
        };
        f.write_str(name)
    }
}

/// A failure folded into a `FittingResponse` rather than raised.
#[derive(Debug, Error)]
pub enum Failure {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The response body was not JSON of the requested shape.
    #[error("failed to decode response body: {0}")]
    Decode(#[source] serde_json::Error),
}

impl Failure {
    pub fn kind(&self) -> FailureKind {
        match self {
            Failure::Transport(e) => match e.kind() {
                TransportErrorKind::Timeout => FailureKind::Timeout,
                TransportErrorKind::SecureChannel => FailureKind::SecureChannelFailure,
                TransportErrorKind::Protocol(_) => FailureKind::ProtocolError,
                TransportErrorKind::Unknown => FailureKind::UnknownTransportFailure,
            },
            Failure::Decode(_) => FailureKind::GenericFailure,
        }
    }

    /// Status code carried by a protocol failure.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Failure::Transport(e) => e.status_code(),
            _ => None,
        }
    }

    /// Fixed diagnostic line for this failure's kind.
    pub fn diagnostic(&self) -> String {
        match self.kind() {
            FailureKind::Timeout => "send_request failed due to a timeout".to_string(),
            FailureKind::SecureChannelFailure => {
                "send_request failed due to an SSL/TLS error".to_string()
            }
            FailureKind::ProtocolError => match self.status_code() {
                Some(code) => format!("send_request failed with status code {code}"),
                None => "send_request failed with a protocol error".to_string(),
            },
            FailureKind::UnknownTransportFailure => {
                "send_request failed due to an unknown transport error".to_string()
            }
            FailureKind::GenericFailure => {
                "send_request failed with an unexpected error".to_string()
            }
        }
    }
}

/// Render the `source()` chain below `err`, one cause per line.
pub(crate) fn error_context(err: &dyn StdError) -> String {
    let mut lines = Vec::new();
    let mut current = err.source();
    while let Some(cause) = current {
        lines.push(format!("caused by: {cause}"));
        current = cause.source();
    }
    if lines.is_empty() {
        "no further context".to_string()
    } else {
        lines.join("\n")
    }
}
