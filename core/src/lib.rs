//! Generic outbound HTTP request utility.
//!
//! # Overview
//! A caller describes a request with a `RequestDescriptor` and hands it to a
//! `Fitting`, which builds the request, sends it through a `Transport` and
//! always returns a `FittingResponse` envelope. Transport and decoding
//! failures are folded into the envelope's `Health`; only an invalid
//! descriptor comes back as `Err`.
//!
//! # Design
//! - `Fitting` is stateless apart from its collaborators: an
//!   `Arc<dyn Transport>` and an `Arc<dyn Logger>` (no-op by default).
//! - The pipeline is split at the I/O boundary: `prepare` produces a plain
//!   `HttpRequest`, the transport returns a plain `HttpResponse`, and the
//!   normalizer never sees transport internals. Tests swap in stubs.
//! - `UreqTransport` is the built-in transport; it runs `ureq` on tokio's
//!   blocking pool.
//! - The decoded result type is chosen per call: `send_request::<T>()`.

pub mod client;
pub mod descriptor;
pub mod error;
pub mod http;
pub mod logger;
pub mod response;
pub mod transport;
pub mod ureq_transport;

pub use client::Fitting;
pub use descriptor::{RequestDescriptor, DEFAULT_CONTENT_TYPE};
pub use error::{Failure, FailureKind, FittingError, TransportError, TransportErrorKind};
pub use http::{HttpRequest, HttpResponse, Method};
pub use logger::{Logger, NoopLogger, TracingLogger};
pub use response::{FittingResponse, Health, ResponseStatus};
pub use transport::{Faucet, Transport, TransportConfig};
pub use ureq_transport::UreqTransport;
