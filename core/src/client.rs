//! The request pipeline: build, send, normalize.
//!
//! # Design
//! `Fitting` holds only its collaborators (a `Transport` and a `Logger`) and
//! carries no state between calls. One invocation of `send_request` walks a
//! fixed sequence:
//!
//! 1. `prepare` validates the descriptor and produces an `HttpRequest`. A
//!    missing base path or method is the only error ever returned as `Err`.
//! 2. The transport sends the request. This is the only await point.
//! 3. `normalize` turns whatever happened into a `FittingResponse`, stamping
//!    the response time last. Transport and decoding failures end up in the
//!    envelope with `Health::Bad`; they never escape.

use std::sync::Arc;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::descriptor::{upsert_header, RequestDescriptor};
use crate::error::{error_context, Failure, FittingError, TransportError};
use crate::http::{HttpRequest, HttpResponse, Method};
use crate::logger::{Logger, NoopLogger};
use crate::response::{FittingResponse, Outcome};
use crate::transport::{Faucet, Transport};
use crate::ureq_transport::UreqTransport;

/// Generic outbound request utility.
///
/// Cheap to clone; clones share the same transport and logger.
#[derive(Clone)]
pub struct Fitting {
    transport: Arc<dyn Transport>,
    logger: Arc<dyn Logger>,
}

impl Fitting {
    /// Pipeline over `transport` with logging disabled.
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Arc::new(transport),
            logger: Arc::new(NoopLogger),
        }
    }

    pub fn with_logger(mut self, logger: impl Logger + 'static) -> Self {
        self.logger = Arc::new(logger);
        self
    }

    /// Validate `descriptor` and build the request the transport will send.
    ///
    /// POST and PUT get the parameters as an indented JSON body; the other
    /// methods never carry one. A `Content-Type` entry among the headers is
    /// used when the descriptor has no content type of its own.
    pub fn prepare(&self, descriptor: &RequestDescriptor) -> Result<HttpRequest, FittingError> {
        let method = validate(descriptor)?;

        let mut headers = Vec::with_capacity(descriptor.headers.len());
        let mut header_content_type = None;
        for (name, value) in &descriptor.headers {
            if name.eq_ignore_ascii_case("content-type") {
                header_content_type = Some(value.clone());
            } else {
                upsert_header(&mut headers, name.clone(), value.clone());
            }
        }

        let content_type = match (descriptor.content_type.as_deref(), header_content_type) {
            (Some(ct), _) if !ct.is_empty() => ct.to_string(),
            (_, Some(ct)) if !ct.is_empty() => ct,
            _ => descriptor.effective_content_type().to_string(),
        };

        // `{:#}` is serde_json's indented form.
        let body = method
            .carries_body()
            .then(|| format!("{:#}", Value::Object(descriptor.parameters.clone())));

        let request = HttpRequest {
            method,
            url: descriptor.target(),
            content_type,
            headers,
            body,
        };
        tracing::debug!(method = %request.method, url = %request.url, "prepared request");
        Ok(request)
    }

    /// Send the request `descriptor` describes and decode the JSON response
    /// into `T`.
    ///
    /// Returns `Err` only for an invalid descriptor, before any I/O. Every
    /// other outcome is reported through the envelope's health.
    pub async fn send_request<T: DeserializeOwned>(
        &self,
        descriptor: &RequestDescriptor,
    ) -> Result<FittingResponse<T>, FittingError> {
        let request = self.prepare(descriptor)?;
        let target = request.url.clone();
        let request_utc = Utc::now();

        tracing::debug!(method = %request.method, url = %target, "sending request");
        let sent = self.transport.send(request).await;
        let outcome = self.normalize(&target, sent);

        Ok(FittingResponse::finalize(request_utc, outcome))
    }

    /// `send_request` decoding into an untyped JSON tree.
    pub async fn send_request_json(
        &self,
        descriptor: &RequestDescriptor,
    ) -> Result<FittingResponse<Value>, FittingError> {
        self.send_request(descriptor).await
    }

    /// Validate `descriptor` and return the raw outgoing body stream.
    ///
    /// Nothing is decoded and no envelope is produced; the caller writes the
    /// payload and calls [`Faucet::finish`].
    pub fn open_faucet(&self, descriptor: &RequestDescriptor) -> Result<Faucet, FittingError> {
        let mut request = self.prepare(descriptor)?;
        request.body = None;
        tracing::debug!(method = %request.method, url = %request.url, "opening faucet");
        self.transport.open_faucet(request).map_err(FittingError::Faucet)
    }

    /// Classify the transport result, decode on success and log either way.
    fn normalize<T: DeserializeOwned>(
        &self,
        target: &str,
        sent: Result<HttpResponse, TransportError>,
    ) -> Outcome<T> {
        match sent.and_then(check_status).map_err(Failure::from).and_then(decode::<T>) {
            Ok(value) => {
                self.logger.info(&format!("send_request succeeded for {target}"));
                Outcome::Success(value)
            }
            Err(failure) => {
                let diagnostic = failure.diagnostic();
                self.logger
                    .error(&format!("{diagnostic}\n{failure}\n{}", error_context(&failure)));
                Outcome::Failure(failure)
            }
        }
    }
}

impl Default for Fitting {
    fn default() -> Self {
        Self::new(UreqTransport::default())
    }
}

impl std::fmt::Debug for Fitting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fitting").finish_non_exhaustive()
    }
}

fn validate(descriptor: &RequestDescriptor) -> Result<Method, FittingError> {
    if descriptor.base_path.is_empty() {
        return Err(FittingError::MissingField("base_path"));
    }
    descriptor.method.ok_or(FittingError::MissingField("method"))
}

/// Non-2xx responses are protocol errors even when the transport returned
/// them as data.
fn check_status(response: HttpResponse) -> Result<HttpResponse, TransportError> {
    if response.is_success() {
        return Ok(response);
    }
    Err(TransportError::protocol(
        Some(response.status),
        format!("remote endpoint answered with status {}", response.status),
    ))
}

/// An empty body decodes as JSON `null`. Bytes that are not UTF-8 fail here
/// like any other malformed JSON.
fn decode<T: DeserializeOwned>(response: HttpResponse) -> Result<T, Failure> {
    let body = &response.body;
    let bytes: &[u8] = if body.iter().all(u8::is_ascii_whitespace) { b"null" } else { body };
    serde_json::from_slice(bytes).map_err(Failure::Decode)
}
