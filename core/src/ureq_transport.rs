//! `Transport` backed by a blocking `ureq` agent.
//!
//! Requests run on tokio's blocking pool so `send` can be awaited. The agent
//! is configured not to turn 4xx/5xx into errors; those come back as data and
//! the pipeline classifies them. Response bodies are read in full with no size
//! cap.

use std::io::{self, Read, Write};
use std::sync::mpsc::{self, Receiver, SyncSender};

use async_trait::async_trait;
use ureq::{Agent, RequestBuilder, SendBody};

use crate::error::{TransportError, TransportErrorKind};
use crate::http::{HttpRequest, HttpResponse, Method};
use crate::transport::{Faucet, Transport, TransportConfig};

/// Chunks buffered between a faucet writer and the request thread.
const FAUCET_CHUNKS: usize = 16;

/// `Transport` over a shared `ureq::Agent`.
///
/// `send` hands the blocking call to the current tokio runtime's blocking
/// pool. Polled outside a tokio runtime it runs the call inline on the
/// polling thread instead.
#[derive(Clone)]
pub struct UreqTransport {
    agent: Agent,
    user_agent: String,
}

impl UreqTransport {
    pub fn new(config: &TransportConfig) -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(config.timeout)
            .build()
            .new_agent();
        Self {
            agent,
            user_agent: config.user_agent.clone(),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(&TransportConfig::default())
    }
}

#[async_trait]
impl Transport for UreqTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let transport = self.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle
                .spawn_blocking(move || transport.execute(request))
                .await
                .map_err(|e| TransportError::unknown("transport worker failed").with_source(e))?,
            Err(_) => transport.execute(request),
        }
    }

    fn open_faucet(&self, request: HttpRequest) -> Result<Faucet, TransportError> {
        if matches!(request.method, Method::Get | Method::Delete) {
            return Err(TransportError::unknown(format!(
                "{} requests cannot carry a body",
                request.method
            )));
        }

        let (tx, rx) = mpsc::sync_channel(FAUCET_CHUNKS);
        let end = tx.clone();
        let transport = self.clone();
        let url = request.url.clone();
        let worker = std::thread::spawn(move || transport.stream(request, PipeReader::new(rx)));

        // Dropping the faucet drops `end` unsent, which aborts the request.
        Ok(Faucet::new(url, PipeWriter { tx }, move || {
            // A failed send means the worker already stopped; its result says why.
            let _ = end.send(Chunk::End);
            drop(end);
            match worker.join() {
                Ok(outcome) => outcome,
                Err(_) => Err(TransportError::unknown("faucet worker panicked")),
            }
        }))
    }
}

impl UreqTransport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = request.url.as_str();
        let result = match (request.method, request.body.as_deref()) {
            (Method::Get, _) => self.decorate(self.agent.get(url), &request).call(),
            (Method::Delete, _) => self.decorate(self.agent.delete(url), &request).call(),
            (Method::Post, body) => send_optional(self.decorate(self.agent.post(url), &request), body),
            (Method::Put, body) => send_optional(self.decorate(self.agent.put(url), &request), body),
            (Method::Patch, body) => send_optional(self.decorate(self.agent.patch(url), &request), body),
        };
        let mut response = result.map_err(classify)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or_default().to_string()))
            .collect();
        let body = response
            .body_mut()
            .with_config()
            .limit(u64::MAX)
            .read_to_vec()
            .map_err(classify)?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    fn stream(&self, request: HttpRequest, mut reader: PipeReader) -> Result<u16, TransportError> {
        let url = request.url.as_str();
        let builder = match request.method {
            Method::Put => self.agent.put(url),
            Method::Patch => self.agent.patch(url),
            _ => self.agent.post(url),
        };
        let response = self
            .decorate(builder, &request)
            .send(SendBody::from_reader(&mut reader))
            .map_err(classify)?;
        Ok(response.status().as_u16())
    }

    /// The configured user agent is only sent when the request has none.
    fn decorate<B>(&self, mut builder: RequestBuilder<B>, request: &HttpRequest) -> RequestBuilder<B> {
        if request.header("user-agent").is_none() {
            builder = builder.header("user-agent", self.user_agent.as_str());
        }
        builder = builder.header("content-type", request.content_type.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder
    }
}

fn send_optional(
    builder: RequestBuilder<ureq::typestate::WithBody>,
    body: Option<&str>,
) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    match body {
        Some(body) => builder.send(body.as_bytes()),
        None => builder.send_empty(),
    }
}

/// Map ureq's error onto the transport taxonomy.
fn classify(err: ureq::Error) -> TransportError {
    let kind = match &err {
        ureq::Error::Timeout(_) => TransportErrorKind::Timeout,
        ureq::Error::Io(e) if e.kind() == io::ErrorKind::TimedOut => TransportErrorKind::Timeout,
        ureq::Error::Tls(_) => TransportErrorKind::SecureChannel,
        ureq::Error::StatusCode(code) => TransportErrorKind::Protocol(Some(*code)),
        _ => TransportErrorKind::Unknown,
    };
    TransportError::new(kind, err.to_string()).with_source(err)
}

enum Chunk {
    Data(Vec<u8>),
    /// The body is complete.
    End,
}

struct PipeWriter {
    tx: SyncSender<Chunk>,
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.tx
            .send(Chunk::Data(buf.to_vec()))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "request ended before body was written"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Reads what a `PipeWriter` sent. The body only ends cleanly on
/// `Chunk::End`; a channel closed without it is an aborted upload.
struct PipeReader {
    rx: Receiver<Chunk>,
    chunk: Vec<u8>,
    pos: usize,
    done: bool,
}

impl PipeReader {
    fn new(rx: Receiver<Chunk>) -> Self {
        Self {
            rx,
            chunk: Vec::new(),
            pos: 0,
            done: false,
        }
    }
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pos == self.chunk.len() {
            if self.done {
                return Ok(0);
            }
            match self.rx.recv() {
                Ok(Chunk::Data(chunk)) => {
                    self.chunk = chunk;
                    self.pos = 0;
                }
                Ok(Chunk::End) => self.done = true,
                Err(_) => {
                    return Err(io::Error::new(
                        io::ErrorKind::ConnectionAborted,
                        "faucet dropped before the body was finished",
                    ))
                }
            }
        }
        let n = buf.len().min(self.chunk.len() - self.pos);
        buf[..n].copy_from_slice(&self.chunk[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
