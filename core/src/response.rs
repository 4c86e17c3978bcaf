//! The envelope returned by every `Fitting::send_request` call.
//!
//! # Design
//! The envelope is always produced, whatever happened on the wire. Callers
//! check `status().health()` (or `is_good()`) instead of matching on an error.
//! Fields are private so an envelope can only come out of the normalizer with
//! both timestamps stamped and `response_utc >= request_utc`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Failure;

/// Binary outcome of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Health {
    Good,
    Bad,
}

/// Health plus the two UTC timestamps bracketing the invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseStatus {
    health: Health,
    #[serde(rename = "requestUtcDateTime")]
    request_utc: DateTime<Utc>,
    #[serde(rename = "responseUtcDateTime")]
    response_utc: DateTime<Utc>,
}

impl ResponseStatus {
    pub fn health(&self) -> Health {
        self.health
    }

    /// Taken just before the request was handed to the transport.
    pub fn request_utc(&self) -> DateTime<Utc> {
        self.request_utc
    }

    /// Taken as the last step of the invocation.
    pub fn response_utc(&self) -> DateTime<Utc> {
        self.response_utc
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.response_utc - self.request_utc
    }
}

/// Tagged result the normalizer consumes.
#[derive(Debug)]
pub(crate) enum Outcome<T> {
    Success(T),
    Failure(Failure),
}

/// Status, decoded result and, on failure, the failure itself.
#[derive(Debug, Serialize)]
pub struct FittingResponse<T> {
    status: ResponseStatus,
    result: Option<T>,
    #[serde(skip)]
    failure: Option<Failure>,
}

impl<T> FittingResponse<T> {
    /// Stamp the response time and fold `outcome` into an envelope.
    pub(crate) fn finalize(request_utc: DateTime<Utc>, outcome: Outcome<T>) -> Self {
        let (health, result, failure) = match outcome {
            Outcome::Success(value) => (Health::Good, Some(value), None),
            Outcome::Failure(failure) => (Health::Bad, None, Some(failure)),
        };
        // Wall clock can step backwards; never report a negative duration.
        let response_utc = Utc::now().max(request_utc);
        Self {
            status: ResponseStatus {
                health,
                request_utc,
                response_utc,
            },
            result,
            failure,
        }
    }

    pub fn status(&self) -> &ResponseStatus {
        &self.status
    }

    pub fn is_good(&self) -> bool {
        self.status.health == Health::Good
    }

    pub fn result(&self) -> Option<&T> {
        self.result.as_ref()
    }

    pub fn into_result(self) -> Option<T> {
        self.result
    }

    pub fn failure(&self) -> Option<&Failure> {
        self.failure.as_ref()
    }

    /// The fixed diagnostic line of the failure, if any.
    pub fn diagnostic(&self) -> Option<String> {
        self.failure.as_ref().map(Failure::diagnostic)
    }

    pub fn into_parts(self) -> (ResponseStatus, Option<T>, Option<Failure>) {
        (self.status, self.result, self.failure)
    }
}
