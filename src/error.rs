//! Single error taxonomy for the whole crate.
//!
//! Every fallible path (config, backend, update engine, both front-ends)
//! produces an [`Error`]. The DNS front-end maps it to an [`Rcode`] with
//! [`Error::to_rcode`]; the HTTP front-end maps it to a status code and a
//! JSON body with [`Error::to_http`].

use domain::base::iana::Rcode;
use serde::Serialize;
use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, ThisError)]
pub enum Error {
    /// The request could not be decoded, or named a shape we don't
    /// support (multiple questions, a non-SOA query, a non-empty
    /// prerequisite section, ...).
    #[error("malformed request: {0}")]
    Malformed(String),

    /// No TSIG / no credentials were presented at all.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Credentials were presented but do not authorize the request.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The request is well-formed and authorized but violates a policy
    /// invariant (wrong zone, TTL too low, apex delete-all, ...).
    #[error("rejected: {0}")]
    PolicyRejected(String),

    /// The backend failed to apply a committed set of operations.
    #[error("backend failure: {0}")]
    BackendFailure(String),

    /// The name or resource the request refers to is not known to us.
    #[error("not found: {0}")]
    NotFound(String),

    /// Anything else: config errors, io errors, internal bugs.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn policy_rejected(message: impl Into<String>) -> Self {
        Self::PolicyRejected(message.into())
    }

    pub fn backend_failure(message: impl Into<String>) -> Self {
        Self::BackendFailure(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// RFC 2136 response code for this error.
    pub fn to_rcode(&self) -> Rcode {
        match self {
            Error::Malformed(_) => Rcode::FORMERR,
            Error::Unauthenticated(_) | Error::Unauthorized(_) => Rcode::REFUSED,
            Error::PolicyRejected(_) => Rcode::NOTIMP,
            Error::NotFound(_) => Rcode::NXDOMAIN,
            Error::BackendFailure(_) | Error::Internal(_) => Rcode::SERVFAIL,
        }
    }

    /// HTTP status + JSON body for this error.
    pub fn to_http(&self) -> (u16, ErrorBody) {
        let status = match self {
            Error::Malformed(_) => 400,
            Error::Unauthenticated(_) => 403,
            Error::Unauthorized(_) => 403,
            Error::PolicyRejected(_) => 400,
            Error::NotFound(_) => 404,
            Error::BackendFailure(_) | Error::Internal(_) => 500,
        };
        (
            status,
            ErrorBody {
                error: self.kind_str().to_string(),
                message: self.reason().to_string(),
            },
        )
    }

    /// The message a caller gave us, without the variant-name prefix
    /// `to_string()` adds for logging — this is what goes in the JSON
    /// `message` field, matching the wording callers constructed (e.g.
    /// "TTL is too low, 60 < 120").
    fn reason(&self) -> &str {
        match self {
            Error::Malformed(m)
            | Error::Unauthenticated(m)
            | Error::Unauthorized(m)
            | Error::PolicyRejected(m)
            | Error::BackendFailure(m)
            | Error::NotFound(m)
            | Error::Internal(m) => m,
        }
    }

    fn kind_str(&self) -> &'static str {
        match self {
            Error::Malformed(_) => "malformed_request",
            Error::Unauthenticated(_) => "unauthenticated",
            Error::Unauthorized(_) => "unauthorized",
            Error::PolicyRejected(_) => "policy_rejected",
            Error::BackendFailure(_) => "backend_failure",
            Error::NotFound(_) => "not_found",
            Error::Internal(_) => "internal_error",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl From<serde_yaml::Error> for Error {
    fn from(value: serde_yaml::Error) -> Self {
        Self::internal(format!("config parse error: {value}"))
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::internal(format!("io error: {value}"))
    }
}

impl From<domain::base::name::FromStrError> for Error {
    fn from(value: domain::base::name::FromStrError) -> Self {
        Self::malformed(format!("invalid domain name: {value}"))
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::malformed(format!("invalid json: {value}"))
    }
}
