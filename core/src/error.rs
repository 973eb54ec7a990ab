//! Error types for the TribeHR connector.
//!
//! # Design
//! Sending a request can fail in exactly one way: the transport never
//! obtained an HTTP status code. Everything the server answers with, 4xx and
//! 5xx included, comes back as an ordinary `ResponseResult` and is left to
//! the caller to interpret. The remaining variants cover building a client
//! or a payload, before any request exists.

use thiserror::Error;

/// Numeric transport error codes.
///
/// The numbering follows libcurl's `CURLcode` table so callers porting
/// existing error handling can keep matching on the same values.
pub mod code {
    /// No response was received and the transport gave no reason.
    pub const UNKNOWN: i32 = 0;
    pub const URL_MALFORMAT: i32 = 3;
    pub const COULDNT_RESOLVE_HOST: i32 = 6;
    pub const COULDNT_CONNECT: i32 = 7;
    pub const READ_ERROR: i32 = 26;
    pub const OPERATION_TIMEDOUT: i32 = 28;
    pub const SSL_CONNECT_ERROR: i32 = 35;
    pub const BAD_FUNCTION_ARGUMENT: i32 = 43;
    pub const TOO_MANY_REDIRECTS: i32 = 47;
    pub const RECV_ERROR: i32 = 56;
}

/// Errors returned by the connector.
#[derive(Error, Debug)]
pub enum Error {
    /// The request produced no HTTP status code (DNS, connect, TLS, timeout,
    /// redirect limit, unreadable upload file).
    #[error("An error occurred while connecting to TribeHR: {description} ({code})")]
    Transport { description: String, code: i32 },

    /// Missing or invalid client configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A JSON payload nests deeper than the normalizer accepts.
    #[error("payload nesting exceeds {limit} levels")]
    PayloadTooDeep { limit: usize },
}

impl Error {
    pub fn transport(description: impl Into<String>, code: i32) -> Self {
        Error::Transport {
            description: description.into(),
            code,
        }
    }

    /// The numeric transport code, if this is a transport failure.
    pub fn transport_code(&self) -> Option<i32> {
        match self {
            Error::Transport { code, .. } => Some(*code),
            _ => None,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_message_embeds_description_and_code() {
        let err = Error::transport("Couldn't resolve host 'acme.mytribehr.com'", code::COULDNT_RESOLVE_HOST);
        assert_eq!(
            err.to_string(),
            "An error occurred while connecting to TribeHR: Couldn't resolve host 'acme.mytribehr.com' (6)"
        );
        assert_eq!(err.transport_code(), Some(6));
    }

    #[test]
    fn config_error_has_no_transport_code() {
        let err = Error::Config("TRIBEHR_SUBDOMAIN is not set".into());
        assert!(err.transport_code().is_none());
        assert!(err.to_string().contains("TRIBEHR_SUBDOMAIN"));
    }
}
