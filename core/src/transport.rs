//! Request execution.
//!
//! # Design
//! [`Transport`] is the only place that touches the network. It always
//! returns a [`TransferOutcome`]: a status code of `0` means no response was
//! obtained, and `failure` then says why. Turning that into a `Result` is the
//! client's job, so test transports can simulate failures by returning an
//! outcome rather than constructing errors.
//!
//! [`UreqTransport`] builds a fresh blocking agent for every call, so no
//! connection outlives the call that opened it.

use std::io;
use std::time::{Duration, Instant};

use ureq::http;
use ureq::tls::TlsConfig;
use ureq::{Agent, ResponseExt};

use crate::config::ClientConfig;
use crate::error::code;
use crate::http::{HttpRequest, RequestBody, TransferMeta};
use crate::multipart;

/// Connection settings applied to a single call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportOptions {
    pub connect_timeout: Duration,
    pub timeout: Duration,
    pub max_redirects: u32,
    /// Verify the server certificate and hostname.
    pub verify_tls: bool,
}

impl TransportOptions {
    pub fn from_config(config: &ClientConfig) -> Self {
        let https = config.origin().starts_with("https://");
        Self {
            connect_timeout: config.connect_timeout,
            timeout: config.timeout,
            max_redirects: config.max_redirects,
            verify_tls: !(https && config.danger_accept_invalid_certs),
        }
    }
}

/// Why a transfer produced no status code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFailure {
    pub description: String,
    pub code: i32,
}

/// Everything a transport observed while executing one request.
#[derive(Debug, Clone, Default)]
pub struct TransferOutcome {
    /// HTTP status, or `0` when none was received.
    pub code: u16,
    pub body: Vec<u8>,
    pub content_type: Option<String>,
    pub meta: TransferMeta,
    pub failure: Option<TransportFailure>,
}

impl TransferOutcome {
    pub fn failed(description: impl Into<String>, code: i32) -> Self {
        Self {
            failure: Some(TransportFailure {
                description: description.into(),
                code,
            }),
            ..Self::default()
        }
    }
}

/// Executes an [`HttpRequest`].
pub trait Transport {
    fn execute(&self, request: &HttpRequest, options: &TransportOptions) -> TransferOutcome;
}

impl<F> Transport for F
where
    F: Fn(&HttpRequest, &TransportOptions) -> TransferOutcome,
{
    fn execute(&self, request: &HttpRequest, options: &TransportOptions) -> TransferOutcome {
        self(request, options)
    }
}

/// Blocking transport backed by `ureq`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UreqTransport;

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest, options: &TransportOptions) -> TransferOutcome {
        let started = Instant::now();
        let agent = build_agent(options);

        let result = match dispatch(&agent, request) {
            Ok(response) => read_response(response),
            Err(failure) => Err(failure),
        };

        match result {
            Ok(mut outcome) => {
                outcome.meta.total_time = started.elapsed();
                outcome
            }
            Err(failure) => {
                tracing::warn!(
                    method = %request.method,
                    url = %request.url,
                    code = failure.code,
                    "transfer failed: {}",
                    failure.description
                );
                TransferOutcome {
                    failure: Some(failure),
                    meta: TransferMeta {
                        effective_url: request.url.clone(),
                        total_time: started.elapsed(),
                        ..TransferMeta::default()
                    },
                    ..TransferOutcome::default()
                }
            }
        }
    }
}

fn build_agent(options: &TransportOptions) -> Agent {
    let tls = TlsConfig::builder()
        .disable_verification(!options.verify_tls)
        .build();

    Agent::config_builder()
        .http_status_as_error(false)
        .max_redirects(options.max_redirects)
        .save_redirect_history(true)
        .timeout_connect(Some(options.connect_timeout))
        .timeout_global(Some(options.timeout))
        .tls_config(tls)
        .allow_non_standard_methods(true)
        .build()
        .new_agent()
}

fn dispatch(
    agent: &Agent,
    request: &HttpRequest,
) -> Result<http::Response<ureq::Body>, TransportFailure> {
    let method = http::Method::from_bytes(request.method.as_str().as_bytes()).map_err(|e| TransportFailure {
        description: format!("invalid request method {:?}: {e}", request.method.as_str()),
        code: code::BAD_FUNCTION_ARGUMENT,
    })?;

    let mut builder = http::Request::builder().method(method).uri(request.url.as_str());
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    let sent = match &request.body {
        None => agent.run(builder.body(()).map_err(malformed)?),
        Some(RequestBody::Encoded(encoded)) => agent.run(builder.body(encoded.clone().into_bytes()).map_err(malformed)?),
        Some(RequestBody::Multipart(entries)) => {
            let form = multipart::form(entries).map_err(read_failure)?;
            agent.run(builder.body(form).map_err(malformed)?)
        }
    };

    sent.map_err(|e| failure_from(&e))
}

fn read_response(mut response: http::Response<ureq::Body>) -> Result<TransferOutcome, TransportFailure> {
    let code = response.status().as_u16();
    let content_type = response
        .headers()
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let headers = response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    let redirect_count = response
        .get_redirect_history()
        .map(|history| history.len().saturating_sub(1) as u32)
        .unwrap_or(0);
    let effective_url = response.get_uri().to_string();
    let http_version = format!("{:?}", response.version());

    // ureq caps read_to_vec at 10 MiB unless told otherwise.
    let body = response
        .body_mut()
        .with_config()
        .limit(u64::MAX)
        .read_to_vec()
        .map_err(|e| failure_from(&e))?;

    Ok(TransferOutcome {
        code,
        content_type,
        meta: TransferMeta {
            effective_url,
            http_version,
            redirect_count,
            total_time: Duration::ZERO,
            size_download: body.len() as u64,
            headers,
        },
        body,
        failure: None,
    })
}

fn malformed(e: http::Error) -> TransportFailure {
    TransportFailure {
        description: format!("malformed request: {e}"),
        code: code::URL_MALFORMAT,
    }
}

fn read_failure(e: io::Error) -> TransportFailure {
    TransportFailure {
        description: e.to_string(),
        code: code::READ_ERROR,
    }
}

/// Classify a `ureq` error into a numeric transport code.
fn failure_from(err: &ureq::Error) -> TransportFailure {
    let code = match err {
        ureq::Error::HostNotFound => code::COULDNT_RESOLVE_HOST,
        ureq::Error::ConnectionFailed => code::COULDNT_CONNECT,
        ureq::Error::Timeout(_) => code::OPERATION_TIMEDOUT,
        ureq::Error::TooManyRedirects => code::TOO_MANY_REDIRECTS,
        ureq::Error::BadUri(_) | ureq::Error::Http(_) => code::URL_MALFORMAT,
        ureq::Error::Tls(_) | ureq::Error::Rustls(_) => code::SSL_CONNECT_ERROR,
        ureq::Error::Io(e) if is_tls_failure(e) => code::SSL_CONNECT_ERROR,
        ureq::Error::Io(e) => match e.kind() {
            io::ErrorKind::ConnectionRefused | io::ErrorKind::AddrNotAvailable => code::COULDNT_CONNECT,
            io::ErrorKind::TimedOut => code::OPERATION_TIMEDOUT,
            _ => code::RECV_ERROR,
        },
        _ => code::RECV_ERROR,
    };
    TransportFailure {
        description: err.to_string(),
        code,
    }
}

/// rustls reports handshake failures, certificate rejection included, as an
/// `InvalidData` I/O error wrapping a [`rustls::Error`].
fn is_tls_failure(err: &io::Error) -> bool {
    err.get_ref()
        .is_some_and(|inner| inner.downcast_ref::<rustls::Error>().is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Protocol;
    use crate::http::HttpMethod;

    #[test]
    fn options_verify_tls_by_default() {
        let config = ClientConfig::new("acme", "admin", "key");
        let options = TransportOptions::from_config(&config);
        assert!(options.verify_tls);
        assert_eq!(options.connect_timeout, Duration::from_secs(10));
        assert_eq!(options.timeout, Duration::from_secs(30));
        assert_eq!(options.max_redirects, 2);
    }

    #[test]
    fn options_disable_verification_only_for_https_opt_in() {
        let insecure = ClientConfig::new("acme", "admin", "key").danger_accept_invalid_certs(true);
        assert!(!TransportOptions::from_config(&insecure).verify_tls);

        let plain = insecure.clone().with_protocol(Protocol::Http);
        assert!(TransportOptions::from_config(&plain).verify_tls);
    }

    #[test]
    fn closures_are_transports() {
        let transport = |req: &HttpRequest, _: &TransportOptions| TransferOutcome {
            code: 204,
            meta: TransferMeta {
                effective_url: req.url.clone(),
                ..TransferMeta::default()
            },
            ..TransferOutcome::default()
        };
        let request = HttpRequest {
            method: HttpMethod::Get,
            url: "http://localhost/users.xml".into(),
            headers: Vec::new(),
            body: None,
        };
        let config = ClientConfig::new("acme", "admin", "key");
        let outcome = transport.execute(&request, &TransportOptions::from_config(&config));
        assert_eq!(outcome.code, 204);
        assert_eq!(outcome.meta.effective_url, "http://localhost/users.xml");
    }

    #[test]
    fn failed_outcome_has_no_status() {
        let outcome = TransferOutcome::failed("Connection refused", code::COULDNT_CONNECT);
        assert_eq!(outcome.code, 0);
        assert_eq!(outcome.failure.unwrap().code, 7);
    }

    #[test]
    fn rustls_errors_are_tls_failures() {
        let rejected = io::Error::new(
            io::ErrorKind::InvalidData,
            rustls::Error::InvalidCertificate(rustls::CertificateError::UnknownIssuer),
        );
        let failure = failure_from(&ureq::Error::Io(rejected));
        assert_eq!(failure.code, code::SSL_CONNECT_ERROR);
        assert!(failure.description.contains("invalid peer certificate"));

        let reset = io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer");
        assert_eq!(failure_from(&ureq::Error::Io(reset)).code, code::RECV_ERROR);

        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert_eq!(failure_from(&ureq::Error::Io(refused)).code, code::COULDNT_CONNECT);
    }

    #[test]
    fn agent_accepts_non_standard_methods() {
        let config = ClientConfig::new("acme", "admin", "key");
        let agent = build_agent(&TransportOptions::from_config(&config));
        assert!(agent.config().allow_non_standard_methods());
        assert!(!agent.config().http_status_as_error());
        assert_eq!(agent.config().max_redirects(), 2);
    }

    #[test]
    fn invalid_verb_fails_before_connecting() {
        let request = HttpRequest {
            method: HttpMethod::Custom("BAD VERB".into()),
            url: "http://127.0.0.1:9/users.xml".into(),
            headers: Vec::new(),
            body: None,
        };
        let config = ClientConfig::new("acme", "admin", "key");
        let outcome = UreqTransport.execute(&request, &TransportOptions::from_config(&config));
        assert_eq!(outcome.code, 0);
        assert_eq!(outcome.failure.unwrap().code, code::BAD_FUNCTION_ARGUMENT);
    }

    #[test]
    fn unreadable_upload_is_a_read_error() {
        let request = HttpRequest {
            method: HttpMethod::Post,
            url: "http://127.0.0.1:9/upload".into(),
            headers: Vec::new(),
            body: Some(RequestBody::Multipart(vec![(
                "file".into(),
                crate::payload::PayloadValue::file("/definitely/not/here.pdf"),
            )])),
        };
        let config = ClientConfig::new("acme", "admin", "key");
        let outcome = UreqTransport.execute(&request, &TransportOptions::from_config(&config));
        assert_eq!(outcome.code, 0);
        assert_eq!(outcome.failure.unwrap().code, code::READ_ERROR);
    }
}
