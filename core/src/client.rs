//! The TribeHR request builder.
//!
//! # Design
//! `TribeHrClient` holds only its configuration. A call is split the same
//! way every time: [`TribeHrClient::build_request`] turns a path, verb and
//! payload into an [`HttpRequest`] without any I/O, then a [`Transport`]
//! executes it. A call either yields one [`ResponseResult`] or one
//! [`Error::Transport`]; HTTP error statuses are results, not errors.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::config::{ClientConfig, Protocol};
use crate::error::{code, Error, Result};
use crate::http::{HttpMethod, HttpRequest, RequestBody, ResponseResult};
use crate::payload::{build_data, NormalizedPayload, Payload};
use crate::transport::{Transport, TransportOptions, UreqTransport};

pub const ACCEPT: &str = "text/xml; charset=utf-8";
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// `User-Agent` sent with every request.
pub fn user_agent() -> String {
    format!("TribeHR Rust Connector/{}", env!("CARGO_PKG_VERSION"))
}

/// Synchronous client for the TribeHR API.
#[derive(Debug, Clone)]
pub struct TribeHrClient {
    config: ClientConfig,
}

impl TribeHrClient {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Shorthand for `TribeHrClient::new(ClientConfig::new(..))`.
    pub fn connect(
        subdomain: impl Into<String>,
        username: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self::new(ClientConfig::new(subdomain, username, api_key))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Change the scheme used by subsequent calls.
    pub fn set_protocol(&mut self, protocol: Protocol) {
        self.config.protocol = protocol;
    }

    /// Describe the request for `method path` carrying `payload`.
    ///
    /// `POST` sends the normalized payload as a form body. `PUT` does the
    /// same and also states its `Content-Length`. Every other verb is sent
    /// verbatim and without a body.
    pub fn build_request(&self, path: &str, method: impl Into<HttpMethod>, payload: &Payload) -> HttpRequest {
        let method = method.into();
        let url = format!("{}{}", self.config.origin(), path);
        let credentials = STANDARD.encode(format!("{}:{}", self.config.username, self.config.api_key));

        let mut headers = vec![
            ("Authorization".to_string(), format!("Basic {credentials}")),
            ("Accept".to_string(), ACCEPT.to_string()),
            ("User-Agent".to_string(), user_agent()),
        ];

        let body = match method {
            HttpMethod::Post | HttpMethod::Put => {
                let body = request_body(build_data(payload));
                if let RequestBody::Encoded(encoded) = &body {
                    headers.push(("Content-Type".to_string(), FORM_CONTENT_TYPE.to_string()));
                    if method == HttpMethod::Put {
                        headers.push(("Content-Length".to_string(), encoded.len().to_string()));
                    }
                }
                Some(body)
            }
            HttpMethod::Get | HttpMethod::Custom(_) => None,
        };

        HttpRequest {
            method,
            url,
            headers,
            body,
        }
    }

    /// Send a request over the default blocking transport.
    pub fn send_request(&self, path: &str, method: impl Into<HttpMethod>, payload: &Payload) -> Result<ResponseResult> {
        self.send_request_with(&UreqTransport, path, method, payload)
    }

    /// Send a request over `transport`.
    pub fn send_request_with<T>(
        &self,
        transport: &T,
        path: &str,
        method: impl Into<HttpMethod>,
        payload: &Payload,
    ) -> Result<ResponseResult>
    where
        T: Transport + ?Sized,
    {
        let request = self.build_request(path, method, payload);
        let options = TransportOptions::from_config(&self.config);
        tracing::debug!(method = %request.method, url = %request.url, "sending request");

        let outcome = transport.execute(&request, &options);
        if outcome.code == 0 {
            let (description, code) = match outcome.failure {
                Some(failure) => (failure.description, failure.code),
                None => ("no response received".to_string(), code::UNKNOWN),
            };
            return Err(Error::Transport { description, code });
        }

        tracing::debug!(
            status = outcome.code,
            url = %outcome.meta.effective_url,
            redirects = outcome.meta.redirect_count,
            "received response"
        );
        Ok(ResponseResult {
            code: outcome.code,
            body: outcome.body,
            content_type: outcome.content_type,
            meta: outcome.meta,
        })
    }
}

fn request_body(normalized: NormalizedPayload) -> RequestBody {
    match normalized {
        NormalizedPayload::Empty => RequestBody::Encoded(String::new()),
        NormalizedPayload::Raw(encoded) | NormalizedPayload::Form(encoded) => RequestBody::Encoded(encoded),
        NormalizedPayload::Multipart(entries) => RequestBody::Multipart(entries),
    }
}
