//! Synchronous connector for the TribeHR API.
//!
//! # Overview
//! Builds authenticated requests against `https://{subdomain}.mytribehr.com`
//! and returns the raw response: status code, body, content type and
//! transfer metadata. Responses are not parsed and HTTP error statuses are
//! not treated as failures; only a transfer that produced no status code is
//! an error.
//!
//! # Design
//! - `TribeHrClient` holds only its `ClientConfig`; every call is independent.
//! - A call is split into `build_request` (pure, produces an `HttpRequest`)
//!   and a `Transport` that executes it, so the wire shape is testable
//!   without a network.
//! - Payloads are sum types. Structured payloads without files are
//!   flattened into bracket-keyed form bodies; payloads with files are sent
//!   as multipart.
//!
//! ```no_run
//! use tribehr_core::{Payload, PayloadValue, TribeHrClient};
//!
//! let client = TribeHrClient::connect("acme", "admin", "api-key");
//! let users = client.send_request("/users.xml", "GET", &Payload::Empty)?;
//! println!("{} {}", users.code, users.text());
//!
//! let jane = Payload::structured([("user", PayloadValue::map([("name", "Jane".into())]))]);
//! let created = client.send_request("/users.xml", "POST", &jane)?;
//! assert!(created.code > 0);
//! # Ok::<(), tribehr_core::Error>(())
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod multipart;
pub mod payload;
pub mod transport;

pub use client::TribeHrClient;
pub use config::{ClientConfig, Protocol};
pub use error::{Error, Result};
pub use http::{HttpMethod, HttpRequest, RequestBody, ResponseResult, TransferMeta};
pub use payload::{build_data, files_submitted, NormalizedPayload, Payload, PayloadValue};
pub use transport::{TransferOutcome, Transport, TransportFailure, TransportOptions, UreqTransport};
