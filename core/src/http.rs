//! HTTP request and response values.
//!
//! # Design
//! Requests are described as plain data so that building one is pure and
//! testable without a network. A [`Transport`](crate::Transport) executes
//! the request and hands back a [`ResponseResult`]. A result is a fresh value
//! per call; nothing about a response is stored on the client.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::payload::Entries;

/// HTTP verb for a request.
///
/// Only the verbs the API shapes differently get their own variant; every
/// other verb is forwarded verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Custom(String),
}

impl HttpMethod {
    /// Case-insensitive parse. Unknown verbs are kept, uppercased; surrounding
    /// whitespace is not stripped.
    pub fn parse(method: &str) -> Self {
        let upper = method.to_ascii_uppercase();
        match upper.as_str() {
            "" | "GET" => HttpMethod::Get,
            "POST" => HttpMethod::Post,
            "PUT" => HttpMethod::Put,
            _ => HttpMethod::Custom(upper),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Custom(verb) => verb,
        }
    }
}

impl From<&str> for HttpMethod {
    fn from(method: &str) -> Self {
        HttpMethod::parse(method)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body attached to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// Already encoded bytes (form data or a raw string).
    Encoded(String),
    /// Entries to encode as `multipart/form-data`; file references are read
    /// when the request is executed.
    Multipart(Entries),
}

/// An HTTP request described as plain data.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

impl HttpRequest {
    /// First header value with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Facts about a completed transfer, independent of the body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransferMeta {
    /// URL of the last request in a redirect chain.
    pub effective_url: String,
    pub http_version: String,
    pub redirect_count: u32,
    /// Wall-clock time for the whole call.
    #[serde(serialize_with = "serialize_secs")]
    pub total_time: Duration,
    pub size_download: u64,
    pub headers: Vec<(String, String)>,
}

impl TransferMeta {
    /// The metadata as a string-keyed map.
    pub fn to_map(&self) -> BTreeMap<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map.into_iter().collect(),
            _ => BTreeMap::new(),
        }
    }
}

fn serialize_secs<S: serde::Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

/// Response to a single call.
#[derive(Debug, Clone)]
pub struct ResponseResult {
    pub code: u16,
    pub body: Vec<u8>,
    pub content_type: Option<String>,
    pub meta: TransferMeta,
}

impl ResponseResult {
    /// Body decoded as UTF-8, with invalid sequences replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_parse_is_case_insensitive() {
        assert_eq!(HttpMethod::parse("get"), HttpMethod::Get);
        assert_eq!(HttpMethod::parse("Post"), HttpMethod::Post);
        assert_eq!(HttpMethod::parse("put"), HttpMethod::Put);
        assert_eq!(HttpMethod::parse(""), HttpMethod::Get);
    }

    #[test]
    fn unknown_methods_are_kept_verbatim() {
        assert_eq!(HttpMethod::parse("delete"), HttpMethod::Custom("DELETE".into()));
        assert_eq!(HttpMethod::parse("purge").as_str(), "PURGE");
    }

    #[test]
    fn whitespace_is_part_of_the_verb() {
        assert_eq!(HttpMethod::parse(" get"), HttpMethod::Custom(" GET".into()));
        assert_eq!(HttpMethod::parse("post\n"), HttpMethod::Custom("POST\n".into()));
    }

    #[test]
    fn header_lookup_ignores_case() {
        let req = HttpRequest {
            method: HttpMethod::Get,
            url: "https://acme.mytribehr.com/users.xml".into(),
            headers: vec![("Accept".into(), "text/xml; charset=utf-8".into())],
            body: None,
        };
        assert_eq!(req.header("accept"), Some("text/xml; charset=utf-8"));
        assert!(req.header("content-length").is_none());
    }

    #[test]
    fn meta_exports_as_map() {
        let meta = TransferMeta {
            effective_url: "https://acme.mytribehr.com/users.xml".into(),
            http_version: "HTTP/1.1".into(),
            redirect_count: 1,
            total_time: Duration::from_millis(1500),
            size_download: 42,
            headers: Vec::new(),
        };
        let map = meta.to_map();
        assert_eq!(map["effective_url"], "https://acme.mytribehr.com/users.xml");
        assert_eq!(map["redirect_count"], 1);
        assert_eq!(map["total_time"], 1.5);
        assert_eq!(map["size_download"], 42);
    }

    #[test]
    fn response_text_and_success() {
        let result = ResponseResult {
            code: 404,
            body: b"<error>not found</error>".to_vec(),
            content_type: Some("text/xml".into()),
            meta: TransferMeta::default(),
        };
        assert_eq!(result.text(), "<error>not found</error>");
        assert!(!result.is_success());
    }
}
