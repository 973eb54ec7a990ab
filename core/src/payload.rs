//! Request payloads and their normalization into request bodies.
//!
//! # Design
//! A payload is either nothing, a pre-encoded string, or an ordered tree of
//! string keys. Files to upload are an explicit [`PayloadValue::FileReference`]
//! variant. The legacy `"@/path"` spelling is only recognized at the edges,
//! by [`PayloadValue::from_wire`] and [`Payload::from_json`].
//!
//! [`build_data`] turns a payload into what goes on the wire. Trees without
//! files are flattened into one form-encoded string using bracket keys
//! (`user[name]=Jane`). Trees containing a file anywhere are handed to the
//! transport untouched and sent as multipart; their nested non-file
//! containers are not flattened.

use std::path::PathBuf;

use serde_json::Value;
use url::form_urlencoded;

use crate::error::{Error, Result};

/// Deepest JSON nesting accepted by [`Payload::from_json`].
pub const MAX_PAYLOAD_DEPTH: usize = 32;

/// Ordered key/value entries of a structured payload.
pub type Entries = Vec<(String, PayloadValue)>;

/// A single value inside a structured payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadValue {
    Text(String),
    /// Path of a local file to upload.
    FileReference(PathBuf),
    List(Vec<PayloadValue>),
    Map(Entries),
}

impl PayloadValue {
    pub fn text(value: impl Into<String>) -> Self {
        PayloadValue::Text(value.into())
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        PayloadValue::FileReference(path.into())
    }

    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, PayloadValue)>,
    {
        PayloadValue::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Interpret a wire string, where a leading `@` marks a file path.
    pub fn from_wire(value: &str) -> Self {
        match value.strip_prefix('@') {
            Some(path) => PayloadValue::FileReference(PathBuf::from(path)),
            None => PayloadValue::Text(value.to_string()),
        }
    }

    /// The wire spelling of a scalar value; `None` for lists and maps.
    pub fn to_wire(&self) -> Option<String> {
        match self {
            PayloadValue::Text(text) => Some(text.clone()),
            PayloadValue::FileReference(path) => Some(format!("@{}", path.display())),
            PayloadValue::List(_) | PayloadValue::Map(_) => None,
        }
    }
}

impl From<&str> for PayloadValue {
    fn from(value: &str) -> Self {
        PayloadValue::Text(value.to_string())
    }
}

impl From<String> for PayloadValue {
    fn from(value: String) -> Self {
        PayloadValue::Text(value)
    }
}

impl From<Vec<PayloadValue>> for PayloadValue {
    fn from(values: Vec<PayloadValue>) -> Self {
        PayloadValue::List(values)
    }
}

/// Data sent with a request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Payload {
    #[default]
    Empty,
    /// Already encoded; sent as-is.
    Raw(String),
    Structured(Entries),
}

impl Payload {
    pub fn structured<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, PayloadValue)>,
    {
        Payload::Structured(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Convert a JSON document into a payload.
    ///
    /// A top-level string is sent raw and `null` means no payload. Inside
    /// objects and arrays, strings starting with `@` become file references,
    /// booleans become `1`/`0` and nulls are dropped.
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Payload::Empty),
            Value::String(s) => Ok(Payload::Raw(s.clone())),
            Value::Object(map) => Ok(Payload::Structured(object_entries(map, 1)?)),
            Value::Array(items) => {
                let entries = items
                    .iter()
                    .enumerate()
                    .filter_map(|(i, item)| {
                        json_value(item, 1)
                            .transpose()
                            .map(|v| v.map(|v| (i.to_string(), v)))
                    })
                    .collect::<Result<Entries>>()?;
                Ok(Payload::Structured(entries))
            }
            Value::Bool(_) | Value::Number(_) => Ok(Payload::Raw(scalar_text(value))),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Payload::Empty => true,
            Payload::Raw(s) => s.is_empty(),
            Payload::Structured(entries) => entries.is_empty(),
        }
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Payload::Raw(value.to_string())
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Payload::Raw(value)
    }
}

impl TryFrom<Value> for Payload {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        Payload::from_json(&value)
    }
}

fn object_entries(map: &serde_json::Map<String, Value>, depth: usize) -> Result<Entries> {
    let mut entries = Vec::with_capacity(map.len());
    for (key, item) in map {
        if let Some(value) = json_value(item, depth)? {
            entries.push((key.clone(), value));
        }
    }
    Ok(entries)
}

fn json_value(value: &Value, depth: usize) -> Result<Option<PayloadValue>> {
    if depth > MAX_PAYLOAD_DEPTH {
        return Err(Error::PayloadTooDeep {
            limit: MAX_PAYLOAD_DEPTH,
        });
    }
    let converted = match value {
        Value::Null => return Ok(None),
        Value::String(s) => PayloadValue::from_wire(s),
        Value::Bool(_) | Value::Number(_) => PayloadValue::Text(scalar_text(value)),
        Value::Array(items) => {
            let mut list = Vec::with_capacity(items.len());
            for item in items {
                if let Some(v) = json_value(item, depth + 1)? {
                    list.push(v);
                }
            }
            PayloadValue::List(list)
        }
        Value::Object(map) => PayloadValue::Map(object_entries(map, depth + 1)?),
    };
    Ok(Some(converted))
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A payload in the form it is put on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedPayload {
    Empty,
    Raw(String),
    /// `application/x-www-form-urlencoded` body.
    Form(String),
    /// Contains at least one file; encoded as multipart by the transport.
    Multipart(Entries),
}

impl NormalizedPayload {
    /// The encoded body, for every variant except multipart.
    pub fn as_encoded(&self) -> Option<&str> {
        match self {
            NormalizedPayload::Empty => Some(""),
            NormalizedPayload::Raw(s) | NormalizedPayload::Form(s) => Some(s),
            NormalizedPayload::Multipart(_) => None,
        }
    }
}

/// Normalize a payload into its wire form.
pub fn build_data(payload: &Payload) -> NormalizedPayload {
    match payload {
        Payload::Empty => NormalizedPayload::Empty,
        Payload::Raw(raw) => NormalizedPayload::Raw(raw.clone()),
        Payload::Structured(entries) => {
            if entries.iter().any(|(_, value)| files_submitted(value)) {
                NormalizedPayload::Multipart(entries.clone())
            } else {
                NormalizedPayload::Form(encode_form(entries))
            }
        }
    }
}

/// Whether `value` is, or contains at any depth, a file reference.
pub fn files_submitted(value: &PayloadValue) -> bool {
    match value {
        PayloadValue::FileReference(_) => true,
        PayloadValue::Text(_) => false,
        PayloadValue::List(items) => items.iter().any(files_submitted),
        PayloadValue::Map(entries) => entries.iter().any(|(_, v)| files_submitted(v)),
    }
}

/// Flatten entries into a bracket-keyed form string (`a[b][0]=v`).
pub fn encode_form(entries: &[(String, PayloadValue)]) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in entries {
        append_value(&mut serializer, key, value);
    }
    serializer.finish()
}

fn append_value(serializer: &mut form_urlencoded::Serializer<'_, String>, key: &str, value: &PayloadValue) {
    match value {
        PayloadValue::Text(text) => {
            serializer.append_pair(key, text);
        }
        PayloadValue::FileReference(_) => {
            if let Some(wire) = value.to_wire() {
                serializer.append_pair(key, &wire);
            }
        }
        PayloadValue::List(items) => {
            for (i, item) in items.iter().enumerate() {
                append_value(serializer, &format!("{key}[{i}]"), item);
            }
        }
        PayloadValue::Map(entries) => {
            for (child, item) in entries {
                append_value(serializer, &format!("{key}[{child}]"), item);
            }
        }
    }
}
