//! `multipart/form-data` bodies for payloads that upload files.
//!
//! Only top-level entries are sent. Nested lists and maps are skipped with
//! a warning, matching the long-standing behavior of the API's upload
//! endpoints, which never accepted nested fields alongside files.

use std::io;

use ureq::unversioned::multipart::Form;

use crate::payload::{Entries, PayloadValue};

/// Build a form from `entries`, opening every referenced file.
///
/// The returned [`Form`] borrows field names and text from `entries` and
/// sets its own `Content-Type` (with boundary) when sent.
pub fn form(entries: &Entries) -> io::Result<Form<'_>> {
    let mut form = Form::new();
    for (name, value) in entries {
        form = match value {
            PayloadValue::Text(text) => form.text(name, text),
            PayloadValue::FileReference(path) => form.file(name, path).map_err(|e| {
                io::Error::new(e.kind(), format!("couldn't open file \"{}\": {e}", path.display()))
            })?,
            PayloadValue::List(_) | PayloadValue::Map(_) => {
                tracing::warn!(field = %name, "nested field not supported in multipart upload, skipping");
                form
            }
        };
    }
    Ok(form)
}
