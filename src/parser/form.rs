//! Request body field extraction
//!
//! Normalizes both body encodings into a single multi-map of form fields.

use super::models::RequestBody;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::collections::HashMap;

/// Decoded form fields (field name -> values in submission order)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFields {
    fields: HashMap<String, Vec<String>>,
}

impl FormFields {
    /// Decode a captured request body
    ///
    /// Parsed `formData` wins when present. Otherwise raw chunks are base64
    /// decoded, concatenated and parsed as `application/x-www-form-urlencoded`.
    /// Chunks that fail to decode are skipped.
    pub fn from_body(body: &RequestBody) -> Self {
        if let Some(form) = &body.form_data {
            return Self {
                fields: form.clone(),
            };
        }

        let Some(chunks) = &body.raw else {
            return Self::default();
        };

        let mut bytes = Vec::new();
        for chunk in chunks {
            let Some(encoded) = chunk.bytes.as_deref() else {
                continue;
            };
            match STANDARD.decode(encoded) {
                Ok(decoded) => bytes.extend_from_slice(&decoded),
                Err(e) => tracing::debug!("Skipping undecodable upload chunk: {}", e),
            }
        }

        Self::from_urlencoded(&bytes)
    }

    /// Parse an `application/x-www-form-urlencoded` payload
    pub fn from_urlencoded(bytes: &[u8]) -> Self {
        let mut fields: HashMap<String, Vec<String>> = HashMap::new();
        for (key, value) in url::form_urlencoded::parse(bytes) {
            fields
                .entry(key.into_owned())
                .or_default()
                .push(value.into_owned());
        }
        Self { fields }
    }

    /// First value of a field, if present
    pub fn first(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// First value of a field, or empty string
    pub fn first_or_empty(&self, name: &str) -> String {
        self.first(name).unwrap_or_default().to_string()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
