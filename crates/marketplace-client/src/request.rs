//! Immutable request descriptors
//!
//! An `ApiRequest` fully describes one call: method, path, query, and body.
//! The client may dispatch the same descriptor twice (original and retry),
//! so multipart bodies are kept as plain fields and turned into a
//! `reqwest::multipart::Form` per dispatch.

use reqwest::Method;
use reqwest::multipart::{Form, Part};

use crate::error::{Error, Result};

/// Whether a dispatch may still trigger a credential refresh.
///
/// Passed explicitly through the client's retry loop; requests carry no
/// hidden retry flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    /// First dispatch of a request
    Initial,
    /// Resend after a successful refresh; a 401 here goes to the caller
    Retried,
}

impl Attempt {
    pub fn may_refresh(self) -> bool {
        matches!(self, Attempt::Initial)
    }
}

/// One multipart form field.
#[derive(Debug, Clone)]
pub enum FormField {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        mime_type: String,
        bytes: Vec<u8>,
    },
}

impl FormField {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        FormField::Text {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FormField::Text { name, .. } | FormField::File { name, .. } => name,
        }
    }

    fn to_part(&self) -> Result<Part> {
        match self {
            FormField::Text { value, .. } => Ok(Part::text(value.clone())),
            FormField::File {
                file_name,
                mime_type,
                bytes,
                ..
            } => Part::bytes(bytes.clone())
                .file_name(file_name.clone())
                .mime_str(mime_type)
                .map_err(|e| Error::InvalidRequest(format!("bad mime type {mime_type}: {e}"))),
        }
    }
}

/// Request payload.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(serde_json::Value),
    Multipart(Vec<FormField>),
}

/// A fully formed request against the marketplace API.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: RequestBody,
    renewable: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
            renewable: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn multipart(mut self, fields: Vec<FormField>) -> Self {
        self.body = RequestBody::Multipart(fields);
        self
    }

    /// Mark a call that issues credentials (login). A 401 from it means the
    /// input was wrong, not that the session expired, so it never refreshes.
    pub fn credential_exchange(mut self) -> Self {
        self.renewable = false;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn body(&self) -> &RequestBody {
        &self.body
    }

    pub fn is_renewable(&self) -> bool {
        self.renewable
    }

    /// Build a fresh multipart form for one dispatch.
    pub(crate) fn build_form(fields: &[FormField]) -> Result<Form> {
        fields.iter().try_fold(Form::new(), |form, field| {
            Ok(form.part(field.name().to_owned(), field.to_part()?))
        })
    }
}
