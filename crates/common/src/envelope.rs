//! Response envelope used by every marketplace API endpoint
//!
//! `{ "success": bool, "data": ..., "error": { "message": ... }, "pagination": { "hasNextPage": bool } }`

use serde::{Deserialize, Serialize};

/// Server-side error description.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

/// Paging information on list endpoints.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(default)]
    pub has_next_page: bool,
}

/// The JSON envelope wrapping every response body.
///
/// `data` is optional because error responses and some acknowledgements
/// (logout, resend OTP) carry none.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<ErrorBody>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

impl<T> Envelope<T> {
    /// Server-provided error message, if any.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().and_then(|e| e.message.as_deref())
    }

    pub fn has_next_page(&self) -> bool {
        self.pagination.as_ref().is_some_and(|p| p.has_next_page)
    }
}

impl Envelope<serde_json::Value> {
    /// Parse just the error message out of an arbitrary response body.
    pub fn message_in(body: &str) -> Option<String> {
        serde_json::from_str::<Self>(body)
            .ok()
            .and_then(|e| e.error_message().map(str::to_owned))
    }
}
