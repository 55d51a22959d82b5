//! Error types for signing operations

use serde::Serialize;
use thiserror::Error;

/// Computed bounds for one axis of a rejected placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AxisBounds {
    pub min: f64,
    pub max: f64,
    pub value: f64,
}

#[derive(Debug, Error)]
pub enum SignError {
    #[error("missing required fields: {}", missing.join(", "))]
    MissingFields { missing: Vec<&'static str> },

    #[error("invalid numeric value for {field}: {value}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("document not found: {0}")]
    NotFound(String),

    #[error("invalid page number {page}: document has {page_count} pages")]
    InvalidPage { page: i64, page_count: usize },

    #[error("signature position outside page bounds")]
    OutOfBounds { x: AxisBounds, y: AxisBounds },

    #[error("not authorized")]
    NotAuthorized,

    #[error("no pending signatures for document {0}")]
    NoPendingSignatures(String),

    #[error("storage failure: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl SignError {
    /// Machine-checkable error kind. Callers match on this, never on
    /// message text.
    pub fn kind(&self) -> &'static str {
        match self {
            SignError::MissingFields { .. } => "validation",
            SignError::InvalidNumber { .. } => "invalid_number",
            SignError::NotFound(_) => "not_found",
            SignError::InvalidPage { .. } => "invalid_page",
            SignError::OutOfBounds { .. } => "out_of_bounds",
            SignError::NotAuthorized => "not_authorized",
            SignError::NoPendingSignatures(_) => "no_pending_signatures",
            SignError::Storage(_) => "storage",
            SignError::Internal(_) => "internal",
        }
    }

    /// Structured detail payload, suitable for inclusion in an API
    /// error body.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            SignError::MissingFields { missing } => {
                Some(serde_json::json!({ "missing": missing }))
            }
            SignError::InvalidNumber { field, value } => {
                Some(serde_json::json!({ "field": field, "value": value }))
            }
            SignError::InvalidPage { page, page_count } => {
                Some(serde_json::json!({ "page": page, "pageCount": page_count }))
            }
            SignError::OutOfBounds { x, y } => {
                Some(serde_json::json!({ "bounds": { "x": x, "y": y } }))
            }
            _ => None,
        }
    }
}

impl From<std::io::Error> for SignError {
    fn from(err: std::io::Error) -> Self {
        SignError::Storage(err.to_string())
    }
}

impl From<lopdf::Error> for SignError {
    fn from(err: lopdf::Error) -> Self {
        SignError::Internal(format!("PDF error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_stable_per_variant() {
        let err = SignError::InvalidPage {
            page: 9,
            page_count: 3,
        };
        assert_eq!(err.kind(), "invalid_page");

        let err = SignError::NoPendingSignatures("doc-1".into());
        assert_eq!(err.kind(), "no_pending_signatures");
    }

    #[test]
    fn out_of_bounds_details_carry_computed_bounds() {
        let err = SignError::OutOfBounds {
            x: AxisBounds {
                min: 0.0,
                max: 612.0,
                value: 650.0,
            },
            y: AxisBounds {
                min: 0.0,
                max: 792.0,
                value: 100.0,
            },
        };
        let details = err.details().unwrap();
        assert_eq!(details["bounds"]["x"]["max"], 612.0);
        assert_eq!(details["bounds"]["x"]["value"], 650.0);
    }

    #[test]
    fn missing_fields_message_lists_names() {
        let err = SignError::MissingFields {
            missing: vec!["fileId", "signature"],
        };
        assert_eq!(err.to_string(), "missing required fields: fileId, signature");
    }
}
