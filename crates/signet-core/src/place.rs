//! Placement request validation and the place-signature operation

use serde_json::Value;

use crate::coords::{check_bounds, viewport_to_pdf, PageSize, PdfPoint, ScaleFactors, Viewport};
use crate::error::SignError;
use crate::pdf::PdfFile;
use crate::store::{BlobStore, NewPlacement, PlacementRecord, PlacementStore};

/// Raw placement request, before validation. Numeric fields arrive as
/// arbitrary JSON because clients send both numbers and numeric
/// strings.
#[derive(Debug, Default, Clone)]
pub struct PlacementInput {
    pub document_id: Option<String>,
    pub page_number: Option<Value>,
    pub x: Option<Value>,
    pub y: Option<Value>,
    pub signature: Option<String>,
    pub font: Option<String>,
    pub rendered_height: Option<Value>,
    pub rendered_width: Option<Value>,
}

/// A placement that passed field and numeric validation. Page range
/// and bounds are checked later, against the actual PDF.
#[derive(Debug, Clone)]
pub struct ValidPlacement {
    pub document_id: String,
    pub page_number: i64,
    pub x: f64,
    pub y: f64,
    pub signature: String,
    pub font: Option<String>,
    pub rendered_height: f64,
    pub rendered_width: Option<f64>,
}

/// Coerce a JSON value to a finite float. Accepts numbers and
/// parseable numeric strings; rejects everything else including NaN.
pub fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

fn require_f64(value: Option<&Value>, field: &'static str) -> Result<f64, SignError> {
    let value = value.ok_or(SignError::MissingFields {
        missing: vec![field],
    })?;
    coerce_f64(value).ok_or_else(|| SignError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

fn require_page(value: Option<&Value>) -> Result<i64, SignError> {
    let n = require_f64(value, "pageNumber")?;
    if n.fract() != 0.0 || n.abs() > i64::MAX as f64 {
        return Err(SignError::InvalidNumber {
            field: "pageNumber",
            value: n.to_string(),
        });
    }
    Ok(n as i64)
}

impl PlacementInput {
    /// Validate presence of required fields, then coerce numerics.
    /// All missing fields are reported in one error.
    pub fn validate(&self) -> Result<ValidPlacement, SignError> {
        let mut missing = Vec::new();
        if self.document_id.as_deref().map_or(true, str::is_empty) {
            missing.push("fileId");
        }
        if self.page_number.is_none() {
            missing.push("pageNumber");
        }
        if self.x.is_none() {
            missing.push("xCoordinate");
        }
        if self.y.is_none() {
            missing.push("yCoordinate");
        }
        if self.signature.as_deref().map_or(true, str::is_empty) {
            missing.push("signature");
        }
        if self.rendered_height.is_none() {
            missing.push("renderedPageHeight");
        }
        if !missing.is_empty() {
            return Err(SignError::MissingFields { missing });
        }

        let document_id = self.document_id.clone().unwrap_or_default();
        let signature = self.signature.clone().unwrap_or_default();
        let page_number = require_page(self.page_number.as_ref())?;
        let x = require_f64(self.x.as_ref(), "xCoordinate")?;
        let y = require_f64(self.y.as_ref(), "yCoordinate")?;
        let rendered_height = require_f64(self.rendered_height.as_ref(), "renderedPageHeight")?;
        let rendered_width = self
            .rendered_width
            .as_ref()
            .map(|v| require_f64(Some(v), "renderedPageWidth"))
            .transpose()?;

        Ok(ValidPlacement {
            document_id,
            page_number,
            x,
            y,
            signature,
            font: self.font.clone(),
            rendered_height,
            rendered_width,
        })
    }
}

/// Everything a client needs to confirm a placement: the stored
/// record, the computed PDF position, and the transform inputs.
#[derive(Debug, Clone)]
pub struct PlacementReceipt {
    pub placement: PlacementRecord,
    pub pdf_point: PdfPoint,
    pub page: PageSize,
    pub scale: ScaleFactors,
}

/// Validate a placement against the stored PDF and persist it,
/// replacing any earlier pending placement by the same signer.
pub async fn place_signature(
    store: &dyn PlacementStore,
    blobs: &dyn BlobStore,
    signer_id: &str,
    input: PlacementInput,
) -> Result<PlacementReceipt, SignError> {
    let valid = input.validate()?;

    let document = store
        .find_document(&valid.document_id)
        .await?
        .ok_or_else(|| SignError::NotFound(valid.document_id.clone()))?;

    let bytes = blobs.read(&document.storage_path)?;
    let pdf = PdfFile::from_bytes(&bytes)?;
    let page_count = pdf.page_count();
    if valid.page_number < 1 || valid.page_number > page_count as i64 {
        return Err(SignError::InvalidPage {
            page: valid.page_number,
            page_count,
        });
    }

    let page = pdf.page_size(valid.page_number as u32)?;
    let viewport = Viewport {
        width: valid.rendered_width,
        height: valid.rendered_height,
    };
    let (point, scale) = viewport_to_pdf(page, viewport, valid.x, valid.y)?;
    check_bounds(page, point)?;

    let record = store
        .replace_pending(NewPlacement {
            document_id: valid.document_id,
            signer_id: signer_id.to_string(),
            page_number: valid.page_number,
            x: valid.x,
            y: valid.y,
            signature: valid.signature,
            font: valid.font,
            rendered_height: valid.rendered_height,
            rendered_width: valid.rendered_width,
        })
        .await?;

    tracing::debug!(
        placement = %record.id,
        document = %record.document_id,
        page = record.page_number,
        pdf_x = point.x,
        pdf_y = point.y,
        "signature placed"
    );

    Ok(PlacementReceipt {
        placement: record,
        pdf_point: point,
        page,
        scale,
    })
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    proptest! {
        /// Property: coercion agrees between number and string forms.
        #[test]
        fn string_and_number_forms_coerce_equally(v in -1e6f64..1e6) {
            let from_number = coerce_f64(&json!(v));
            let from_string = coerce_f64(&json!(v.to_string()));
            prop_assert_eq!(from_number, Some(v));
            prop_assert_eq!(from_string, Some(v));
        }

        /// Property: coercion never yields a non-finite value.
        #[test]
        fn coerced_values_are_finite(s in ".{0,20}") {
            if let Some(v) = coerce_f64(&json!(s)) {
                prop_assert!(v.is_finite());
            }
        }
    }
}
