//! Wire models for the signet API
//!
//! Field names are camelCase to match the browser client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use signet_core::{DocumentStatus, PlacementInput, PlacementRecord, PlacementStatus};

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub filename: String,
    pub pdf_base64: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResponse {
    pub id: String,
    pub filename: String,
    pub status: DocumentStatus,
    pub signed_file: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<usize>,
}

/// Placement request. Numeric fields are raw JSON so both numbers and
/// numeric strings are accepted; validation happens in the core.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaceRequest {
    pub file_id: Option<String>,
    pub page_number: Option<Value>,
    pub x_coordinate: Option<Value>,
    pub y_coordinate: Option<Value>,
    pub signature: Option<String>,
    pub font: Option<String>,
    pub rendered_page_height: Option<Value>,
    pub rendered_page_width: Option<Value>,
}

impl From<PlaceRequest> for PlacementInput {
    fn from(req: PlaceRequest) -> Self {
        PlacementInput {
            document_id: req.file_id,
            page_number: req.page_number,
            x: req.x_coordinate,
            y: req.y_coordinate,
            signature: req.signature,
            font: req.font,
            rendered_height: req.rendered_page_height,
            rendered_width: req.rendered_page_width,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RenderedDimensions {
    pub width: Option<f64>,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PageDimensions {
    pub pdf: Dimensions,
    pub rendered: RenderedDimensions,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementResponse {
    pub id: String,
    pub file_id: String,
    pub signer_id: String,
    pub page_number: i64,
    pub x_coordinate: f64,
    pub y_coordinate: f64,
    pub signature: String,
    pub font: Option<String>,
    pub rendered_page_height: f64,
    pub rendered_page_width: Option<f64>,
    pub status: PlacementStatus,
    pub created_at: DateTime<Utc>,
}

impl From<PlacementRecord> for PlacementResponse {
    fn from(record: PlacementRecord) -> Self {
        Self {
            id: record.id,
            file_id: record.document_id,
            signer_id: record.signer_id,
            page_number: record.page_number,
            x_coordinate: record.x,
            y_coordinate: record.y,
            signature: record.signature,
            font: record.font,
            rendered_page_height: record.rendered_height,
            rendered_page_width: record.rendered_width,
            status: record.status,
            created_at: record.created_at,
        }
    }
}

/// Placement confirmation: the stored record plus everything the
/// client needs to render a preview at the exact burn position.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceResponse {
    pub signature: PlacementResponse,
    pub pdf_coordinates: Point,
    pub browser_coordinates: Point,
    pub page_dimensions: PageDimensions,
    pub scale_factors: Point,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FinalizeRequest {
    pub file_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeResponse {
    pub message: String,
    pub signed_file: String,
    pub drawn: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClearRequest {
    pub file_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearResponse {
    pub message: String,
    pub removed: u64,
}
