//! HTTP handlers for the signet API

use axum::{
    extract::{Path, State},
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use signet_core::{
    finalize_document, place_signature, BlobStore, PdfFile, PlacementStore, SignError,
};

use crate::auth::{self, AuthUser};
use crate::error::ApiError;
use crate::models::*;
use crate::state::AppState;

/// Health check endpoint
pub async fn health() -> &'static str {
    "OK"
}

fn user_response(user: crate::db::DbUser) -> UserResponse {
    UserResponse {
        id: user.id,
        name: user.name,
        email: user.email,
        created_at: user.created_at,
    }
}

/// Register a new user and hand back a session token
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let mut missing = Vec::new();
    if req.name.trim().is_empty() {
        missing.push("name");
    }
    if req.email.trim().is_empty() {
        missing.push("email");
    }
    if req.password.is_empty() {
        missing.push("password");
    }
    if !missing.is_empty() {
        return Err(SignError::MissingFields { missing }.into());
    }

    let salt = Uuid::new_v4().to_string();
    let digest = auth::hash_password(&req.password, &salt);
    let user = state
        .store
        .create_user(req.name.trim(), req.email.trim(), &salt, &digest)
        .await
        .map_err(|e| {
            if e.as_database_error()
                .map_or(false, |d| d.is_unique_violation())
            {
                ApiError::InvalidRequest("email already registered".to_string())
            } else {
                ApiError::Database(e)
            }
        })?;

    tracing::info!("Registered user: {}", user.id);

    let token = auth::issue_token(state.auth_secret.as_bytes(), &user.id, Utc::now())
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("token signing failed")))?;
    Ok(Json(AuthResponse {
        token,
        user: user_response(user),
    }))
}

/// Verify credentials and issue a session token
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let user = state
        .store
        .find_user_by_email(req.email.trim())
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    if !auth::verify_password(&req.password, &user.password_salt, &user.password_digest) {
        return Err(ApiError::InvalidCredentials);
    }

    let token = auth::issue_token(state.auth_secret.as_bytes(), &user.id, Utc::now())
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("token signing failed")))?;
    Ok(Json(AuthResponse {
        token,
        user: user_response(user),
    }))
}

/// Lowercased, space-free filename for blob storage.
fn sanitize_filename(name: &str) -> String {
    name.trim().replace(' ', "-").to_lowercase()
}

/// Upload a PDF (base64 transport) and create its document record
pub async fn upload_document(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<UploadRequest>,
) -> Result<Json<DocumentResponse>, ApiError> {
    if req.filename.trim().is_empty() {
        return Err(SignError::MissingFields {
            missing: vec!["filename"],
        }
        .into());
    }
    let pdf_data = BASE64
        .decode(&req.pdf_base64)
        .map_err(|e| ApiError::InvalidRequest(format!("Invalid PDF base64: {}", e)))?;
    if !pdf_data.starts_with(b"%PDF-") {
        return Err(ApiError::InvalidRequest(
            "file is not a PDF".to_string(),
        ));
    }
    let page_count = PdfFile::from_bytes(&pdf_data)
        .map_err(|e| ApiError::InvalidRequest(format!("unreadable PDF: {}", e)))?
        .page_count();

    let stored_name = format!(
        "{}-{}",
        Utc::now().timestamp_millis(),
        sanitize_filename(&req.filename)
    );
    let storage_path = format!("uploads/{}", stored_name);
    state.blobs.write(&storage_path, &pdf_data)?;

    let document = state
        .store
        .insert_document(&user.id, req.filename.trim(), &storage_path)
        .await?;

    tracing::info!(
        "Uploaded document {} ({} pages) for user {}",
        document.id,
        page_count,
        user.id
    );

    let record = document.into_record();
    Ok(Json(DocumentResponse {
        id: record.id,
        filename: record.filename,
        status: record.status,
        signed_file: record.signed_path,
        uploaded_at: record.uploaded_at,
        page_count: Some(page_count),
    }))
}

/// List the caller's documents
pub async fn list_documents(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<DocumentResponse>>, ApiError> {
    let documents = state.store.list_documents(&user.id).await?;
    Ok(Json(
        documents
            .into_iter()
            .map(|d| {
                let record = d.into_record();
                DocumentResponse {
                    id: record.id,
                    filename: record.filename,
                    status: record.status,
                    signed_file: record.signed_path,
                    uploaded_at: record.uploaded_at,
                    page_count: None,
                }
            })
            .collect(),
    ))
}

/// Delete a document, its placements, and its blobs (owner only)
pub async fn delete_document(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let document = state
        .store
        .find_document(&id)
        .await?
        .ok_or_else(|| SignError::NotFound(id.clone()))?;
    if document.owner_id != user.id {
        return Err(SignError::NotAuthorized.into());
    }

    // Blob deletion failures leave orphan files, not orphan rows.
    if let Err(e) = state.blobs.delete(&document.storage_path) {
        tracing::warn!("failed to delete blob {}: {}", document.storage_path, e);
    }
    if let Some(signed) = &document.signed_path {
        if let Err(e) = state.blobs.delete(signed) {
            tracing::warn!("failed to delete blob {}: {}", signed, e);
        }
    }
    state.store.delete_document_cascade(&id).await?;

    tracing::info!("Deleted document {} for user {}", id, user.id);
    Ok(Json(json!({ "message": "document deleted" })))
}

/// Place a signature on a document page
pub async fn place(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<PlaceRequest>,
) -> Result<Json<PlaceResponse>, ApiError> {
    let receipt = place_signature(&state.store, &state.blobs, &user.id, req.into()).await?;

    let record = receipt.placement;
    Ok(Json(PlaceResponse {
        pdf_coordinates: Point {
            x: receipt.pdf_point.x,
            y: receipt.pdf_point.y,
        },
        browser_coordinates: Point {
            x: record.x,
            y: record.y,
        },
        page_dimensions: PageDimensions {
            pdf: Dimensions {
                width: receipt.page.width,
                height: receipt.page.height,
            },
            rendered: RenderedDimensions {
                width: record.rendered_width,
                height: record.rendered_height,
            },
        },
        scale_factors: Point {
            x: receipt.scale.x,
            y: receipt.scale.y,
        },
        signature: record.into(),
    }))
}

/// Pending placements for a document
pub async fn list_placements(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(file_id): Path<String>,
) -> Result<Json<Vec<PlacementResponse>>, ApiError> {
    state
        .store
        .find_document(&file_id)
        .await?
        .ok_or_else(|| SignError::NotFound(file_id.clone()))?;
    let placements = state.store.pending_placements(&file_id).await?;
    Ok(Json(
        placements.into_iter().map(PlacementResponse::from).collect(),
    ))
}

/// Burn all pending placements into a signed copy of the PDF
pub async fn finalize(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Json(req): Json<FinalizeRequest>,
) -> Result<Json<FinalizeResponse>, ApiError> {
    let file_id = req.file_id.filter(|id| !id.is_empty()).ok_or(
        SignError::MissingFields {
            missing: vec!["fileId"],
        },
    )?;

    let outcome = finalize_document(&state.store, &state.blobs, &state.fonts, &file_id).await?;
    Ok(Json(FinalizeResponse {
        message: "document finalized".to_string(),
        signed_file: outcome.signed_path,
        drawn: outcome.drawn,
        skipped: outcome.skipped,
    }))
}

/// Remove the caller's pending placements for a document
pub async fn clear_placements(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<ClearRequest>,
) -> Result<Json<ClearResponse>, ApiError> {
    let file_id = req.file_id.filter(|id| !id.is_empty()).ok_or(
        SignError::MissingFields {
            missing: vec!["fileId"],
        },
    )?;
    state
        .store
        .find_document(&file_id)
        .await?
        .ok_or_else(|| SignError::NotFound(file_id.clone()))?;

    let removed = state
        .store
        .delete_pending_for_signer(&file_id, &user.id)
        .await?;
    Ok(Json(ClearResponse {
        message: "pending signatures cleared".to_string(),
        removed,
    }))
}

/// Remove a single placement (signer only)
pub async fn remove_placement(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(signature_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let placement = state
        .store
        .find_placement(&signature_id)
        .await?
        .ok_or_else(|| SignError::NotFound(signature_id.clone()))?;
    if placement.signer_id != user.id {
        return Err(SignError::NotAuthorized.into());
    }
    state.store.delete_placement(&signature_id).await?;
    Ok(Json(json!({ "message": "signature removed" })))
}
