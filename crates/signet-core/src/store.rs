//! Persistence and blob-storage seams
//!
//! The signing operations talk to a [`PlacementStore`] for metadata
//! and a [`BlobStore`] for PDF bytes. The API server provides SQLite
//! and filesystem implementations; tests use the in-memory fakes.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SignError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Signed,
    Rejected,
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentStatus::Pending => write!(f, "pending"),
            DocumentStatus::Signed => write!(f, "signed"),
            DocumentStatus::Rejected => write!(f, "rejected"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementStatus {
    Pending,
    Signed,
}

impl fmt::Display for PlacementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlacementStatus::Pending => write!(f, "pending"),
            PlacementStatus::Signed => write!(f, "signed"),
        }
    }
}

/// A stored document and where its PDF bytes live.
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    pub id: String,
    pub owner_id: String,
    pub filename: String,
    /// Blob path of the original upload.
    pub storage_path: String,
    /// Blob path of the finalized output, once signed.
    pub signed_path: Option<String>,
    pub status: DocumentStatus,
    pub uploaded_at: DateTime<Utc>,
}

/// A stored signature placement. Coordinates are the raw viewport
/// values from the client; the PDF-space position is re-derived at
/// finalize time.
#[derive(Debug, Clone)]
pub struct PlacementRecord {
    pub id: String,
    pub document_id: String,
    pub signer_id: String,
    pub page_number: i64,
    pub x: f64,
    pub y: f64,
    pub signature: String,
    pub font: Option<String>,
    pub rendered_height: f64,
    pub rendered_width: Option<f64>,
    pub status: PlacementStatus,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a placement; the store assigns id, status, and
/// timestamp.
#[derive(Debug, Clone)]
pub struct NewPlacement {
    pub document_id: String,
    pub signer_id: String,
    pub page_number: i64,
    pub x: f64,
    pub y: f64,
    pub signature: String,
    pub font: Option<String>,
    pub rendered_height: f64,
    pub rendered_width: Option<f64>,
}

#[async_trait]
pub trait PlacementStore: Send + Sync {
    async fn find_document(&self, id: &str) -> Result<Option<DocumentRecord>, SignError>;

    async fn pending_placements(
        &self,
        document_id: &str,
    ) -> Result<Vec<PlacementRecord>, SignError>;

    /// Drop the signer's pending placements for the document and
    /// insert the replacement, atomically. Readers never observe the
    /// gap between delete and insert.
    async fn replace_pending(&self, placement: NewPlacement)
        -> Result<PlacementRecord, SignError>;

    async fn find_placement(&self, id: &str) -> Result<Option<PlacementRecord>, SignError>;

    async fn delete_placement(&self, id: &str) -> Result<(), SignError>;

    /// Delete the signer's pending placements; returns how many went.
    async fn delete_pending_for_signer(
        &self,
        document_id: &str,
        signer_id: &str,
    ) -> Result<u64, SignError>;

    async fn update_placements_status(
        &self,
        document_id: &str,
        from: PlacementStatus,
        to: PlacementStatus,
    ) -> Result<u64, SignError>;

    async fn delete_placements(
        &self,
        document_id: &str,
        status: PlacementStatus,
    ) -> Result<u64, SignError>;

    /// Record the finalized blob path and flip the document to signed.
    async fn set_document_signed_file(
        &self,
        document_id: &str,
        path: &str,
    ) -> Result<(), SignError>;
}

/// Byte storage for PDFs, addressed by relative path.
pub trait BlobStore: Send + Sync {
    fn read(&self, path: &str) -> Result<Vec<u8>, SignError>;
    fn write(&self, path: &str, bytes: &[u8]) -> Result<(), SignError>;
    fn exists(&self, path: &str) -> bool;
    fn delete(&self, path: &str) -> Result<(), SignError>;
}

/// Blob store rooted at a directory on the local filesystem.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl BlobStore for FsBlobStore {
    fn read(&self, path: &str) -> Result<Vec<u8>, SignError> {
        Ok(std::fs::read(self.resolve(path))?)
    }

    fn write(&self, path: &str, bytes: &[u8]) -> Result<(), SignError> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(full, bytes)?;
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).exists()
    }

    fn delete(&self, path: &str) -> Result<(), SignError> {
        std::fs::remove_file(self.resolve(path))?;
        Ok(())
    }
}

/// In-memory [`PlacementStore`] for tests.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    documents: HashMap<String, DocumentRecord>,
    placements: Vec<PlacementRecord>,
    next_id: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn seed_document(&self, document: DocumentRecord) {
        self.lock().documents.insert(document.id.clone(), document);
    }

    pub fn placement_count(&self) -> usize {
        self.lock().placements.len()
    }
}

#[async_trait]
impl PlacementStore for MemoryStore {
    async fn find_document(&self, id: &str) -> Result<Option<DocumentRecord>, SignError> {
        Ok(self.lock().documents.get(id).cloned())
    }

    async fn pending_placements(
        &self,
        document_id: &str,
    ) -> Result<Vec<PlacementRecord>, SignError> {
        Ok(self
            .lock()
            .placements
            .iter()
            .filter(|p| p.document_id == document_id && p.status == PlacementStatus::Pending)
            .cloned()
            .collect())
    }

    async fn replace_pending(
        &self,
        placement: NewPlacement,
    ) -> Result<PlacementRecord, SignError> {
        let mut state = self.lock();
        state.placements.retain(|p| {
            !(p.document_id == placement.document_id
                && p.signer_id == placement.signer_id
                && p.status == PlacementStatus::Pending)
        });
        state.next_id += 1;
        let record = PlacementRecord {
            id: format!("placement-{}", state.next_id),
            document_id: placement.document_id,
            signer_id: placement.signer_id,
            page_number: placement.page_number,
            x: placement.x,
            y: placement.y,
            signature: placement.signature,
            font: placement.font,
            rendered_height: placement.rendered_height,
            rendered_width: placement.rendered_width,
            status: PlacementStatus::Pending,
            created_at: Utc::now(),
        };
        state.placements.push(record.clone());
        Ok(record)
    }

    async fn find_placement(&self, id: &str) -> Result<Option<PlacementRecord>, SignError> {
        Ok(self.lock().placements.iter().find(|p| p.id == id).cloned())
    }

    async fn delete_placement(&self, id: &str) -> Result<(), SignError> {
        self.lock().placements.retain(|p| p.id != id);
        Ok(())
    }

    async fn delete_pending_for_signer(
        &self,
        document_id: &str,
        signer_id: &str,
    ) -> Result<u64, SignError> {
        let mut state = self.lock();
        let before = state.placements.len();
        state.placements.retain(|p| {
            !(p.document_id == document_id
                && p.signer_id == signer_id
                && p.status == PlacementStatus::Pending)
        });
        Ok((before - state.placements.len()) as u64)
    }

    async fn update_placements_status(
        &self,
        document_id: &str,
        from: PlacementStatus,
        to: PlacementStatus,
    ) -> Result<u64, SignError> {
        let mut count = 0;
        for p in self.lock().placements.iter_mut() {
            if p.document_id == document_id && p.status == from {
                p.status = to;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn delete_placements(
        &self,
        document_id: &str,
        status: PlacementStatus,
    ) -> Result<u64, SignError> {
        let mut state = self.lock();
        let before = state.placements.len();
        state
            .placements
            .retain(|p| !(p.document_id == document_id && p.status == status));
        Ok((before - state.placements.len()) as u64)
    }

    async fn set_document_signed_file(
        &self,
        document_id: &str,
        path: &str,
    ) -> Result<(), SignError> {
        let mut state = self.lock();
        let document = state
            .documents
            .get_mut(document_id)
            .ok_or_else(|| SignError::NotFound(document_id.to_string()))?;
        document.signed_path = Some(path.to_string());
        document.status = DocumentStatus::Signed;
        Ok(())
    }
}

/// In-memory [`BlobStore`] for tests.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    fail_writes: Mutex<bool>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with a storage error.
    pub fn fail_writes(&self) {
        *self.fail_writes.lock().unwrap_or_else(|e| e.into_inner()) = true;
    }
}

impl BlobStore for MemoryBlobStore {
    fn read(&self, path: &str) -> Result<Vec<u8>, SignError> {
        self.blobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(path)
            .cloned()
            .ok_or_else(|| SignError::Storage(format!("blob not found: {}", path)))
    }

    fn write(&self, path: &str, bytes: &[u8]) -> Result<(), SignError> {
        if *self.fail_writes.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(SignError::Storage("simulated write failure".into()));
        }
        self.blobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        self.blobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(path)
    }

    fn delete(&self, path: &str) -> Result<(), SignError> {
        self.blobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str) -> DocumentRecord {
        DocumentRecord {
            id: id.to_string(),
            owner_id: "user-1".to_string(),
            filename: "contract.pdf".to_string(),
            storage_path: format!("uploads/{}.pdf", id),
            signed_path: None,
            status: DocumentStatus::Pending,
            uploaded_at: Utc::now(),
        }
    }

    fn placement(document_id: &str, signer_id: &str) -> NewPlacement {
        NewPlacement {
            document_id: document_id.to_string(),
            signer_id: signer_id.to_string(),
            page_number: 1,
            x: 100.0,
            y: 200.0,
            signature: "Jane Doe".to_string(),
            font: None,
            rendered_height: 800.0,
            rendered_width: Some(600.0),
        }
    }

    #[tokio::test]
    async fn replace_pending_keeps_one_per_signer() {
        let store = MemoryStore::new();
        store.seed_document(doc("doc-1"));

        store.replace_pending(placement("doc-1", "alice")).await.unwrap();
        store.replace_pending(placement("doc-1", "bob")).await.unwrap();
        let latest = store.replace_pending(placement("doc-1", "alice")).await.unwrap();

        let pending = store.pending_placements("doc-1").await.unwrap();
        assert_eq!(pending.len(), 2);
        assert!(pending.iter().any(|p| p.id == latest.id));
    }

    #[tokio::test]
    async fn status_flip_then_delete_clears_pending() {
        let store = MemoryStore::new();
        store.seed_document(doc("doc-1"));
        store.replace_pending(placement("doc-1", "alice")).await.unwrap();

        let flipped = store
            .update_placements_status("doc-1", PlacementStatus::Pending, PlacementStatus::Signed)
            .await
            .unwrap();
        assert_eq!(flipped, 1);
        let deleted = store
            .delete_placements("doc-1", PlacementStatus::Signed)
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.placement_count(), 0);
    }

    #[test]
    fn memory_blob_store_round_trips() {
        let blobs = MemoryBlobStore::new();
        blobs.write("uploads/a.pdf", b"pdf bytes").unwrap();
        assert!(blobs.exists("uploads/a.pdf"));
        assert_eq!(blobs.read("uploads/a.pdf").unwrap(), b"pdf bytes");
        blobs.delete("uploads/a.pdf").unwrap();
        assert!(!blobs.exists("uploads/a.pdf"));
    }

    #[test]
    fn failing_blob_store_reports_storage_error() {
        let blobs = MemoryBlobStore::new();
        blobs.fail_writes();
        let err = blobs.write("x", b"y").unwrap_err();
        assert_eq!(err.kind(), "storage");
    }
}
