//! SQLite persistence: user and document queries plus the store
//! implementation the core signing operations run against.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use signet_core::{
    DocumentRecord, DocumentStatus, NewPlacement, PlacementRecord, PlacementStatus,
    PlacementStore, SignError,
};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct DbUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_salt: String,
    pub password_digest: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbDocument {
    pub id: String,
    pub owner_id: String,
    pub filename: String,
    pub storage_path: String,
    pub signed_path: Option<String>,
    pub status: String,
    pub uploaded_at: DateTime<Utc>,
}

impl DbDocument {
    pub fn into_record(self) -> DocumentRecord {
        let status = match self.status.as_str() {
            "signed" => DocumentStatus::Signed,
            "rejected" => DocumentStatus::Rejected,
            _ => DocumentStatus::Pending,
        };
        DocumentRecord {
            id: self.id,
            owner_id: self.owner_id,
            filename: self.filename,
            storage_path: self.storage_path,
            signed_path: self.signed_path,
            status,
            uploaded_at: self.uploaded_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct DbPlacement {
    id: String,
    document_id: String,
    signer_id: String,
    page_number: i64,
    x: f64,
    y: f64,
    signature: String,
    font: Option<String>,
    rendered_height: f64,
    rendered_width: Option<f64>,
    status: String,
    created_at: DateTime<Utc>,
}

impl DbPlacement {
    fn into_record(self) -> PlacementRecord {
        let status = match self.status.as_str() {
            "signed" => PlacementStatus::Signed,
            _ => PlacementStatus::Pending,
        };
        PlacementRecord {
            id: self.id,
            document_id: self.document_id,
            signer_id: self.signer_id,
            page_number: self.page_number,
            x: self.x,
            y: self.y,
            signature: self.signature,
            font: self.font,
            rendered_height: self.rendered_height,
            rendered_width: self.rendered_width,
            status,
            created_at: self.created_at,
        }
    }
}

fn storage_err(err: sqlx::Error) -> SignError {
    SignError::Storage(err.to_string())
}

const PLACEMENT_COLUMNS: &str = "id, document_id, signer_id, page_number, x, y, signature, \
     font, rendered_height, rendered_width, status, created_at";

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_user(
        &self,
        name: &str,
        email: &str,
        password_salt: &str,
        password_digest: &str,
    ) -> Result<DbUser, sqlx::Error> {
        let user = DbUser {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: email.to_string(),
            password_salt: password_salt.to_string(),
            password_digest: password_digest.to_string(),
            created_at: Utc::now(),
        };
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_salt, password_digest, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_salt)
        .bind(&user.password_digest)
        .bind(user.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<DbUser>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT id, name, email, password_salt, password_digest, created_at
            FROM users WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn insert_document(
        &self,
        owner_id: &str,
        filename: &str,
        storage_path: &str,
    ) -> Result<DbDocument, sqlx::Error> {
        let document = DbDocument {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            filename: filename.to_string(),
            storage_path: storage_path.to_string(),
            signed_path: None,
            status: "pending".to_string(),
            uploaded_at: Utc::now(),
        };
        sqlx::query(
            r#"
            INSERT INTO documents (id, owner_id, filename, storage_path, signed_path, status, uploaded_at)
            VALUES (?, ?, ?, ?, NULL, 'pending', ?)
            "#,
        )
        .bind(&document.id)
        .bind(&document.owner_id)
        .bind(&document.filename)
        .bind(&document.storage_path)
        .bind(document.uploaded_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(document)
    }

    pub async fn list_documents(&self, owner_id: &str) -> Result<Vec<DbDocument>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT id, owner_id, filename, storage_path, signed_path, status, uploaded_at
            FROM documents WHERE owner_id = ? ORDER BY uploaded_at DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Delete a document and all of its placements in one transaction.
    pub async fn delete_document_cascade(&self, document_id: &str) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM signatures WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await
    }
}

#[async_trait]
impl PlacementStore for SqliteStore {
    async fn find_document(&self, id: &str) -> Result<Option<DocumentRecord>, SignError> {
        let document: Option<DbDocument> = sqlx::query_as(
            r#"
            SELECT id, owner_id, filename, storage_path, signed_path, status, uploaded_at
            FROM documents WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(document.map(DbDocument::into_record))
    }

    async fn pending_placements(
        &self,
        document_id: &str,
    ) -> Result<Vec<PlacementRecord>, SignError> {
        let rows: Vec<DbPlacement> = sqlx::query_as(&format!(
            "SELECT {} FROM signatures WHERE document_id = ? AND status = 'pending' \
             ORDER BY created_at",
            PLACEMENT_COLUMNS
        ))
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(rows.into_iter().map(DbPlacement::into_record).collect())
    }

    async fn replace_pending(
        &self,
        placement: NewPlacement,
    ) -> Result<PlacementRecord, SignError> {
        let record = PlacementRecord {
            id: Uuid::new_v4().to_string(),
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

        // Delete-then-insert runs in one transaction so readers never
        // observe a signer with zero pending placements mid-replace.
        let mut tx = self.pool.begin().await.map_err(storage_err)?;
        sqlx::query(
            "DELETE FROM signatures WHERE document_id = ? AND signer_id = ? AND status = 'pending'",
        )
        .bind(&record.document_id)
        .bind(&record.signer_id)
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;
        sqlx::query(&format!(
            "INSERT INTO signatures ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'pending', ?)",
            PLACEMENT_COLUMNS
        ))
        .bind(&record.id)
        .bind(&record.document_id)
        .bind(&record.signer_id)
        .bind(record.page_number)
        .bind(record.x)
        .bind(record.y)
        .bind(&record.signature)
        .bind(&record.font)
        .bind(record.rendered_height)
        .bind(record.rendered_width)
        .bind(record.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;
        tx.commit().await.map_err(storage_err)?;

        Ok(record)
    }

    async fn find_placement(&self, id: &str) -> Result<Option<PlacementRecord>, SignError> {
        let row: Option<DbPlacement> = sqlx::query_as(&format!(
            "SELECT {} FROM signatures WHERE id = ?",
            PLACEMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(row.map(DbPlacement::into_record))
    }

    async fn delete_placement(&self, id: &str) -> Result<(), SignError> {
        sqlx::query("DELETE FROM signatures WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn delete_pending_for_signer(
        &self,
        document_id: &str,
        signer_id: &str,
    ) -> Result<u64, SignError> {
        let result = sqlx::query(
            "DELETE FROM signatures WHERE document_id = ? AND signer_id = ? AND status = 'pending'",
        )
        .bind(document_id)
        .bind(signer_id)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(result.rows_affected())
    }

    async fn update_placements_status(
        &self,
        document_id: &str,
        from: PlacementStatus,
        to: PlacementStatus,
    ) -> Result<u64, SignError> {
        let result =
            sqlx::query("UPDATE signatures SET status = ? WHERE document_id = ? AND status = ?")
                .bind(to.to_string())
                .bind(document_id)
                .bind(from.to_string())
                .execute(&self.pool)
                .await
                .map_err(storage_err)?;
        Ok(result.rows_affected())
    }

    async fn delete_placements(
        &self,
        document_id: &str,
        status: PlacementStatus,
    ) -> Result<u64, SignError> {
        let result = sqlx::query("DELETE FROM signatures WHERE document_id = ? AND status = ?")
            .bind(document_id)
            .bind(status.to_string())
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(result.rows_affected())
    }

    async fn set_document_signed_file(
        &self,
        document_id: &str,
        path: &str,
    ) -> Result<(), SignError> {
        sqlx::query("UPDATE documents SET signed_path = ?, status = 'signed' WHERE id = ?")
            .bind(path)
            .bind(document_id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }
}
