//! Application state for the signet API

use std::path::{Path, PathBuf};

use anyhow::Result;
use signet_core::{FontRegistry, FsBlobStore};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::db::SqliteStore;

pub struct AppState {
    pub store: SqliteStore,
    pub blobs: FsBlobStore,
    pub fonts: FontRegistry,
    pub auth_secret: String,
}

impl AppState {
    pub async fn new() -> Result<Self> {
        let storage_dir =
            PathBuf::from(std::env::var("STORAGE_DIR").unwrap_or_else(|_| "data".to_string()));
        std::fs::create_dir_all(&storage_dir)?;

        let db_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| {
            format!("sqlite:{}/signet.db?mode=rwc", storage_dir.display())
        });
        tracing::info!("Connecting to database: {}", db_url);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;
        Self::run_migrations(&pool).await?;

        let fonts_dir = std::env::var("FONTS_DIR").unwrap_or_else(|_| "fonts".to_string());
        let fonts = FontRegistry::load(Path::new(&fonts_dir))?;

        let auth_secret = match std::env::var("AUTH_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => {
                // Tokens won't survive a restart without a configured
                // secret.
                tracing::warn!("AUTH_SECRET not set, using a random per-process secret");
                uuid::Uuid::new_v4().to_string()
            }
        };

        Ok(Self {
            store: SqliteStore::new(pool),
            blobs: FsBlobStore::new(storage_dir),
            fonts,
            auth_secret,
        })
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<()> {
        tracing::info!("Running database migrations...");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                password_salt TEXT NOT NULL,
                password_digest TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL REFERENCES users(id),
                filename TEXT NOT NULL,
                storage_path TEXT NOT NULL,
                signed_path TEXT,
                status TEXT NOT NULL DEFAULT 'pending',
                uploaded_at TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS signatures (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL REFERENCES documents(id),
                signer_id TEXT NOT NULL REFERENCES users(id),
                page_number INTEGER NOT NULL,
                x REAL NOT NULL,
                y REAL NOT NULL,
                signature TEXT NOT NULL,
                font TEXT,
                rendered_height REAL NOT NULL,
                rendered_width REAL,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        // Indexes for the hot lookups
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_documents_owner ON documents(owner_id)
            "#,
        )
        .execute(pool)
        .await?;
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_signatures_document ON signatures(document_id, status)
            "#,
        )
        .execute(pool)
        .await?;

        tracing::info!("Migrations complete");
        Ok(())
    }
}
