//! Core signing logic for the signet document e-signature service.
//!
//! This crate is transport-agnostic: it maps browser viewport clicks
//! into PDF user space, validates placement requests, resolves cursive
//! fonts, and burns pending signatures into a signed copy of the PDF.
//! Persistence is abstracted behind [`store::PlacementStore`] and
//! [`store::BlobStore`] so the logic runs unchanged against SQLite and
//! the filesystem in production or in-memory fakes in tests.

pub mod coords;
pub mod error;
pub mod finalize;
pub mod fonts;
pub mod pdf;
pub mod place;
pub mod store;

pub use coords::{
    check_bounds, pdf_to_viewport, scale_factors, viewport_to_pdf, PageSize, PdfPoint,
    ScaleFactors, Viewport,
};
pub use error::{AxisBounds, SignError};
pub use finalize::{finalize_document, FinalizeOutcome, SIGNATURE_FONT_SIZE};
pub use fonts::{normalize_font_name, FontAsset, FontRegistry, DEFAULT_FONT};
pub use pdf::PdfFile;
pub use place::{place_signature, PlacementInput, PlacementReceipt, ValidPlacement};
pub use store::{
    BlobStore, DocumentRecord, DocumentStatus, FsBlobStore, MemoryBlobStore, MemoryStore,
    NewPlacement, PlacementRecord, PlacementStatus, PlacementStore,
};
