//! Burn pending placements into a signed copy of the PDF

use chrono::Utc;

use crate::coords::{viewport_to_pdf, Viewport};
use crate::error::SignError;
use crate::fonts::FontRegistry;
use crate::pdf::PdfFile;
use crate::store::{BlobStore, PlacementStatus, PlacementStore};

/// Signature text is always drawn at this size, in points.
pub const SIGNATURE_FONT_SIZE: f64 = 20.0;

#[derive(Debug, Clone)]
pub struct FinalizeOutcome {
    /// Blob path of the signed output.
    pub signed_path: String,
    pub drawn: usize,
    pub skipped: usize,
}

/// Draw every pending placement into a copy of the original PDF and
/// commit the result. The original upload is never modified.
///
/// Placement state is only touched after the signed bytes are durably
/// written; a storage failure leaves every placement pending so the
/// caller can retry.
pub async fn finalize_document(
    store: &dyn PlacementStore,
    blobs: &dyn BlobStore,
    fonts: &FontRegistry,
    document_id: &str,
) -> Result<FinalizeOutcome, SignError> {
    let document = store
        .find_document(document_id)
        .await?
        .ok_or_else(|| SignError::NotFound(document_id.to_string()))?;

    let placements = store.pending_placements(document_id).await?;
    if placements.is_empty() {
        return Err(SignError::NoPendingSignatures(document_id.to_string()));
    }

    let bytes = blobs.read(&document.storage_path)?;
    let mut pdf = PdfFile::from_bytes(&bytes)?;
    let page_count = pdf.page_count();

    let mut drawn = 0;
    let mut skipped = 0;
    for placement in &placements {
        // A placement can outlive its page if the document changed
        // after it was stored. Skip it rather than failing the batch.
        if placement.page_number < 1 || placement.page_number > page_count as i64 {
            tracing::warn!(
                placement = %placement.id,
                page = placement.page_number,
                page_count,
                "skipping placement on out-of-range page"
            );
            skipped += 1;
            continue;
        }
        let page_num = placement.page_number as u32;
        let page = pdf.page_size(page_num)?;
        let viewport = Viewport {
            width: placement.rendered_width,
            height: if placement.rendered_height > 0.0 {
                placement.rendered_height
            } else {
                page.height
            },
        };
        let (point, _) = viewport_to_pdf(page, viewport, placement.x, placement.y)?;
        let font = fonts.resolve(placement.font.as_deref());
        pdf.draw_text(
            page_num,
            &placement.signature,
            point,
            SIGNATURE_FONT_SIZE,
            font,
        )?;
        drawn += 1;
    }

    let output = pdf.save_to_bytes()?;
    let signed_path = unique_signed_path(blobs);
    blobs.write(&signed_path, &output)?;

    store
        .set_document_signed_file(document_id, &signed_path)
        .await?;
    store
        .update_placements_status(document_id, PlacementStatus::Pending, PlacementStatus::Signed)
        .await?;
    store
        .delete_placements(document_id, PlacementStatus::Signed)
        .await?;

    tracing::info!(
        document = document_id,
        drawn,
        skipped,
        path = %signed_path,
        "document finalized"
    );
    Ok(FinalizeOutcome {
        signed_path,
        drawn,
        skipped,
    })
}

/// Timestamp-named output path, suffixed on collision.
fn unique_signed_path(blobs: &dyn BlobStore) -> String {
    let ts = Utc::now().timestamp_millis();
    let mut path = format!("signed/signed-{}.pdf", ts);
    let mut n = 1;
    while blobs.exists(&path) {
        path = format!("signed/signed-{}-{}.pdf", ts, n);
        n += 1;
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::testpdf::letter_pdf;
    use crate::store::{
        DocumentRecord, DocumentStatus, MemoryBlobStore, MemoryStore, NewPlacement,
    };
    use pretty_assertions::assert_eq;

    fn seed(store: &MemoryStore, blobs: &MemoryBlobStore, pages: usize) {
        store.seed_document(DocumentRecord {
            id: "doc-1".into(),
            owner_id: "owner".into(),
            filename: "contract.pdf".into(),
            storage_path: "uploads/doc-1.pdf".into(),
            signed_path: None,
            status: DocumentStatus::Pending,
            uploaded_at: chrono::Utc::now(),
        });
        blobs.write("uploads/doc-1.pdf", &letter_pdf(pages)).unwrap();
    }

    fn placement(signer: &str, page: i64, x: f64, y: f64) -> NewPlacement {
        NewPlacement {
            document_id: "doc-1".into(),
            signer_id: signer.into(),
            page_number: page,
            x,
            y,
            signature: format!("Signature of {}", signer),
            font: None,
            rendered_height: 800.0,
            rendered_width: Some(600.0),
        }
    }

    fn registry() -> FontRegistry {
        FontRegistry::from_fonts(vec![("Great Vibes", b"stub-font".to_vec())]).unwrap()
    }

    #[tokio::test]
    async fn unknown_document_is_not_found() {
        let store = MemoryStore::new();
        let blobs = MemoryBlobStore::new();
        let err = finalize_document(&store, &blobs, &registry(), "ghost")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn no_pending_is_distinct_from_not_found() {
        let store = MemoryStore::new();
        let blobs = MemoryBlobStore::new();
        seed(&store, &blobs, 1);
        let err = finalize_document(&store, &blobs, &registry(), "doc-1")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "no_pending_signatures");
    }

    #[tokio::test]
    async fn finalize_draws_flips_and_clears() {
        let store = MemoryStore::new();
        let blobs = MemoryBlobStore::new();
        seed(&store, &blobs, 1);
        store
            .replace_pending(placement("alice", 1, 300.0, 400.0))
            .await
            .unwrap();

        let outcome = finalize_document(&store, &blobs, &registry(), "doc-1")
            .await
            .unwrap();
        assert_eq!(outcome.drawn, 1);
        assert_eq!(outcome.skipped, 0);
        assert!(outcome.signed_path.starts_with("signed/signed-"));
        assert!(outcome.signed_path.ends_with(".pdf"));

        // Output is durable and is a loadable PDF with the text drawn
        // at the transformed position (612x792 at 600x800 rendering).
        let signed = blobs.read(&outcome.signed_path).unwrap();
        let text = String::from_utf8_lossy(&signed);
        assert!(text.contains("(Signature of alice) Tj"));
        assert!(text.contains("306 396 Td"));
        assert!(PdfFile::from_bytes(&signed).is_ok());

        // The original upload is untouched.
        assert_eq!(blobs.read("uploads/doc-1.pdf").unwrap(), letter_pdf(1));

        let document = store.find_document("doc-1").await.unwrap().unwrap();
        assert_eq!(document.status, DocumentStatus::Signed);
        assert_eq!(document.signed_path.as_deref(), Some(outcome.signed_path.as_str()));
        assert_eq!(store.placement_count(), 0);
    }

    #[tokio::test]
    async fn out_of_range_pages_are_skipped_not_fatal() {
        let store = MemoryStore::new();
        let blobs = MemoryBlobStore::new();
        seed(&store, &blobs, 2);
        store
            .replace_pending(placement("alice", 1, 100.0, 100.0))
            .await
            .unwrap();
        store
            .replace_pending(placement("bob", 99, 100.0, 100.0))
            .await
            .unwrap();
        store
            .replace_pending(placement("carol", 2, 200.0, 200.0))
            .await
            .unwrap();

        let outcome = finalize_document(&store, &blobs, &registry(), "doc-1")
            .await
            .unwrap();
        assert_eq!(outcome.drawn, 2);
        assert_eq!(outcome.skipped, 1);

        let signed = blobs.read(&outcome.signed_path).unwrap();
        let text = String::from_utf8_lossy(&signed);
        assert!(text.contains("Signature of alice"));
        assert!(text.contains("Signature of carol"));
        assert!(!text.contains("Signature of bob"));
    }

    #[tokio::test]
    async fn storage_failure_leaves_placements_pending() {
        let store = MemoryStore::new();
        let blobs = MemoryBlobStore::new();
        seed(&store, &blobs, 1);
        store
            .replace_pending(placement("alice", 1, 100.0, 100.0))
            .await
            .unwrap();
        blobs.fail_writes();

        let err = finalize_document(&store, &blobs, &registry(), "doc-1")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "storage");

        let pending = store.pending_placements("doc-1").await.unwrap();
        assert_eq!(pending.len(), 1);
        let document = store.find_document("doc-1").await.unwrap().unwrap();
        assert_eq!(document.status, DocumentStatus::Pending);
        assert_eq!(document.signed_path, None);
    }

    #[tokio::test]
    async fn output_paths_do_not_collide() {
        let store = MemoryStore::new();
        let blobs = MemoryBlobStore::new();
        seed(&store, &blobs, 1);

        // Occupy the path a same-millisecond finalize would pick.
        let ts = chrono::Utc::now().timestamp_millis();
        for t in ts..ts + 1000 {
            blobs
                .write(&format!("signed/signed-{}.pdf", t), b"existing")
                .unwrap();
        }
        store
            .replace_pending(placement("alice", 1, 100.0, 100.0))
            .await
            .unwrap();

        let outcome = finalize_document(&store, &blobs, &registry(), "doc-1")
            .await
            .unwrap();
        assert!(outcome.signed_path.contains("-1.pdf") || !blobs
            .read(&outcome.signed_path)
            .unwrap()
            .starts_with(b"existing"));
    }
}
