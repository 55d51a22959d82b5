//! PDF loading, font embedding, and text drawing via lopdf

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::coords::{PageSize, PdfPoint};
use crate::error::SignError;
use crate::fonts::FontAsset;

/// Escape text for a PDF string literal under WinAnsiEncoding.
/// U+00A0..=U+00FF coincide with WinAnsi and are emitted as octal
/// escapes; only characters the encoding cannot represent become `?`.
fn escape_pdf_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            '\\' => out.push_str("\\\\"),
            _ if c.is_ascii() => out.push(c),
            '\u{A0}'..='\u{FF}' => out.push_str(&format!("\\{:03o}", c as u32)),
            _ => out.push('?'),
        }
    }
    out
}

/// Wrapper around `lopdf::Document` exposing the operations the
/// finalizer needs: page lookup, font embedding, and text drawing.
#[derive(Debug)]
pub struct PdfFile {
    doc: Document,
    /// Fonts already embedded in this document, keyed by asset name.
    embedded: HashMap<String, (ObjectId, String)>,
    next_font: usize,
}

impl PdfFile {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignError> {
        let doc = Document::load_mem(bytes)
            .map_err(|e| SignError::Internal(format!("PDF parse error: {}", e)))?;
        Ok(Self {
            doc,
            embedded: HashMap::new(),
            next_font: 1,
        })
    }

    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    /// Page object ID for a 1-based page number.
    pub fn page_id(&self, page_num: u32) -> Option<ObjectId> {
        self.doc.get_pages().get(&page_num).copied()
    }

    /// Native page dimensions from the MediaBox, walking up the Pages
    /// tree when the page inherits it. Defaults to US Letter.
    pub fn page_size(&self, page_num: u32) -> Result<PageSize, SignError> {
        let page_id = self.page_id(page_num).ok_or(SignError::InvalidPage {
            page: page_num as i64,
            page_count: self.page_count(),
        })?;
        let page = self.doc.get_object(page_id)?;
        let rect = self.find_media_box(page, 10);
        Ok(PageSize {
            width: rect[2] - rect[0],
            height: rect[3] - rect[1],
        })
    }

    fn find_media_box(&self, obj: &Object, depth: usize) -> [f64; 4] {
        if depth == 0 {
            return [0.0, 0.0, 612.0, 792.0];
        }
        if let Ok(dict) = obj.as_dict() {
            if let Ok(media_box) = dict.get(b"MediaBox") {
                if let Some(rect) = self.parse_rect(media_box) {
                    return rect;
                }
            }
            if let Ok(Object::Reference(parent_id)) = dict.get(b"Parent") {
                if let Ok(parent) = self.doc.get_object(*parent_id) {
                    return self.find_media_box(parent, depth - 1);
                }
            }
        }
        [0.0, 0.0, 612.0, 792.0]
    }

    fn parse_rect(&self, obj: &Object) -> Option<[f64; 4]> {
        let arr = match obj {
            Object::Array(a) => a,
            Object::Reference(id) => match self.doc.get_object(*id) {
                Ok(Object::Array(a)) => a,
                _ => return None,
            },
            _ => return None,
        };
        if arr.len() != 4 {
            return None;
        }
        let mut values = [0.0f64; 4];
        for (i, item) in arr.iter().enumerate() {
            values[i] = self.extract_number(item)?;
        }
        Some(values)
    }

    fn extract_number(&self, obj: &Object) -> Option<f64> {
        match obj {
            Object::Integer(i) => Some(*i as f64),
            Object::Real(r) => Some(*r as f64),
            Object::Reference(id) => self
                .doc
                .get_object(*id)
                .ok()
                .and_then(|o| self.extract_number(o)),
            _ => None,
        }
    }

    /// Draw text at PDF coordinates on a 1-based page, embedding the
    /// font on first use.
    pub fn draw_text(
        &mut self,
        page_num: u32,
        text: &str,
        at: PdfPoint,
        size: f64,
        font: &FontAsset,
    ) -> Result<(), SignError> {
        let page_id = self.page_id(page_num).ok_or(SignError::InvalidPage {
            page: page_num as i64,
            page_count: self.page_count(),
        })?;

        let (font_id, resource_name) = self.embed_font(font)?;
        self.add_font_to_page(page_id, &resource_name, font_id)?;

        let content = format!(
            "q\n0 0 0 rg\nBT\n/{} {} Tf\n{} {} Td\n({}) Tj\nET\nQ\n",
            resource_name,
            size,
            at.x,
            at.y,
            escape_pdf_text(text),
        );
        self.append_content(page_id, content.into_bytes())
    }

    /// Embed a TrueType font program once per document; returns the
    /// font object ID and the content-stream resource name.
    fn embed_font(&mut self, asset: &FontAsset) -> Result<(ObjectId, String), SignError> {
        if let Some(entry) = self.embedded.get(&asset.name) {
            return Ok(entry.clone());
        }
        let metrics = &asset.metrics;
        let base_name = asset.name.replace(' ', "");

        let mut file_dict = Dictionary::new();
        file_dict.set("Length1", Object::Integer(asset.bytes.len() as i64));
        let file_id = self
            .doc
            .add_object(Object::Stream(Stream::new(file_dict, asset.bytes.as_ref().clone())));

        let mut descriptor = Dictionary::new();
        descriptor.set("Type", Object::Name(b"FontDescriptor".to_vec()));
        descriptor.set("FontName", Object::Name(base_name.clone().into_bytes()));
        descriptor.set("Flags", Object::Integer(32)); // Nonsymbolic
        descriptor.set(
            "FontBBox",
            Object::Array(
                metrics
                    .bbox
                    .iter()
                    .map(|v| Object::Real(*v as f32))
                    .collect(),
            ),
        );
        descriptor.set("ItalicAngle", Object::Real(metrics.italic_angle as f32));
        descriptor.set("Ascent", Object::Real(metrics.ascent as f32));
        descriptor.set("Descent", Object::Real(metrics.descent as f32));
        descriptor.set("CapHeight", Object::Real(metrics.cap_height as f32));
        descriptor.set("StemV", Object::Integer(80));
        descriptor.set("MissingWidth", Object::Integer(metrics.missing_width as i64));
        descriptor.set("FontFile2", Object::Reference(file_id));
        let descriptor_id = self.doc.add_object(Object::Dictionary(descriptor));

        let mut font_dict = Dictionary::new();
        font_dict.set("Type", Object::Name(b"Font".to_vec()));
        font_dict.set("Subtype", Object::Name(b"TrueType".to_vec()));
        font_dict.set("BaseFont", Object::Name(base_name.into_bytes()));
        font_dict.set("FirstChar", Object::Integer(32));
        font_dict.set("LastChar", Object::Integer(255));
        font_dict.set(
            "Widths",
            Object::Array(
                metrics
                    .widths
                    .iter()
                    .map(|w| Object::Integer(*w as i64))
                    .collect(),
            ),
        );
        font_dict.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));
        font_dict.set("FontDescriptor", Object::Reference(descriptor_id));
        let font_id = self.doc.add_object(Object::Dictionary(font_dict));

        let resource_name = format!("SF{}", self.next_font);
        self.next_font += 1;
        self.embedded
            .insert(asset.name.clone(), (font_id, resource_name.clone()));
        Ok((font_id, resource_name))
    }

    /// Register an embedded font in the page's Resources dictionary.
    fn add_font_to_page(
        &mut self,
        page_id: ObjectId,
        resource_name: &str,
        font_id: ObjectId,
    ) -> Result<(), SignError> {
        let mut resources = {
            let page = self
                .doc
                .get_object(page_id)?
                .as_dict()
                .map_err(|_| SignError::Internal("page is not a dictionary".into()))?;
            match page.get(b"Resources") {
                Ok(Object::Dictionary(dict)) => dict.clone(),
                Ok(Object::Reference(id)) => match self.doc.get_object(*id) {
                    Ok(Object::Dictionary(dict)) => dict.clone(),
                    _ => Dictionary::new(),
                },
                _ => Dictionary::new(),
            }
        };

        let mut fonts = match resources.get(b"Font") {
            Ok(Object::Dictionary(dict)) => dict.clone(),
            Ok(Object::Reference(id)) => match self.doc.get_object(*id) {
                Ok(Object::Dictionary(dict)) => dict.clone(),
                _ => Dictionary::new(),
            },
            _ => Dictionary::new(),
        };
        fonts.set(resource_name, Object::Reference(font_id));
        resources.set("Font", Object::Dictionary(fonts));

        let page = self
            .doc
            .get_object_mut(page_id)?
            .as_dict_mut()
            .map_err(|_| SignError::Internal("page is not a dictionary".into()))?;
        page.set("Resources", Object::Dictionary(resources));
        Ok(())
    }

    /// Append a content stream to a page, preserving existing content.
    fn append_content(&mut self, page_id: ObjectId, content: Vec<u8>) -> Result<(), SignError> {
        let stream = Stream::new(Dictionary::new(), content);
        let content_id = self.doc.add_object(Object::Stream(stream));

        // Contents may be a stream ref, an array, or a ref to an
        // array; resolve before appending so arrays never nest.
        let new_contents = {
            let page = self
                .doc
                .get_object(page_id)?
                .as_dict()
                .map_err(|_| SignError::Internal("page is not a dictionary".into()))?;
            match page.get(b"Contents") {
                Ok(Object::Array(arr)) => {
                    let mut arr = arr.clone();
                    arr.push(Object::Reference(content_id));
                    Object::Array(arr)
                }
                Ok(Object::Reference(existing_id)) => match self.doc.get_object(*existing_id) {
                    Ok(Object::Array(arr)) => {
                        let mut arr = arr.clone();
                        arr.push(Object::Reference(content_id));
                        Object::Array(arr)
                    }
                    _ => Object::Array(vec![
                        Object::Reference(*existing_id),
                        Object::Reference(content_id),
                    ]),
                },
                _ => Object::Reference(content_id),
            }
        };

        let page = self
            .doc
            .get_object_mut(page_id)?
            .as_dict_mut()
            .map_err(|_| SignError::Internal("page is not a dictionary".into()))?;

        page.set("Contents", new_contents);
        Ok(())
    }

    pub fn save_to_bytes(&mut self) -> Result<Vec<u8>, SignError> {
        let mut buffer = Vec::new();
        self.doc
            .save_to(&mut buffer)
            .map_err(|e| SignError::Internal(format!("failed to save PDF: {}", e)))?;
        Ok(buffer)
    }
}

/// Build minimal in-memory PDFs for tests.
#[cfg(test)]
pub(crate) mod testpdf {
    use lopdf::{dictionary, Dictionary, Document, Object, Stream};

    /// A valid PDF with `pages` empty US Letter pages.
    pub(crate) fn letter_pdf(pages: usize) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let kids: Vec<Object> = (0..pages)
            .map(|_| {
                let content_id = doc.add_object(Stream::new(Dictionary::new(), Vec::new()));
                let page_id = doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => Object::Reference(pages_id),
                    "Contents" => Object::Reference(content_id),
                    "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                });
                Object::Reference(page_id)
            })
            .collect();

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut out = Vec::new();
        doc.save_to(&mut out).expect("save test PDF");
        out
    }

    /// A single-page PDF whose Contents is an indirect reference to an
    /// array of stream references.
    pub(crate) fn letter_pdf_with_array_contents() -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let content_id = doc.add_object(Stream::new(Dictionary::new(), Vec::new()));
        let array_id = doc.add_object(Object::Array(vec![Object::Reference(content_id)]));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "Contents" => Object::Reference(array_id),
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut out = Vec::new();
        doc.save_to(&mut out).expect("save test PDF");
        out
    }
}
