//! Cursive font registry and name resolution
//!
//! The registry is loaded once at process start and never mutated at
//! request time; handlers share it by reference.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::error::SignError;

/// Registry key every unknown or absent font name resolves to.
pub const DEFAULT_FONT: &str = "Default";

/// Font files shipped alongside the server, keyed by registry name.
/// Great Vibes doubles as the `cursive` alias and the default.
const BUNDLED_FONTS: &[(&str, &str)] = &[
    ("Great Vibes", "GreatVibes-Regular.ttf"),
    ("Dancing Script", "DancingScript-VariableFont_wght.ttf"),
    ("Pacifico", "Pacifico-Regular.ttf"),
    ("Satisfy", "Satisfy-Regular.ttf"),
    ("Shadows Into Light", "ShadowsIntoLight-Regular.ttf"),
    ("Caveat", "Caveat-VariableFont_wght.ttf"),
    ("Homemade Apple", "HomemadeApple-Regular.ttf"),
    ("Indie Flower", "IndieFlower-Regular.ttf"),
];

/// Normalize a free-form, possibly CSS-style font-family string:
/// strip quotes, take the text before the first comma, trim.
/// Empty or absent input resolves to the default entry.
pub fn normalize_font_name(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return DEFAULT_FONT.to_string();
    };
    let cleaned: String = raw.chars().filter(|c| *c != '\'' && *c != '"').collect();
    let first = cleaned.split(',').next().unwrap_or("").trim();
    if first.is_empty() {
        DEFAULT_FONT.to_string()
    } else {
        first.to_string()
    }
}

/// Metrics needed to build a PDF FontDescriptor and Widths array,
/// normalized to 1000 units per em.
#[derive(Debug, Clone)]
pub struct FontMetrics {
    pub ascent: f64,
    pub descent: f64,
    pub cap_height: f64,
    pub italic_angle: f64,
    pub bbox: [f64; 4],
    /// Advance widths for character codes 32..=255 (Latin-1
    /// approximation of WinAnsi).
    pub widths: Vec<u16>,
    pub missing_width: u16,
}

impl FontMetrics {
    /// Conservative stand-in metrics for fonts ttf-parser rejects.
    fn conservative() -> Self {
        Self {
            ascent: 800.0,
            descent: -200.0,
            cap_height: 700.0,
            italic_angle: 0.0,
            bbox: [-200.0, -300.0, 1200.0, 1000.0],
            widths: vec![500; 224],
            missing_width: 500,
        }
    }

    fn parse(bytes: &[u8]) -> Option<Self> {
        let face = ttf_parser::Face::parse(bytes, 0).ok()?;
        let units_per_em = face.units_per_em() as f64;
        if units_per_em <= 0.0 {
            return None;
        }
        let scale = 1000.0 / units_per_em;

        let widths = (32u32..=255)
            .map(|code| {
                char::from_u32(code)
                    .and_then(|c| face.glyph_index(c))
                    .and_then(|gid| face.glyph_hor_advance(gid))
                    .map(|advance| (advance as f64 * scale).round() as u16)
                    .unwrap_or(500)
            })
            .collect();

        let bbox = face.global_bounding_box();
        Some(Self {
            ascent: face.ascender() as f64 * scale,
            descent: face.descender() as f64 * scale,
            cap_height: face
                .capital_height()
                .map(|v| v as f64 * scale)
                .unwrap_or(700.0),
            italic_angle: face.italic_angle() as f64,
            bbox: [
                bbox.x_min as f64 * scale,
                bbox.y_min as f64 * scale,
                bbox.x_max as f64 * scale,
                bbox.y_max as f64 * scale,
            ],
            widths,
            missing_width: 500,
        })
    }
}

/// One embeddable font program plus its parsed metrics.
#[derive(Debug)]
pub struct FontAsset {
    pub name: String,
    pub bytes: Arc<Vec<u8>>,
    pub metrics: FontMetrics,
}

impl FontAsset {
    fn new(name: &str, bytes: Vec<u8>) -> Self {
        let metrics = FontMetrics::parse(&bytes).unwrap_or_else(|| {
            tracing::warn!(font = name, "font metrics unparseable, using defaults");
            FontMetrics::conservative()
        });
        Self {
            name: name.to_string(),
            bytes: Arc::new(bytes),
            metrics,
        }
    }
}

/// Immutable mapping from normalized font name to font asset.
#[derive(Debug)]
pub struct FontRegistry {
    entries: HashMap<String, Arc<FontAsset>>,
}

impl FontRegistry {
    /// Load the bundled font set from a directory. The default font
    /// (Great Vibes) is required; other entries are skipped with a
    /// warning when their file is missing.
    pub fn load(dir: &Path) -> Result<Self, SignError> {
        let mut entries = HashMap::new();
        for (name, file) in BUNDLED_FONTS {
            let path = dir.join(file);
            match std::fs::read(&path) {
                Ok(bytes) => {
                    entries.insert(name.to_string(), Arc::new(FontAsset::new(name, bytes)));
                }
                Err(err) if *name == "Great Vibes" => {
                    return Err(SignError::Storage(format!(
                        "required font {} not readable: {}",
                        path.display(),
                        err
                    )));
                }
                Err(err) => {
                    tracing::warn!(font = name, error = %err, "skipping unavailable font");
                }
            }
        }

        let default = entries
            .get("Great Vibes")
            .cloned()
            .ok_or_else(|| SignError::Internal("default font missing from registry".into()))?;
        entries.insert("cursive".to_string(), default.clone());
        entries.insert(DEFAULT_FONT.to_string(), default);

        tracing::info!(fonts = entries.len(), "font registry loaded");
        Ok(Self { entries })
    }

    /// Build a registry from in-memory fonts. The first entry becomes
    /// the default and the `cursive` alias.
    pub fn from_fonts(fonts: Vec<(&str, Vec<u8>)>) -> Result<Self, SignError> {
        let mut entries = HashMap::new();
        let mut default = None;
        for (name, bytes) in fonts {
            let asset = Arc::new(FontAsset::new(name, bytes));
            if default.is_none() {
                default = Some(asset.clone());
            }
            entries.insert(name.to_string(), asset);
        }
        let default =
            default.ok_or_else(|| SignError::Internal("font registry needs at least one font".into()))?;
        entries.entry("cursive".to_string()).or_insert_with(|| default.clone());
        entries.entry(DEFAULT_FONT.to_string()).or_insert(default);
        Ok(Self { entries })
    }

    /// Resolve a raw font-family string to an asset. Resolution is
    /// total: unknown names fall back to the default entry.
    pub fn resolve(&self, raw: Option<&str>) -> &Arc<FontAsset> {
        let normalized = normalize_font_name(raw);
        self.entries
            .get(&normalized)
            .unwrap_or_else(|| &self.entries[DEFAULT_FONT])
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: normalization is idempotent.
        #[test]
        fn normalize_is_idempotent(raw in ".{0,60}") {
            let once = normalize_font_name(Some(&raw));
            let twice = normalize_font_name(Some(&once));
            prop_assert_eq!(once, twice);
        }

        /// Property: the normalized name is never empty and carries no
        /// quote characters or commas.
        #[test]
        fn normalized_name_is_clean(raw in ".{0,60}") {
            let name = normalize_font_name(Some(&raw));
            prop_assert!(!name.is_empty());
            prop_assert!(!name.contains('\''));
            prop_assert!(!name.contains('"'));
            prop_assert!(!name.contains(','));
        }

        /// Property: resolution is total for arbitrary input.
        #[test]
        fn resolve_never_fails(raw in ".{0,60}") {
            let registry = FontRegistry::from_fonts(vec![
                ("Great Vibes", b"stub".to_vec()),
            ]).unwrap();
            let asset = registry.resolve(Some(&raw));
            prop_assert!(!asset.bytes.is_empty());
        }
    }
}
