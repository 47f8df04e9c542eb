//! Source family autodetection from file names.

use std::path::Path;

use crate::config::ModelKind;
use crate::error::{InputError, Result};

/// Keywords per family, checked in this order.
const KEYWORDS: [(ModelKind, &[&str]); 3] = [
    (ModelKind::NextGems, &["nextgems", "ngc", "catalog"]),
    (ModelKind::Icon, &["icon", "ifces2", "_dom0"]),
    (ModelKind::Era, &["era5", "era-", "era_"]),
];

fn match_keywords(text: &str) -> Option<ModelKind> {
    let lower = text.to_lowercase();
    KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map(|(kind, _)| *kind)
}

/// Infer the source family of an input path.
///
/// The file name is checked before the full path, so a reanalysis file in an
/// `icon/` directory is still recognised as reanalysis.
pub fn detect_model(path: &Path) -> Result<ModelKind> {
    let file_name = path.file_name().and_then(|s| s.to_str()).unwrap_or_default();

    if let Some(kind) = match_keywords(file_name) {
        return Ok(kind);
    }

    let lower = file_name.to_lowercase();
    if lower.ends_with(".yaml") || lower.ends_with(".yml") {
        return Ok(ModelKind::NextGems);
    }

    match_keywords(&path.to_string_lossy())
        .ok_or_else(|| InputError::UnknownSource(path.display().to_string()))
}
