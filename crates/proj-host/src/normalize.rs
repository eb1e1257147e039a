//! Reference-system identifier normalization.
//!
//! Identifiers are normalized on the host side before they are encoded,
//! so `epsg:4326`, ` EPSG: 4326 ` and `EPSG:4326` reach the module as the
//! same bytes.

const EPSG_PREFIX: &str = "epsg:";

/// Normalize a CRS identifier.
///
/// Surrounding whitespace is trimmed. A case-insensitive `epsg:` prefix
/// becomes `EPSG:` followed by the trimmed code; any other identifier is
/// returned trimmed and otherwise unchanged.
pub fn normalize_crs(input: &str) -> String {
    let trimmed = input.trim();
    match trimmed.get(..EPSG_PREFIX.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(EPSG_PREFIX) => {
            format!("EPSG:{}", trimmed[EPSG_PREFIX.len()..].trim())
        }
        _ => trimmed.to_string(),
    }
}
