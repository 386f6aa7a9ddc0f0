//! Normalization of user supplied names into storage segments

use super::error::{Result, StoreError};

/// Placeholder for leaves whose name sanitizes to nothing
pub const UNTITLED: &str = "Untitled";

/// Placeholder for folders whose name sanitizes to nothing
pub const NEW_FOLDER: &str = "New Folder";

const MAX_NAME_CHARS: usize = 120;

fn is_allowed(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.')
}

/// Sanitize `raw` against the allow-list, falling back to `placeholder`.
///
/// Leading dots are dropped as well so that a created entry is never hidden
/// from the scanner. The result never contains a path separator.
pub fn sanitize_name(raw: &str, placeholder: &str) -> String {
    let kept: String = raw.chars().filter(|c| is_allowed(*c)).collect();
    let trimmed = kept.trim().trim_start_matches('.').trim_start();
    let name: String = trimmed.chars().take(MAX_NAME_CHARS).collect();
    let name = name.trim_end();

    if name.is_empty() {
        placeholder.to_string()
    } else {
        name.to_string()
    }
}

/// Final guard before a name becomes a path segment
pub fn validate_segment(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.chars().any(char::is_control);
    if bad {
        return Err(StoreError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_disallowed_characters() {
        assert_eq!(sanitize_name("Shopping: list*?", UNTITLED), "Shopping list");
        assert_eq!(sanitize_name("  v1.2_final-draft  ", UNTITLED), "v1.2_final-draft");
    }

    #[test]
    fn test_traversal_attempt_has_no_separators() {
        let name = sanitize_name("../../etc", NEW_FOLDER);
        assert!(!name.is_empty());
        assert!(!name.contains('/'));
        assert!(!name.contains('\\'));
        assert_ne!(name, "..");
        assert!(validate_segment(&name).is_ok());
        assert_eq!(name, "etc");

        let name = sanitize_name("..\\..\\windows", NEW_FOLDER);
        assert_eq!(name, "windows");
    }

    #[test]
    fn test_fallback_placeholder() {
        assert_eq!(sanitize_name("///***", UNTITLED), UNTITLED);
        assert_eq!(sanitize_name("", NEW_FOLDER), NEW_FOLDER);
        assert_eq!(sanitize_name("   ", NEW_FOLDER), NEW_FOLDER);
        assert_eq!(sanitize_name("..", NEW_FOLDER), NEW_FOLDER);
    }

    #[test]
    fn test_unicode_letters_survive() {
        assert_eq!(sanitize_name("Café notes", UNTITLED), "Café notes");
    }

    #[test]
    fn test_long_names_are_truncated() {
        let raw = "a".repeat(500);
        assert_eq!(sanitize_name(&raw, UNTITLED).chars().count(), MAX_NAME_CHARS);
    }

    #[test]
    fn test_validate_segment_rejects_dot_segments() {
        assert!(validate_segment(".").is_err());
        assert!(validate_segment("..").is_err());
        assert!(validate_segment("a/b").is_err());
        assert!(validate_segment("").is_err());
        assert!(validate_segment("Work").is_ok());
    }
}
