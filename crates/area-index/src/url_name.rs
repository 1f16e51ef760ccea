//! Area name to URL-name normalization.

/// Derives the URL name used for reverse lookups.
///
/// Every character outside `[-_A-Za-z0-9]` is dropped and letter case is
/// kept as written, so `"My Room #1!"` becomes `"MyRoom1"`. The mapping is
/// lossy and idempotent.
pub fn normalize_url_name(name: &str) -> String {
    name.chars().filter(|c| is_url_name_char(*c)).collect()
}

fn is_url_name_char(c: char) -> bool {
    matches!(c, '-' | '_') || c.is_ascii_alphanumeric()
}
