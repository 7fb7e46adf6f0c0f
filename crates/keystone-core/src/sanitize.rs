//! Display-name sanitizing for the host platform
//!
//! The host only accepts names made of letters, digits, spaces and
//! apostrophes, starting and ending with a letter or digit.

use crate::record::VendorId;

/// Normalize a user-entered label into a name the host will accept
pub fn sanitize_device_name(raw: &str, id: VendorId) -> String {
    let replaced: String = raw
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == ' ' || c == '\'' {
                c
            } else {
                ' '
            }
        })
        .collect();

    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_matches(|c: char| !c.is_alphanumeric());

    if trimmed.is_empty() {
        format!("Unnamed device ID{}", id)
    } else {
        trimmed.to_string()
    }
}
