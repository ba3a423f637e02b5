//! Filesystem-safe directory naming.
//!
//! Download directories are named after user-visible titles, which may carry
//! characters that are invalid on FAT/exFAT-style filesystems. `sanitize`
//! maps any title to a name that is safe on every filesystem the download
//! tree might live on.

/// Replacement used when a name has no valid form at all
const INVALID_PLACEHOLDER: &str = "(invalid)";

/// Maximum directory name length.
///
/// vfat allows 255 UCS-2 chars, but the tree may end up on ext4 through a
/// compatibility layer, so use the stricter limit.
const MAX_NAME_LEN: usize = 255;

/// Mutate the given name into a valid directory name, replacing any invalid
/// character with `_`.
///
/// Blank input, `"."` and `".."` (which would escape or collide in a path)
/// map to `"(invalid)"`. The result is truncated to 255 characters. Total —
/// never fails.
pub fn sanitize(name: &str) -> String {
    if name.trim().is_empty() {
        return INVALID_PLACEHOLDER.to_string();
    }

    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if is_valid_filename_char(c) {
            out.push(c);
        } else {
            out.push('_');
        }
    }

    if out == "." || out == ".." {
        return INVALID_PLACEHOLDER.to_string();
    }

    out.chars().take(MAX_NAME_LEN).collect()
}

/// Returns true if the given character is valid in a directory name
fn is_valid_filename_char(c: char) -> bool {
    if c <= '\u{1f}' {
        return false;
    }
    !matches!(
        c,
        '"' | '*' | '/' | ':' | '<' | '>' | '?' | '\\' | '|' | '\u{7f}'
    )
}
