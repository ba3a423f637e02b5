//! Utility functions for chapter-dl

/// Extension of the temporary file a page image is first written to
pub(crate) const TMP_EXTENSION: &str = "tmp";

/// Base filename for a page: three-digit, one-based index (`001`, `002`, ...).
///
/// Keeps lexicographic directory order equal to reading order for chapters
/// up to 999 pages.
pub(crate) fn page_filename(index: u32) -> String {
    format!("{:03}", index + 1)
}

/// Determine the image file extension for a downloaded page.
///
/// The `Content-Type` header is authoritative when it names a known image
/// type; otherwise the first bytes of the payload are sniffed. Falls back to
/// `jpg`, the overwhelmingly common case for comic pages.
pub(crate) fn image_extension(content_type: Option<&str>, bytes: &[u8]) -> &'static str {
    if let Some(ct) = content_type {
        // Strip any "; charset=..." parameter before matching
        let mime = ct.split(';').next().unwrap_or(ct).trim();
        match mime {
            "image/jpeg" | "image/jpg" => return "jpg",
            "image/png" => return "png",
            "image/gif" => return "gif",
            "image/webp" => return "webp",
            _ => {}
        }
    }
    sniff_extension(bytes).unwrap_or("jpg")
}

/// Guess an image extension from magic bytes
fn sniff_extension(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("jpg")
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        Some("png")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("gif")
    } else if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
        Some("webp")
    } else {
        None
    }
}
