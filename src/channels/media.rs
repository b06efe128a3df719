//! Local storage naming and integrity checks for downloaded media.

use std::path::{Path, PathBuf};

use base64::Engine;
use sha2::{Digest, Sha256};

/// Extension used when the MIME type is not in the table.
pub const FALLBACK_EXTENSION: &str = ".bin";

/// Base MIME type → file extension, covering the types the Cloud API delivers.
const MIME_EXTENSIONS: &[(&str, &str)] = &[
    // audio
    ("audio/aac", ".aac"),
    ("audio/amr", ".amr"),
    ("audio/mp4", ".m4a"),
    ("audio/mpeg", ".mp3"),
    ("audio/ogg", ".ogg"),
    ("audio/wav", ".wav"),
    // images
    ("image/bmp", ".bmp"),
    ("image/gif", ".gif"),
    ("image/jpeg", ".jpg"),
    ("image/png", ".png"),
    ("image/webp", ".webp"),
    // video
    ("video/3gpp", ".3gp"),
    ("video/mp4", ".mp4"),
    ("video/quicktime", ".mov"),
    ("video/x-flv", ".flv"),
    ("video/x-ms-wmv", ".wmv"),
    ("video/x-msvideo", ".avi"),
    // text
    ("text/calendar", ".ics"),
    ("text/csv", ".csv"),
    ("text/plain", ".txt"),
    // archives
    ("application/gzip", ".gz"),
    ("application/x-7z-compressed", ".7z"),
    ("application/x-rar-compressed", ".rar"),
    ("application/x-tar", ".tar"),
    ("application/x-xz", ".xz"),
    ("application/zip", ".zip"),
    // documents
    ("application/pdf", ".pdf"),
    ("application/msword", ".doc"),
    ("application/vnd.ms-access", ".mdb"),
    ("application/vnd.ms-excel", ".xls"),
    ("application/vnd.ms-outlook", ".msg"),
    ("application/vnd.ms-powerpoint", ".ppt"),
    ("application/vnd.ms-publisher", ".pub"),
    ("application/vnd.visio", ".vsd"),
    ("application/vnd.visio2013", ".vsdx"),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ".docx",
    ),
    (
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        ".xlsx",
    ),
    (
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        ".pptx",
    ),
    ("application/vnd.oasis.opendocument.chart", ".odc"),
    ("application/vnd.oasis.opendocument.database", ".odb"),
    ("application/vnd.oasis.opendocument.formula", ".odf"),
    ("application/vnd.oasis.opendocument.graphics", ".odg"),
    ("application/vnd.oasis.opendocument.presentation", ".odp"),
    ("application/vnd.oasis.opendocument.spreadsheet", ".ods"),
    ("application/vnd.oasis.opendocument.text", ".odt"),
];

/// Strip parameters: `"audio/ogg; codecs=opus"` → `"audio/ogg"`.
pub fn base_mime(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// File extension (with dot) for a MIME type.
///
/// # Example
/// ```
/// use wagate::channels::media::extension_for;
///
/// assert_eq!(extension_for("audio/ogg; codecs=opus"), ".ogg");
/// assert_eq!(extension_for("application/x-unknown"), ".bin");
/// ```
pub fn extension_for(mime_type: &str) -> &'static str {
    let base = base_mime(mime_type);
    MIME_EXTENSIONS
        .iter()
        .find(|(mime, _)| *mime == base)
        .map(|(_, ext)| *ext)
        .unwrap_or(FALLBACK_EXTENSION)
}

/// Where an attachment is stored: `{root}/{media_id}{ext}`.
///
/// Characters outside `[A-Za-z0-9_-]` in the id are replaced so the path
/// cannot leave `root`.
pub fn media_path(root: &Path, media_id: &str, mime_type: &str) -> PathBuf {
    let safe: String = media_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    root.join(format!("{}{}", safe, extension_for(mime_type)))
}

/// Compare bytes against an announced SHA-256, given as hex or base64.
pub fn digest_matches(bytes: &[u8], expected: &str) -> bool {
    let digest = Sha256::digest(bytes);
    let expected = expected.trim();
    if expected.eq_ignore_ascii_case(&hex::encode(digest)) {
        return true;
    }
    let engine = base64::engine::general_purpose::STANDARD;
    engine
        .decode(expected)
        .map(|raw| raw.as_slice() == digest.as_slice())
        .unwrap_or(false)
}
