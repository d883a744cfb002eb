//! Extension → MIME table, used both for the outbound multipart part and for
//! the `Content-Type` of proxied downloads.

/// Fallback when the extension is unknown or missing.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Lowercased extension (including the dot) of `file_name`, or an empty
/// string when the name has no `.`.
pub fn extension_of(file_name: &str) -> String {
    match file_name.rfind('.') {
        Some(idx) => file_name[idx..].to_ascii_lowercase(),
        None => String::new(),
    }
}

/// Resolve the MIME type for a file name, matching the extension case-insensitively.
pub fn content_type_for(file_name: &str) -> &'static str {
    match extension_of(file_name).as_str() {
        ".wav" => "audio/wav",
        ".mp3" => "audio/mpeg",
        ".flac" => "audio/flac",
        ".m4a" => "audio/mp4",
        ".aac" => "audio/aac",
        ".ogg" => "audio/ogg",
        _ => OCTET_STREAM,
    }
}
