use std::path::Path;

/// Storage key for an uploaded artifact: `{YYYYMMDDhhmmss}_{uuid-v4}{.ext}`.
///
/// The extension keeps its original case; files without one get no suffix.
pub fn upload_key(path: &Path) -> String {
    let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S");
    let id = uuid::Uuid::new_v4();
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.is_empty() => format!("{stamp}_{id}.{ext}"),
        _ => format!("{stamp}_{id}"),
    }
}
