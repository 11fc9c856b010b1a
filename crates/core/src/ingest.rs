use crate::IngestError;
use std::path::{Path, PathBuf};
use uuid::Uuid;
use walkdir::WalkDir;

const OCR_EXTENSION: &str = ".json";

/// Turns a public object URL back into a bucket-relative path. Paths that
/// are already relative pass through unchanged.
pub fn strip_public_prefix<'a>(reference: &'a str, public_prefix: &str) -> &'a str {
    let trimmed = reference.trim();
    if public_prefix.is_empty() {
        return trimmed;
    }
    trimmed.strip_prefix(public_prefix).unwrap_or(trimmed)
}

/// Document id of an OCR JSON object, e.g. `ocr/abcd1234.json` → `abcd1234`.
///
/// The leading folder segment and the `.json` extension are dropped; anything
/// in between, nested folders included, is the id.
pub fn document_id_from_path(storage_path: &str) -> Result<String, IngestError> {
    let invalid = || {
        IngestError::InvalidArgument(format!(
            "storage path {storage_path:?} is not <folder>/<id>.json"
        ))
    };

    let (_, file) = storage_path.split_once('/').ok_or_else(invalid)?;
    let id = file
        .len()
        .checked_sub(OCR_EXTENSION.len())
        .filter(|&split| file.is_char_boundary(split))
        .map(|split| file.split_at(split))
        .filter(|(_, extension)| extension.eq_ignore_ascii_case(OCR_EXTENSION))
        .map(|(id, _)| id)
        .ok_or_else(invalid)?;

    if id.is_empty() {
        return Err(invalid());
    }
    Ok(id.to_string())
}

/// Storage path and document id for a public URL or bucket path.
pub fn resolve_reference(
    reference: &str,
    public_prefix: &str,
) -> Result<(String, String), IngestError> {
    let storage_path = strip_public_prefix(reference, public_prefix);
    if storage_path.is_empty() {
        return Err(IngestError::EmptyInput("file path is required".to_string()));
    }
    let document_id = document_id_from_path(storage_path)?;
    Ok((storage_path.to_string(), document_id))
}

/// Fresh `<folder>/<uuid>.json` path for a newly processed upload.
pub fn new_ocr_path(folder: &str) -> String {
    format!("{}/{}.json", folder.trim_matches('/'), Uuid::new_v4())
}

pub fn discover_ocr_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_json = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

/// Storage path of a discovered file relative to the scanned root, with
/// forward slashes.
pub fn relative_storage_path(root: &Path, file: &Path) -> Result<String, IngestError> {
    let relative = file.strip_prefix(root).map_err(|_| {
        IngestError::InvalidArgument(format!(
            "{} is not under {}",
            file.display(),
            root.display()
        ))
    })?;

    Ok(relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/"))
}
