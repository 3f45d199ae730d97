use crate::config::AccessConfig;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Keeps only the last path component and replaces reserved characters.
pub fn sanitize_filename(filename: &str) -> Result<String, ValidationError> {
    let name = Path::new(filename.trim())
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    if name.is_empty() || name == "." || name == ".." {
        return Err(ValidationError {
            code: "INVALID_FILENAME",
            message: "Filename cannot be empty".to_string(),
        });
    }

    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        tracing::warn!("Path traversal attempt detected: {}", filename);
    }

    let sanitized: String = name
        .chars()
        .map(|c| match c {
            c if c.is_control() => '_',
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | ';' => '_',
            c => c,
        })
        .collect();

    // Limit length safely for UTF-8
    let sanitized = if sanitized.len() > 255 {
        let mut end = 255;
        while !sanitized.is_char_boundary(end) {
            end -= 1;
        }
        sanitized[..end].to_string()
    } else {
        sanitized
    };

    Ok(sanitized)
}

/// Picks the content type to store for an upload.
///
/// When the magic bytes identify the format, the sniffed type wins over the
/// declared one; otherwise the declared type (parameters stripped) is used.
/// Either way the result must be on the allowlist.
pub fn resolve_content_type(
    declared: Option<&str>,
    data: &[u8],
    config: &AccessConfig,
) -> Result<String, ValidationError> {
    let declared = declared
        .map(|ct| ct.split(';').next().unwrap_or("").trim().to_lowercase())
        .filter(|ct| !ct.is_empty())
        .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string());

    let effective = match infer::get(data) {
        Some(kind) => {
            if kind.mime_type() != declared {
                tracing::debug!(
                    "Declared type {} differs from sniffed type {}",
                    declared,
                    kind.mime_type()
                );
            }
            kind.mime_type().to_string()
        }
        None => declared,
    };

    if !config.is_mime_allowed(&effective) {
        return Err(ValidationError {
            code: "INVALID_MIME_TYPE",
            message: format!("File type '{}' is not supported", effective),
        });
    }

    Ok(effective)
}
