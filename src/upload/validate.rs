//! Upload validation and naming

use crate::common::error::ApiError;

/// MIME types accepted for image upload
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/svg+xml",
];

/// Extension used when the client filename has none
const FALLBACK_EXTENSION: &str = "png";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadRejection {
    InvalidType,
    TooLarge { max_bytes: usize },
}

impl From<UploadRejection> for ApiError {
    fn from(rejection: UploadRejection) -> Self {
        ApiError::BadRequest(rejection.to_string())
    }
}

impl std::fmt::Display for UploadRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadRejection::InvalidType => {
                write!(f, "Invalid file type. Only image files are allowed.")
            }
            UploadRejection::TooLarge { max_bytes } => write!(
                f,
                "File too large. Maximum size allowed is {}MB.",
                max_bytes / (1024 * 1024)
            ),
        }
    }
}

pub fn is_allowed_mime(mime: &str) -> bool {
    ALLOWED_MIME_TYPES.contains(&mime)
}

pub fn check_type(mime: &str) -> Result<(), UploadRejection> {
    if is_allowed_mime(mime) {
        Ok(())
    } else {
        Err(UploadRejection::InvalidType)
    }
}

/// `size` is the number of bytes received so far
pub fn check_size(size: usize, max_bytes: usize) -> Result<(), UploadRejection> {
    if size > max_bytes {
        return Err(UploadRejection::TooLarge { max_bytes });
    }
    Ok(())
}

/// MIME type for a part, guessed from the filename when not declared
pub fn resolve_mime(declared: Option<&str>, filename: &str) -> String {
    match declared.map(str::trim).filter(|m| !m.is_empty()) {
        Some(mime) => mime.to_ascii_lowercase(),
        None => mime_guess::from_path(filename)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string(),
    }
}

/// Stored object name `upload-{timestamp_ms}.{ext}`
///
/// `ext` is whatever follows the last `.` of the client filename (the whole
/// name when there is no dot), reduced to ASCII alphanumerics.
pub fn generate_filename(client_name: &str, timestamp_ms: i64) -> String {
    let ext: String = client_name
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect();
    let ext = if ext.is_empty() {
        FALLBACK_EXTENSION
    } else {
        ext.as_str()
    };
    format!("upload-{}.{}", timestamp_ms, ext)
}
