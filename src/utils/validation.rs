use std::borrow::Cow;

#[derive(Debug, Clone)]
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

/// Reduces a client-supplied filename to a filesystem-safe form.
///
/// Only the last path component survives (both `/` and `\` count as
/// separators), whitespace becomes `_`, anything outside `[A-Za-z0-9._-]` is
/// dropped, and leading/trailing dots and underscores are trimmed. The result
/// may be empty.
pub fn sanitize_filename(filename: &str) -> String {
    let name = filename.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or("");

    if name.len() != filename.len() {
        tracing::warn!("Path components stripped from upload name: {}", filename);
    }

    let sanitized: String = name
        .chars()
        .filter_map(|c| {
            if c.is_whitespace() {
                Some('_')
            } else if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                Some(c)
            } else {
                None
            }
        })
        .collect();

    sanitized.trim_matches(|c: char| c == '.' || c == '_').to_string()
}

/// Lowercase extension after the last dot, if the name has one
pub fn file_extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Usernames end up inside stored file names, so they are held to the same
/// character set as sanitized filenames and must pass as a storage name.
pub fn validate_username(username: &str) -> Result<(), validator::ValidationError> {
    let valid = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if !valid || username.starts_with('.') || validate_storage_name(username).is_err() {
        let mut err = validator::ValidationError::new("INVALID_USERNAME");
        err.message = Some(Cow::from(
            "Username may only contain letters, digits, '.', '_' and '-', and no '..'",
        ));
        return Err(err);
    }
    Ok(())
}

/// Rejects names that would escape the media root
pub fn validate_storage_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name.contains("..")
        || name.chars().any(|c| c.is_control())
    {
        return Err(ValidationError {
            code: "INVALID_FILENAME",
            message: format!("'{}' is not a valid media file name", name),
        });
    }
    Ok(())
}
