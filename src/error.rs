//! Media Vault - Error Types

use thiserror::Error;

/// Result type for vault operations
pub type VaultResult<T> = Result<T, VaultError>;

/// Vault error types
#[derive(Error, Debug)]
pub enum VaultError {
    // ═══════════════════════════════════════════════════════════════
    // CALLER ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("File too large: {size} bytes (max: {max})")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    // ═══════════════════════════════════════════════════════════════
    // STORAGE ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Storage write failed: {0}")]
    StorageWrite(String),

    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ═══════════════════════════════════════════════════════════════
    // DERIVATIVE ERRORS (never fatal to a request)
    // ═══════════════════════════════════════════════════════════════

    #[error("Derivative failed: {0}")]
    Derivative(String),

    // ═══════════════════════════════════════════════════════════════
    // CONFIGURATION
    // ═══════════════════════════════════════════════════════════════

    #[error("Configuration error: {0}")]
    Config(String),
}

impl VaultError {
    pub fn photo_not_found(id: &str) -> Self {
        VaultError::NotFound { kind: "Photo", id: id.to_string() }
    }

    pub fn grant_not_found(id: &str) -> Self {
        VaultError::NotFound { kind: "Share", id: id.to_string() }
    }

    /// HTTP status an outer web layer should answer with
    pub fn http_status(&self) -> u16 {
        match self {
            VaultError::NotFound { .. } => 404,
            VaultError::Validation(_)
            | VaultError::FileTooLarge { .. }
            | VaultError::UnsupportedFileType(_) => 400,
            VaultError::PermissionDenied(_) => 403,
            VaultError::StorageWrite(_)
            | VaultError::Persistence(_)
            | VaultError::Io(_)
            | VaultError::Derivative(_)
            | VaultError::Config(_) => 500,
        }
    }

    /// Check if resubmitting the same request could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            VaultError::StorageWrite(_) | VaultError::Persistence(_) | VaultError::Io(_)
        )
    }

    /// Check if this error came from the caller's input
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.http_status())
    }
}

impl From<rusqlite::Error> for VaultError {
    fn from(e: rusqlite::Error) -> Self {
        VaultError::Persistence(e.to_string())
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(e: serde_json::Error) -> Self {
        VaultError::Persistence(format!("serialization: {e}"))
    }
}

impl From<image::ImageError> for VaultError {
    fn from(e: image::ImageError) -> Self {
        VaultError::Derivative(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(VaultError::photo_not_found("p1").http_status(), 404);
        assert_eq!(VaultError::Validation("x".into()).http_status(), 400);
        assert_eq!(VaultError::FileTooLarge { size: 2, max: 1 }.http_status(), 400);
        assert_eq!(VaultError::PermissionDenied("x".into()).http_status(), 403);
        assert_eq!(VaultError::Persistence("x".into()).http_status(), 500);

        assert!(VaultError::StorageWrite("disk full".into()).is_retryable());
        assert!(!VaultError::Validation("x".into()).is_retryable());
        assert!(VaultError::grant_not_found("g").is_client_error());
    }

    #[test]
    fn test_not_found_message() {
        let err = VaultError::grant_not_found("abc");
        assert_eq!(err.to_string(), "Share not found: abc");
    }
}
