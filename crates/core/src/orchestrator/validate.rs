//! Pre-flight checks for selected files.

use crate::slot::FileHandle;

use super::{OrchestratorConfig, ValidationError};

/// Check size and container type. No content inspection, no I/O.
pub fn validate_file(file: &FileHandle, config: &OrchestratorConfig) -> Result<(), ValidationError> {
    if file.size() > config.max_file_size_bytes {
        return Err(ValidationError::FileTooLarge {
            size: file.size(),
            max: config.max_file_size_bytes,
        });
    }

    match file.extension() {
        Some(ext) if config.allows_extension(&ext) => Ok(()),
        extension => Err(ValidationError::UnsupportedFormat { extension }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GIB: u64 = 1024 * 1024 * 1024;

    #[test]
    fn test_accepts_allowed_file() {
        let config = OrchestratorConfig::default();
        assert!(validate_file(&FileHandle::new("/v/a.mp4", 10), &config).is_ok());
        assert!(validate_file(&FileHandle::new("/v/B.MOV", 5 * GIB), &config).is_ok());
    }

    #[test]
    fn test_rejects_oversized_file() {
        let config = OrchestratorConfig::default();
        let err = validate_file(&FileHandle::new("/v/huge.mp4", 6 * GIB), &config).unwrap_err();
        assert_eq!(
            err,
            ValidationError::FileTooLarge {
                size: 6 * GIB,
                max: 5 * GIB
            }
        );
        assert_eq!(err.code(), "file_too_large");
    }

    #[test]
    fn test_rejects_disallowed_format() {
        let config = OrchestratorConfig::default();
        let err = validate_file(&FileHandle::new("/v/clip.avi", 10), &config).unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnsupportedFormat {
                extension: Some("avi".to_string())
            }
        );

        let err = validate_file(&FileHandle::new("/v/noext", 10), &config).unwrap_err();
        assert_eq!(err, ValidationError::UnsupportedFormat { extension: None });
        assert_eq!(err.code(), "unsupported_format");
    }
}
