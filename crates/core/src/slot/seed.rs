//! Loading the previous-uploads snapshot.

use std::path::Path;

use thiserror::Error;

use super::types::PreviousUpload;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Failed to read previous uploads from {path}: {message}")]
    Io { path: String, message: String },

    #[error("Failed to parse previous uploads: {0}")]
    Parse(String),
}

/// Parse a JSON array of previous-upload records.
pub fn parse_previous_uploads(json: &str) -> Result<Vec<PreviousUpload>, SeedError> {
    serde_json::from_str(json).map_err(|e| SeedError::Parse(e.to_string()))
}

/// Read and parse the previous-uploads file written by the page.
pub async fn load_previous_uploads(path: &Path) -> Result<Vec<PreviousUpload>, SeedError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SeedError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
    parse_previous_uploads(&contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::UploadState;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_keeps_order() {
        let json = r#"[
            {"video_id": "v1", "file_name": "a.mp4", "state": "processing"},
            {"video_id": "v2", "file_name": "b.mp4", "state": "ready",
             "encodings": {"desktop_mp4": true, "youtube": false}},
            {"video_id": "v3", "file_name": "c.mov", "state": "failed", "error": "file_corrupt"}
        ]"#;
        let records = parse_previous_uploads(json).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].video_id, "v1");
        assert_eq!(records[1].state, UploadState::Ready);
        assert_eq!(records[1].encodings.get("youtube"), Some(&false));
        assert_eq!(records[2].error.as_deref(), Some("file_corrupt"));
    }

    #[test]
    fn test_parse_invalid_json() {
        let result = parse_previous_uploads("{not json");
        assert!(matches!(result, Err(SeedError::Parse(_))));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"video_id": "v1", "file_name": "a.mp4", "state": "processing"}}]"#
        )
        .unwrap();

        let records = load_previous_uploads(file.path()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].file_name, "a.mp4");
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let result = load_previous_uploads(Path::new("/nonexistent/previous.json")).await;
        assert!(matches!(result, Err(SeedError::Io { .. })));
    }
}
