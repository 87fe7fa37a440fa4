//! Structured errors reported at the engine's call boundary

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    AlreadyRecording,
    AlreadyReplaying,
    NotFound,
    MalformedData,
    IoError,
    InjectionFailure,
    EmptyMacro,
    BackendUnavailable,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            suggestions: Vec::new(),
            context: None,
        }
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn already_recording() -> Self {
        Self::new(ErrorCode::AlreadyRecording, "a recording is already in progress")
            .with_suggestions(vec!["stop the current recording first".to_string()])
    }

    pub fn already_replaying() -> Self {
        Self::new(ErrorCode::AlreadyReplaying, "a replay is already in progress")
            .with_suggestions(vec!["stop the running replay first".to_string()])
    }

    pub fn not_found(path: &Path) -> Self {
        Self::new(
            ErrorCode::NotFound,
            format!("Macro file '{}' not found", path.display()),
        )
        .with_context(serde_json::json!({ "path": path.display().to_string() }))
    }

    pub fn malformed(path: &Path, reason: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::MalformedData,
            format!("Could not decode macro from '{}': {}", path.display(), reason),
        )
        .with_context(serde_json::json!({ "path": path.display().to_string() }))
    }

    pub fn io(path: &Path, err: &std::io::Error) -> Self {
        Self::new(
            ErrorCode::IoError,
            format!("I/O failure on '{}': {}", path.display(), err),
        )
        .with_context(serde_json::json!({
            "path": path.display().to_string(),
            "kind": format!("{:?}", err.kind()),
        }))
    }

    pub fn empty_macro() -> Self {
        Self::new(ErrorCode::EmptyMacro, "no events to replay")
            .with_suggestions(vec!["record or load a macro first".to_string()])
    }

    pub fn backend_unavailable(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::BackendUnavailable, reason)
            .with_suggestions(vec!["rebuild with `--features native`".to_string()])
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for Error {}

impl From<crate::input::InjectError> for Error {
    fn from(e: crate::input::InjectError) -> Self {
        Self::new(ErrorCode::InjectionFailure, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::AlreadyRecording).unwrap();
        assert_eq!(json, "\"ALREADY_RECORDING\"");
        let json = serde_json::to_string(&ErrorCode::MalformedData).unwrap();
        assert_eq!(json, "\"MALFORMED_DATA\"");
    }

    #[test]
    fn test_not_found_carries_path_context() {
        let err = Error::not_found(Path::new("/tmp/missing.json"));
        assert_eq!(err.code, ErrorCode::NotFound);
        assert!(err.message.contains("/tmp/missing.json"));
        assert_eq!(err.context.unwrap()["path"], "/tmp/missing.json");
    }

    #[test]
    fn test_display_includes_code() {
        let err = Error::already_replaying();
        assert_eq!(
            err.to_string(),
            "[AlreadyReplaying] a replay is already in progress"
        );
    }

    #[test]
    fn test_skips_empty_fields_when_serialized() {
        let err = Error::new(ErrorCode::IoError, "disk full");
        let value = serde_json::to_value(&err).unwrap();
        assert!(value.get("suggestions").is_none());
        assert!(value.get("context").is_none());
        assert_eq!(value["code"], "IO_ERROR");
    }

    #[test]
    fn test_inject_error_maps_to_injection_failure() {
        let err: Error = crate::input::InjectError::UnknownKey("bogus".into()).into();
        assert_eq!(err.code, ErrorCode::InjectionFailure);
        assert!(err.message.contains("bogus"));
    }
}
