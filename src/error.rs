//! Error types for the edgequake-office2pdf library.
//!
//! Errors are split by the stage that produces them:
//!
//! * [`InitError`] — bringing the shared engine up failed. The manager resets
//!   to an uninitialized state so a later call can retry from scratch. The
//!   type is `Clone` because every caller waiting on the same in-flight
//!   initialization receives the same outcome.
//!
//! * [`ConvertError`] — a single conversion failed. The engine stays
//!   initialized; the next document is not penalised for this one.
//!
//! * [`ConversionFailure`] — what the gateway hands back to the UI: a stable
//!   [`ErrorCode`], a user-facing message and optional diagnostic detail.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Response headers a host must send for the engine's shared memory to work.
pub const ISOLATION_HEADERS: &str =
    "Cross-Origin-Opener-Policy: same-origin, Cross-Origin-Embedder-Policy: require-corp";

/// Fatal errors raised while initializing the shared engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InitError {
    /// The runtime cannot host the multi-threaded engine.
    #[error(
        "Environment unsupported: {missing} unavailable.\n\
Serve every response with the cross-origin isolation headers:\n  {}",
        ISOLATION_HEADERS
    )]
    EnvironmentUnsupported { missing: String },

    /// A required engine asset is missing or unreachable.
    #[error("Engine asset '{file}' is unavailable ({status}).\nCheck that the engine files are deployed at the configured base path.")]
    AssetUnavailable { file: String, status: AssetStatus },

    /// The engine was built but its own startup failed.
    #[error("Engine startup failed: {0}")]
    Startup(String),

    /// Startup did not finish within the configured bound.
    #[error("Engine initialization timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The manager was destroyed while this initialization was in flight.
    #[error("Engine initialization aborted: the manager was destroyed")]
    Aborted,
}

/// Why an asset probe failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetStatus {
    /// The server answered with a non-success status code.
    Http(u16),
    /// A local asset path does not exist.
    NotFound,
    /// The probe could not complete at all (DNS, connection, timeout, I/O).
    Unreachable(String),
}

impl fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetStatus::Http(code) => write!(f, "HTTP {code}"),
            AssetStatus::NotFound => f.write_str("not found"),
            AssetStatus::Unreachable(reason) => write!(f, "unreachable: {reason}"),
        }
    }
}

/// Errors raised by a single conversion call on the manager.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConvertError {
    /// `convert` was called before a successful `initialize`.
    #[error("Conversion engine is not initialized; call initialize() first")]
    EngineNotInitialized,

    /// The source name carries no extension the engine understands.
    #[error("Cannot derive an input format from '{name}'")]
    UnrecognizedFormat { name: String },

    /// The engine rejected or failed on this document.
    #[error("Engine conversion failed: {0}")]
    Engine(String),

    /// The engine call did not return within the configured bound.
    #[error("Conversion timed out after {secs}s")]
    Timeout { secs: u64 },
}

/// Failure reported by the engine itself through its capability interface.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct EngineError {
    pub message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Builder validation failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Stable machine-readable failure codes surfaced to the UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidInput,
    UnsupportedFileType,
    EnvironmentUnsupported,
    AssetUnavailable,
    EngineNotInitialized,
    ProcessingCancelled,
    ProcessingFailed,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::UnsupportedFileType => "UNSUPPORTED_FILE_TYPE",
            ErrorCode::EnvironmentUnsupported => "ENVIRONMENT_UNSUPPORTED",
            ErrorCode::AssetUnavailable => "ASSET_UNAVAILABLE",
            ErrorCode::EngineNotInitialized => "ENGINE_NOT_INITIALIZED",
            ErrorCode::ProcessingCancelled => "PROCESSING_CANCELLED",
            ErrorCode::ProcessingFailed => "PROCESSING_FAILED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure returned by [`crate::gateway::ConversionGateway::process`].
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("[{code}] {message}")]
pub struct ConversionFailure {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ConversionFailure {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.code == ErrorCode::ProcessingCancelled
    }
}

impl From<InitError> for ConversionFailure {
    fn from(err: InitError) -> Self {
        match &err {
            InitError::EnvironmentUnsupported { .. } => ConversionFailure::new(
                ErrorCode::EnvironmentUnsupported,
                "This browser session cannot run the conversion engine",
            )
            .with_detail(err.to_string()),
            InitError::AssetUnavailable { file, .. } => ConversionFailure::new(
                ErrorCode::AssetUnavailable,
                format!("Conversion engine file '{file}' could not be loaded"),
            )
            .with_detail(err.to_string()),
            _ => ConversionFailure::new(
                ErrorCode::ProcessingFailed,
                "Failed to initialize the conversion engine",
            )
            .with_detail(err.to_string()),
        }
    }
}

impl From<ConvertError> for ConversionFailure {
    fn from(err: ConvertError) -> Self {
        match err {
            ConvertError::EngineNotInitialized => ConversionFailure::new(
                ErrorCode::EngineNotInitialized,
                "Conversion engine is not initialized",
            )
            .with_detail(err.to_string()),
            other => ConversionFailure::new(ErrorCode::ProcessingFailed, "Document conversion failed")
                .with_detail(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_error_names_required_headers() {
        let e = InitError::EnvironmentUnsupported {
            missing: "SharedArrayBuffer".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("SharedArrayBuffer"), "got: {msg}");
        assert!(msg.contains("Cross-Origin-Opener-Policy"), "got: {msg}");
        assert!(msg.contains("Cross-Origin-Embedder-Policy"), "got: {msg}");
    }

    #[test]
    fn asset_error_names_file_and_status() {
        let e = InitError::AssetUnavailable {
            file: "soffice.wasm".into(),
            status: AssetStatus::Http(404),
        };
        let msg = e.to_string();
        assert!(msg.contains("soffice.wasm"));
        assert!(msg.contains("HTTP 404"));
    }

    #[test]
    fn error_code_serialises_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::UnsupportedFileType).unwrap();
        assert_eq!(json, "\"UNSUPPORTED_FILE_TYPE\"");
        assert_eq!(ErrorCode::ProcessingCancelled.to_string(), "PROCESSING_CANCELLED");
    }

    #[test]
    fn failure_omits_missing_detail() {
        let f = ConversionFailure::new(ErrorCode::InvalidInput, "Expected exactly 1 file, got 2");
        let json = serde_json::to_value(&f).unwrap();
        assert_eq!(json["code"], "INVALID_INPUT");
        assert!(json.get("detail").is_none());
    }

    #[test]
    fn convert_error_maps_to_processing_failed_with_detail() {
        let f: ConversionFailure = ConvertError::Engine("corrupt zip container".into()).into();
        assert_eq!(f.code, ErrorCode::ProcessingFailed);
        assert!(f.detail.unwrap().contains("corrupt zip container"));
    }

    #[test]
    fn init_errors_keep_operational_codes() {
        let f: ConversionFailure = InitError::AssetUnavailable {
            file: "soffice.data".into(),
            status: AssetStatus::NotFound,
        }
        .into();
        assert_eq!(f.code, ErrorCode::AssetUnavailable);
        assert!(f.message.contains("soffice.data"));

        let f: ConversionFailure = InitError::Startup("worker crashed".into()).into();
        assert_eq!(f.code, ErrorCode::ProcessingFailed);
    }
}
