//! Per-request conversion entry point.
//!
//! [`ConversionGateway::process`] turns one uploaded document into a PDF
//! artifact or a structured [`ConversionFailure`]. It never returns `Err` and
//! never panics on engine faults: the UI always gets something it can render.
//!
//! ## Flow
//!
//! ```text
//! validate ─▶ [cancel?] ─▶ initialize (0..ceiling %) ─▶ [cancel?]
//!          ─▶ convert ─▶ [cancel?] ─▶ complete (100 %)
//! ```
//!
//! Validation fails fast, before the engine is touched. Cancellation is
//! cooperative: it is only observed at the bracketed checkpoints and never
//! interrupts an engine call already running.

use crate::config::GatewayConfig;
use crate::error::{ConversionFailure, ErrorCode};
use crate::format::{extension_of, output_file_name, DocumentFormat};
use crate::lifecycle::EngineManager;
use crate::progress::{ProgressCallback, ProgressPhase, ProgressTracker};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// A document supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl InputFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, keeping its file name.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { name, bytes })
    }
}

/// Input to [`ConversionGateway::process`]. Exactly one file is expected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessInput {
    pub files: Vec<InputFile>,
}

impl ProcessInput {
    pub fn single(file: InputFile) -> Self {
        Self { files: vec![file] }
    }
}

impl From<Vec<InputFile>> for ProcessInput {
    fn from(files: Vec<InputFile>) -> Self {
        Self { files }
    }
}

/// Cooperative cancellation handle shared between the caller and a call.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Format metadata attached to a successful artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    /// Output format.
    pub format: DocumentFormat,
    pub source_format: DocumentFormat,
    pub route: String,
    pub size: usize,
}

/// A converted document ready to hand to the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionArtifact {
    pub artifact: Vec<u8>,
    pub filename: String,
    pub mime_type: String,
    pub metadata: ArtifactMetadata,
}

/// Outcome of one gateway call. Conversion is atomic: there is no partial result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionResult {
    Success(ConversionArtifact),
    Failure(ConversionFailure),
}

impl ConversionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ConversionResult::Success(_))
    }

    pub fn failure(&self) -> Option<&ConversionFailure> {
        match self {
            ConversionResult::Failure(f) => Some(f),
            ConversionResult::Success(_) => None,
        }
    }

    pub fn code(&self) -> Option<ErrorCode> {
        self.failure().map(|f| f.code)
    }

    /// Convert to a `Result` so callers can use `?`.
    pub fn into_result(self) -> Result<ConversionArtifact, ConversionFailure> {
        match self {
            ConversionResult::Success(a) => Ok(a),
            ConversionResult::Failure(f) => Err(f),
        }
    }
}

impl From<ConversionFailure> for ConversionResult {
    fn from(failure: ConversionFailure) -> Self {
        ConversionResult::Failure(failure)
    }
}

/// Translates document requests into engine calls on a shared manager.
#[derive(Clone)]
pub struct ConversionGateway {
    manager: Arc<EngineManager>,
    config: GatewayConfig,
}

impl ConversionGateway {
    pub fn new(manager: Arc<EngineManager>, config: GatewayConfig) -> Self {
        Self { manager, config }
    }

    pub fn manager(&self) -> &Arc<EngineManager> {
        &self.manager
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Convert the single file in `input` along this gateway's route.
    ///
    /// Progress percent is non-decreasing for the whole call and reaches
    /// exactly 100 on success. Engine initialization occupies
    /// `0..=init_progress_ceiling`; the conversion fills the rest.
    pub async fn process(
        &self,
        input: ProcessInput,
        progress: Option<ProgressCallback>,
        cancel: &CancelFlag,
    ) -> ConversionResult {
        let route = &self.config.route;
        let mut files = input.files;

        // ── Validate ─────────────────────────────────────────────────────
        if files.len() != 1 {
            debug!("Rejected request with {} files", files.len());
            return ConversionFailure::new(
                ErrorCode::InvalidInput,
                format!("Expected exactly 1 file, received {}", files.len()),
            )
            .into();
        }
        let file = files.remove(0);

        let Some(source_format) = route.match_file(&file.name) else {
            let received = extension_of(&file.name).unwrap_or("none");
            debug!("Rejected '{}' for route {}", file.name, route.name);
            return ConversionFailure::new(
                ErrorCode::UnsupportedFileType,
                format!(
                    "Unsupported file type '{received}'; expected one of: {}",
                    route.accepted_list()
                ),
            )
            .into();
        };

        let start = Instant::now();
        // Direct field writes and deserialized configs skip the builder clamp.
        let ceiling = self.config.init_progress_ceiling.clamp(1, 95);
        let tracker = ProgressTracker::new(progress);
        tracker.emit(ProgressPhase::Loading, 2, "Preparing conversion engine");

        // ── Engine ───────────────────────────────────────────────────────
        if cancel.is_cancelled() {
            return cancelled(&file.name);
        }
        let init_progress = tracker.scaled(tracker.last_percent(), ceiling);
        if let Err(e) = self.manager.initialize(Some(init_progress)).await {
            warn!("Engine unavailable for '{}': {}", file.name, e);
            return ConversionFailure::from(e).into();
        }

        // ── Convert ──────────────────────────────────────────────────────
        if cancel.is_cancelled() {
            return cancelled(&file.name);
        }
        tracker.emit(
            ProgressPhase::Converting,
            ceiling.saturating_add((100 - ceiling) / 4),
            format!("Converting {} to {}", file.name, route.output.extension().to_uppercase()),
        );

        let converted = match self
            .manager
            .convert(&file.bytes, &file.name, route.output)
            .await
        {
            Ok(c) => c,
            Err(e) => {
                warn!("Conversion of '{}' failed: {}", file.name, e);
                return ConversionFailure::from(e).into();
            }
        };

        if cancel.is_cancelled() {
            return cancelled(&file.name);
        }

        tracker.emit(ProgressPhase::Complete, 100, "Conversion complete");
        info!(
            "Route {}: '{}' → PDF ({} bytes) in {}ms",
            route.name,
            file.name,
            converted.data.len(),
            start.elapsed().as_millis()
        );

        let mime_type = route.output.mime_type();
        if converted.mime_type != mime_type {
            warn!(
                "Engine labelled '{}' output as '{}'; declaring '{}'",
                file.name, converted.mime_type, mime_type
            );
        }

        let size = converted.data.len();
        ConversionResult::Success(ConversionArtifact {
            artifact: converted.data,
            filename: output_file_name(&file.name, route.output),
            mime_type: mime_type.to_string(),
            metadata: ArtifactMetadata {
                format: route.output,
                source_format,
                route: route.name.clone(),
                size,
            },
        })
    }
}

fn cancelled(name: &str) -> ConversionResult {
    info!("Conversion of '{}' cancelled", name);
    ConversionFailure::new(ErrorCode::ProcessingCancelled, "Conversion cancelled").into()
}
