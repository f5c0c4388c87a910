//! # edgequake-office2pdf
//!
//! Convert office documents (spreadsheets, word-processing files,
//! presentations) to PDF on the client, through a shared embedded office
//! engine, without uploading anything to a server.
//!
//! ## Why this crate?
//!
//! The conversion engine is a full office suite compiled to WebAssembly: a
//! multi-hundred-megabyte download, seconds of compilation, and a hard
//! dependency on shared-memory threads. Getting a single `convert()` call
//! right is easy. Getting a whole session right is not: every request must
//! share one engine, initialization must run at most once even under
//! concurrent callers, failures must say *which* file or header is missing,
//! and a bad document must not take the engine down for the next one.
//!
//! ## Components
//!
//! ```text
//! caller
//!  │  process(files, on_progress, cancel)
//!  ▼
//! ConversionGateway ── validate ─ progress ─ cancel checkpoints
//!  │  initialize() / convert()
//!  ▼
//! EngineManager ── preflight ─ asset probes ─ startup (once) ─ convert
//!  │  EngineFactory / ConversionEngine
//!  ▼
//! office engine (opaque)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_office2pdf::{
//!     CancelFlag, ConversionGateway, EngineConfig, EngineFactory, EngineManager,
//!     GatewayConfig, InputFile, ProcessInput,
//! };
//! use std::sync::Arc;
//!
//! # async fn run(factory: Arc<dyn EngineFactory>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = EngineConfig::builder()
//!     .base_path("https://cdn.example.com/office/")
//!     .build()?;
//! let manager = Arc::new(EngineManager::new(config, factory)?);
//! let gateway = ConversionGateway::new(Arc::clone(&manager), GatewayConfig::default());
//!
//! let file = InputFile::from_path("budget.xlsx").await?;
//! let artifact = gateway
//!     .process(ProcessInput::single(file), None, &CancelFlag::new())
//!     .await
//!     .into_result()?;
//! std::fs::write(&artifact.filename, &artifact.artifact)?;
//! # Ok(())
//! # }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod gateway;
pub mod lifecycle;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{EngineConfig, EngineConfigBuilder, GatewayConfig, GatewayConfigBuilder};
pub use engine::assets::{
    AssetInfo, AssetLocation, AssetProber, DefaultAssetProber, EngineAssets,
};
pub use engine::environment::{RuntimeCapabilities, StaticCapabilities};
pub use engine::{ConversionEngine, EngineEvents, EngineFactory, EngineOutput};
pub use error::{
    AssetStatus, ConfigError, ConversionFailure, ConvertError, EngineError, ErrorCode, InitError,
};
pub use format::{ConversionRoute, DocumentFormat, FormatPair};
pub use gateway::{
    ArtifactMetadata, CancelFlag, ConversionArtifact, ConversionGateway, ConversionResult,
    InputFile, ProcessInput,
};
pub use lifecycle::{ConvertedDocument, EngineManager};
pub use progress::{
    ConversionProgressCallback, NoopProgressCallback, ProgressCallback, ProgressEvent,
    ProgressPhase, ProgressTracker,
};
