//! The conversion engine as an opaque capability.
//!
//! Nothing in this crate knows how the office suite lays out a page. The
//! engine is reached through three narrow traits:
//!
//! ```text
//! EngineFactory ──create(assets, events)──▶ ConversionEngine
//!                                            ├─ initialize()
//!                                            ├─ convert(bytes, formats, name)
//!                                            └─ destroy()
//! EngineEvents ◀── progress / ready / error hooks fired by the engine
//! ```
//!
//! Swapping the WebAssembly build for a native one (or a test double) only
//! requires implementing these traits.
//!
//! 1. [`assets`]      — asset locations and reachability probes
//! 2. [`environment`] — runtime capability preflight

pub mod assets;
pub mod environment;

use crate::error::EngineError;
use crate::format::FormatPair;
use crate::progress::ProgressPhase;
use assets::EngineAssets;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

/// Raw result of an engine conversion.
///
/// `data` may be backed by engine-managed memory; callers copy it out before
/// handing it to anyone else.
#[derive(Debug, Clone)]
pub struct EngineOutput {
    pub data: Bytes,
    pub mime_type: String,
}

/// Hooks the engine fires while it runs. Implementations must be cheap and
/// must not block; they may be called from the engine's worker context.
pub trait EngineEvents: Send + Sync {
    fn on_progress(&self, phase: ProgressPhase, percent: u8, message: &str);

    fn on_ready(&self) {}

    fn on_error(&self, message: &str) {
        let _ = message;
    }
}

/// A running (or startable) engine instance.
#[async_trait]
pub trait ConversionEngine: Send + Sync {
    /// Complete the engine's own startup. Called exactly once per instance.
    async fn initialize(&self) -> Result<(), EngineError>;

    /// Convert `input` from `formats.input` to `formats.output`.
    async fn convert(
        &self,
        input: &[u8],
        formats: &FormatPair,
        source_name: &str,
    ) -> Result<EngineOutput, EngineError>;

    /// Release the engine's resources. Must tolerate repeated calls.
    async fn destroy(&self);
}

/// Builds an engine instance wired to explicit asset paths and event hooks.
pub trait EngineFactory: Send + Sync {
    fn create(
        &self,
        assets: &EngineAssets,
        events: Arc<dyn EngineEvents>,
    ) -> Result<Arc<dyn ConversionEngine>, EngineError>;
}
