//! Capability preflight: can this runtime host the multi-threaded engine?
//!
//! The engine's worker threads share a single memory buffer, which browsers
//! only expose to cross-origin-isolated pages. Checking up front turns a
//! startup that would otherwise hang into an immediate, actionable error.

use crate::error::InitError;
use tracing::warn;

/// What the hosting runtime supports. Browser hosts answer from the page's
/// isolation state; native hosts can use [`StaticCapabilities::native`].
pub trait RuntimeCapabilities: Send + Sync {
    /// True when the page is served with COOP/COEP isolation headers.
    fn cross_origin_isolated(&self) -> bool;

    /// True when shared-memory buffers can be allocated.
    fn shared_memory_supported(&self) -> bool;
}

/// Fixed answers, set by the host at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticCapabilities {
    pub cross_origin_isolated: bool,
    pub shared_memory: bool,
}

impl StaticCapabilities {
    /// A native process: threads always share memory.
    pub fn native() -> Self {
        Self {
            cross_origin_isolated: true,
            shared_memory: true,
        }
    }
}

impl Default for StaticCapabilities {
    fn default() -> Self {
        Self::native()
    }
}

impl RuntimeCapabilities for StaticCapabilities {
    fn cross_origin_isolated(&self) -> bool {
        self.cross_origin_isolated
    }

    fn shared_memory_supported(&self) -> bool {
        self.shared_memory
    }
}

/// Fail fast when any capability the engine needs is missing.
pub fn preflight(caps: &dyn RuntimeCapabilities) -> Result<(), InitError> {
    let mut missing = Vec::new();
    if !caps.cross_origin_isolated() {
        missing.push("cross-origin isolation");
    }
    if !caps.shared_memory_supported() {
        missing.push("shared memory (SharedArrayBuffer)");
    }
    if missing.is_empty() {
        return Ok(());
    }

    let missing = missing.join(" and ");
    warn!("Engine preflight failed: {} unavailable", missing);
    Err(InitError::EnvironmentUnsupported { missing })
}
