//! Progress events and the callback trait that receives them.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] into
//! [`crate::lifecycle::EngineManager::initialize`] or
//! [`crate::gateway::ConversionGateway::process`] to receive events while the
//! engine loads and while a document converts.
//!
//! # Why callbacks instead of channels?
//!
//! The callback is the least-invasive integration point: a host can forward
//! events to a progress bar, a broadcast channel or a log without the library
//! knowing how the UI is wired. The trait is `Send + Sync` because engine
//! events arrive from the engine's own worker context.
//!
//! Closures implement the trait directly:
//!
//! ```rust
//! use edgequake_office2pdf::{ConversionProgressCallback, ProgressCallback, ProgressEvent};
//! use std::sync::Arc;
//!
//! let cb: ProgressCallback = Arc::new(|e: &ProgressEvent| {
//!     eprintln!("{:>3}% {:?} {}", e.percent, e.phase, e.message);
//! });
//! ```

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Coarse stage of a conversion call, declared in the order a call moves
/// through them. Engine initialization ends in `Ready`, before `Converting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressPhase {
    Loading,
    Initializing,
    Ready,
    Converting,
    Complete,
}

/// A single immutable progress update. `percent` is always within 0..=100.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub phase: ProgressPhase,
    pub percent: u8,
    pub message: String,
}

impl ProgressEvent {
    pub fn new(phase: ProgressPhase, percent: u8, message: impl Into<String>) -> Self {
        Self {
            phase,
            percent: percent.min(100),
            message: message.into(),
        }
    }
}

/// Receives progress events. The default implementation ignores them.
pub trait ConversionProgressCallback: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent) {
        let _ = event;
    }
}

impl<F> ConversionProgressCallback for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_progress(&self, event: &ProgressEvent) {
        self(event)
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Shared handle type accepted throughout the crate.
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

/// Highest phase and percent delivered so far. Later events are raised to it,
/// so neither ever goes backwards.
#[derive(Debug, Clone, Copy)]
struct Watermark {
    phase: ProgressPhase,
    percent: u8,
}

impl Watermark {
    const START: Self = Self {
        phase: ProgressPhase::Loading,
        percent: 0,
    };

    fn raise(&mut self, phase: ProgressPhase, percent: u8) -> (ProgressPhase, u8) {
        self.phase = self.phase.max(phase);
        self.percent = self.percent.max(percent.min(100));
        (self.phase, self.percent)
    }
}

// ── Engine-side relay ────────────────────────────────────────────────────

struct RelayState {
    callback: Option<ProgressCallback>,
    finished: bool,
    mark: Watermark,
}

/// Forwards engine progress to the caller until initialization finishes.
///
/// Once [`ProgressRelay::finish`] has run, the caller's callback is dropped and
/// any late engine event is discarded.
pub(crate) struct ProgressRelay {
    state: Mutex<RelayState>,
}

impl ProgressRelay {
    pub(crate) fn new(callback: Option<ProgressCallback>) -> Self {
        Self {
            state: Mutex::new(RelayState {
                callback,
                finished: false,
                mark: Watermark::START,
            }),
        }
    }

    pub(crate) fn emit(&self, event: ProgressEvent) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.finished {
            debug!(
                "Suppressed stale progress event after init: {:?} {}%",
                event.phase, event.percent
            );
            return;
        }
        let (phase, percent) = state.mark.raise(event.phase, event.percent);
        if let Some(cb) = state.callback.as_ref() {
            cb.on_progress(&ProgressEvent {
                phase,
                percent,
                message: event.message,
            });
        }
    }

    /// Deliver `last` (if any), then detach the callback for good.
    pub(crate) fn finish(&self, last: Option<ProgressEvent>) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.finished {
            return;
        }
        if let Some(event) = last {
            let (phase, percent) = state.mark.raise(event.phase, event.percent);
            if let Some(cb) = state.callback.as_ref() {
                cb.on_progress(&ProgressEvent {
                    phase,
                    percent,
                    message: event.message,
                });
            }
        }
        state.finished = true;
        state.callback = None;
    }
}

// ── Gateway-side tracking ────────────────────────────────────────────────

/// Emits events for one gateway call, never letting phase or percent go
/// backwards.
pub struct ProgressTracker {
    callback: Option<ProgressCallback>,
    last: Mutex<Watermark>,
}

impl ProgressTracker {
    pub fn new(callback: Option<ProgressCallback>) -> Arc<Self> {
        Arc::new(Self {
            callback,
            last: Mutex::new(Watermark::START),
        })
    }

    pub fn emit(&self, phase: ProgressPhase, percent: u8, message: impl Into<String>) {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let (phase, percent) = last.raise(phase, percent);
        if let Some(cb) = self.callback.as_ref() {
            cb.on_progress(&ProgressEvent::new(phase, percent, message));
        }
    }

    pub fn last_percent(&self) -> u8 {
        self.last.lock().unwrap_or_else(|e| e.into_inner()).percent
    }

    /// A callback mapping 0..=100 into `start..=end` of this tracker's range.
    pub fn scaled(self: &Arc<Self>, start: u8, end: u8) -> ProgressCallback {
        let start = start.min(100);
        Arc::new(ScaledProgress {
            tracker: Arc::clone(self),
            start,
            end: end.clamp(start, 100),
        })
    }
}

struct ScaledProgress {
    tracker: Arc<ProgressTracker>,
    start: u8,
    end: u8,
}

impl ScaledProgress {
    fn map(&self, percent: u8) -> u8 {
        let span = u16::from(self.end - self.start);
        self.start + (u16::from(percent.min(100)) * span / 100) as u8
    }
}

impl ConversionProgressCallback for ScaledProgress {
    fn on_progress(&self, event: &ProgressEvent) {
        self.tracker
            .emit(event.phase, self.map(event.percent), event.message.clone());
    }
}
