//! Engine lifecycle: one shared engine, initialized at most once.
//!
//! ## Why a manager instead of a global?
//!
//! The engine payload is hundreds of megabytes and takes seconds to compile.
//! Two copies would double both. The host builds a single [`EngineManager`] at
//! startup and hands `Arc<EngineManager>` to every gateway that needs it, so
//! the "one engine per process" rule is explicit in the wiring rather than
//! hidden in a static.
//!
//! ## State machine
//!
//! ```text
//!              initialize()                 startup ok
//! Uninitialized ──────────▶ Initializing(rx) ──────────▶ Ready(engine)
//!       ▲                        │  startup failed / cancelled   │
//!       └────────────────────────┘                               │
//!       └──────────────────────── destroy() ─────────────────────┘
//! ```
//!
//! Concurrent `initialize()` calls that arrive while a sequence is in flight
//! clone the `watch` receiver and sleep until the outcome is published; no
//! polling, and every waiter observes the same `Result`.

use crate::config::EngineConfig;
use crate::engine::assets::{verify_assets, AssetProber, DefaultAssetProber, EngineAssets};
use crate::engine::environment::{preflight, RuntimeCapabilities, StaticCapabilities};
use crate::engine::{ConversionEngine, EngineEvents, EngineFactory};
use crate::error::{ConfigError, ConvertError, InitError};
use crate::format::{DocumentFormat, FormatPair};
use crate::progress::{ProgressCallback, ProgressEvent, ProgressPhase, ProgressRelay};
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

type InitOutcome = Option<Result<(), InitError>>;

enum EngineState {
    Uninitialized,
    Initializing(watch::Receiver<InitOutcome>),
    Ready(Arc<dyn ConversionEngine>),
}

struct Inner {
    state: EngineState,
    /// Bumped by `destroy()`; an initialization that started under an older
    /// epoch must not publish its engine.
    epoch: u64,
}

/// A converted document, owned by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedDocument {
    pub data: Vec<u8>,
    pub mime_type: String,
    pub formats: FormatPair,
}

/// Owns the single shared conversion engine and its readiness state.
pub struct EngineManager {
    config: EngineConfig,
    assets: EngineAssets,
    factory: Arc<dyn EngineFactory>,
    capabilities: Arc<dyn RuntimeCapabilities>,
    prober: Arc<dyn AssetProber>,
    inner: Mutex<Inner>,
}

impl EngineManager {
    /// Create an uninitialized manager. Nothing is probed or loaded yet.
    ///
    /// Defaults to native capabilities and the HEAD/metadata asset prober.
    pub fn new(config: EngineConfig, factory: Arc<dyn EngineFactory>) -> Result<Self, ConfigError> {
        let assets = config.assets()?;
        let prober = Arc::new(DefaultAssetProber::new(config.probe_timeout())?);
        Ok(Self {
            config,
            assets,
            factory,
            capabilities: Arc::new(StaticCapabilities::native()),
            prober,
            inner: Mutex::new(Inner {
                state: EngineState::Uninitialized,
                epoch: 0,
            }),
        })
    }

    pub fn with_capabilities(mut self, capabilities: Arc<dyn RuntimeCapabilities>) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_prober(mut self, prober: Arc<dyn AssetProber>) -> Self {
        self.prober = prober;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn assets(&self) -> &EngineAssets {
        &self.assets
    }

    /// True iff initialization completed and the engine is held.
    pub fn is_ready(&self) -> bool {
        matches!(self.lock_inner().state, EngineState::Ready(_))
    }

    /// Bring the engine up, or join the initialization already in flight.
    ///
    /// Returns immediately when already initialized. Progress events go to
    /// `progress` only for the caller that actually runs the sequence; the
    /// callback is released once the final `ready` event has been delivered.
    ///
    /// # Errors
    /// - [`InitError::EnvironmentUnsupported`] — capability preflight failed
    /// - [`InitError::AssetUnavailable`] — first unreachable engine file
    /// - [`InitError::Startup`] / [`InitError::Timeout`] — engine startup failed
    /// - [`InitError::Aborted`] — [`Self::destroy`] ran mid-initialization
    ///
    /// On any error the manager returns to the uninitialized state, so a later
    /// call starts again from scratch.
    pub async fn initialize(&self, progress: Option<ProgressCallback>) -> Result<(), InitError> {
        loop {
            let step = {
                let mut inner = self.lock_inner();
                let waiting = match &inner.state {
                    EngineState::Ready(_) => return Ok(()),
                    EngineState::Initializing(rx) => Some(rx.clone()),
                    EngineState::Uninitialized => None,
                };
                match waiting {
                    Some(rx) => InitStep::Wait(rx),
                    None => {
                        let (tx, rx) = watch::channel(None);
                        inner.state = EngineState::Initializing(rx);
                        InitStep::Run(InitGuard {
                            manager: self,
                            epoch: inner.epoch,
                            tx,
                            armed: true,
                        })
                    }
                }
            };

            match step {
                InitStep::Run(guard) => return self.run_initialization(guard, progress).await,
                InitStep::Wait(mut rx) => {
                    debug!("Joining in-flight engine initialization");
                    let outcome = rx.wait_for(Option::is_some).await.ok().and_then(|o| o.clone());
                    match outcome {
                        Some(result) => return result,
                        // The initializing caller was dropped before finishing;
                        // its guard has reset the state, so try again.
                        None => warn!("In-flight engine initialization was abandoned; retrying"),
                    }
                }
            }
        }
    }

    async fn run_initialization(
        &self,
        guard: InitGuard<'_>,
        progress: Option<ProgressCallback>,
    ) -> Result<(), InitError> {
        let relay = Arc::new(ProgressRelay::new(progress));
        let start = Instant::now();
        info!("Initializing conversion engine from {}", self.config.base_path);

        let started = self.start_engine(&relay).await;

        // Publish under the lock so `destroy()` can't interleave.
        let (outcome, orphan) = {
            let mut inner = self.lock_inner();
            if inner.epoch != guard.epoch {
                (Err(InitError::Aborted), started.ok().map(PendingEngine::publish))
            } else {
                match started {
                    Ok(pending) => {
                        inner.state = EngineState::Ready(pending.publish());
                        (Ok(()), None)
                    }
                    Err(e) => {
                        inner.state = EngineState::Uninitialized;
                        (Err(e), None)
                    }
                }
            }
        };

        if let Some(engine) = orphan {
            warn!("Manager destroyed during initialization; releasing the new engine");
            release(engine).await;
        }

        match &outcome {
            Ok(()) => {
                info!(
                    "Conversion engine ready in {}ms",
                    start.elapsed().as_millis()
                );
                relay.finish(Some(ProgressEvent::new(
                    ProgressPhase::Ready,
                    100,
                    "Conversion engine ready",
                )));
            }
            Err(e) => {
                warn!("Conversion engine initialization failed: {}", e);
                relay.finish(None);
            }
        }

        guard.complete(outcome.clone());
        outcome
    }

    /// Preflight, asset probes, engine construction and startup.
    async fn start_engine(
        &self,
        relay: &Arc<ProgressRelay>,
    ) -> Result<PendingEngine, InitError> {
        relay.emit(ProgressEvent::new(
            ProgressPhase::Loading,
            0,
            "Checking runtime capabilities",
        ));
        preflight(self.capabilities.as_ref())?;

        relay.emit(ProgressEvent::new(
            ProgressPhase::Loading,
            5,
            "Verifying engine files",
        ));
        verify_assets(self.prober.as_ref(), &self.assets).await?;

        relay.emit(ProgressEvent::new(
            ProgressPhase::Initializing,
            10,
            "Starting conversion engine",
        ));
        let events: Arc<dyn EngineEvents> = Arc::new(RelayEvents {
            relay: Arc::clone(relay),
        });
        let created = std::panic::catch_unwind(AssertUnwindSafe(|| {
            self.factory.create(&self.assets, events)
        }));
        let engine = match created {
            Ok(engine) => engine.map_err(|e| InitError::Startup(e.message))?,
            Err(panic) => return Err(InitError::Startup(panic_message(panic))),
        };
        // Released in the background if this future is dropped before publishing.
        let pending = PendingEngine::new(engine);

        let limit = self.config.init_timeout();
        let startup = AssertUnwindSafe(pending.engine.initialize()).catch_unwind();
        let result = match with_limit(limit, startup).await {
            None => Err(InitError::Timeout {
                secs: limit.map(|d| d.as_secs()).unwrap_or_default(),
            }),
            Some(Err(panic)) => Err(InitError::Startup(panic_message(panic))),
            Some(Ok(r)) => r.map_err(|e| InitError::Startup(e.message)),
        };

        if let Err(e) = result {
            release(pending.publish()).await;
            return Err(e);
        }
        Ok(pending)
    }

    /// Convert `input` to `output`, deriving the input format from `source_name`.
    ///
    /// The returned bytes are a copy; nothing in the result aliases engine
    /// memory. A failure here leaves the engine initialized.
    pub async fn convert(
        &self,
        input: &[u8],
        source_name: &str,
        output: DocumentFormat,
    ) -> Result<ConvertedDocument, ConvertError> {
        let engine = {
            let inner = self.lock_inner();
            match &inner.state {
                EngineState::Ready(engine) => Arc::clone(engine),
                _ => return Err(ConvertError::EngineNotInitialized),
            }
        };

        let input_format = DocumentFormat::from_file_name(source_name).ok_or_else(|| {
            ConvertError::UnrecognizedFormat {
                name: source_name.to_string(),
            }
        })?;
        let formats = FormatPair {
            input: input_format,
            output,
        };
        debug!(
            "Converting '{}' ({} bytes) {} → {}",
            source_name,
            input.len(),
            formats.input,
            formats.output
        );

        let start = Instant::now();
        let limit = self.config.convert_timeout();
        let call = AssertUnwindSafe(engine.convert(input, &formats, source_name)).catch_unwind();
        let converted = match with_limit(limit, call).await {
            None => {
                return Err(ConvertError::Timeout {
                    secs: limit.map(|d| d.as_secs()).unwrap_or_default(),
                })
            }
            Some(Err(panic)) => return Err(ConvertError::Engine(panic_message(panic))),
            Some(Ok(r)) => r.map_err(|e| ConvertError::Engine(e.message))?,
        };

        // Copy out of the engine's buffer before handing it to the caller.
        let data = converted.data.to_vec();
        info!(
            "Converted '{}': {} → {} bytes in {}ms",
            source_name,
            input.len(),
            data.len(),
            start.elapsed().as_millis()
        );

        Ok(ConvertedDocument {
            data,
            mime_type: converted.mime_type,
            formats,
        })
    }

    /// Release the engine and return to the uninitialized state.
    ///
    /// Safe to call at any time. An initialization still in flight finishes
    /// with [`InitError::Aborted`] and tears down whatever it built.
    pub async fn destroy(&self) {
        let engine = {
            let mut inner = self.lock_inner();
            inner.epoch += 1;
            match std::mem::replace(&mut inner.state, EngineState::Uninitialized) {
                EngineState::Ready(engine) => Some(engine),
                _ => None,
            }
        };

        match engine {
            Some(engine) => {
                release(engine).await;
                info!("Conversion engine destroyed");
            }
            None => debug!("destroy() called with no running engine"),
        }
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

enum InitStep<'a> {
    Run(InitGuard<'a>),
    Wait(watch::Receiver<InitOutcome>),
}

/// Clears the `Initializing` state if the initializing future is dropped or
/// unwinds before publishing an outcome. Dropping `tx` afterwards wakes the
/// waiters, who then retry.
struct InitGuard<'a> {
    manager: &'a EngineManager,
    epoch: u64,
    tx: watch::Sender<InitOutcome>,
    armed: bool,
}

impl InitGuard<'_> {
    fn complete(mut self, outcome: Result<(), InitError>) {
        self.armed = false;
        self.tx.send_replace(Some(outcome));
    }
}

impl Drop for InitGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut inner = self.manager.lock_inner();
        if inner.epoch == self.epoch && matches!(inner.state, EngineState::Initializing(_)) {
            inner.state = EngineState::Uninitialized;
        }
    }
}

/// An engine that has been created but not yet published as `Ready`.
///
/// Dropping it unpublished (the initializing caller went away mid-startup)
/// spawns the engine's teardown on the current runtime.
struct PendingEngine {
    engine: Arc<dyn ConversionEngine>,
    armed: bool,
}

impl PendingEngine {
    fn new(engine: Arc<dyn ConversionEngine>) -> Self {
        Self {
            engine,
            armed: true,
        }
    }

    fn publish(mut self) -> Arc<dyn ConversionEngine> {
        self.armed = false;
        Arc::clone(&self.engine)
    }
}

impl Drop for PendingEngine {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!("Engine initialization abandoned; releasing the half-started engine");
                handle.spawn(release(Arc::clone(&self.engine)));
            }
            Err(_) => warn!("Engine initialization abandoned outside a runtime; engine not destroyed"),
        }
    }
}

/// Destroy `engine`, logging instead of unwinding if its teardown panics.
async fn release(engine: Arc<dyn ConversionEngine>) {
    if let Err(panic) = AssertUnwindSafe(engine.destroy()).catch_unwind().await {
        warn!("Engine teardown failed: {}", panic_message(panic));
    }
}

/// Forwards engine hooks into the caller's progress relay.
struct RelayEvents {
    relay: Arc<ProgressRelay>,
}

impl EngineEvents for RelayEvents {
    fn on_progress(&self, phase: ProgressPhase, percent: u8, message: &str) {
        self.relay.emit(ProgressEvent::new(phase, percent, message));
    }

    fn on_ready(&self) {
        debug!("Engine signalled ready");
    }

    fn on_error(&self, message: &str) {
        warn!("Engine reported error: {}", message);
    }
}

/// `None` when `limit` elapsed first.
async fn with_limit<F: Future>(limit: Option<Duration>, fut: F) -> Option<F::Output> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut).await.ok(),
        None => Some(fut.await),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    format!("engine panicked: {detail}")
}
