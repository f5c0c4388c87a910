//! Shared test doubles: a scripted engine, a scripted asset prober, and a
//! progress recorder.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use edgequake_office2pdf::{
    AssetInfo, AssetLocation, AssetProber, AssetStatus, ConversionEngine, EngineAssets,
    EngineConfig, EngineError, EngineEvents, EngineFactory, EngineManager, EngineOutput,
    FormatPair, ProgressCallback, ProgressEvent, ProgressPhase, RuntimeCapabilities,
    StaticCapabilities,
};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Scripted engine ──────────────────────────────────────────────────────────

/// Counters and switches shared by a factory and every engine it builds.
#[derive(Default)]
pub struct MockState {
    pub creates: AtomicUsize,
    pub startups: AtomicUsize,
    pub converts: AtomicUsize,
    pub destroys: AtomicUsize,
    pub fail_startup: AtomicBool,
    pub fail_converts: AtomicBool,
    pub panic_converts: AtomicBool,
    pub panic_create: AtomicBool,
    pub panic_destroy: AtomicBool,
    /// Content type the engine reports instead of `application/pdf`.
    pub mislabel_output: Mutex<Option<String>>,
    pub startup_delay_ms: AtomicU64,
    pub convert_delay_ms: AtomicU64,
    pub events: Mutex<Option<Arc<dyn EngineEvents>>>,
    pub assets: Mutex<Option<EngineAssets>>,
}

impl MockState {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    /// Fire a progress hook as the engine would, e.g. after startup finished.
    pub fn fire_progress(&self, phase: ProgressPhase, percent: u8, message: &str) {
        if let Some(events) = self.events.lock().unwrap().as_ref() {
            events.on_progress(phase, percent, message);
        }
    }
}

pub struct MockFactory {
    pub state: Arc<MockState>,
}

impl MockFactory {
    pub fn new() -> (Arc<Self>, Arc<MockState>) {
        let state = Arc::new(MockState::default());
        (
            Arc::new(Self {
                state: Arc::clone(&state),
            }),
            state,
        )
    }
}

impl EngineFactory for MockFactory {
    fn create(
        &self,
        assets: &EngineAssets,
        events: Arc<dyn EngineEvents>,
    ) -> Result<Arc<dyn ConversionEngine>, EngineError> {
        self.state.creates.fetch_add(1, Ordering::SeqCst);
        if self.state.panic_create.load(Ordering::SeqCst) {
            panic!("worker constructor threw");
        }
        *self.state.events.lock().unwrap() = Some(Arc::clone(&events));
        *self.state.assets.lock().unwrap() = Some(assets.clone());
        Ok(Arc::new(MockEngine {
            state: Arc::clone(&self.state),
            events,
        }))
    }
}

struct MockEngine {
    state: Arc<MockState>,
    events: Arc<dyn EngineEvents>,
}

#[async_trait]
impl ConversionEngine for MockEngine {
    async fn initialize(&self) -> Result<(), EngineError> {
        self.state.startups.fetch_add(1, Ordering::SeqCst);
        let delay = self.state.startup_delay_ms.load(Ordering::SeqCst);

        // Engines count their own progress from zero.
        self.events
            .on_progress(ProgressPhase::Loading, 0, "Downloading engine");
        tokio::time::sleep(Duration::from_millis(delay / 2)).await;
        self.events
            .on_progress(ProgressPhase::Initializing, 60, "Compiling engine");
        tokio::time::sleep(Duration::from_millis(delay - delay / 2)).await;

        if self.state.fail_startup.load(Ordering::SeqCst) {
            self.events.on_error("worker failed to boot");
            return Err(EngineError::new("worker failed to boot"));
        }
        self.events
            .on_progress(ProgressPhase::Initializing, 95, "Engine started");
        self.events.on_ready();
        Ok(())
    }

    async fn convert(
        &self,
        input: &[u8],
        formats: &FormatPair,
        source_name: &str,
    ) -> Result<EngineOutput, EngineError> {
        self.state.converts.fetch_add(1, Ordering::SeqCst);
        let delay = self.state.convert_delay_ms.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(delay)).await;

        if self.state.panic_converts.load(Ordering::SeqCst) {
            panic!("filter crashed on {source_name}");
        }
        if self.state.fail_converts.load(Ordering::SeqCst) {
            return Err(EngineError::new("malformed document"));
        }
        Ok(EngineOutput {
            data: Bytes::from(format!(
                "%PDF-1.7 {} {}->{} {} bytes",
                source_name,
                formats.input,
                formats.output,
                input.len()
            )),
            mime_type: self
                .state
                .mislabel_output
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| "application/pdf".to_string()),
        })
    }

    async fn destroy(&self) {
        self.state.destroys.fetch_add(1, Ordering::SeqCst);
        if self.state.panic_destroy.load(Ordering::SeqCst) {
            panic!("worker already terminated");
        }
    }
}

// ── Scripted asset prober ────────────────────────────────────────────────────

/// Answers 404 for any asset whose file name is listed in `missing`.
#[derive(Default)]
pub struct ScriptedProber {
    pub missing: Mutex<Vec<String>>,
    pub probed: Mutex<Vec<String>>,
}

impl ScriptedProber {
    pub fn with_missing(files: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            missing: Mutex::new(files.iter().map(|f| f.to_string()).collect()),
            probed: Mutex::new(Vec::new()),
        })
    }

    pub fn probed(&self) -> Vec<String> {
        self.probed.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssetProber for ScriptedProber {
    async fn probe(&self, location: &AssetLocation) -> Result<AssetInfo, AssetStatus> {
        let name = location.file_name();
        self.probed.lock().unwrap().push(name.clone());
        if self.missing.lock().unwrap().contains(&name) {
            return Err(AssetStatus::Http(404));
        }
        Ok(AssetInfo {
            size: Some(1024),
            content_type: Some("application/octet-stream".into()),
        })
    }
}

// ── Builders ─────────────────────────────────────────────────────────────────

pub fn manager_with(
    config: EngineConfig,
    factory: Arc<MockFactory>,
    prober: Arc<ScriptedProber>,
    caps: StaticCapabilities,
) -> EngineManager {
    let caps: Arc<dyn RuntimeCapabilities> = Arc::new(caps);
    EngineManager::new(config, factory)
        .expect("valid config")
        .with_capabilities(caps)
        .with_prober(prober)
}

/// A manager whose assets are all reachable, plus its engine state.
pub fn ready_to_start() -> (EngineManager, Arc<MockState>, Arc<ScriptedProber>) {
    let (factory, state) = MockFactory::new();
    let prober = ScriptedProber::with_missing(&[]);
    let manager = manager_with(
        EngineConfig::default(),
        factory,
        Arc::clone(&prober),
        StaticCapabilities::native(),
    );
    (manager, state, prober)
}

// ── Progress recorder ────────────────────────────────────────────────────────

pub fn recorder() -> (ProgressCallback, Arc<Mutex<Vec<ProgressEvent>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let cb: ProgressCallback = Arc::new(move |e: &ProgressEvent| {
        sink.lock().unwrap().push(e.clone());
    });
    (cb, seen)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
