//! Configuration for the engine manager and the conversion gateway.
//!
//! [`EngineConfig`] describes where the engine's files live and how long the
//! manager is willing to wait for them. [`GatewayConfig`] describes one UI
//! entry point: which inputs it accepts and how engine-load progress is
//! folded into the caller's single progress bar.
//!
//! Both are built through builders so callers only set what they care about.

use crate::engine::assets::{AssetLocation, EngineAssets};
use crate::error::ConfigError;
use crate::format::ConversionRoute;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for [`crate::lifecycle::EngineManager`].
///
/// # Example
/// ```rust
/// use edgequake_office2pdf::EngineConfig;
///
/// let config = EngineConfig::builder()
///     .base_path("https://cdn.example.com/office/")
///     .init_timeout_secs(300)
///     .build()
///     .unwrap();
/// assert_eq!(config.wasm_file, "soffice.wasm");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Asset root: an `http(s)://` URL or a local directory. Default: `"/office/"`.
    pub base_path: String,

    /// Engine bootstrap script. Default: `soffice.js`.
    pub script_file: String,

    /// Compiled engine binary module. Default: `soffice.wasm`.
    ///
    /// This is the multi-hundred-megabyte payload that makes a second
    /// initialization so expensive.
    pub wasm_file: String,

    /// Preloaded data bundle (configuration, dictionaries). Default: `soffice.data`.
    pub data_file: String,

    /// Worker thread bootstrap script. Default: `soffice.worker.js`.
    pub worker_file: String,

    /// Per-asset probe timeout in seconds. Default: 10.
    pub probe_timeout_secs: u64,

    /// Upper bound on engine startup. Default: None (wait indefinitely).
    pub init_timeout_secs: Option<u64>,

    /// Upper bound on a single engine conversion call. Default: None.
    ///
    /// When it elapses the call is abandoned, not aborted: the engine keeps
    /// working on the document in its own worker.
    pub convert_timeout_secs: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_path: "/office/".to_string(),
            script_file: "soffice.js".to_string(),
            wasm_file: "soffice.wasm".to_string(),
            data_file: "soffice.data".to_string(),
            worker_file: "soffice.worker.js".to_string(),
            probe_timeout_secs: 10,
            init_timeout_secs: None,
            convert_timeout_secs: None,
        }
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder {
            config: Self::default(),
        }
    }

    /// Resolve every asset against `base_path`.
    pub fn assets(&self) -> Result<EngineAssets, ConfigError> {
        let base = AssetLocation::parse(&self.base_path)?;
        Ok(EngineAssets {
            script: base.join(&self.script_file)?,
            wasm: base.join(&self.wasm_file)?,
            data: base.join(&self.data_file)?,
            worker: base.join(&self.worker_file)?,
        })
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn init_timeout(&self) -> Option<Duration> {
        self.init_timeout_secs.map(Duration::from_secs)
    }

    pub fn convert_timeout(&self) -> Option<Duration> {
        self.convert_timeout_secs.map(Duration::from_secs)
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn base_path(mut self, path: impl Into<String>) -> Self {
        self.config.base_path = path.into();
        self
    }

    pub fn script_file(mut self, name: impl Into<String>) -> Self {
        self.config.script_file = name.into();
        self
    }

    pub fn wasm_file(mut self, name: impl Into<String>) -> Self {
        self.config.wasm_file = name.into();
        self
    }

    pub fn data_file(mut self, name: impl Into<String>) -> Self {
        self.config.data_file = name.into();
        self
    }

    pub fn worker_file(mut self, name: impl Into<String>) -> Self {
        self.config.worker_file = name.into();
        self
    }

    pub fn probe_timeout_secs(mut self, secs: u64) -> Self {
        self.config.probe_timeout_secs = secs.max(1);
        self
    }

    pub fn init_timeout_secs(mut self, secs: u64) -> Self {
        self.config.init_timeout_secs = Some(secs);
        self
    }

    pub fn convert_timeout_secs(mut self, secs: u64) -> Self {
        self.config.convert_timeout_secs = Some(secs);
        self
    }

    /// Build the configuration, validating that every asset resolves.
    pub fn build(self) -> Result<EngineConfig, ConfigError> {
        let c = &self.config;
        if c.base_path.trim().is_empty() {
            return Err(ConfigError::Invalid("base_path must not be empty".into()));
        }
        for (field, value) in [
            ("script_file", &c.script_file),
            ("wasm_file", &c.wasm_file),
            ("data_file", &c.data_file),
            ("worker_file", &c.worker_file),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{field} must not be empty")));
            }
        }
        if c.init_timeout_secs == Some(0) || c.convert_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid("timeouts must be ≥ 1s".into()));
        }
        c.assets()?;
        Ok(self.config)
    }
}

/// Configuration for [`crate::gateway::ConversionGateway`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Accepted inputs and target format. Default: spreadsheet → PDF.
    pub route: ConversionRoute,

    /// Share of the progress bar reserved for engine initialization. Default: 80.
    ///
    /// Engine init percent is mapped into `0..=init_progress_ceiling`; the
    /// conversion itself fills the rest.
    pub init_progress_ceiling: u8,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            route: ConversionRoute::default(),
            init_progress_ceiling: 80,
        }
    }
}

impl GatewayConfig {
    pub fn builder() -> GatewayConfigBuilder {
        GatewayConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`GatewayConfig`].
#[derive(Debug)]
pub struct GatewayConfigBuilder {
    config: GatewayConfig,
}

impl GatewayConfigBuilder {
    pub fn route(mut self, route: ConversionRoute) -> Self {
        self.config.route = route;
        self
    }

    pub fn init_progress_ceiling(mut self, percent: u8) -> Self {
        self.config.init_progress_ceiling = percent.clamp(1, 95);
        self
    }

    pub fn build(self) -> Result<GatewayConfig, ConfigError> {
        if self.config.route.accepted.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "route '{}' accepts no formats",
                self.config.route.name
            )));
        }
        Ok(self.config)
    }
}
