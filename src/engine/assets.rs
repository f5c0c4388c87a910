//! Engine asset locations and reachability probes.
//!
//! ## Why probe before startup?
//!
//! A missing `soffice.wasm` makes the engine fail deep inside its loader with
//! an error that looks exactly like a crash. Probing every file first (HEAD
//! for remote assets, `metadata` for local ones, never a body download) lets
//! us report "engine not deployed" with the exact file and status instead.

use crate::error::{AssetStatus, ConfigError, InitError};
use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, Url};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where an engine asset lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetLocation {
    /// Served over HTTP(S).
    Remote(Url),
    /// A file on the local filesystem.
    Local(PathBuf),
}

impl AssetLocation {
    /// Interpret `base` as a URL when it has an http(s) scheme, else a path.
    ///
    /// Remote bases always end in `/` so that joining keeps the last segment.
    pub fn parse(base: &str) -> Result<Self, ConfigError> {
        let base = base.trim();
        if base.starts_with("http://") || base.starts_with("https://") {
            let mut url = Url::parse(base)
                .map_err(|e| ConfigError::Invalid(format!("base_path '{base}': {e}")))?;
            if !url.path().ends_with('/') {
                let path = format!("{}/", url.path());
                url.set_path(&path);
            }
            Ok(AssetLocation::Remote(url))
        } else {
            Ok(AssetLocation::Local(PathBuf::from(base)))
        }
    }

    pub fn join(&self, file: &str) -> Result<Self, ConfigError> {
        match self {
            AssetLocation::Remote(url) => url
                .join(file)
                .map(AssetLocation::Remote)
                .map_err(|e| ConfigError::Invalid(format!("asset '{file}': {e}"))),
            AssetLocation::Local(dir) => Ok(AssetLocation::Local(dir.join(file))),
        }
    }

    /// The last path segment, e.g. `soffice.wasm`.
    pub fn file_name(&self) -> String {
        match self {
            AssetLocation::Remote(url) => url
                .path_segments()
                .and_then(|mut s| s.next_back())
                .unwrap_or_default()
                .to_string(),
            AssetLocation::Local(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }
}

impl fmt::Display for AssetLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetLocation::Remote(url) => f.write_str(url.as_str()),
            AssetLocation::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Resolved locations of every file the engine needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineAssets {
    pub script: AssetLocation,
    pub wasm: AssetLocation,
    pub data: AssetLocation,
    pub worker: AssetLocation,
}

impl EngineAssets {
    /// Assets in probe order.
    pub fn required(&self) -> [&AssetLocation; 4] {
        [&self.script, &self.wasm, &self.data, &self.worker]
    }
}

/// What a successful probe learned about an asset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetInfo {
    pub size: Option<u64>,
    pub content_type: Option<String>,
}

/// Checks that an asset exists without downloading it.
#[async_trait]
pub trait AssetProber: Send + Sync {
    async fn probe(&self, location: &AssetLocation) -> Result<AssetInfo, AssetStatus>;
}

/// HEAD requests for remote assets, filesystem metadata for local ones.
///
/// One HTTP client is shared by every probe.
#[derive(Debug, Clone)]
pub struct DefaultAssetProber {
    client: Client,
    timeout: Duration,
}

impl DefaultAssetProber {
    /// # Errors
    /// [`ConfigError::Invalid`] if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::Invalid(format!("asset probe HTTP client: {e}")))?;
        Ok(Self { client, timeout })
    }

    async fn probe_remote(&self, url: &Url) -> Result<AssetInfo, AssetStatus> {
        let response = self.client.head(url.clone()).send().await.map_err(|e| {
            if e.is_timeout() {
                AssetStatus::Unreachable(format!("timed out after {}s", self.timeout.as_secs()))
            } else {
                AssetStatus::Unreachable(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AssetStatus::Http(status.as_u16()));
        }

        let headers = response.headers();
        Ok(AssetInfo {
            size: headers
                .get(CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok()),
            content_type: headers
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        })
    }

    async fn probe_local(&self, path: &std::path::Path) -> Result<AssetInfo, AssetStatus> {
        let meta = tokio::fs::metadata(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AssetStatus::NotFound
            } else {
                AssetStatus::Unreachable(e.to_string())
            }
        })?;
        if !meta.is_file() {
            return Err(AssetStatus::Unreachable("not a regular file".into()));
        }
        Ok(AssetInfo {
            size: Some(meta.len()),
            content_type: guess_content_type(path).map(str::to_string),
        })
    }
}

#[async_trait]
impl AssetProber for DefaultAssetProber {
    async fn probe(&self, location: &AssetLocation) -> Result<AssetInfo, AssetStatus> {
        match location {
            AssetLocation::Remote(url) => self.probe_remote(url).await,
            AssetLocation::Local(path) => self.probe_local(path).await,
        }
    }
}

fn guess_content_type(path: &std::path::Path) -> Option<&'static str> {
    match path.extension()?.to_str()? {
        "js" | "mjs" => Some("text/javascript"),
        "wasm" => Some("application/wasm"),
        "data" => Some("application/octet-stream"),
        _ => None,
    }
}

/// Probe every required asset in order, stopping at the first failure.
pub async fn verify_assets(
    prober: &dyn AssetProber,
    assets: &EngineAssets,
) -> Result<(), InitError> {
    for location in assets.required() {
        match prober.probe(location).await {
            Ok(info) => debug!(
                "Asset {} reachable: size={:?} type={:?}",
                location,
                info.size,
                info.content_type.as_deref()
            ),
            Err(status) => {
                warn!(
                    "Engine asset {} unavailable at {}: {}",
                    location.file_name(),
                    location,
                    status
                );
                return Err(InitError::AssetUnavailable {
                    file: location.to_string(),
                    status,
                });
            }
        }
    }
    info!("All {} engine assets reachable", assets.required().len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prober() -> DefaultAssetProber {
        DefaultAssetProber::new(Duration::from_secs(10)).unwrap()
    }

    fn local_assets(dir: &std::path::Path) -> EngineAssets {
        let base = AssetLocation::Local(dir.to_path_buf());
        EngineAssets {
            script: base.join("soffice.js").unwrap(),
            wasm: base.join("soffice.wasm").unwrap(),
            data: base.join("soffice.data").unwrap(),
            worker: base.join("soffice.worker.js").unwrap(),
        }
    }

    #[test]
    fn remote_base_gains_trailing_slash() {
        let base = AssetLocation::parse("https://cdn.example.com/office").unwrap();
        let wasm = base.join("soffice.wasm").unwrap();
        assert_eq!(wasm.to_string(), "https://cdn.example.com/office/soffice.wasm");
        assert_eq!(wasm.file_name(), "soffice.wasm");
    }

    #[test]
    fn local_base_joins_paths() {
        let base = AssetLocation::parse("/srv/office").unwrap();
        let data = base.join("soffice.data").unwrap();
        assert_eq!(data, AssetLocation::Local(PathBuf::from("/srv/office/soffice.data")));
        assert_eq!(data.file_name(), "soffice.data");
    }

    #[tokio::test]
    async fn local_probe_reports_size_and_type() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("soffice.wasm"), b"\0asm\x01\0\0\0").unwrap();

        let info = prober()
            .probe(&AssetLocation::Local(dir.path().join("soffice.wasm")))
            .await
            .unwrap();
        assert_eq!(info.size, Some(8));
        assert_eq!(info.content_type.as_deref(), Some("application/wasm"));
    }

    #[tokio::test]
    async fn verify_names_first_missing_local_asset() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("soffice.js"), b"// boot").unwrap();
        std::fs::write(dir.path().join("soffice.worker.js"), b"// worker").unwrap();

        let err = verify_assets(&prober(), &local_assets(dir.path()))
            .await
            .unwrap_err();
        match err {
            InitError::AssetUnavailable { file, status } => {
                assert!(file.ends_with("soffice.wasm"), "got: {file}");
                assert_eq!(status, AssetStatus::NotFound);
            }
            other => panic!("expected AssetUnavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn directory_is_not_an_asset() {
        let dir = tempfile::tempdir().unwrap();
        let status = prober()
            .probe(&AssetLocation::Local(dir.path().to_path_buf()))
            .await
            .unwrap_err();
        assert!(matches!(status, AssetStatus::Unreachable(_)));
    }
}
