//! Launcher settings consumed by the core.
//!
//! Settings are plain serde structs stored as JSON. Missing fields take their
//! defaults so older files keep loading.

use crate::game::installer::config::{DEFAULT_CONCURRENCY, REQUEST_TIMEOUT_SECS};
use crate::game::installer::core::downloader::{DownloaderOptions, ProxySettings};
use crate::game::installer::core::mirror::{Mirror, MirrorSelection};
use crate::game::java::JavaRegistry;
use crate::game::launcher::Launcher;
use crate::game::paths::GamePaths;
use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory created under the selected base
pub const GAME_DIR_NAME: &str = ".minecraft";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePathType {
    /// Next to the launcher's working directory
    #[default]
    Root,
    AppData,
    ProgramFiles,
    Custom,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownloadSource {
    /// Every known mirror, ranked by latency
    #[default]
    Auto,
    Origin,
    Bmclapi,
    Mcbbs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    pub game_path_type: GamePathType,
    /// Used with [`GamePathType::Custom`]
    pub game_path: Option<PathBuf>,
    /// Pick the best detected runtime instead of `java_path`
    pub auto_java: bool,
    pub java_path: Option<PathBuf>,
    pub version_isolation: bool,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            game_path_type: GamePathType::Root,
            game_path: None,
            auto_java: true,
            java_path: None,
            version_isolation: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub source: DownloadSource,
    pub mirror_selection: MirrorSelection,
    pub proxy_address: Option<String>,
    pub proxy_port: u16,
    pub proxy_username: Option<String>,
    pub proxy_password: Option<String>,
    pub thread_count: usize,
    pub check_hash: bool,
    pub timeout_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            source: DownloadSource::Auto,
            mirror_selection: MirrorSelection::Latency,
            proxy_address: None,
            proxy_port: 0,
            proxy_username: None,
            proxy_password: None,
            thread_count: DEFAULT_CONCURRENCY,
            check_hash: true,
            timeout_secs: REQUEST_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    pub environment: EnvironmentConfig,
    pub download: DownloadConfig,
}

impl LauncherConfig {
    /// Read settings from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config {:?}", path)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No config at {:?}, using defaults", path);
                Ok(Self::default())
            }
            Err(e) => Err(e).with_context(|| format!("Failed to read config {:?}", path)),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write config {:?}", path))
    }

    /// Game root for the selected path type
    pub fn game_root(&self) -> Result<PathBuf> {
        let base = match self.environment.game_path_type {
            GamePathType::Root => {
                std::env::current_dir().context("Failed to read working directory")?
            }
            GamePathType::AppData => BaseDirs::new()
                .map(|dirs| dirs.data_dir().to_path_buf())
                .ok_or_else(|| anyhow::anyhow!("Failed to determine user's data directory"))?,
            GamePathType::ProgramFiles => std::env::var_os("ProgramFiles")
                .map(PathBuf::from)
                .ok_or_else(|| anyhow::anyhow!("ProgramFiles is not set on this system"))?,
            GamePathType::Custom => self
                .environment
                .game_path
                .clone()
                .ok_or_else(|| anyhow::anyhow!("Custom game path selected but none configured"))?,
        };
        Ok(base.join(GAME_DIR_NAME))
    }

    pub fn game_paths(&self) -> Result<GamePaths> {
        Ok(GamePaths::new(
            self.game_root()?,
            self.environment.version_isolation,
        ))
    }

    /// Mirror presets for the configured download source
    pub fn mirrors(&self) -> Vec<Mirror> {
        match self.download.source {
            DownloadSource::Origin => Vec::new(),
            DownloadSource::Bmclapi => vec![Mirror::bmclapi()],
            DownloadSource::Mcbbs => vec![Mirror::mcbbs()],
            DownloadSource::Auto => vec![Mirror::mcbbs(), Mirror::bmclapi()],
        }
    }

    pub fn proxy(&self) -> Option<ProxySettings> {
        let address = self
            .download
            .proxy_address
            .clone()
            .filter(|a| !a.trim().is_empty())?;
        Some(ProxySettings {
            address,
            port: self.download.proxy_port,
            username: self.download.proxy_username.clone(),
            password: self.download.proxy_password.clone(),
        })
    }

    pub fn downloader_options(&self) -> DownloaderOptions {
        DownloaderOptions {
            concurrency: self.download.thread_count.max(1),
            check_hash: self.download.check_hash,
            timeout: Duration::from_secs(self.download.timeout_secs.max(1)),
            proxy: self.proxy(),
            mirror_selection: self.download.mirror_selection,
        }
    }

    /// Launcher for the configured root. The default runtime is the best
    /// detected one when `auto_java` is set, otherwise `java_path` if it
    /// validates.
    pub fn launcher(&self, registry: &JavaRegistry) -> Result<Launcher> {
        let java = if self.environment.auto_java {
            registry.suitable()
        } else {
            match &self.environment.java_path {
                Some(path) => match registry.add(path) {
                    Ok(runtime) => Some(runtime),
                    Err(e) => {
                        log::warn!("Configured Java at {:?} is unusable: {:#}", path, e);
                        None
                    }
                },
                None => None,
            }
        };
        Ok(Launcher::new(self.game_paths()?).with_java(java))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::java::JavaRuntime;

    #[test]
    fn defaults_follow_downloader_constants() {
        let config = LauncherConfig::default();
        let options = config.downloader_options();
        assert_eq!(options.concurrency, 8);
        assert!(options.check_hash);
        assert_eq!(options.timeout, Duration::from_secs(120));
        assert!(options.proxy.is_none());
        assert_eq!(config.mirrors().len(), 2);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: LauncherConfig = serde_json::from_str(
            r#"{"download": {"source": "Bmclapi", "mirror_selection": "ordered", "thread_count": 0}}"#,
        )
        .unwrap();
        assert_eq!(config.download.source, DownloadSource::Bmclapi);
        assert!(config.download.check_hash);
        assert_eq!(config.downloader_options().concurrency, 1);
        assert_eq!(config.downloader_options().mirror_selection, MirrorSelection::Ordered);
        assert_eq!(config.mirrors()[0].name, "BMCLAPI");
        assert!(config.environment.auto_java);
    }

    #[test]
    fn save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("conf").join("hearth.json");
        assert_eq!(LauncherConfig::load(&path).unwrap(), LauncherConfig::default());

        let mut config = LauncherConfig::default();
        config.environment.game_path_type = GamePathType::Custom;
        config.environment.game_path = Some(tmp.path().to_path_buf());
        config.download.proxy_address = Some("127.0.0.1".into());
        config.download.proxy_port = 8080;
        config.save(&path).unwrap();

        let loaded = LauncherConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.game_root().unwrap(), tmp.path().join(".minecraft"));
        assert_eq!(loaded.proxy().unwrap().port, 8080);
    }

    #[test]
    fn custom_path_without_value_is_an_error() {
        let mut config = LauncherConfig::default();
        config.environment.game_path_type = GamePathType::Custom;
        assert!(config.game_root().is_err());
    }

    #[test]
    fn origin_source_has_no_mirrors() {
        let mut config = LauncherConfig::default();
        config.download.source = DownloadSource::Origin;
        assert!(config.mirrors().is_empty());
    }

    #[test]
    fn launcher_uses_registry_runtime() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = LauncherConfig::default();
        config.environment.game_path_type = GamePathType::Custom;
        config.environment.game_path = Some(tmp.path().to_path_buf());
        config.environment.version_isolation = true;

        let registry = JavaRegistry::with_runtimes(vec![JavaRuntime {
            path: PathBuf::from("/jvm/bin/java"),
            version: "21".into(),
            major_version: 21,
            is_64bit: true,
        }]);
        let launcher = config.launcher(&registry).unwrap();
        assert!(launcher.paths().version_isolation());
        assert_eq!(launcher.paths().root(), tmp.path().join(".minecraft"));
    }
}
