//! Centralized downloader settings.
//! Static defaults; user-facing overrides come from `crate::config::LauncherConfig`.

use std::time::Duration;

pub const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Worker pool size used when nothing else is configured
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Upper bound for a single mirror latency probe
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

pub fn current_timeout() -> Duration {
    Duration::from_secs(REQUEST_TIMEOUT_SECS)
}

// URL Constants
pub const LIBRARIES_URL: &str = "https://libraries.minecraft.net/";
pub const RESOURCES_URL: &str = "https://resources.download.minecraft.net/";
pub const LAUNCHER_META_URL: &str = "https://launchermeta.mojang.com/";
pub const LAUNCHER_URL: &str = "https://launcher.mojang.com/";
pub const PISTON_META_URL: &str = "https://piston-meta.mojang.com/";
pub const PISTON_DATA_URL: &str = "https://piston-data.mojang.com/";
pub const FORGE_MAVEN_URL: &str = "https://maven.minecraftforge.net/";

pub const BMCLAPI_BASE_URL: &str = "https://bmclapi2.bangbang93.com";
pub const MCBBS_BASE_URL: &str = "https://download.mcbbs.net";
