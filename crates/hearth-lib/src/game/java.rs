//! Java runtime discovery and validation.

use crate::utils::hardware;
use crate::utils::process::HearthCommandExt;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Heap cap for 32-bit runtimes
const MAX_MEMORY_32BIT_MB: u32 = 1024;
/// Heap cap for 64-bit runtimes
const MAX_MEMORY_64BIT_MB: u32 = 4096;

/// A validated Java installation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JavaRuntime {
    pub path: PathBuf,
    /// Version as reported by `java -version`, e.g. `17.0.8`
    pub version: String,
    pub major_version: u32,
    pub is_64bit: bool,
}

/// Owned list of known runtimes, replaced wholesale on refresh
#[derive(Debug, Default)]
pub struct JavaRegistry {
    runtimes: RwLock<Arc<Vec<JavaRuntime>>>,
}

impl JavaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with already-validated runtimes
    pub fn with_runtimes(runtimes: Vec<JavaRuntime>) -> Self {
        Self {
            runtimes: RwLock::new(Arc::new(runtimes)),
        }
    }

    /// Scan the host and build a registry from what validates
    pub fn discover() -> Self {
        let registry = Self::new();
        registry.refresh();
        registry
    }

    /// Rescan the host, replacing the current list
    pub fn refresh(&self) -> Arc<Vec<JavaRuntime>> {
        let found = Arc::new(scan_system_javas());
        log::info!("Found {} Java runtime(s)", found.len());
        *self.runtimes.write().unwrap_or_else(|e| e.into_inner()) = found.clone();
        found
    }

    pub async fn refresh_async(self: &Arc<Self>) -> Arc<Vec<JavaRuntime>> {
        let registry = self.clone();
        match tokio::task::spawn_blocking(move || registry.refresh()).await {
            Ok(list) => list,
            Err(e) => {
                log::error!("Java scan task failed: {}", e);
                self.runtimes()
            }
        }
    }

    pub fn runtimes(&self) -> Arc<Vec<JavaRuntime>> {
        self.runtimes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Validate `path` and add it unless already known
    pub fn add(&self, path: &Path) -> Result<JavaRuntime> {
        let runtime = verify_java(path)?;
        let mut guard = self.runtimes.write().unwrap_or_else(|e| e.into_inner());
        if !guard.iter().any(|r| r.path == runtime.path) {
            let mut list = guard.as_ref().clone();
            list.push(runtime.clone());
            *guard = Arc::new(list);
        }
        Ok(runtime)
    }

    /// Newest runtime, 64-bit preferred
    pub fn suitable(&self) -> Option<JavaRuntime> {
        pick_best(self.runtimes().iter())
    }

    /// Best runtime meeting a minimum major version
    pub fn for_major(&self, min_major: u32) -> Option<JavaRuntime> {
        pick_best(self.runtimes().iter().filter(|r| r.major_version >= min_major))
    }
}

fn pick_best<'a>(candidates: impl Iterator<Item = &'a JavaRuntime>) -> Option<JavaRuntime> {
    candidates
        .max_by_key(|r| (r.is_64bit, r.major_version))
        .cloned()
}

/// Heap size for a runtime: 60% of available memory, capped by bit width
pub fn best_memory_mb(runtime: &JavaRuntime) -> u32 {
    best_memory_for(hardware::memory().available_mb, runtime.is_64bit)
}

fn best_memory_for(available_mb: u64, is_64bit: bool) -> u32 {
    let cap = if is_64bit {
        MAX_MEMORY_64BIT_MB
    } else {
        MAX_MEMORY_32BIT_MB
    };
    let share = (available_mb as f64 * 0.6) as u64;
    share.min(cap as u64) as u32
}

fn java_binary() -> &'static str {
    if cfg!(windows) {
        "java.exe"
    } else {
        "java"
    }
}

/// `java` below a JDK home. `dir` may be the home itself, a macOS bundle
/// (`Contents/Home`), or a folder holding either one level down.
pub fn find_java_executable(dir: &Path) -> Option<PathBuf> {
    let inside = |home: &Path| {
        ["bin", "Contents/Home/bin"]
            .iter()
            .map(|bin| home.join(bin).join(java_binary()))
            .find(|candidate| candidate.is_file())
    };
    inside(dir).or_else(|| {
        std::fs::read_dir(dir)
            .ok()?
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .find_map(|path| inside(&path))
    })
}

/// Directories whose children are JDK homes
fn install_roots() -> &'static [&'static str] {
    if cfg!(windows) {
        &[
            "C:\\Program Files\\Java",
            "C:\\Program Files (x86)\\Java",
            "C:\\Program Files\\Eclipse Adoptium",
            "C:\\Program Files\\Microsoft",
        ]
    } else if cfg!(target_os = "macos") {
        &["/Library/Java/JavaVirtualMachines"]
    } else {
        &["/usr/lib/jvm", "/usr/java", "/opt/java"]
    }
}

/// Every runtime that validates: `java` on PATH first, then the usual
/// install roots. Symlinked duplicates are collapsed.
pub fn scan_system_javas() -> Vec<JavaRuntime> {
    let installed = install_roots()
        .iter()
        .filter_map(|root| std::fs::read_dir(root).ok())
        .flat_map(|entries| entries.flatten())
        .filter_map(|entry| find_java_executable(&entry.path()));

    let mut seen = HashSet::new();
    which::which("java")
        .ok()
        .into_iter()
        .chain(installed)
        .map(|path| dunce::canonicalize(&path).unwrap_or(path))
        .filter(|path| seen.insert(path.clone()))
        .filter_map(|path| match verify_java(&path) {
            Ok(runtime) => Some(runtime),
            Err(e) => {
                log::debug!("Skipping {:?}: {:#}", path, e);
                None
            }
        })
        .collect()
}

/// Run `path -version` and read the runtime's version and bitness
pub fn verify_java(path: &Path) -> Result<JavaRuntime> {
    anyhow::ensure!(path.is_file(), "No Java executable at {:?}", path);

    let output = std::process::Command::new(path)
        .arg("-version")
        .hide_console()
        .output()
        .with_context(|| format!("Failed to run {:?} -version", path))?;

    // The banner goes to stderr
    parse_version_output(path, &String::from_utf8_lossy(&output.stderr))
}

fn parse_version_output(path: &Path, banner: &str) -> Result<JavaRuntime> {
    let version = regex::Regex::new(r#"version\s+"([^"]+)""#)
        .ok()
        .and_then(|re| re.captures(banner))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .with_context(|| format!("No version in java -version output: {}", banner.trim()))?;
    let major_version =
        major_of(&version).with_context(|| format!("Unrecognised Java version {}", version))?;

    Ok(JavaRuntime {
        path: path.to_path_buf(),
        is_64bit: ["64-Bit", "x86_64", "amd64"].iter().any(|m| banner.contains(m)),
        version,
        major_version,
    })
}

/// `1.8.0_311` is 8, `17.0.8` is 17, `21-ea` is 21
fn major_of(version: &str) -> Option<u32> {
    let mut numbers = version
        .split(|c: char| !c.is_ascii_digit())
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<u32>().ok());
    match numbers.next()?? {
        1 => numbers.next()?,
        major => Some(major),
    }
}
