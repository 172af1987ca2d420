//! Resolved versions and the on-disk version reader.

use crate::error::{MetadataError, MetadataResult};
use crate::game::installer::config::LIBRARIES_URL;
use crate::game::installer::types::Platform;
use crate::game::launcher::classpath::maven_to_path;
use crate::game::launcher::version_parser::{
    self, library_key, parse_version_json, parse_version_str, resolve_version_chain, rules_allow,
    Argument, Artifact, AssetIndex, FeatureSet, Rule, VersionManifest,
};
use crate::game::paths::GamePaths;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// A version with its parent chain flattened
#[derive(Debug, Clone, PartialEq)]
pub struct Version {
    pub id: String,
    /// Parent the version was declared to inherit from, kept for display
    pub inherits_from: Option<String>,
    /// Version id whose jar is put on the classpath
    pub jar: String,
    pub main_class: String,
    pub libraries: Vec<Library>,
    pub natives: Vec<Native>,
    pub asset_index: Option<AssetIndex>,
    /// Assets id (falls back to the asset index id, then "legacy")
    pub assets: String,
    pub min_java_major: Option<u32>,
    pub jvm_arguments: Vec<Argument>,
    pub game_arguments: Vec<Argument>,
    /// Pre-1.13 single string template
    pub legacy_game_arguments: Option<String>,
    pub version_type: String,
    pub client: Option<Artifact>,
}

/// A classpath library
#[derive(Debug, Clone, PartialEq)]
pub struct Library {
    /// Maven coordinates
    pub name: String,
    /// Path relative to `<root>/libraries`
    pub path: String,
    pub url: String,
    pub sha1: Option<String>,
    pub size: Option<u64>,
    pub rules: Vec<Rule>,
}

impl Library {
    /// group:artifact[:classifier]
    pub fn key(&self) -> String {
        library_key(&self.name)
    }

    pub fn applies_to(&self, platform: &Platform) -> bool {
        rules_allow(&self.rules, platform, &FeatureSet::default())
    }
}

/// A platform-specific archive extracted before launch
#[derive(Debug, Clone, PartialEq)]
pub struct Native {
    pub name: String,
    pub classifier: String,
    pub path: String,
    pub url: String,
    pub sha1: Option<String>,
    pub size: Option<u64>,
    pub exclude: Vec<String>,
}

impl Native {
    pub fn key(&self) -> String {
        format!("{}:{}", library_key(&self.name), self.classifier)
    }
}

/// Result of a best-effort scan of `<root>/versions`
#[derive(Debug, Default)]
pub struct VersionScan {
    pub versions: Vec<Version>,
    /// Entries that were skipped, with the reason
    pub failures: Vec<(String, MetadataError)>,
}

impl VersionScan {
    pub fn skipped(&self) -> usize {
        self.failures.len()
    }
}

/// Reads versions from a game root for one platform. Cloning is cheap and
/// clones share the cached version list.
#[derive(Debug, Clone)]
pub struct VersionReader {
    paths: GamePaths,
    platform: Platform,
    cache: Arc<RwLock<Arc<Vec<Version>>>>,
}

impl VersionReader {
    pub fn new(paths: GamePaths) -> Self {
        Self::with_platform(paths, Platform::current())
    }

    pub fn with_platform(paths: GamePaths, platform: Platform) -> Self {
        Self {
            paths,
            platform,
            cache: Arc::new(RwLock::new(Arc::new(Vec::new()))),
        }
    }

    pub fn paths(&self) -> &GamePaths {
        &self.paths
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Load and flatten one version
    pub fn get_version(&self, id: &str) -> MetadataResult<Version> {
        let manifest = self.load_manifest(id)?;
        self.resolve(manifest)
    }

    /// Parse manifest text; parents are loaded from disk
    pub fn json_to_version(&self, json: &str) -> MetadataResult<Version> {
        let manifest = parse_version_str(json, "<inline>")?;
        self.resolve(manifest)
    }

    /// Every readable version under the root. Broken entries are left out.
    pub fn get_versions(&self) -> Vec<Version> {
        self.get_versions_with_diagnostics().versions
    }

    pub fn get_versions_with_diagnostics(&self) -> VersionScan {
        let mut scan = VersionScan::default();
        let versions_dir = self.paths.versions_dir();

        let entries = match std::fs::read_dir(&versions_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return scan,
            Err(source) => {
                log::warn!("Failed to read versions dir {:?}: {}", versions_dir, source);
                scan.failures.push((
                    String::new(),
                    MetadataError::Io {
                        path: versions_dir,
                        source,
                    },
                ));
                return scan;
            }
        };

        let mut ids: Vec<String> = entries
            .flatten()
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|id| self.paths.version_json(id).is_file())
            .collect();
        ids.sort();

        for id in ids {
            match self.get_version(&id) {
                Ok(version) => scan.versions.push(version),
                Err(e) => {
                    log::warn!("Skipping version {}: {}", id, e);
                    scan.failures.push((id, e));
                }
            }
        }
        scan
    }

    /// Last list produced by [`refresh_versions`](Self::refresh_versions)
    pub fn cached_versions(&self) -> Arc<Vec<Version>> {
        self.cache
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Rescan the root and replace the cached list in one swap
    pub fn refresh_versions(&self) -> Arc<Vec<Version>> {
        let fresh = Arc::new(self.get_versions());
        *self.cache.write().unwrap_or_else(|e| e.into_inner()) = fresh.clone();
        fresh
    }

    /// Re-read a single version and update it in the cached list
    pub fn refresh_version(&self, id: &str) -> MetadataResult<Version> {
        let version = self.get_version(id)?;
        let mut guard = self.cache.write().unwrap_or_else(|e| e.into_inner());
        let mut list: Vec<Version> = guard.as_ref().clone();
        match list.iter_mut().find(|v| v.id == version.id) {
            Some(slot) => *slot = version.clone(),
            None => list.push(version.clone()),
        }
        *guard = Arc::new(list);
        Ok(version)
    }

    pub async fn get_version_async(&self, id: &str) -> MetadataResult<Version> {
        let reader = self.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || reader.get_version(&id))
            .await
            .unwrap_or_else(|e| Err(join_error(e)))
    }

    pub async fn get_versions_async(&self) -> Vec<Version> {
        let reader = self.clone();
        tokio::task::spawn_blocking(move || reader.get_versions())
            .await
            .unwrap_or_else(|e| {
                log::error!("Version scan task failed: {}", e);
                Vec::new()
            })
    }

    pub async fn refresh_versions_async(&self) -> Arc<Vec<Version>> {
        let reader = self.clone();
        match tokio::task::spawn_blocking(move || reader.refresh_versions()).await {
            Ok(list) => list,
            Err(e) => {
                log::error!("Version refresh task failed: {}", e);
                self.cached_versions()
            }
        }
    }

    fn load_manifest(&self, id: &str) -> MetadataResult<VersionManifest> {
        let path = self.paths.version_json(id);
        log::debug!("Reading version manifest {} -> {:?}", id, path);
        parse_version_json(&path, id)
    }

    fn resolve(&self, manifest: VersionManifest) -> MetadataResult<Version> {
        let declared_parent = manifest.inherits_from.clone();
        let mut load = |id: &str| self.load_manifest(id);
        let mut flat = resolve_version_chain(manifest, &mut load)?;
        if flat.jar.is_none() {
            flat.jar = Some(flat.id.clone());
        }
        let mut version = self.to_version(flat)?;
        version.inherits_from = declared_parent;
        Ok(version)
    }

    fn to_version(&self, manifest: VersionManifest) -> MetadataResult<Version> {
        let id = manifest.id.clone();
        let main_class = manifest.main_class.clone().ok_or(MetadataError::MissingField {
            id: id.clone(),
            field: "mainClass",
        })?;

        let mut libraries: Vec<Library> = Vec::new();
        let mut natives: Vec<Native> = Vec::new();

        for lib in &manifest.libraries {
            let rules = lib.rules.clone().unwrap_or_default();
            if !rules_allow(&rules, &self.platform, &FeatureSet::default()) {
                continue;
            }

            if lib.natives.is_some() {
                if let Some(native) = self.resolve_native(lib, &id)? {
                    push_unique(&mut natives, native, Native::key);
                }
            }

            if let Some(library) = resolve_library(lib, rules, &id)? {
                push_unique(&mut libraries, library, Library::key);
            }
        }

        let assets = manifest
            .assets
            .clone()
            .or_else(|| manifest.asset_index.as_ref().map(|a| a.id.clone()))
            .unwrap_or_else(|| "legacy".to_string());

        let (jvm_arguments, game_arguments) = match manifest.arguments {
            Some(args) => (args.jvm, args.game),
            None => (Vec::new(), Vec::new()),
        };

        Ok(Version {
            jar: manifest.jar.unwrap_or_else(|| id.clone()),
            id,
            inherits_from: None,
            main_class,
            libraries,
            natives,
            asset_index: manifest.asset_index,
            assets,
            min_java_major: manifest.java_version.map(|j| j.major_version),
            jvm_arguments,
            game_arguments,
            legacy_game_arguments: manifest.minecraft_arguments,
            version_type: manifest.version_type.unwrap_or_else(|| "release".to_string()),
            client: manifest.downloads.and_then(|d| d.client),
        })
    }

    /// Pick the classifier for this platform and describe its archive
    fn resolve_native(
        &self,
        lib: &version_parser::Library,
        version_id: &str,
    ) -> MetadataResult<Option<Native>> {
        let Some(template) = lib
            .natives
            .as_ref()
            .and_then(|n| n.get(self.platform.os.as_str()))
        else {
            return Ok(None);
        };
        let classifier = template.replace("${arch}", self.platform.arch.bits());

        let artifact = lib
            .downloads
            .as_ref()
            .and_then(|d| d.classifiers.as_ref())
            .and_then(|c| c.get(&classifier));

        let path = match artifact.and_then(|a| a.path.clone()) {
            Some(p) => p,
            None => coords_path(&format!("{}:{}", lib.name, classifier), version_id)?,
        };
        let url = artifact
            .and_then(|a| a.url.clone())
            .unwrap_or_else(|| repository_url(lib.url.as_deref(), &path));

        Ok(Some(Native {
            name: lib.name.clone(),
            classifier,
            path,
            url,
            sha1: artifact.and_then(|a| a.sha1.clone()),
            size: artifact.and_then(|a| a.size),
            exclude: lib
                .extract
                .as_ref()
                .map(|e| e.exclude.clone())
                .unwrap_or_default(),
        }))
    }
}

fn resolve_library(
    lib: &version_parser::Library,
    rules: Vec<Rule>,
    version_id: &str,
) -> MetadataResult<Option<Library>> {
    let artifact = lib.downloads.as_ref().and_then(|d| d.artifact.as_ref());

    // Legacy natives-only entries carry no classpath artifact
    if artifact.is_none() && lib.natives.is_some() {
        return Ok(None);
    }

    let path = match artifact.and_then(|a| a.path.clone()) {
        Some(p) => p,
        None => coords_path(&lib.name, version_id)?,
    };
    let url = artifact
        .and_then(|a| a.url.clone())
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| repository_url(lib.url.as_deref(), &path));

    Ok(Some(Library {
        name: lib.name.clone(),
        path,
        url,
        sha1: artifact.and_then(|a| a.sha1.clone()),
        size: artifact.and_then(|a| a.size),
        rules,
    }))
}

fn coords_path(coords: &str, version_id: &str) -> MetadataResult<String> {
    maven_to_path(coords).map_err(|_| MetadataError::MissingField {
        id: version_id.to_string(),
        field: "libraries.name",
    })
}

fn repository_url(base: Option<&str>, path: &str) -> String {
    let base = base.unwrap_or(LIBRARIES_URL);
    if base.ends_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}

/// Later entries replace earlier ones with the same key, keeping the
/// earlier position.
fn push_unique<T, F: Fn(&T) -> String>(list: &mut Vec<T>, item: T, key: F) {
    let k = key(&item);
    match list.iter().position(|existing| key(existing) == k) {
        Some(idx) => list[idx] = item,
        None => list.push(item),
    }
}

fn join_error(e: tokio::task::JoinError) -> MetadataError {
    MetadataError::Io {
        path: Default::default(),
        source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
    }
}

/// Index of versions by id, for callers that look up repeatedly
pub fn index_by_id(versions: &[Version]) -> HashMap<&str, &Version> {
    versions.iter().map(|v| (v.id.as_str(), v)).collect()
}
