//! Classpath assembly for a resolved version.

use crate::error::ArgumentError;
use crate::game::installer::types::Platform;
use crate::game::launcher::versions::Version;
use crate::game::paths::GamePaths;
use std::collections::HashSet;

/// Build the classpath string: every library that applies to `platform`, in
/// manifest order, then the version jar. Missing files are logged and kept
/// on the classpath so the JVM reports them itself.
pub fn build_classpath(version: &Version, paths: &GamePaths, platform: &Platform) -> String {
    classpath_entries(version, paths, platform).join(platform.os.classpath_separator())
}

pub fn classpath_entries(version: &Version, paths: &GamePaths, platform: &Platform) -> Vec<String> {
    let mut entries = Vec::with_capacity(version.libraries.len() + 1);
    let mut seen = HashSet::new();

    for library in &version.libraries {
        if !library.applies_to(platform) {
            continue;
        }
        let file = paths.library(&library.path);
        if !file.is_file() {
            log::warn!("Library missing from disk: {:?}", file);
        }
        let entry = file.to_string_lossy().into_owned();
        if seen.insert(entry.clone()) {
            entries.push(entry);
        }
    }

    let jar = paths.version_jar(&version.jar);
    if !jar.exists() {
        log::warn!("Version jar missing from disk: {:?}", jar);
    }
    entries.push(jar.to_string_lossy().to_string());
    entries
}

/// Repository-relative path for `group:artifact:version[:classifier][@ext]`.
/// `com.google.guava:guava:21.0` maps to `com/google/guava/guava/21.0/guava-21.0.jar`.
pub fn maven_to_path(coords: &str) -> Result<String, ArgumentError> {
    let invalid = || ArgumentError::InvalidCoordinates(coords.to_string());
    let (body, extension) = coords.rsplit_once('@').unwrap_or((coords, "jar"));

    let mut fields = body.split(':');
    let (Some(group), Some(artifact), Some(version)) = (fields.next(), fields.next(), fields.next()) else {
        return Err(invalid());
    };
    if group.is_empty() || artifact.is_empty() || version.is_empty() || extension.is_empty() {
        return Err(invalid());
    }

    let file = match fields.next().filter(|c| !c.is_empty()) {
        Some(classifier) => format!("{artifact}-{version}-{classifier}.{extension}"),
        None => format!("{artifact}-{version}.{extension}"),
    };
    Ok(format!("{}/{artifact}/{version}/{file}", group.replace('.', "/")))
}
