/// Native library extraction
use crate::error::LaunchError;
use crate::game::launcher::versions::Version;
use crate::game::paths::GamePaths;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs::{self, File};
use std::path::Path;

/// Signature and manifest entries that must not end up next to the natives
const SIGNATURE_SUFFIXES: [&str; 4] = [".SF", ".RSA", ".DSA", ".EC"];

/// Extract one native archive into `destination`.
///
/// Entries whose name starts with an `exclude` prefix are skipped, as are
/// `META-INF` signature files when `strip_signatures` is set. Existing files
/// are overwritten. Returns the number of files written.
pub fn extract_native(
    archive: &Path,
    destination: &Path,
    exclude: &[String],
    strip_signatures: bool,
) -> Result<usize, LaunchError> {
    if !archive.is_file() {
        return Err(LaunchError::NativeNotFound {
            native: archive
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            path: archive.to_path_buf(),
        });
    }
    Ok(extract_archive(archive, destination, exclude, strip_signatures)?)
}

/// Verify and extract every native of `version` into its natives directory.
/// Fails on the first archive missing from disk.
pub fn extract_version_natives(
    version: &Version,
    paths: &GamePaths,
    strip_signatures: bool,
) -> Result<(), LaunchError> {
    let natives_dir = paths.natives_dir(&version.id);

    // Check everything first so a missing archive leaves no partial output
    for native in &version.natives {
        let archive = paths.library(&native.path);
        if !archive.is_file() {
            return Err(LaunchError::NativeNotFound {
                native: native.name.clone(),
                path: archive,
            });
        }
    }

    fs::create_dir_all(&natives_dir).map_err(|source| LaunchError::Io {
        path: natives_dir.clone(),
        source,
    })?;

    let mut done = HashSet::new();
    for native in &version.natives {
        if !done.insert(native.path.clone()) {
            continue;
        }
        let archive = paths.library(&native.path);
        let count = extract_native(&archive, &natives_dir, &native.exclude, strip_signatures)?;
        log::debug!("Extracted {} files from {}", count, native.name);
    }
    Ok(())
}

fn extract_archive(
    jar_path: &Path,
    output_dir: &Path,
    exclusions: &[String],
    strip_signatures: bool,
) -> Result<usize> {
    log::debug!("Extracting natives from: {:?}", jar_path);

    let file = File::open(jar_path).context(format!("Failed to open JAR: {:?}", jar_path))?;
    let mut archive =
        zip::ZipArchive::new(file).context(format!("Failed to read JAR: {:?}", jar_path))?;

    let mut written = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = entry.name().to_string();

        if should_exclude(&name, exclusions) {
            continue;
        }
        if strip_signatures && is_signature_entry(&name) {
            continue;
        }

        // Rejects absolute paths and `..` components
        let Some(relative) = entry.enclosed_name() else {
            anyhow::bail!("Archive entry escapes destination: {} in {:?}", name, jar_path);
        };
        let output_path = output_dir.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&output_path)?;
            continue;
        }

        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)?;
        }

        // File::create truncates anything left from an earlier launch
        let mut output_file = File::create(&output_path)
            .context(format!("Failed to create {:?}", output_path))?;
        std::io::copy(&mut entry, &mut output_file)?;
        written += 1;
    }

    Ok(written)
}

/// Check if a file should be excluded
fn should_exclude(file_path: &str, exclusions: &[String]) -> bool {
    exclusions.iter().any(|e| file_path.starts_with(e.as_str()))
}

fn is_signature_entry(name: &str) -> bool {
    let Some(rest) = name.strip_prefix("META-INF/") else {
        return false;
    };
    let upper = rest.to_ascii_uppercase();
    upper == "MANIFEST.MF" || SIGNATURE_SUFFIXES.iter().any(|s| upper.ends_with(s))
}
