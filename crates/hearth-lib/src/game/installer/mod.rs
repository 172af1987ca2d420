//! Dependency acquisition: works out which files a version still needs and
//! fetches them through the mirror-aware batch downloader.

pub mod config;
pub mod core;
pub mod types;

use crate::game::installer::config::RESOURCES_URL;
use crate::game::installer::core::batch::{BatchDownloader, BatchReport, DownloadTask};
use crate::game::installer::types::{CancelToken, Platform};
use crate::game::launcher::assets::{AssetIndexFile, AssetsReader};
use crate::game::launcher::versions::Version;
use crate::game::paths::GamePaths;
use crate::utils::hash::file_matches;
use std::path::Path;

/// Whether a file on disk can be used as-is
fn is_satisfied(path: &Path, sha1: Option<&str>, size: Option<u64>, check_hash: bool) -> bool {
    if check_hash && sha1.is_some() {
        return file_matches(path, sha1);
    }
    match (size, std::fs::metadata(path)) {
        (Some(expected), Ok(meta)) => meta.len() == expected,
        (None, Ok(meta)) => meta.is_file(),
        (_, Err(_)) => false,
    }
}

fn task(
    name: impl Into<String>,
    url: &str,
    path: std::path::PathBuf,
    sha1: Option<&String>,
    size: Option<u64>,
) -> DownloadTask {
    let mut task = DownloadTask::new(name, url, path);
    task.sha1 = sha1.cloned();
    task.size = size;
    task
}

/// Download task for the version's asset index, if it is missing or stale
pub fn asset_index_task(version: &Version, paths: &GamePaths, check_hash: bool) -> Option<DownloadTask> {
    let index = version.asset_index.as_ref()?;
    let url = index.url.as_deref()?;
    let path = paths.asset_index(&index.id);
    if is_satisfied(&path, index.sha1.as_deref(), index.size, check_hash) {
        return None;
    }
    Some(task(
        format!("asset index {}", index.id),
        url,
        path,
        index.sha1.as_ref(),
        index.size,
    ))
}

/// Everything `version` needs that is not already valid on disk: client jar,
/// libraries, native archives, the asset index and, when `assets` is given,
/// the asset objects it lists.
pub fn plan_downloads(
    version: &Version,
    paths: &GamePaths,
    platform: &Platform,
    assets: Option<&AssetIndexFile>,
    check_hash: bool,
) -> Vec<DownloadTask> {
    let mut tasks = Vec::new();

    if let Some(client) = &version.client {
        if let Some(url) = client.url.as_deref() {
            let path = paths.version_jar(&version.jar);
            if !is_satisfied(&path, client.sha1.as_deref(), client.size, check_hash) {
                tasks.push(task(
                    format!("{}.jar", version.jar),
                    url,
                    path,
                    client.sha1.as_ref(),
                    client.size,
                ));
            }
        }
    }

    for library in &version.libraries {
        if !library.applies_to(platform) || library.url.is_empty() {
            continue;
        }
        let path = paths.library(&library.path);
        if !is_satisfied(&path, library.sha1.as_deref(), library.size, check_hash) {
            tasks.push(task(
                library.name.clone(),
                &library.url,
                path,
                library.sha1.as_ref(),
                library.size,
            ));
        }
    }

    for native in &version.natives {
        let path = paths.library(&native.path);
        if !is_satisfied(&path, native.sha1.as_deref(), native.size, check_hash) {
            tasks.push(task(
                format!("{}:{}", native.name, native.classifier),
                &native.url,
                path,
                native.sha1.as_ref(),
                native.size,
            ));
        }
    }

    tasks.extend(asset_index_task(version, paths, check_hash));

    if let Some(index) = assets {
        let mut objects: Vec<_> = index.objects.values().collect();
        objects.sort_by(|a, b| a.hash.cmp(&b.hash));
        objects.dedup_by(|a, b| a.hash == b.hash);
        for object in objects {
            let path = paths.asset_object(&object.hash);
            if !is_satisfied(&path, Some(&object.hash), Some(object.size), check_hash) {
                let url = format!("{}{}", RESOURCES_URL, object.relative_path());
                tasks.push(task(
                    object.hash.clone(),
                    &url,
                    path,
                    Some(&object.hash),
                    Some(object.size),
                ));
            }
        }
    }

    tasks
}

/// Fetch every missing dependency of `version`. The asset index goes first
/// so the objects it lists can be planned in the same call.
pub async fn complete_version(
    version: &Version,
    paths: &GamePaths,
    platform: &Platform,
    downloader: &BatchDownloader,
    check_hash: bool,
    cancel: &CancelToken,
) -> BatchReport {
    let mut report = BatchReport::default();

    if let Some(index_task) = asset_index_task(version, paths, check_hash) {
        log::info!("Fetching asset index for {}", version.id);
        report
            .tasks
            .extend(downloader.download_all(vec![index_task], cancel).await.tasks);
    }

    let assets = match AssetsReader::new(paths.clone()).get_assets(version) {
        Ok(index) => Some(index),
        Err(e) => {
            log::warn!("Asset index unavailable for {}: {}", version.id, e);
            None
        }
    };

    let tasks = plan_downloads(version, paths, platform, assets.as_ref(), check_hash);
    log::info!("{} file(s) missing for {}", tasks.len(), version.id);
    report
        .tasks
        .extend(downloader.download_all(tasks, cancel).await.tasks);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::installer::types::{Arch, OsType};
    use crate::game::launcher::assets::AssetObject;
    use crate::game::launcher::version_parser::{Artifact, AssetIndex};
    use crate::game::launcher::versions::{Library, Native};
    use crate::utils::hash::sha1_hex;
    use std::collections::HashMap;

    fn linux() -> Platform {
        Platform {
            os: OsType::Linux,
            arch: Arch::X64,
        }
    }

    fn version() -> Version {
        Version {
            id: "1.20.1".into(),
            inherits_from: None,
            jar: "1.20.1".into(),
            main_class: "Main".into(),
            libraries: vec![Library {
                name: "a:b:1".into(),
                path: "a/b/1/b-1.jar".into(),
                url: "https://libraries.minecraft.net/a/b/1/b-1.jar".into(),
                sha1: Some(sha1_hex(b"lib")),
                size: Some(3),
                rules: vec![],
            }],
            natives: vec![Native {
                name: "org.lwjgl:lwjgl:3".into(),
                classifier: "natives-linux".into(),
                path: "org/lwjgl/lwjgl/3/lwjgl-3-natives-linux.jar".into(),
                url: "https://libraries.minecraft.net/org/lwjgl/lwjgl/3/lwjgl-3-natives-linux.jar".into(),
                sha1: None,
                size: None,
                exclude: vec![],
            }],
            asset_index: Some(AssetIndex {
                id: "5".into(),
                sha1: None,
                size: None,
                total_size: None,
                url: Some("https://piston-meta.mojang.com/5.json".into()),
            }),
            assets: "5".into(),
            min_java_major: None,
            jvm_arguments: vec![],
            game_arguments: vec![],
            legacy_game_arguments: None,
            version_type: "release".into(),
            client: Some(Artifact {
                path: None,
                url: Some("https://piston-data.mojang.com/client.jar".into()),
                sha1: None,
                size: Some(10),
            }),
        }
    }

    #[test]
    fn plans_everything_on_empty_root() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = GamePaths::new(tmp.path(), false);

        let mut objects = HashMap::new();
        objects.insert(
            "a.ogg".to_string(),
            AssetObject {
                hash: "ab".repeat(20),
                size: 1,
            },
        );
        objects.insert(
            "b.ogg".to_string(),
            AssetObject {
                hash: "ab".repeat(20),
                size: 1,
            },
        );
        let index = AssetIndexFile {
            objects,
            ..Default::default()
        };

        let tasks = plan_downloads(&version(), &paths, &linux(), Some(&index), true);
        // jar, library, native, index, one deduplicated object
        assert_eq!(tasks.len(), 5);
        let object = tasks.last().unwrap();
        assert_eq!(
            object.url,
            format!("https://resources.download.minecraft.net/ab/{}", "ab".repeat(20))
        );
        assert_eq!(object.path, paths.asset_object(&"ab".repeat(20)));
    }

    #[test]
    fn valid_files_are_not_planned() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = GamePaths::new(tmp.path(), false);
        let v = version();

        let lib = paths.library(&v.libraries[0].path);
        std::fs::create_dir_all(lib.parent().unwrap()).unwrap();
        std::fs::write(&lib, b"lib").unwrap();

        let jar = paths.version_jar("1.20.1");
        std::fs::create_dir_all(jar.parent().unwrap()).unwrap();
        std::fs::write(&jar, b"0123456789").unwrap();

        let tasks = plan_downloads(&v, &paths, &linux(), None, true);
        let names: Vec<&str> = tasks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["org.lwjgl:lwjgl:3:natives-linux", "asset index 5"]);
    }

    #[test]
    fn corrupt_library_is_replanned_only_with_hash_checks() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = GamePaths::new(tmp.path(), false);
        let v = version();
        let lib = paths.library(&v.libraries[0].path);
        std::fs::create_dir_all(lib.parent().unwrap()).unwrap();
        std::fs::write(&lib, b"bad").unwrap();

        let with_hash = plan_downloads(&v, &paths, &linux(), None, true);
        assert!(with_hash.iter().any(|t| t.name == "a:b:1"));
        let size_only = plan_downloads(&v, &paths, &linux(), None, false);
        assert!(!size_only.iter().any(|t| t.name == "a:b:1"));
    }
}
