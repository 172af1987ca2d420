//! Canonical on-disk layout of a game root.

use std::path::{Path, PathBuf};

/// Name of the per-version native scratch directory
pub const NATIVES_DIR_NAME: &str = "$natives";

/// Maps identifiers to paths under a game root. Holds no state beyond the
/// root and the isolation flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GamePaths {
    root: PathBuf,
    version_isolation: bool,
}

impl GamePaths {
    pub fn new(root: impl Into<PathBuf>, version_isolation: bool) -> Self {
        Self {
            root: root.into(),
            version_isolation,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn version_isolation(&self) -> bool {
        self.version_isolation
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.root.join("versions")
    }

    pub fn version_dir(&self, id: &str) -> PathBuf {
        self.versions_dir().join(id)
    }

    /// `<root>/versions/<id>/<id>.json`
    pub fn version_json(&self, id: &str) -> PathBuf {
        self.version_dir(id).join(format!("{}.json", id))
    }

    /// `<root>/versions/<jar>/<jar>.jar`
    pub fn version_jar(&self, jar_id: &str) -> PathBuf {
        self.version_dir(jar_id).join(format!("{}.jar", jar_id))
    }

    /// Working directory of a version: its own folder when isolated, the
    /// shared root otherwise.
    pub fn version_root(&self, id: &str) -> PathBuf {
        if self.version_isolation {
            self.version_dir(id)
        } else {
            self.root.clone()
        }
    }

    /// `<version-root>/$natives`
    pub fn natives_dir(&self, id: &str) -> PathBuf {
        self.version_root(id).join(NATIVES_DIR_NAME)
    }

    pub fn options_file(&self, id: &str) -> PathBuf {
        self.version_root(id).join("options.txt")
    }

    pub fn libraries_dir(&self) -> PathBuf {
        self.root.join("libraries")
    }

    /// `<root>/libraries/<relative>`
    pub fn library(&self, relative: &str) -> PathBuf {
        join_relative(&self.libraries_dir(), relative)
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.root.join("assets")
    }

    pub fn asset_index(&self, index_id: &str) -> PathBuf {
        self.assets_dir()
            .join("indexes")
            .join(format!("{}.json", index_id))
    }

    /// `<root>/assets/objects/<hh>/<hash>`
    pub fn asset_object(&self, hash: &str) -> PathBuf {
        let prefix = hash.get(..2).unwrap_or(hash);
        self.assets_dir().join("objects").join(prefix).join(hash)
    }

    /// Legacy `virtual/legacy` asset layout used by very old versions
    pub fn legacy_assets_dir(&self) -> PathBuf {
        self.assets_dir().join("virtual").join("legacy")
    }
}

/// Join a `/`-separated relative path so it uses the host separator
fn join_relative(base: &Path, relative: &str) -> PathBuf {
    relative
        .split('/')
        .filter(|s| !s.is_empty())
        .fold(base.to_path_buf(), |acc, seg| acc.join(seg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_layout() {
        let paths = GamePaths::new("/mc", false);
        assert_eq!(paths.version_json("1.20.1"), Path::new("/mc/versions/1.20.1/1.20.1.json"));
        assert_eq!(paths.version_jar("1.20.1"), Path::new("/mc/versions/1.20.1/1.20.1.jar"));
        assert_eq!(paths.version_root("1.20.1"), Path::new("/mc"));
        assert_eq!(paths.natives_dir("1.20.1"), Path::new("/mc/$natives"));
        assert_eq!(paths.options_file("1.20.1"), Path::new("/mc/options.txt"));
    }

    #[test]
    fn isolated_layout_moves_version_root() {
        let paths = GamePaths::new("/mc", true);
        assert_eq!(paths.version_root("fabric"), Path::new("/mc/versions/fabric"));
        assert_eq!(paths.natives_dir("fabric"), Path::new("/mc/versions/fabric/$natives"));
        // jar location does not depend on isolation
        assert_eq!(paths.version_jar("1.20.1"), Path::new("/mc/versions/1.20.1/1.20.1.jar"));
    }

    #[test]
    fn library_and_asset_paths() {
        let paths = GamePaths::new("/mc", false);
        assert_eq!(
            paths.library("org/lwjgl/lwjgl/3.3.1/lwjgl-3.3.1.jar"),
            Path::new("/mc/libraries/org/lwjgl/lwjgl/3.3.1/lwjgl-3.3.1.jar")
        );
        assert_eq!(paths.asset_index("5"), Path::new("/mc/assets/indexes/5.json"));
        assert_eq!(paths.asset_object("abcdef"), Path::new("/mc/assets/objects/ab/abcdef"));
    }
}
