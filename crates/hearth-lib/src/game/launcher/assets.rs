/// Asset index reading
use crate::error::{MetadataError, MetadataResult};
use crate::game::launcher::versions::Version;
use crate::game::paths::GamePaths;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Parsed `<root>/assets/indexes/<id>.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetIndexFile {
    #[serde(default)]
    pub objects: HashMap<String, AssetObject>,

    /// Pre-1.7.10 indexes are mirrored into `assets/virtual/legacy`
    #[serde(default, rename = "virtual")]
    pub is_virtual: bool,

    #[serde(default)]
    pub map_to_resources: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetObject {
    pub hash: String,
    pub size: u64,
}

impl AssetObject {
    /// `<hh>/<hash>`, relative to both `assets/objects` and the resources URL
    pub fn relative_path(&self) -> String {
        let prefix = self.hash.get(..2).unwrap_or(&self.hash);
        format!("{}/{}", prefix, self.hash)
    }
}

#[derive(Debug, Clone)]
pub struct AssetsReader {
    paths: GamePaths,
}

impl AssetsReader {
    pub fn new(paths: GamePaths) -> Self {
        Self { paths }
    }

    pub fn index_path(&self, version: &Version) -> PathBuf {
        self.paths.asset_index(&version.assets)
    }

    /// Read the asset index referenced by `version`
    pub fn get_assets(&self, version: &Version) -> MetadataResult<AssetIndexFile> {
        let path = self.index_path(version);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MetadataError::NotFound(path))
            }
            Err(source) => return Err(MetadataError::Io { path, source }),
        };
        serde_json::from_str(&content).map_err(|source| MetadataError::Parse {
            id: version.assets.clone(),
            source,
        })
    }

    pub async fn get_assets_async(&self, version: &Version) -> MetadataResult<AssetIndexFile> {
        let reader = self.clone();
        let version = version.clone();
        tokio::task::spawn_blocking(move || reader.get_assets(&version))
            .await
            .unwrap_or_else(|e| {
                Err(MetadataError::Io {
                    path: PathBuf::new(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
                })
            })
    }

    /// Absolute on-disk location of one object
    pub fn object_path(&self, object: &AssetObject) -> PathBuf {
        self.paths.asset_object(&object.hash)
    }
}
