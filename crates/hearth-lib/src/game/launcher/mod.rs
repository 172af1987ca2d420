pub mod arguments;
pub mod assets;
pub mod classpath;
pub mod natives;
pub mod process;
/// Game launcher module: version metadata, argument construction and process supervision
pub mod types;
pub mod version_parser;
pub mod versions;

// Re-export commonly used types
pub use crate::game::installer::types::OsType;
pub use arguments::{quote_arg, ArgumentsParser};
pub use assets::{AssetIndexFile, AssetObject, AssetsReader};
pub use classpath::{build_classpath, maven_to_path};
pub use natives::{extract_native, extract_version_natives};
pub use process::Launcher;
pub use types::{
    GameExitEvent, LaunchResult, LaunchSetting, LaunchState, LaunchType, LauncherEvent, LogLevel,
    OutputStream, ProcessHandle, WindowSize,
};
pub use version_parser::{parse_version_json, resolve_version_chain, Argument, VersionManifest};
pub use versions::{Library, Native, Version, VersionReader, VersionScan};
