//! Launch orchestration and dependency acquisition for JVM game runtimes.

pub mod auth;
pub mod config;
pub mod error;
pub mod game;
pub mod utils;

pub use config::LauncherConfig;
pub use error::{ArgumentError, DownloadError, LaunchError, MetadataError};
