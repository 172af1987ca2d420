pub mod installer;
pub mod java;
pub mod launcher;
pub mod paths;

// Re-export commonly used types
pub use java::{JavaRegistry, JavaRuntime};
pub use launcher::{LaunchResult, LaunchSetting, Launcher, Version, VersionReader};
pub use paths::GamePaths;
