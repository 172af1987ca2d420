/// Launch settings, events and state shared across the launcher
use crate::auth::AuthenticateResult;
use crate::error::LaunchError;
use crate::game::java::JavaRuntime;
use crate::game::launcher::versions::Version;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::oneshot;

pub const DEFAULT_LAUNCHER_NAME: &str = "Hearth";

/// How a launch request should be carried out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LaunchType {
    #[default]
    Normal,
    /// Drop advanced arguments, GC tuning and java agents
    Safe,
    /// Write a launch script instead of starting the game
    CreateShort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSize {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub fullscreen: bool,
}

/// Everything needed for one launch attempt
#[derive(Debug, Clone)]
pub struct LaunchSetting {
    pub version: Option<Version>,
    pub auth: Option<AuthenticateResult>,
    /// Falls back to the launcher's default runtime when unset
    pub java: Option<JavaRuntime>,

    /// Young generation size in MB, 0 to omit
    pub min_memory_mb: u32,
    /// Heap cap in MB, 0 to compute from host memory
    pub max_memory_mb: u32,

    pub launch_type: LaunchType,

    pub advanced_jvm_arguments: Option<String>,
    pub advanced_game_arguments: Option<String>,
    /// Replaces the default G1 flags
    pub gc_argument: Option<String>,
    /// Path of a `-javaagent:` jar
    pub java_agent: Option<String>,

    pub window_size: Option<WindowSize>,

    pub launcher_name: String,
    pub launcher_version: String,
}

impl Default for LaunchSetting {
    fn default() -> Self {
        Self {
            version: None,
            auth: None,
            java: None,
            min_memory_mb: 0,
            max_memory_mb: 0,
            launch_type: LaunchType::Normal,
            advanced_jvm_arguments: None,
            advanced_game_arguments: None,
            gc_argument: None,
            java_agent: None,
            window_size: None,
            launcher_name: DEFAULT_LAUNCHER_NAME.to_string(),
            launcher_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl LaunchSetting {
    pub fn new(version: Version, auth: AuthenticateResult) -> Self {
        Self {
            version: Some(version),
            auth: Some(auth),
            ..Default::default()
        }
    }

    pub fn is_safe(&self) -> bool {
        self.launch_type == LaunchType::Safe
    }

    /// Clear everything safe mode does not allow
    pub fn strip_for_safe_mode(&mut self) {
        self.advanced_jvm_arguments = None;
        self.advanced_game_arguments = None;
        self.gc_argument = None;
        self.java_agent = None;
    }
}

/// Handle to a running process
#[derive(Debug)]
pub struct ProcessHandle {
    /// Process ID
    pub pid: u32,

    /// Resolves once the watcher has observed the exit
    pub exit: oneshot::Receiver<GameExitEvent>,
}

impl ProcessHandle {
    /// Wait for the game to exit. `None` if the watcher went away first.
    pub async fn wait(self) -> Option<GameExitEvent> {
        self.exit.await.ok()
    }
}

/// Result of launching a game
#[derive(Debug)]
pub struct LaunchResult {
    pub is_success: bool,

    /// Absent on failure and for shortcut launches
    pub process: Option<ProcessHandle>,

    /// Quoted command line, empty when construction failed
    pub arguments: String,

    /// Time spent between the request and the process start
    pub launch_duration: Duration,

    pub error: Option<LaunchError>,
}

impl LaunchResult {
    pub(crate) fn succeeded(process: Option<ProcessHandle>, arguments: String, launch_duration: Duration) -> Self {
        Self {
            is_success: true,
            process,
            arguments,
            launch_duration,
            error: None,
        }
    }

    pub(crate) fn failed(error: LaunchError, arguments: String, launch_duration: Duration) -> Self {
        Self {
            is_success: false,
            process: None,
            arguments,
            launch_duration,
            error: Some(error),
        }
    }
}

/// Emitted once per game process after it exits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameExitEvent {
    pub exit_code: i32,
    pub pid: u32,
    pub version_id: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub started_at: chrono::DateTime<chrono::Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub ended_at: chrono::DateTime<chrono::Utc>,
    pub duration: Duration,
}

impl GameExitEvent {
    /// 0 and -1 are clean exits; anything else is a crash
    pub fn is_normal_exit(&self) -> bool {
        matches!(self.exit_code, 0 | -1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    /// Lines produced by the game itself
    Game,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Events pushed to the optional sink while launching and supervising
#[derive(Debug, Clone)]
pub enum LauncherEvent {
    Log { level: LogLevel, message: String },
    GameLog { stream: OutputStream, line: String },
    GameExit(GameExitEvent),
}

/// Phase of the current (or last) launch attempt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LaunchState {
    #[default]
    Idle,
    Validating,
    ShortcutWrite,
    Extracting,
    Starting,
    Running,
    Failed,
}
