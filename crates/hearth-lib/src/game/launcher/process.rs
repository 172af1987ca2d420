/// Launch orchestration: preflight, script generation and the game process lifecycle
use crate::auth::AuthState;
use crate::error::LaunchError;
use crate::game::installer::types::Platform;
use crate::game::java::{best_memory_mb, JavaRuntime};
use crate::game::launcher::arguments::{join_arguments, quote_arg, script_command_line, ArgumentsParser};
use crate::game::launcher::natives::extract_version_natives;
use crate::game::launcher::types::{
    GameExitEvent, LaunchResult, LaunchSetting, LaunchState, LaunchType, LauncherEvent, LogLevel,
    OutputStream, ProcessHandle,
};
use crate::game::paths::GamePaths;
use crate::utils::process::HearthCommandExt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncRead};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

/// Script written by [`LaunchType::CreateShort`]
pub fn shortcut_file_name(windows: bool) -> &'static str {
    if windows {
        "LaunchMinecraft.bat"
    } else {
        "LaunchMinecraft.sh"
    }
}

/// Counts a launch from the moment it is requested, including time spent
/// queued behind another launch, until it returns
struct BusyGuard<'a>(&'a AtomicUsize);

impl<'a> BusyGuard<'a> {
    fn new(pending: &'a AtomicUsize) -> Self {
        pending.fetch_add(1, Ordering::SeqCst);
        Self(pending)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Launches game processes for one game root. Launches on the same
/// `Launcher` are serialized.
pub struct Launcher {
    paths: GamePaths,
    platform: Platform,
    default_java: Option<JavaRuntime>,
    shortcut_dir: PathBuf,
    events: Option<mpsc::UnboundedSender<LauncherEvent>>,
    launch_lock: Mutex<()>,
    busy: AtomicUsize,
    state: Arc<StdMutex<LaunchState>>,
}

impl Launcher {
    pub fn new(paths: GamePaths) -> Self {
        Self {
            shortcut_dir: paths.root().to_path_buf(),
            paths,
            platform: Platform::current(),
            default_java: None,
            events: None,
            launch_lock: Mutex::new(()),
            busy: AtomicUsize::new(0),
            state: Arc::new(StdMutex::new(LaunchState::Idle)),
        }
    }

    /// Runtime used when a setting does not name one
    pub fn with_java(mut self, java: Option<JavaRuntime>) -> Self {
        self.default_java = java;
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<LauncherEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_shortcut_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.shortcut_dir = dir.into();
        self
    }

    pub fn paths(&self) -> &GamePaths {
        &self.paths
    }

    pub fn state(&self) -> LaunchState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_busy_launching(&self) -> bool {
        self.busy.load(Ordering::SeqCst) > 0
    }

    /// Run `launch` on a spawned task
    pub fn launch_detached(self: &Arc<Self>, setting: LaunchSetting) -> JoinHandle<LaunchResult> {
        let launcher = self.clone();
        tokio::spawn(async move { launcher.launch(setting).await })
    }

    /// Launch the game described by `setting`. Never panics on bad input;
    /// every failure is reported inside the result.
    pub async fn launch(&self, setting: LaunchSetting) -> LaunchResult {
        // Busy while queued too; the guard outlives the lock
        let _busy = BusyGuard::new(&self.busy);
        let _lock = self.launch_lock.lock().await;
        let start = Instant::now();

        let version_id = setting
            .version
            .as_ref()
            .map(|v| v.id.clone())
            .unwrap_or_default();
        self.log(LogLevel::Info, format!("Launching {}", version_id));

        let mut arguments = String::new();
        let result = match self.run_launch(setting, &mut arguments, start).await {
            Ok(process) => LaunchResult::succeeded(process, arguments, start.elapsed()),
            Err(error) => {
                log::error!("Launch of {} failed: {}", version_id, error);
                self.set_state(LaunchState::Failed);
                self.log(LogLevel::Fatal, format!("Launch failed: {}", error));
                LaunchResult::failed(error, arguments, start.elapsed())
            }
        };

        self.log(LogLevel::Info, format!("Launch finished for {}", version_id));
        result
    }

    async fn run_launch(
        &self,
        mut setting: LaunchSetting,
        arguments: &mut String,
        start: Instant,
    ) -> Result<Option<ProcessHandle>, LaunchError> {
        self.set_state(LaunchState::Validating);

        let java = setting
            .java
            .clone()
            .or_else(|| self.default_java.clone())
            .ok_or(LaunchError::RuntimeMissing)?;
        setting.java = Some(java.clone());

        let auth_ok = setting
            .auth
            .as_ref()
            .map(|a| a.state == AuthState::Success)
            .unwrap_or(false);
        let Some(version) = setting.version.clone().filter(|_| auth_ok) else {
            return Err(LaunchError::InvalidRequest(
                "a version and a successful authentication result are required".into(),
            ));
        };

        if setting.max_memory_mb == 0 {
            setting.max_memory_mb = best_memory_mb(&java);
            log::debug!("Using {} MB heap for {:?}", setting.max_memory_mb, java.path);
        }

        let safe = setting.is_safe();
        if safe {
            setting.strip_for_safe_mode();
        }

        let parser = ArgumentsParser::new(self.paths.clone(), self.platform);
        let args = parser.parse(&setting)?;
        *arguments = join_arguments(&args);
        log::info!("Exec command: {} {}", quote_arg(&java.path.to_string_lossy()), arguments);

        if setting.launch_type == LaunchType::CreateShort {
            self.set_state(LaunchState::ShortcutWrite);
            let path = self.write_shortcut(&java, &args).await?;
            self.log(LogLevel::Info, format!("Launch script written to {:?}", path));
            self.set_state(LaunchState::Idle);
            return Ok(None);
        }

        self.set_state(LaunchState::Extracting);
        let paths = self.paths.clone();
        let natives_version = version.clone();
        tokio::task::spawn_blocking(move || extract_version_natives(&natives_version, &paths, !safe))
            .await
            .map_err(|e| LaunchError::Internal(format!("native extraction task failed: {}", e)))??;

        self.set_state(LaunchState::Starting);
        let game_dir = self.paths.version_root(&version.id);
        tokio::fs::create_dir_all(&game_dir)
            .await
            .map_err(|source| LaunchError::Io {
                path: game_dir.clone(),
                source,
            })?;

        let mut command = tokio::process::Command::new(&java.path);
        command
            .args(&args)
            .current_dir(&game_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .hide_console();

        log::info!("Spawning game process for {}", version.id);
        let mut child = command.spawn().map_err(|source| LaunchError::Io {
            path: java.path.clone(),
            source,
        })?;
        let pid = child.id().unwrap_or_default();
        let started_at = chrono::Utc::now();
        log::info!("Game process started with PID: {} after {:?}", pid, start.elapsed());

        let pumps = [
            child
                .stdout
                .take()
                .map(|s| self.pump(s, OutputStream::Stdout)),
            child
                .stderr
                .take()
                .map(|s| self.pump(s, OutputStream::Stderr)),
        ];

        // Set before the watcher exists so a fast exit still lands on Idle
        self.set_state(LaunchState::Running);

        let (exit_tx, exit_rx) = oneshot::channel();
        let events = self.events.clone();
        let state = self.state.clone();
        let version_id = version.id.clone();
        tokio::spawn(async move {
            let status = child.wait().await;
            // Deliver every line before the exit event
            for pump in pumps.into_iter().flatten() {
                let _ = pump.await;
            }

            let exit_code = match status {
                Ok(status) => exit_code(status),
                Err(e) => {
                    log::error!("Failed to wait for game process (PID {}): {}", pid, e);
                    -1
                }
            };
            let ended_at = chrono::Utc::now();
            let event = GameExitEvent {
                exit_code,
                pid,
                version_id,
                started_at,
                ended_at,
                duration: (ended_at - started_at).to_std().unwrap_or_default(),
            };
            if event.is_normal_exit() {
                log::info!("Game process (PID {}) exited with code {}", pid, exit_code);
            } else {
                log::error!("Game process (PID {}) crashed with code {}", pid, exit_code);
            }

            {
                let mut current = state.lock().unwrap_or_else(|e| e.into_inner());
                if *current == LaunchState::Running {
                    *current = LaunchState::Idle;
                }
            }
            if let Some(tx) = &events {
                let _ = tx.send(LauncherEvent::GameExit(event.clone()));
            }
            let _ = exit_tx.send(event);
        });

        Ok(Some(ProcessHandle { pid, exit: exit_rx }))
    }

    fn pump<R>(&self, stream: R, kind: OutputStream) -> JoinHandle<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let events = self.events.clone();
        tokio::spawn(async move {
            let mut lines = tokio::io::BufReader::new(stream).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(tx) = &events {
                    let _ = tx.send(LauncherEvent::GameLog { stream: kind, line });
                }
            }
        })
    }

    async fn write_shortcut(&self, java: &JavaRuntime, args: &[String]) -> Result<PathBuf, LaunchError> {
        let windows = self.platform.os.is_windows();
        let path = self.shortcut_dir.join(shortcut_file_name(windows));
        let line = script_command_line(&java.path.to_string_lossy(), args, windows)?;
        let content = if windows {
            format!("@echo off\r\n{}\r\n", line)
        } else {
            format!("#!/bin/sh\nexec {}\n", line)
        };

        let io_err = |source| LaunchError::Io {
            path: path.clone(),
            source,
        };
        tokio::fs::create_dir_all(&self.shortcut_dir)
            .await
            .map_err(io_err)?;
        tokio::fs::write(&path, content).await.map_err(io_err)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
                .await
                .map_err(io_err)?;
        }
        Ok(path)
    }

    fn set_state(&self, state: LaunchState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    fn log(&self, level: LogLevel, message: String) {
        if let Some(tx) = &self.events {
            let _ = tx.send(LauncherEvent::Log { level, message });
        }
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthenticateResult, Profile};
    use crate::game::installer::types::{Arch, OsType};
    use crate::game::launcher::versions::Version;

    fn version() -> Version {
        Version {
            id: "1.20.1".into(),
            inherits_from: None,
            jar: "1.20.1".into(),
            main_class: "net.minecraft.client.main.Main".into(),
            libraries: vec![],
            natives: vec![],
            asset_index: None,
            assets: "5".into(),
            min_java_major: None,
            jvm_arguments: vec![],
            game_arguments: vec![],
            legacy_game_arguments: Some("--username ${auth_player_name}".into()),
            version_type: "release".into(),
            client: None,
        }
    }

    fn java(path: &str) -> JavaRuntime {
        JavaRuntime {
            path: PathBuf::from(path),
            version: "17.0.8".into(),
            major_version: 17,
            is_64bit: true,
        }
    }

    fn setting() -> LaunchSetting {
        LaunchSetting {
            max_memory_mb: 1024,
            ..LaunchSetting::new(
                version(),
                AuthenticateResult::success(
                    "tok",
                    Profile {
                        id: "id".into(),
                        name: "Alex".into(),
                    },
                ),
            )
        }
    }

    #[tokio::test]
    async fn missing_runtime_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let launcher = Launcher::new(GamePaths::new(tmp.path(), false));
        let result = launcher.launch(setting()).await;
        assert!(!result.is_success);
        assert!(matches!(result.error, Some(LaunchError::RuntimeMissing)));
        assert_eq!(launcher.state(), LaunchState::Failed);
        assert!(!launcher.is_busy_launching());
    }

    #[tokio::test]
    async fn rejected_auth_is_invalid_request() {
        let tmp = tempfile::tempdir().unwrap();
        let launcher = Launcher::new(GamePaths::new(tmp.path(), false)).with_java(Some(java("/usr/bin/java")));
        let mut s = setting();
        s.auth = Some(AuthenticateResult::failed(AuthState::ErrInside, "boom"));
        let result = launcher.launch(s).await;
        assert!(matches!(result.error, Some(LaunchError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn shortcut_mode_writes_script() {
        let tmp = tempfile::tempdir().unwrap();
        let windows = Platform {
            os: OsType::Windows,
            arch: Arch::X64,
        };
        let launcher = Launcher::new(GamePaths::new(tmp.path(), false))
            .with_platform(windows)
            .with_java(Some(java("C:/Java/bin/java.exe")));
        let mut s = setting();
        s.launch_type = LaunchType::CreateShort;

        let result = launcher.launch(s).await;
        assert!(result.is_success, "{:?}", result.error);
        assert!(result.process.is_none());

        let script = std::fs::read_to_string(tmp.path().join("LaunchMinecraft.bat")).unwrap();
        let mut lines = script.lines();
        assert_eq!(lines.next(), Some("@echo off"));
        let command = lines.next().unwrap();
        assert!(command.starts_with("\"C:/Java/bin/java.exe\" "));
        assert!(command.contains(" net.minecraft.client.main.Main "));
        assert!(!command.contains("\\\""));
        assert_eq!(launcher.state(), LaunchState::Idle);
    }

    #[tokio::test]
    async fn launches_are_serialized() {
        let tmp = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let launcher = Arc::new(
            Launcher::new(GamePaths::new(tmp.path(), false))
                .with_java(Some(java("/opt/java/bin/java")))
                .with_events(tx),
        );

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let mut s = setting();
                s.launch_type = LaunchType::CreateShort;
                launcher.launch_detached(s)
            })
            .collect();
        for h in handles {
            assert!(h.await.unwrap().is_success);
        }
        drop(launcher);

        let mut in_flight = 0;
        let mut max_in_flight = 0;
        while let Some(event) = rx.recv().await {
            if let LauncherEvent::Log { message, .. } = event {
                if message.starts_with("Launching") {
                    in_flight += 1;
                } else if message.starts_with("Launch finished") {
                    in_flight -= 1;
                }
                max_in_flight = max_in_flight.max(in_flight);
            }
        }
        assert_eq!(max_in_flight, 1);
        assert_eq!(in_flight, 0);
    }

    #[tokio::test]
    async fn queued_launch_counts_as_busy() {
        let tmp = tempfile::tempdir().unwrap();
        let launcher = Arc::new(
            Launcher::new(GamePaths::new(tmp.path(), false)).with_java(Some(java("/opt/java/bin/java"))),
        );
        let held = launcher.launch_lock.lock().await;

        let mut s = setting();
        s.launch_type = LaunchType::CreateShort;
        let queued = launcher.launch_detached(s);
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while !launcher.is_busy_launching() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert_eq!(launcher.state(), LaunchState::Idle);

        drop(held);
        assert!(queued.await.unwrap().is_success);
        assert!(!launcher.is_busy_launching());
    }

    #[test]
    fn shortcut_names() {
        assert_eq!(shortcut_file_name(true), "LaunchMinecraft.bat");
        assert_eq!(shortcut_file_name(false), "LaunchMinecraft.sh");
    }
}
