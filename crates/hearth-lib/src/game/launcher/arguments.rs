/// Argument builder for the game process
use crate::auth::{AuthState, AuthenticateResult};
use crate::error::{ArgumentError, LaunchError};
use crate::game::installer::types::Platform;
use crate::game::launcher::classpath::build_classpath;
use crate::game::launcher::types::LaunchSetting;
use crate::game::launcher::version_parser::{rules_allow, Argument, ArgumentValue, FeatureSet};
use crate::game::launcher::versions::Version;
use crate::game::paths::GamePaths;
use dunce::canonicalize;
use std::collections::HashMap;
use std::path::Path;

/// Used when no GC argument is configured
const DEFAULT_GC_ARGS: [&str; 3] = [
    "-XX:+UseG1GC",
    "-XX:-UseAdaptiveSizePolicy",
    "-XX:-OmitStackTraceInFastThrow",
];

/// Placeholders that may legitimately have no value. The token holding one
/// is dropped together with the flag in front of it.
const OPTIONAL_PLACEHOLDERS: &[&str] = &[
    "clientid",
    "auth_xuid",
    "resolution_width",
    "resolution_height",
    "quickPlayPath",
    "quickPlaySingleplayer",
    "quickPlayMultiplayer",
    "quickPlayRealms",
];

/// Turns a [`LaunchSetting`] into the ordered process arguments
#[derive(Debug, Clone)]
pub struct ArgumentsParser {
    paths: GamePaths,
    platform: Platform,
}

impl ArgumentsParser {
    pub fn new(paths: GamePaths, platform: Platform) -> Self {
        Self { paths, platform }
    }

    /// Build the argument list, runtime path excluded
    pub fn parse(&self, setting: &LaunchSetting) -> Result<Vec<String>, LaunchError> {
        let version = setting
            .version
            .as_ref()
            .ok_or_else(|| LaunchError::InvalidRequest("no version selected".into()))?;
        let auth = setting
            .auth
            .as_ref()
            .ok_or_else(|| LaunchError::InvalidRequest("no authentication result".into()))?;
        if auth.state != AuthState::Success {
            return Err(LaunchError::InvalidRequest(format!(
                "authentication state is {:?}",
                auth.state
            )));
        }

        let safe = setting.is_safe();
        let features = FeatureSet {
            is_demo_user: false,
            has_custom_resolution: setting
                .window_size
                .map(|w| w.width > 0 && w.height > 0)
                .unwrap_or(false),
        };

        let mut args = Vec::new();

        // Heap and GC
        if setting.min_memory_mb > 0 {
            args.push(format!("-Xmn{}m", setting.min_memory_mb));
        }
        if setting.max_memory_mb > 0 {
            args.push(format!("-Xmx{}m", setting.max_memory_mb));
        }
        match setting.gc_argument.as_deref().filter(|s| !s.trim().is_empty() && !safe) {
            Some(gc) => args.extend(split_user_arguments(gc)?),
            None => args.extend(DEFAULT_GC_ARGS.iter().map(|s| s.to_string())),
        }

        if !safe {
            if let Some(agent) = setting.java_agent.as_deref().filter(|s| !s.trim().is_empty()) {
                args.push(format!("-javaagent:{}", agent));
            }
            if let Some(extra) = setting.advanced_jvm_arguments.as_deref() {
                args.extend(split_user_arguments(extra)?);
            }
        }

        args.extend(self.jvm_arguments(version, setting, &features)?);
        args.push(version.main_class.clone());
        args.extend(self.game_arguments(version, auth, setting, &features)?);

        if let Some(window) = setting.window_size {
            if window.width > 0 && window.height > 0 && !args.iter().any(|a| a == "--width") {
                args.push("--width".to_string());
                args.push(window.width.to_string());
                args.push("--height".to_string());
                args.push(window.height.to_string());
            }
            if window.fullscreen && !args.iter().any(|a| a == "--fullscreen") {
                args.push("--fullscreen".to_string());
            }
        }

        if !safe {
            if let Some(extra) = setting.advanced_game_arguments.as_deref() {
                args.extend(split_user_arguments(extra)?);
            }
        }

        Ok(args)
    }

    /// Quoted single-line form for logs; launch scripts use [`script_command_line`]
    pub fn parse_to_string(&self, setting: &LaunchSetting) -> Result<String, LaunchError> {
        Ok(join_arguments(&self.parse(setting)?))
    }

    fn jvm_arguments(
        &self,
        version: &Version,
        setting: &LaunchSetting,
        features: &FeatureSet,
    ) -> Result<Vec<String>, ArgumentError> {
        let natives_dir = absolute(&self.paths.natives_dir(&version.id));
        let classpath = build_classpath(version, &self.paths, &self.platform);

        let mut vars = HashMap::new();
        vars.insert("natives_directory", natives_dir.clone());
        vars.insert("launcher_name", setting.launcher_name.clone());
        vars.insert("launcher_version", setting.launcher_version.clone());
        vars.insert("classpath", classpath.clone());
        vars.insert(
            "classpath_separator",
            self.platform.os.classpath_separator().to_string(),
        );
        vars.insert("library_directory", absolute(&self.paths.libraries_dir()));
        vars.insert("version_name", version.id.clone());

        let mut out = Vec::new();
        if version.jvm_arguments.is_empty() {
            // Pre-1.13 manifests carry no JVM template
            for template in [
                "-Djava.library.path=${natives_directory}",
                "-Dminecraft.launcher.brand=${launcher_name}",
                "-Dminecraft.launcher.version=${launcher_version}",
            ] {
                out.push(substitute(template, &vars)?.unwrap_or_default());
            }
        } else {
            for arg in &version.jvm_arguments {
                self.expand(arg, &vars, features, &mut out)?;
            }
        }

        if !out.iter().any(|a| a.starts_with("-Djava.library.path=")) {
            out.push(format!("-Djava.library.path={}", natives_dir));
        }
        if !out.iter().any(|a| a == "-cp" || a == "-classpath") {
            out.push("-cp".to_string());
            out.push(classpath);
        }
        Ok(out)
    }

    fn game_arguments(
        &self,
        version: &Version,
        auth: &AuthenticateResult,
        setting: &LaunchSetting,
        features: &FeatureSet,
    ) -> Result<Vec<String>, LaunchError> {
        let profile = auth
            .selected_profile
            .as_ref()
            .ok_or_else(|| LaunchError::InvalidRequest("no selected profile".into()))?;
        let token = auth.access_token.clone().unwrap_or_default();

        let assets_dir = self.paths.assets_dir();
        let game_assets = if matches!(version.assets.as_str(), "legacy" | "pre-1.6") {
            self.paths.legacy_assets_dir()
        } else {
            assets_dir.clone()
        };

        let mut vars = HashMap::new();
        vars.insert("auth_player_name", profile.name.clone());
        vars.insert("version_name", version.id.clone());
        vars.insert("game_directory", absolute(&self.paths.version_root(&version.id)));
        vars.insert("assets_root", absolute(&assets_dir));
        vars.insert("game_assets", absolute(&game_assets));
        vars.insert("assets_index_name", version.assets.clone());
        vars.insert("auth_uuid", profile.id.clone());
        vars.insert("auth_access_token", token.clone());
        vars.insert("auth_session", token);
        vars.insert("user_type", auth.user_type.clone());
        vars.insert("version_type", version.version_type.clone());
        vars.insert("user_properties", user_properties(auth));
        if let Some(window) = setting.window_size.filter(|w| w.width > 0 && w.height > 0) {
            vars.insert("resolution_width", window.width.to_string());
            vars.insert("resolution_height", window.height.to_string());
        }

        let mut out = Vec::new();
        if !version.game_arguments.is_empty() {
            for arg in &version.game_arguments {
                self.expand(arg, &vars, features, &mut out)?;
            }
        } else if let Some(legacy) = &version.legacy_game_arguments {
            for token in split_preserving_quotes(legacy) {
                push_or_drop_flag(&mut out, substitute(&token, &vars)?);
            }
        }
        Ok(out)
    }

    /// Expand one manifest argument into `out`. Each manifest entry is one
    /// token, whatever its substituted value contains.
    fn expand(
        &self,
        arg: &Argument,
        vars: &HashMap<&str, String>,
        features: &FeatureSet,
        out: &mut Vec<String>,
    ) -> Result<(), ArgumentError> {
        match arg {
            Argument::Simple(s) => push_or_drop_flag(out, substitute(s, vars)?),
            Argument::Conditional { rules, value } => {
                if !rules_allow(rules, &self.platform, features) {
                    return Ok(());
                }
                // A group with a missing optional value is dropped whole
                let mut group = Vec::new();
                for part in value.parts() {
                    match substitute(part, vars)? {
                        Some(v) => group.push(v),
                        None => return Ok(()),
                    }
                }
                out.extend(group);
            }
        }
        Ok(())
    }
}

/// Replace every `${key}` in `text`. `Ok(None)` when an optional placeholder
/// has no value; an unknown placeholder is an error.
fn substitute(text: &str, vars: &HashMap<&str, String>) -> Result<Option<String>, ArgumentError> {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            return Err(ArgumentError::UnresolvedPlaceholder {
                placeholder: after.to_string(),
                argument: text.to_string(),
            });
        };
        let key = &after[..end];
        match vars.get(key) {
            Some(value) => result.push_str(value),
            None if OPTIONAL_PLACEHOLDERS.contains(&key) => return Ok(None),
            None => {
                return Err(ArgumentError::UnresolvedPlaceholder {
                    placeholder: key.to_string(),
                    argument: text.to_string(),
                })
            }
        }
        rest = &after[end + 1..];
    }
    result.push_str(rest);
    Ok(Some(result))
}

/// Push a substituted token; a dropped token also takes the `--flag`
/// immediately before it.
fn push_or_drop_flag(out: &mut Vec<String>, token: Option<String>) {
    match token {
        Some(t) => out.push(t),
        None => {
            if out.last().map(|l| l.starts_with("--")).unwrap_or(false) {
                out.pop();
            }
        }
    }
}

fn split_user_arguments(s: &str) -> Result<Vec<String>, ArgumentError> {
    shlex::split(s).ok_or_else(|| ArgumentError::MalformedArguments(s.to_string()))
}

fn user_properties(auth: &AuthenticateResult) -> String {
    let props: HashMap<&str, Vec<&str>> = auth
        .user_data
        .as_ref()
        .map(|d| {
            d.properties
                .iter()
                .map(|(k, v)| (k.as_str(), vec![v.as_str()]))
                .collect()
        })
        .unwrap_or_default();
    if props.is_empty() {
        return "{}".to_string();
    }
    serde_json::to_string(&props).unwrap_or_else(|_| "{}".to_string())
}

fn absolute(path: &Path) -> String {
    canonicalize(path)
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| path.to_string_lossy().to_string())
}

/// A runnable command line for a launch script. `.sh` scripts get POSIX
/// quoting so `$natives` survives `sh`; `.bat` scripts get `cmd` quoting.
pub fn script_command_line(program: &str, args: &[String], windows: bool) -> Result<String, ArgumentError> {
    if windows {
        let mut line = format!("\"{}\"", program.replace('%', "%%"));
        for arg in args {
            line.push(' ');
            line.push_str(&cmd_quote(arg));
        }
        return Ok(line);
    }
    let tokens = std::iter::once(program).chain(args.iter().map(String::as_str));
    shlex::try_join(tokens)
        .map_err(|e| ArgumentError::MalformedArguments(format!("cannot write launch script: {}", e)))
}

/// `cmd` has no backslash escapes; quotes are doubled and `%` is literal only as `%%`
fn cmd_quote(token: &str) -> String {
    let token = token.replace('%', "%%");
    if token.is_empty() || token.chars().any(|c| c.is_whitespace() || "\"&|<>^(),;=".contains(c)) {
        format!("\"{}\"", token.replace('"', "\"\""))
    } else {
        token
    }
}

/// Quote a token for a shell-style command line
pub fn quote_arg(s: &str) -> String {
    if s.is_empty() {
        return "\"\"".to_string();
    }
    // Add quotes if whitespace or double-quote present; escape backslashes and double quotes
    if s.chars().any(|c| c.is_whitespace() || c == '"') {
        let esc = s.replace('\\', "\\\\").replace('"', "\\\"");
        return format!("\"{}\"", esc);
    }
    s.to_string()
}

pub fn join_arguments(args: &[String]) -> String {
    args.iter().map(|a| quote_arg(a)).collect::<Vec<_>>().join(" ")
}

/// Splits a string into whitespace-separated tokens while respecting
/// single and double quotes. Quotes are removed from returned tokens.
pub(crate) fn split_preserving_quotes(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut buf = String::new();
    let mut in_double = false;
    let mut in_single = false;

    for c in s.chars() {
        match c {
            '"' if !in_single => in_double = !in_double,
            '\'' if !in_double => in_single = !in_single,
            c if c.is_whitespace() && !in_double && !in_single => {
                if !buf.is_empty() {
                    out.push(std::mem::take(&mut buf));
                }
            }
            c => buf.push(c),
        }
    }

    if !buf.is_empty() {
        out.push(buf);
    }

    out
}
