//! Raw `versions/<id>/<id>.json` model, `inheritsFrom` flattening and the
//! rule evaluator shared by libraries and arguments.
//!
//! Everything here mirrors the file layout; unknown keys are ignored and
//! absent ones stay `None` so vanilla, loader and hand-edited manifests all
//! deserialize.

use crate::error::{MetadataError, MetadataResult};
use crate::game::installer::types::{OsType, Platform};
use crate::game::launcher::arguments::split_preserving_quotes;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionManifest {
    pub id: String,
    pub main_class: Option<String>,
    pub inherits_from: Option<String>,
    /// Id whose jar is launched; loaders point this at the vanilla parent
    pub jar: Option<String>,
    /// 1.13+ structured arguments
    pub arguments: Option<Arguments>,
    /// Pre-1.13 single game argument line
    pub minecraft_arguments: Option<String>,
    #[serde(default)]
    pub libraries: Vec<Library>,
    pub asset_index: Option<AssetIndex>,
    pub assets: Option<String>,
    pub java_version: Option<JavaVersion>,
    pub downloads: Option<VersionDownloads>,
    #[serde(rename = "type")]
    pub version_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Arguments {
    #[serde(default)]
    pub game: Vec<Argument>,
    #[serde(default)]
    pub jvm: Vec<Argument>,
}

/// One entry of `arguments.game` / `arguments.jvm`: either a bare token or a
/// rule-guarded token group
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Argument {
    Simple(String),
    Conditional { rules: Vec<Rule>, value: ArgumentValue },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ArgumentValue {
    Single(String),
    Multiple(Vec<String>),
}

impl ArgumentValue {
    pub fn parts(&self) -> &[String] {
        match self {
            ArgumentValue::Single(s) => std::slice::from_ref(s),
            ArgumentValue::Multiple(v) => v.as_slice(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Rule {
    pub action: RuleAction,
    pub os: Option<OsRule>,
    pub features: Option<HashMap<String, bool>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
}

/// `os` clause of a rule. `version` is a regex against the host OS version.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OsRule {
    pub name: Option<String>,
    pub version: Option<String>,
    pub arch: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Library {
    /// `group:artifact:version[:classifier][@ext]`
    pub name: String,
    pub downloads: Option<LibraryDownloads>,
    /// Maven repository base for loader libraries without `downloads`
    pub url: Option<String>,
    pub rules: Option<Vec<Rule>>,
    /// OS name to classifier template, e.g. `natives-windows-${arch}`
    pub natives: Option<HashMap<String, String>>,
    pub extract: Option<ExtractRules>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibraryDownloads {
    pub artifact: Option<Artifact>,
    pub classifiers: Option<HashMap<String, Artifact>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Artifact {
    pub path: Option<String>,
    pub url: Option<String>,
    pub sha1: Option<String>,
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractRules {
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VersionDownloads {
    pub client: Option<Artifact>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetIndex {
    pub id: String,
    pub sha1: Option<String>,
    pub size: Option<u64>,
    pub total_size: Option<u64>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JavaVersion {
    pub major_version: u32,
}

pub fn parse_version_json(path: &Path, id: &str) -> MetadataResult<VersionManifest> {
    let content = std::fs::read_to_string(path).map_err(|source| match source.kind() {
        std::io::ErrorKind::NotFound => MetadataError::NotFound(path.to_path_buf()),
        _ => MetadataError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;
    parse_version_str(&content, id)
}

/// `id` only labels errors
pub fn parse_version_str(content: &str, id: &str) -> MetadataResult<VersionManifest> {
    serde_json::from_str(content).map_err(|source| MetadataError::Parse {
        id: id.to_string(),
        source,
    })
}

/// Flatten `manifest` with all of its ancestors. `load` fetches a manifest by
/// id; meeting an id twice is reported as an inheritance cycle.
pub fn resolve_version_chain<F>(manifest: VersionManifest, load: &mut F) -> MetadataResult<VersionManifest>
where
    F: FnMut(&str) -> MetadataResult<VersionManifest>,
{
    let mut seen = vec![manifest.id.clone()];
    // Nearest parent first
    let mut ancestors: Vec<VersionManifest> = Vec::new();
    let mut next = manifest.inherits_from.clone();

    while let Some(parent_id) = next {
        if seen.contains(&parent_id) {
            seen.push(parent_id);
            return Err(MetadataError::InheritanceCycle { chain: seen });
        }
        seen.push(parent_id.clone());
        let parent = load(&parent_id)?;
        next = parent.inherits_from.clone();
        ancestors.push(parent);
    }

    let Some(root) = ancestors.pop() else {
        return Ok(manifest);
    };
    let flattened = ancestors.into_iter().rev().fold(root, merge_manifests);
    Ok(merge_manifests(flattened, manifest))
}

/// Identity used when a child library overrides a parent one:
/// `group:artifact`, plus the classifier when there is one
pub fn library_key(coords: &str) -> String {
    let mut parts = coords.split(':');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(group), Some(artifact), _, Some(classifier)) => {
            let classifier = classifier.split('@').next().unwrap_or(classifier);
            format!("{}:{}:{}", group, artifact, classifier)
        }
        (Some(group), Some(artifact), _, None) => format!("{}:{}", group, artifact),
        _ => coords.to_string(),
    }
}

/// Overlay `child` on an already flattened `parent`
pub(crate) fn merge_manifests(mut parent: VersionManifest, child: VersionManifest) -> VersionManifest {
    // A modern child on a legacy parent: keep the parent's line as leading tokens
    if child.arguments.is_some() && child.minecraft_arguments.is_none() {
        if let Some(legacy) = parent.minecraft_arguments.take() {
            let game = &mut parent.arguments.get_or_insert_with(Arguments::default).game;
            let tokens = split_preserving_quotes(&legacy).into_iter().map(Argument::Simple);
            game.splice(0..0, tokens);
        }
    }

    let arguments = match (parent.arguments, child.arguments) {
        (Some(mut base), Some(extra)) => {
            base.game.extend(extra.game);
            base.jvm.extend(extra.jvm);
            Some(base)
        }
        (base, extra) => extra.or(base),
    };

    let overridden: HashSet<String> = child.libraries.iter().map(|l| library_key(&l.name)).collect();
    let mut libraries: Vec<Library> = parent
        .libraries
        .into_iter()
        .filter(|l| !overridden.contains(&library_key(&l.name)))
        .collect();
    libraries.extend(child.libraries);

    VersionManifest {
        // Without an explicit jar the root ancestor's id is used
        jar: Some(child.jar.or(parent.jar).unwrap_or(parent.id)),
        id: child.id,
        main_class: child.main_class.or(parent.main_class),
        inherits_from: None,
        arguments,
        minecraft_arguments: child.minecraft_arguments.or(parent.minecraft_arguments),
        libraries,
        asset_index: child.asset_index.or(parent.asset_index),
        assets: child.assets.or(parent.assets),
        java_version: child.java_version.or(parent.java_version),
        downloads: child.downloads.or(parent.downloads),
        version_type: child.version_type.or(parent.version_type),
    }
}

/// Feature flags consulted by conditional rules
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureSet {
    pub is_demo_user: bool,
    pub has_custom_resolution: bool,
}

impl FeatureSet {
    fn get(&self, name: &str) -> Option<bool> {
        match name {
            "is_demo_user" => Some(self.is_demo_user),
            "has_custom_resolution" => Some(self.has_custom_resolution),
            _ => None,
        }
    }
}

/// Last matching rule decides; no rules at all means allowed
pub fn rules_allow(rules: &[Rule], platform: &Platform, features: &FeatureSet) -> bool {
    if rules.is_empty() {
        return true;
    }
    rules
        .iter()
        .filter(|rule| rule_matches(rule, platform, features))
        .last()
        .is_some_and(|rule| rule.action == RuleAction::Allow)
}

fn rule_matches(rule: &Rule, platform: &Platform, features: &FeatureSet) -> bool {
    if let Some(os) = &rule.os {
        if os.name.as_deref().is_some_and(|name| !os_name_matches(name, platform.os)) {
            return false;
        }
        if let Some(arch) = os.arch.as_deref() {
            let arch = match arch {
                "x64" | "amd64" => "x86_64",
                "aarch64" => "arm64",
                other => other,
            };
            if arch != platform.arch.rule_name() {
                return false;
            }
        }
        // An invalid pattern never matches
        if let Some(pattern) = os.version.as_deref() {
            let host = crate::utils::hardware::os_version();
            if !regex::Regex::new(pattern).is_ok_and(|re| re.is_match(&host)) {
                return false;
            }
        }
    }

    // Unknown feature names never match
    rule.features.as_ref().map_or(true, |required| {
        required
            .iter()
            .all(|(name, wanted)| features.get(name) == Some(*wanted))
    })
}

fn os_name_matches(name: &str, os: OsType) -> bool {
    name == os.as_str() || (name == "macos" && os == OsType::MacOS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::installer::types::Arch;

    fn manifest(json: &str) -> VersionManifest {
        parse_version_str(json, "test").unwrap()
    }

    fn linux() -> Platform {
        Platform {
            os: OsType::Linux,
            arch: Arch::X64,
        }
    }

    fn game_tokens(m: &VersionManifest) -> Vec<String> {
        m.arguments
            .as_ref()
            .map(|a| {
                a.game
                    .iter()
                    .filter_map(|arg| match arg {
                        Argument::Simple(s) => Some(s.clone()),
                        Argument::Conditional { .. } => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    #[test]
    fn mixed_argument_forms_deserialize() {
        let args: Vec<Argument> = serde_json::from_str(
            r#"["--demo", {"rules": [{"action": "allow"}], "value": ["--width", "${resolution_width}"]}]"#,
        )
        .unwrap();
        assert_eq!(args[0], Argument::Simple("--demo".into()));
        match &args[1] {
            Argument::Conditional { value, .. } => assert_eq!(value.parts().len(), 2),
            other => panic!("expected conditional, got {other:?}"),
        }
    }

    #[test]
    fn loader_child_overlays_vanilla_parent() {
        let parent = manifest(
            r#"{"id": "1.20.1", "mainClass": "net.minecraft.client.main.Main", "type": "release",
                "arguments": {"game": ["--version"]}}"#,
        );
        let child = manifest(
            r#"{"id": "1.20.1-forge-47.2.0", "inheritsFrom": "1.20.1",
                "mainClass": "cpw.mods.bootstraplauncher.BootstrapLauncher",
                "arguments": {"game": ["--fml.forgeVersion"]}}"#,
        );

        let merged = merge_manifests(parent, child);
        assert_eq!(merged.id, "1.20.1-forge-47.2.0");
        assert_eq!(merged.jar.as_deref(), Some("1.20.1"));
        assert_eq!(
            merged.main_class.as_deref(),
            Some("cpw.mods.bootstraplauncher.BootstrapLauncher")
        );
        assert!(merged.inherits_from.is_none());
        assert_eq!(merged.version_type.as_deref(), Some("release"));
        assert_eq!(game_tokens(&merged), vec!["--version", "--fml.forgeVersion"]);
    }

    #[test]
    fn legacy_parent_line_becomes_leading_tokens() {
        let parent = manifest(
            r#"{"id": "1.12.2", "minecraftArguments": "--username ${auth_player_name} --tweakClass net.minecraftforge.fml.common.launcher.FMLTweaker"}"#,
        );
        let child = manifest(
            r#"{"id": "forge-loader-test", "inheritsFrom": "1.12.2", "arguments": {"game": ["--fml.forgeVersion"]}}"#,
        );

        let merged = merge_manifests(parent, child);
        let tokens = game_tokens(&merged);
        assert_eq!(tokens.first().map(String::as_str), Some("--username"));
        assert_eq!(tokens.last().map(String::as_str), Some("--fml.forgeVersion"));
        assert!(tokens.iter().any(|s| s == "--tweakClass"));
        assert!(merged.minecraft_arguments.is_none());
    }

    #[test]
    fn three_level_chain_flattens_in_order() {
        let root = manifest(r#"{"id": "1.20.1", "libraries": [{"name": "org.ow2.asm:asm:9.3"}]}"#);
        let middle = manifest(
            r#"{"id": "loader", "inheritsFrom": "1.20.1", "libraries": [{"name": "org.ow2.asm:asm:9.6"}]}"#,
        );
        let leaf = manifest(r#"{"id": "pack", "inheritsFrom": "loader", "mainClass": "Leaf"}"#);

        let mut load = |id: &str| -> MetadataResult<VersionManifest> {
            match id {
                "1.20.1" => Ok(root.clone()),
                "loader" => Ok(middle.clone()),
                other => Err(MetadataError::NotFound(other.into())),
            }
        };
        let flat = resolve_version_chain(leaf, &mut load).unwrap();
        assert_eq!(flat.id, "pack");
        assert_eq!(flat.jar.as_deref(), Some("1.20.1"));
        assert_eq!(flat.main_class.as_deref(), Some("Leaf"));
        let names: Vec<&str> = flat.libraries.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["org.ow2.asm:asm:9.6"]);
    }

    #[test]
    fn chain_resolution_detects_cycles() {
        let a = manifest(r#"{"id": "a", "inheritsFrom": "b"}"#);
        let b = manifest(r#"{"id": "b", "inheritsFrom": "a"}"#);

        let mut load = |id: &str| -> MetadataResult<VersionManifest> {
            match id {
                "a" => Ok(a.clone()),
                "b" => Ok(b.clone()),
                other => Err(MetadataError::NotFound(other.into())),
            }
        };
        let start = load("a").unwrap();
        match resolve_version_chain(start, &mut load).unwrap_err() {
            MetadataError::InheritanceCycle { chain } => assert_eq!(chain, vec!["a", "b", "a"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_parent_is_reported() {
        let orphan = manifest(r#"{"id": "orphan", "inheritsFrom": "gone"}"#);
        let mut load = |id: &str| -> MetadataResult<VersionManifest> {
            Err(MetadataError::NotFound(id.into()))
        };
        assert!(matches!(
            resolve_version_chain(orphan, &mut load),
            Err(MetadataError::NotFound(_))
        ));
    }

    #[test]
    fn library_key_keeps_classifier() {
        assert_eq!(library_key("org.lwjgl:lwjgl:3.3.1"), "org.lwjgl:lwjgl");
        assert_eq!(
            library_key("org.lwjgl:lwjgl:3.3.1:natives-linux@jar"),
            "org.lwjgl:lwjgl:natives-linux"
        );
        assert_eq!(library_key("plain"), "plain");
    }

    #[test]
    fn os_rules_follow_last_match() {
        let rules: Vec<Rule> = serde_json::from_str(
            r#"[{"action":"allow"},{"action":"disallow","os":{"name":"osx"}}]"#,
        )
        .unwrap();
        assert!(rules_allow(&rules, &linux(), &FeatureSet::default()));
        let mac = Platform {
            os: OsType::MacOS,
            arch: Arch::X64,
        };
        assert!(!rules_allow(&rules, &mac, &FeatureSet::default()));
    }

    #[test]
    fn feature_rules_need_every_feature() {
        let rules: Vec<Rule> = serde_json::from_str(
            r#"[{"action":"allow","features":{"has_custom_resolution":true}}]"#,
        )
        .unwrap();
        assert!(!rules_allow(&rules, &linux(), &FeatureSet::default()));
        let features = FeatureSet {
            has_custom_resolution: true,
            ..Default::default()
        };
        assert!(rules_allow(&rules, &linux(), &features));

        let unknown: Vec<Rule> = serde_json::from_str(
            r#"[{"action":"allow","features":{"has_quick_plays_support":true}}]"#,
        )
        .unwrap();
        assert!(!rules_allow(&unknown, &linux(), &features));
    }

    #[test]
    fn arch_rules_are_normalized() {
        let rules: Vec<Rule> = serde_json::from_str(r#"[{"action":"allow","os":{"arch":"x86"}}]"#).unwrap();
        assert!(!rules_allow(&rules, &linux(), &FeatureSet::default()));
        let x86 = Platform {
            os: OsType::Linux,
            arch: Arch::X86,
        };
        assert!(rules_allow(&rules, &x86, &FeatureSet::default()));
    }
}
