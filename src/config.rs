use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::mask::ExclusionConfig;
use crate::{TnpError, TnpResult};

pub const DEFAULT_TREE: &str = "Events";
pub const DEFAULT_PREFIX: &str = "rpcTnP";

fn default_tree() -> String {
    DEFAULT_TREE.to_string()
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

/// Settings for `flatten`. Loaded from TOML or YAML; command-line flags win.
///
/// Relative mask paths in a config file are resolved against the file's
/// directory; mask paths given on the command line stay relative to the
/// working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlattenConfig {
    /// Tree holding the events in the input file.
    #[serde(default = "default_tree")]
    pub tree: String,
    /// Branch prefix of the tag-and-probe measurements.
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(flatten)]
    pub exclusion: ExclusionConfig,
}

impl Default for FlattenConfig {
    fn default() -> Self {
        FlattenConfig {
            tree: default_tree(),
            prefix: default_prefix(),
            exclusion: ExclusionConfig::default(),
        }
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct FlattenOverrides {
    pub tree: Option<String>,
    pub prefix: Option<String>,
    pub roll_mask_path: Option<PathBuf>,
    pub run_mask_path: Option<PathBuf>,
}

impl FlattenConfig {
    pub fn apply(mut self, o: FlattenOverrides) -> Self {
        if let Some(tree) = o.tree {
            self.tree = tree;
        }
        if let Some(prefix) = o.prefix {
            self.prefix = prefix;
        }
        if o.roll_mask_path.is_some() {
            self.exclusion.roll_mask_path = o.roll_mask_path;
        }
        if o.run_mask_path.is_some() {
            self.exclusion.run_mask_path = o.run_mask_path;
        }
        self
    }
}

pub fn load_flatten_config(path: &Path) -> TnpResult<FlattenConfig> {
    let s = std::fs::read_to_string(path)
        .map_err(|e| TnpError::io(format!("failed to read config {}", path.display()), e))?;
    let mut cfg = parse_config(path, &s)?;
    if let Some(base) = path.parent() {
        for mask in [&mut cfg.exclusion.roll_mask_path, &mut cfg.exclusion.run_mask_path] {
            if let Some(p) = mask.as_mut().filter(|p| p.is_relative()) {
                *p = base.join(&*p);
            }
        }
    }
    Ok(cfg)
}

fn parse_config(path: &Path, s: &str) -> TnpResult<FlattenConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    match ext {
        "toml" => toml::from_str(s).map_err(|e| TnpError::Config(format!("{}: {e}", path.display()))),
        "yaml" | "yml" => serde_yaml::from_str(s).map_err(|e| TnpError::Config(format!("{}: {e}", path.display()))),
        other => Err(TnpError::Config(format!(
            "unsupported config extension {other:?} for {} (expected .toml, .yaml or .yml)",
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flatten.toml");
        std::fs::write(
            &path,
            "prefix = \"rpcTnPJpsi\"\nknown_bad_rolls = [\"RE+1_R2_CH01_A\"]\nrun_mask_path = \"runs.json\"\n",
        )
        .unwrap();
        let cfg = load_flatten_config(&path).unwrap();
        assert_eq!(cfg.tree, "Events");
        assert_eq!(cfg.prefix, "rpcTnPJpsi");
        assert_eq!(cfg.exclusion.known_bad_rolls, vec!["RE+1_R2_CH01_A".to_string()]);
        assert_eq!(cfg.exclusion.run_mask_path, Some(dir.path().join("runs.json")));
        assert_eq!(cfg.exclusion.roll_mask_path, None);
    }

    #[test]
    fn test_absolute_mask_path_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flatten.yaml");
        let rolls = std::env::temp_dir().join("rolls.json");
        std::fs::write(&path, format!("roll_mask_path: {:?}\n", rolls.display().to_string())).unwrap();
        let cfg = load_flatten_config(&path).unwrap();
        assert_eq!(cfg.exclusion.roll_mask_path, Some(rolls));
    }

    #[test]
    fn test_yaml_config_defaults_known_bad() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flatten.yaml");
        std::fs::write(&path, "tree: Friends\n").unwrap();
        let cfg = load_flatten_config(&path).unwrap();
        assert_eq!(cfg.tree, "Friends");
        assert_eq!(cfg.exclusion.known_bad_rolls.len(), 4);
    }

    #[test]
    fn test_overrides_win() {
        let cfg = FlattenConfig::default().apply(FlattenOverrides {
            prefix: Some("other".into()),
            roll_mask_path: Some("rolls.json".into()),
            ..Default::default()
        });
        assert_eq!(cfg.prefix, "other");
        assert_eq!(cfg.tree, DEFAULT_TREE);
        assert_eq!(cfg.exclusion.roll_mask_path, Some(PathBuf::from("rolls.json")));
    }

    #[test]
    fn test_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flatten.ini");
        std::fs::write(&path, "").unwrap();
        assert!(load_flatten_config(&path).is_err());
    }
}
