use crate::error::Result;
use crate::glob::PathFilter;
use crate::paths;
use crate::rules;
use crate::types::{Domain, Scope, Severity};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

/// Files above this size are left out of a review.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 1024 * 1024;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// `.claude/review.yaml`. Every field is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Scope used when the command line names none.
    #[serde(default)]
    pub default_scope: Scope,
    /// Rule ids that never run.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disabled_rules: Vec<String>,
    /// Per-rule severity replacing whatever the rule computed.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub severity_overrides: BTreeMap<String, Severity>,
    /// Globs removed from every scope.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    /// Directory under the session where reports land.
    #[serde(default = "default_reviews_dir")]
    pub reviews_dir: String,
}

fn default_version() -> u32 {
    1
}

fn default_max_file_bytes() -> u64 {
    DEFAULT_MAX_FILE_BYTES
}

fn default_reviews_dir() -> String {
    paths::REVIEWS_DIR.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            default_scope: Scope::default(),
            disabled_rules: Vec::new(),
            severity_overrides: BTreeMap::new(),
            exclude: Vec::new(),
            max_file_bytes: default_max_file_bytes(),
            reviews_dir: default_reviews_dir(),
        }
    }
}

impl Config {
    /// Load the config, falling back to defaults when the file is absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file; using defaults");
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn exclude_filter(&self) -> Result<PathFilter> {
        PathFilter::new(self.exclude.as_slice())
    }

    pub fn overrides(&self) -> HashMap<String, Severity> {
        self.severity_overrides
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let known: HashSet<String> = Domain::all()
            .iter()
            .flat_map(|d| {
                rules::table(*d)
                    .ids()
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect();

        for id in &self.disabled_rules {
            if !known.contains(id) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("unknown rule '{id}' in disabled_rules"),
                });
            }
        }

        for id in self.severity_overrides.keys() {
            if !known.contains(id) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("unknown rule '{id}' in severity_overrides"),
                });
            }
            if self.disabled_rules.contains(id) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("rule '{id}' is both disabled and overridden"),
                });
            }
        }

        for glob in &self.exclude {
            if let Err(e) = PathFilter::new(&[glob]) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: e.to_string(),
                });
            }
        }

        if self.max_file_bytes == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "max_file_bytes must be greater than zero".to_string(),
            });
        }

        let dir = self.reviews_dir.trim();
        if dir.is_empty() || dir.starts_with('/') || dir.split('/').any(|seg| seg == "..") {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "reviews_dir '{}' must be a relative path inside the session directory",
                    self.reviews_dir
                ),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::load(dir.path()).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.default_scope, Scope::Pr);
        assert_eq!(cfg.reviews_dir, "reviews");
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".claude")).unwrap();
        std::fs::write(
            dir.path().join(".claude/review.yaml"),
            "default_scope: worktree\ndisabled_rules: [snapshot-added]\nseverity_overrides:\n  todo-added: NIT\n",
        )
        .unwrap();
        let cfg = Config::load(dir.path()).unwrap();
        assert_eq!(cfg.default_scope, Scope::Worktree);
        assert_eq!(cfg.max_file_bytes, DEFAULT_MAX_FILE_BYTES);
        assert_eq!(cfg.overrides().get("todo-added"), Some(&Severity::Nit));
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".claude")).unwrap();
        let cfg = Config {
            exclude: vec!["vendor/**".into()],
            ..Config::default()
        };
        cfg.save(dir.path()).unwrap();
        assert_eq!(Config::load(dir.path()).unwrap(), cfg);
    }

    #[test]
    fn validate_flags_problems() {
        let cfg = Config {
            disabled_rules: vec!["no-such-rule".into(), "todo-added".into()],
            severity_overrides: BTreeMap::from([("todo-added".to_string(), Severity::High)]),
            exclude: vec!["src/[oops".into()],
            max_file_bytes: 0,
            reviews_dir: "../escape".into(),
            ..Config::default()
        };
        let warnings = cfg.validate();
        let errors = warnings
            .iter()
            .filter(|w| w.level == WarnLevel::Error)
            .count();
        assert_eq!(errors, 3);
        assert!(warnings.iter().any(|w| w.message.contains("no-such-rule")));
        assert!(warnings
            .iter()
            .any(|w| w.message.contains("both disabled and overridden")));
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".claude")).unwrap();
        std::fs::write(dir.path().join(".claude/review.yaml"), "max_file_bytes: [nope").unwrap();
        assert!(Config::load(dir.path()).is_err());
    }
}
