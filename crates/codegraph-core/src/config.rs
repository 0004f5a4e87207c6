// ABOUTME: Project input configuration: scan root, include/exclude globs, compiler
// ABOUTME: options and the storage path. Layered from a config file, then `CODEGRAPH_*` env vars.
use crate::error::{CodeGraphError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CompilerOptions {
    #[serde(default = "CompilerOptions::default_target")]
    pub target: String,
    #[serde(default = "CompilerOptions::default_module_resolution")]
    pub module_resolution: String,
    #[serde(default)]
    pub lib: Vec<String>,
}

impl CompilerOptions {
    fn default_target() -> String {
        "es2022".to_string()
    }
    fn default_module_resolution() -> String {
        "bundler".to_string()
    }
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            target: Self::default_target(),
            module_resolution: Self::default_module_resolution(),
            lib: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProjectConfig {
    #[serde(default = "ProjectConfig::default_root")]
    pub root: PathBuf,
    #[serde(default = "ProjectConfig::default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default = "ProjectConfig::default_exclude_globs")]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub compiler_options: CompilerOptions,
    #[serde(default = "ProjectConfig::default_storage_path")]
    pub storage_path: PathBuf,
}

impl ProjectConfig {
    fn default_root() -> PathBuf {
        PathBuf::from(".")
    }

    fn default_include_globs() -> Vec<String> {
        vec!["src/**/*.ts".to_string(), "src/**/*.tsx".to_string()]
    }

    fn default_exclude_globs() -> Vec<String> {
        vec![
            "**/node_modules/**".to_string(),
            "**/*.test.ts".to_string(),
            "**/*.spec.ts".to_string(),
            "**/dist/**".to_string(),
            "**/build/**".to_string(),
            "**/.git/**".to_string(),
        ]
    }

    fn default_storage_path() -> PathBuf {
        PathBuf::from(".codegraph/graph.db")
    }

    /// Loads configuration layered as: built-in defaults, then an optional
    /// `codegraph.toml` at `config_path` (or the project root if not given), then
    /// `CODEGRAPH_*` environment variable overrides.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder()
            .set_default("root", ".")
            .map_err(|e| CodeGraphError::Config(e.to_string()))?
            .set_default("include_globs", Self::default_include_globs())
            .map_err(|e| CodeGraphError::Config(e.to_string()))?
            .set_default("exclude_globs", Self::default_exclude_globs())
            .map_err(|e| CodeGraphError::Config(e.to_string()))?
            .set_default(
                "storage_path",
                Self::default_storage_path().to_string_lossy().into_owned(),
            )
            .map_err(|e| CodeGraphError::Config(e.to_string()))?;

        if let Some(path) = config_path {
            if path.exists() {
                builder = builder.add_source(::config::File::from(path));
            }
        }

        builder = builder.add_source(::config::Environment::with_prefix("CODEGRAPH").separator("__"));

        let built = builder.build().map_err(|e| CodeGraphError::Config(e.to_string()))?;
        built
            .try_deserialize()
            .map_err(|e| CodeGraphError::Config(e.to_string()))
    }

    /// A stable hash of the effective configuration, stored on every `Snapshot` so two
    /// runs can be compared for config drift.
    pub fn config_hash(&self) -> String {
        let serialized = serde_json::to_string(self).unwrap_or_default();
        format!("{:016x}", crate::ids::stable_hash(&[&serialized]))
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            root: Self::default_root(),
            include_globs: Self::default_include_globs(),
            exclude_globs: Self::default_exclude_globs(),
            compiler_options: CompilerOptions::default(),
            storage_path: Self::default_storage_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = ProjectConfig::default();
        assert!(config.include_globs.iter().any(|g| g.starts_with("src/")));
        assert!(config.exclude_globs.iter().any(|g| g.contains("node_modules")));
    }

    #[test]
    fn config_hash_is_stable() {
        let a = ProjectConfig::default().config_hash();
        let b = ProjectConfig::default().config_hash();
        assert_eq!(a, b);
    }
}
