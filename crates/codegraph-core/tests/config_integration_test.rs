use codegraph_core::ProjectConfig;
use std::fs;
use tempfile::TempDir;

#[test]
fn defaults_load_without_a_config_file() {
    let config = ProjectConfig::load(None).expect("defaults must always load");
    assert!(config.include_globs.iter().any(|g| g.starts_with("src/")));
    assert!(config.exclude_globs.iter().any(|g| g.contains("node_modules")));
}

#[test]
fn file_overrides_layer_over_defaults() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("codegraph.toml");
    fs::write(&config_path, "include_globs = [\"lib/**/*.ts\"]\n").unwrap();

    let config = ProjectConfig::load(Some(&config_path)).unwrap();
    assert_eq!(config.include_globs, vec!["lib/**/*.ts".to_string()]);
    // Exclude globs weren't overridden, so the default still applies.
    assert!(config.exclude_globs.iter().any(|g| g.contains("node_modules")));
}

#[test]
fn env_overrides_win_over_file() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("codegraph.toml");
    fs::write(&config_path, "storage_path = \"/tmp/file-wins.db\"\n").unwrap();

    std::env::set_var("CODEGRAPH__STORAGE_PATH", "/tmp/env-wins.db");
    let config = ProjectConfig::load(Some(&config_path)).unwrap();
    std::env::remove_var("CODEGRAPH__STORAGE_PATH");

    assert_eq!(config.storage_path.to_string_lossy(), "/tmp/env-wins.db");
}

#[test]
fn config_hash_is_stable_across_loads_of_the_same_file() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("codegraph.toml");
    fs::write(&config_path, "root = \".\"\n").unwrap();

    let a = ProjectConfig::load(Some(&config_path)).unwrap().config_hash();
    let b = ProjectConfig::load(Some(&config_path)).unwrap().config_hash();
    assert_eq!(a, b);
}
