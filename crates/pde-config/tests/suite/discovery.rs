use std::sync::Mutex;

use pde_config::{discover_config_path, load_for_workspace, PdeConfig, PDE_CONFIG_ENV_VAR};
use pretty_assertions::assert_eq;

// Tests in this binary share the process environment.
static ENV_LOCK: Mutex<()> = Mutex::new(());

#[test]
fn missing_config_means_defaults() {
    let _guard = ENV_LOCK.lock().unwrap();
    std::env::remove_var(PDE_CONFIG_ENV_VAR);
    let dir = tempfile::tempdir().unwrap();

    let (config, path) = load_for_workspace(dir.path()).unwrap();
    assert_eq!(config, PdeConfig::default());
    assert_eq!(path, None);
}

#[test]
fn search_order_prefers_pde_toml() {
    let _guard = ENV_LOCK.lock().unwrap();
    std::env::remove_var(PDE_CONFIG_ENV_VAR);
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join(".pde")).unwrap();
    std::fs::write(dir.path().join(".pde/config.toml"), "").unwrap();
    assert_eq!(
        discover_config_path(dir.path()),
        Some(dir.path().join(".pde/config.toml"))
    );

    std::fs::write(dir.path().join(".pde.toml"), "").unwrap();
    assert_eq!(discover_config_path(dir.path()), Some(dir.path().join(".pde.toml")));

    std::fs::write(
        dir.path().join("pde.toml"),
        "[container]\nvm_change_debounce_ms = 10\n",
    )
    .unwrap();
    let (config, path) = load_for_workspace(dir.path()).unwrap();
    assert_eq!(path, Some(dir.path().join("pde.toml")));
    assert_eq!(config.container.vm_change_debounce_ms, 10);
}

#[test]
fn env_var_overrides_search() {
    let _guard = ENV_LOCK.lock().unwrap();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("pde.toml"), "").unwrap();
    std::fs::write(
        dir.path().join("custom.toml"),
        "[classpath]\noverride_compliance = true\n",
    )
    .unwrap();

    std::env::set_var(PDE_CONFIG_ENV_VAR, "custom.toml");
    let loaded = load_for_workspace(dir.path());
    std::env::remove_var(PDE_CONFIG_ENV_VAR);

    let (config, path) = loaded.unwrap();
    assert_eq!(path, Some(dir.path().join("custom.toml")));
    assert!(config.classpath.override_compliance);
}
