//! Environment overrides for Settings.
//!
//! Kept in its own test binary: MSCALLS_* variables are process-wide.

use std::env;
use std::fs;

use tempfile::TempDir;

use mscalls::config::Settings;

#[test]
fn given_env_vars_when_load_then_override_config_file() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mscalls.toml");
    fs::write(&path, "parallel = true\nmax_threads = 8\n").unwrap();
    env::set_var("MSCALLS_PARALLEL", "false");
    env::set_var("MSCALLS_MAX_THREADS", "3");

    // Act
    let settings = Settings::load(Some(&path));
    env::remove_var("MSCALLS_PARALLEL");
    env::remove_var("MSCALLS_MAX_THREADS");

    // Assert
    let settings = settings.expect("load settings");
    assert!(!settings.parallel);
    assert_eq!(settings.max_threads, Some(3));
}
