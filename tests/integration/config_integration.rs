//! Integration tests for layered configuration
//!
//! Precedence: defaults < global file < config/config.toml < config/{env}.toml < env vars

use coursegen::config::{ConfigLoader, ProviderType};
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use tempfile::TempDir;

static ENV_MUTEX: Mutex<()> = Mutex::new(());

const VARS: [&str; 4] = [
    "XDG_CONFIG_HOME",
    "COURSEGEN_ENV",
    "COURSEGEN__GENERATION__WORKERS",
    "COURSEGEN__SERVER__BIND",
];

/// Run `f` with the given variables set and every other tracked variable cleared.
fn with_env<R>(vars: &[(&str, &str)], f: impl FnOnce() -> R) -> R {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let saved: Vec<_> = VARS.iter().map(|k| (*k, std::env::var(k).ok())).collect();
    for key in VARS {
        std::env::remove_var(key);
    }
    for (key, value) in vars {
        std::env::set_var(key, value);
    }

    let result = f();

    for (key, value) in saved {
        match value {
            Some(value) => std::env::set_var(key, value),
            None => std::env::remove_var(key),
        }
    }
    result
}

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

#[test]
fn test_layered_precedence() {
    let xdg = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();

    write(
        &xdg.path().join("coursegen/config.toml"),
        r#"
[provider]
model = "global-model"

[generation]
workers = 8
timeout_secs = 90
"#,
    );
    write(
        &workspace.path().join("config/config.toml"),
        r#"
[generation]
workers = 6

[[auth.tokens]]
token = "secret"
user_id = "ops"
"#,
    );
    write(
        &workspace.path().join("config/staging.toml"),
        r#"
[server]
bind = "0.0.0.0:9100"
"#,
    );

    let xdg_path = xdg.path().to_string_lossy().to_string();
    let config = with_env(
        &[
            ("XDG_CONFIG_HOME", xdg_path.as_str()),
            ("COURSEGEN_ENV", "staging"),
            ("COURSEGEN__GENERATION__WORKERS", "3"),
        ],
        || ConfigLoader::load(workspace.path()).unwrap(),
    );

    assert_eq!(config.provider.model, "global-model");
    assert_eq!(config.generation.timeout_secs, 90);
    assert_eq!(config.generation.workers, 3);
    assert_eq!(config.server.bind, "0.0.0.0:9100");
    assert_eq!(config.auth.tokens.len(), 1);
    assert_eq!(config.auth.tokens[0].user_id, "ops");
    assert_eq!(config.generation.max_tokens, 4000);
    assert!(config.validate().is_ok());
}

#[test]
fn test_defaults_without_files() {
    let xdg = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    let xdg_path = xdg.path().to_string_lossy().to_string();

    let config = with_env(&[("XDG_CONFIG_HOME", xdg_path.as_str())], || {
        ConfigLoader::load(workspace.path()).unwrap()
    });

    assert_eq!(config.server.bind, "127.0.0.1:8080");
    assert_eq!(config.provider.provider_type, ProviderType::OpenAI);
    assert_eq!(config.provider.model, "gpt-4");
    assert_eq!(config.generation.max_tokens, 4000);
    assert!((config.generation.temperature - 0.7).abs() < f32::EPSILON);
    assert_eq!(config.generation.timeout_secs, 60);
    assert_eq!(config.generation.workers, 4);
    assert_eq!(config.generation.max_queue_size, 1000);
    assert!(config.auth.tokens.is_empty());
    assert_eq!(
        config.storage.resolve_store_path(workspace.path()),
        workspace.path().join(".coursegen/store")
    );
}

#[test]
fn test_validation_reports_every_problem() {
    let xdg = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    write(
        &workspace.path().join("config/config.toml"),
        r#"
[server]
bind = "not an address"

[provider]
provider_type = "openai_compatible"

[generation]
workers = 0
"#,
    );
    let xdg_path = xdg.path().to_string_lossy().to_string();

    let config = with_env(&[("XDG_CONFIG_HOME", xdg_path.as_str())], || {
        ConfigLoader::load(workspace.path()).unwrap()
    });

    let errors = config.validate().unwrap_err();
    assert_eq!(errors.len(), 3, "errors: {:?}", errors);
    assert!(config.ensure_valid().is_err());
}
