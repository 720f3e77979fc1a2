//! Workspace files: `config/config.toml`, then `config/{COURSEGEN_ENV}.toml`.

use config::builder::{ConfigBuilder, DefaultState};
use config::{ConfigError, File};
use std::path::Path;

const DEFAULT_ENV: &str = "development";

/// Layer the workspace files present under `workspace_root/config` onto `builder`.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    workspace_root: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let dir = workspace_root.join("config");
    let env = std::env::var("COURSEGEN_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let layers = [dir.join("config.toml"), dir.join(format!("{}.toml", env))];
    Ok(layers
        .into_iter()
        .filter(|path| path.is_file())
        .fold(builder, |builder, path| {
            builder.add_source(File::from(path).required(false))
        }))
}
