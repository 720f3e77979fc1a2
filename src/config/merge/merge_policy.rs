//! Merge rules: built-in defaults applied before any file or environment source.

use config::builder::DefaultState;
use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with the built-in defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("server.bind", "127.0.0.1:8080")?
        .set_default("provider.provider_type", "openai")?
        .set_default("provider.model", "gpt-4")?
        .set_default("provider.api_key_env", "OPENAI_API_KEY")?
        .set_default("generation.max_tokens", 4000_i64)?
        .set_default("generation.temperature", 0.7_f64)?
        .set_default("generation.timeout_secs", 60_i64)?
        .set_default("generation.workers", 4_i64)?
        .set_default("generation.max_queue_size", 1000_i64)?
        .set_default("storage.store_path", ".coursegen/store")
}
