//! `coursegen` entry point: parse flags, set up tracing, run one command.

use clap::Parser;
use coursegen::cli::{map_error, Cli, RunContext};
use coursegen::config::ConfigLoader;
use coursegen::error::PipelineError;
use coursegen::logging::{init_logging, LoggingConfig};
use std::process;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // before anything that can log
    let logging = build_logging_config(&cli);
    if let Err(e) = init_logging(Some(&logging)) {
        eprintln!("coursegen: logging setup failed: {}", e);
        process::exit(1);
    }
    info!(workspace = %cli.workspace.display(), "coursegen starting");

    let context = RunContext::new(cli.workspace.clone(), cli.config.clone())
        .unwrap_or_else(|e| exit_with("workspace setup", &e));

    match context.execute(&cli.command).await {
        Ok(output) => {
            info!("done");
            println!("{}", output);
        }
        Err(e) => exit_with("command", &e),
    }
}

fn exit_with(what: &str, err: &PipelineError) -> ! {
    error!(code = err.code(), "{} failed: {}", what, err);
    eprintln!("{}", map_error(err));
    process::exit(1);
}

/// `[logging]` from whichever config the command will use, with log flags applied.
/// An unreadable config falls back to logging defaults; the command reports it later.
fn build_logging_config(cli: &Cli) -> LoggingConfig {
    let loaded = match cli.config {
        Some(ref path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(&cli.workspace),
    };
    let mut config = loaded.map(|c| c.logging).unwrap_or_default();
    apply_log_flags(cli, &mut config);
    config
}

fn apply_log_flags(cli: &Cli, config: &mut LoggingConfig) {
    if cli.verbose {
        config.level = "debug".to_string();
    }
    if let Some(ref level) = cli.log_level {
        config.level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.format = format.clone();
    }
    if let Some(ref file) = cli.log_file {
        config.file = file.clone();
        // naming a file implies writing to it unless --log-output says otherwise
        config.output = "file".to_string();
    }
    if let Some(ref output) = cli.log_output {
        config.output = output.clone();
    }
    if config.output == "file" && config.file.is_relative() {
        config.file = cli.workspace.join(&config.file);
    }
}
