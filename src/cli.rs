//! CLI domain: parse, route, output and presentation only.
//! No pipeline logic; the route table dispatches to the orchestrator and tracker.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands, JobCommands};
pub use presentation::{format_job_list, format_job_report, format_run_report, JobReport};
pub use route::RunContext;
