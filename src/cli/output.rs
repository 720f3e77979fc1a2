//! CLI output: error mapping from pipeline errors to the stderr line.

use crate::error::PipelineError;

/// Map pipeline errors to a string for CLI output, prefixed with the stable code.
pub fn map_error(e: &PipelineError) -> String {
    format!("error[{}]: {}", e.code(), e)
}
