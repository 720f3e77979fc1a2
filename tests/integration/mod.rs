//! Integration tests for the coursegen pipeline

mod config_integration;
mod pipeline_end_to_end;
pub mod test_utils;
