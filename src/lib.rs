//! Coursegen: Asynchronous Course Generation
//!
//! Turns a topic, an audience and a module count into a persisted course tree. A
//! request is acknowledged with a job id right away; a worker then asks a language
//! model for a course outline, validates it, and writes the course, its modules,
//! lessons and quiz in declared order before publishing it. Failures end up in an
//! append-only generation log rather than with the caller.

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod generator;
pub mod jobs;
pub mod logging;
pub mod pipeline;
pub mod provider;
pub mod store;
pub mod writer;
