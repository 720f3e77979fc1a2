//! Deterministic entity ids.
//!
//! Every record written for a job gets an id derived from the job id and the record's
//! position in the outline, so re-running a job addresses the same rows.

use uuid::Uuid;

/// Derive an entity id from `job_id` and a positional path such as `module/2/lesson/1`.
pub fn entity_id(job_id: &Uuid, path: &str) -> Uuid {
    let mut hasher = blake3::Hasher::new();
    hasher.update(job_id.as_bytes());
    hasher.update(b"/");
    hasher.update(path.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest.as_bytes()[..16]);
    Uuid::from_bytes(bytes)
}

pub fn course_path() -> String {
    "course".to_string()
}

/// Positions are 1-based.
pub fn module_path(module: u32) -> String {
    format!("module/{}", module)
}

pub fn lesson_path(module: u32, lesson: u32) -> String {
    format!("module/{}/lesson/{}", module, lesson)
}

pub fn question_path(question: u32) -> String {
    format!("quiz/{}", question)
}

pub fn option_path(question: u32, option: u32) -> String {
    format!("quiz/{}/option/{}", question, option)
}
