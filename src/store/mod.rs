//! Course and Job Stores
//!
//! Record types for the persisted course tree and the traits the pipeline writes
//! through. Every insert is an upsert keyed on the record id, and children are
//! listed in `order_index` order.

pub mod ids;
pub mod persistence;

pub use persistence::SledStore;

use crate::error::StorageError;
use crate::jobs::{GenerationJob, GenerationLog};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseStatus {
    Draft,
    Generating,
    Published,
    Archived,
}

impl std::fmt::Display for CourseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CourseStatus::Draft => "draft",
            CourseStatus::Generating => "generating",
            CourseStatus::Published => "published",
            CourseStatus::Archived => "archived",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRecord {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: Option<String>,
    pub difficulty_level: Option<String>,
    pub estimated_duration: Option<u32>,
    pub created_by: String,
    pub status: CourseStatus,
    pub generation_job_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleRecord {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub description: String,
    pub order_index: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonRecord {
    pub id: Uuid,
    pub module_id: Uuid,
    pub title: String,
    pub content: String,
    pub content_type: String,
    pub duration: u32,
    pub order_index: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestionRecord {
    pub id: Uuid,
    pub course_id: Uuid,
    pub question: String,
    pub question_type: String,
    pub explanation: Option<String>,
    pub order_index: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizOptionRecord {
    pub id: Uuid,
    pub question_id: Uuid,
    pub option_text: String,
    pub is_correct: bool,
    pub order_index: u32,
}

/// Course tree store interface
pub trait CourseStore: Send + Sync {
    fn insert_course(&self, course: &CourseRecord) -> Result<(), StorageError>;
    fn insert_module(&self, module: &ModuleRecord) -> Result<(), StorageError>;
    fn insert_lesson(&self, lesson: &LessonRecord) -> Result<(), StorageError>;
    fn insert_quiz_question(&self, question: &QuizQuestionRecord) -> Result<(), StorageError>;
    fn insert_quiz_option(&self, option: &QuizOptionRecord) -> Result<(), StorageError>;

    /// Flip a course to `published` and stamp `published_at`.
    ///
    /// Fails with `NotFound` if the course does not exist.
    fn publish_course(
        &self,
        course_id: &Uuid,
        published_at: DateTime<Utc>,
    ) -> Result<CourseRecord, StorageError>;

    fn get_course(&self, course_id: &Uuid) -> Result<Option<CourseRecord>, StorageError>;
    /// Remove every module, lesson, quiz question and quiz option under a course,
    /// along with their order index entries. The course row itself is kept.
    fn clear_children(&self, course_id: &Uuid) -> Result<(), StorageError>;
    fn find_course_by_job(&self, job_id: &Uuid) -> Result<Option<CourseRecord>, StorageError>;
    fn list_modules(&self, course_id: &Uuid) -> Result<Vec<ModuleRecord>, StorageError>;
    fn list_lessons(&self, module_id: &Uuid) -> Result<Vec<LessonRecord>, StorageError>;
    fn list_quiz_questions(&self, course_id: &Uuid)
        -> Result<Vec<QuizQuestionRecord>, StorageError>;
    fn list_quiz_options(&self, question_id: &Uuid) -> Result<Vec<QuizOptionRecord>, StorageError>;
}

/// Generation job and log store interface
pub trait JobStore: Send + Sync {
    fn put_job(&self, job: &GenerationJob) -> Result<(), StorageError>;
    fn get_job(&self, job_id: &Uuid) -> Result<Option<GenerationJob>, StorageError>;
    /// All jobs, newest first.
    fn list_jobs(&self) -> Result<Vec<GenerationJob>, StorageError>;
    /// Append-only; rows are never updated or removed.
    fn append_log(&self, log: &GenerationLog) -> Result<(), StorageError>;
    /// Log rows for a job in append order.
    fn list_logs(&self, job_id: &Uuid) -> Result<Vec<GenerationLog>, StorageError>;
}
