//! Sled-backed course and job store.
//!
//! One tree per record kind, keyed by the record id. Child ordering lives in separate
//! index trees keyed `{parent_id}:{order_index:010}`, so a prefix scan yields children
//! in declared order. Generation logs are keyed `{job_id}:{seq:020}` with a
//! database-wide monotonic sequence.

use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::{Db, Tree};
use uuid::Uuid;

use crate::error::StorageError;
use crate::jobs::{GenerationJob, GenerationLog};
use crate::store::{
    CourseRecord, CourseStatus, CourseStore, JobStore, LessonRecord, ModuleRecord,
    QuizOptionRecord, QuizQuestionRecord,
};

const TREE_COURSES: &str = "courses";
const TREE_MODULES: &str = "modules";
const TREE_LESSONS: &str = "lessons";
const TREE_QUIZ_QUESTIONS: &str = "quiz_questions";
const TREE_QUIZ_OPTIONS: &str = "quiz_options";
const TREE_COURSE_BY_JOB: &str = "courses_by_job";
const TREE_MODULE_ORDER: &str = "module_order";
const TREE_LESSON_ORDER: &str = "lesson_order";
const TREE_QUESTION_ORDER: &str = "quiz_question_order";
const TREE_OPTION_ORDER: &str = "quiz_option_order";
const TREE_JOBS: &str = "generation_jobs";
const TREE_LOGS: &str = "generation_logs";
const ORDER_KEY_PAD: usize = 10;
const LOG_KEY_PAD: usize = 20;

#[derive(Clone)]
pub struct SledStore {
    db: Db,
    courses: Tree,
    modules: Tree,
    lessons: Tree,
    quiz_questions: Tree,
    quiz_options: Tree,
    course_by_job: Tree,
    module_order: Tree,
    lesson_order: Tree,
    question_order: Tree,
    option_order: Tree,
    jobs: Tree,
    logs: Tree,
}

impl SledStore {
    /// Open (or create) a store at the given directory.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path).map_err(|e| {
            StorageError::IoError(io::Error::new(
                io::ErrorKind::Other,
                format!("Failed to open sled database: {}", e),
            ))
        })?;
        Self::new(db)
    }

    pub fn new(db: Db) -> Result<Self, StorageError> {
        let open = |name: &str| db.open_tree(name).map_err(to_storage_io);
        Ok(Self {
            courses: open(TREE_COURSES)?,
            modules: open(TREE_MODULES)?,
            lessons: open(TREE_LESSONS)?,
            quiz_questions: open(TREE_QUIZ_QUESTIONS)?,
            quiz_options: open(TREE_QUIZ_OPTIONS)?,
            course_by_job: open(TREE_COURSE_BY_JOB)?,
            module_order: open(TREE_MODULE_ORDER)?,
            lesson_order: open(TREE_LESSON_ORDER)?,
            question_order: open(TREE_QUESTION_ORDER)?,
            option_order: open(TREE_OPTION_ORDER)?,
            jobs: open(TREE_JOBS)?,
            logs: open(TREE_LOGS)?,
            db,
        })
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush().map_err(to_storage_io)?;
        Ok(())
    }

    pub fn encode_order_key(parent: &Uuid, order_index: u32) -> String {
        encode_order_key(parent, order_index)
    }

    fn put_child<T: Serialize>(
        &self,
        records: &Tree,
        order: &Tree,
        id: &Uuid,
        parent: &Uuid,
        order_index: u32,
        record: &T,
    ) -> Result<(), StorageError> {
        put_record(records, id, record)?;
        order
            .insert(encode_order_key(parent, order_index).as_bytes(), id.as_bytes())
            .map_err(to_storage_io)?;
        Ok(())
    }

    /// Drop every order key under `parent` and the records they point at.
    /// Returns the removed child ids in order.
    fn drop_children(
        &self,
        records: &Tree,
        order: &Tree,
        parent: &Uuid,
    ) -> Result<Vec<Uuid>, StorageError> {
        let prefix = format!("{}:", parent);
        let mut removed = Vec::new();
        for result in order.scan_prefix(prefix.as_bytes()) {
            let (key, value) = result.map_err(to_storage_io)?;
            order.remove(&key).map_err(to_storage_io)?;
            if let Ok(id) = Uuid::from_slice(&value) {
                records.remove(id.as_bytes()).map_err(to_storage_io)?;
                removed.push(id);
            }
        }
        Ok(removed)
    }

    fn list_children<T: DeserializeOwned>(
        &self,
        records: &Tree,
        order: &Tree,
        parent: &Uuid,
    ) -> Result<Vec<T>, StorageError> {
        let prefix = format!("{}:", parent);
        let mut out = Vec::new();
        for result in order.scan_prefix(prefix.as_bytes()) {
            let (key, value) = result.map_err(to_storage_io)?;
            let id = Uuid::from_slice(&value).map_err(|e| {
                StorageError::InvalidRecord(format!(
                    "Bad id in order index {}: {}",
                    String::from_utf8_lossy(&key),
                    e
                ))
            })?;
            let record = get_record(records, &id)?.ok_or_else(|| {
                StorageError::InvalidRecord(format!(
                    "Order index {} points at missing record {}",
                    String::from_utf8_lossy(&key),
                    id
                ))
            })?;
            out.push(record);
        }
        Ok(out)
    }
}

impl CourseStore for SledStore {
    fn insert_course(&self, course: &CourseRecord) -> Result<(), StorageError> {
        put_record(&self.courses, &course.id, course)?;
        self.course_by_job
            .insert(course.generation_job_id.as_bytes(), course.id.as_bytes())
            .map_err(to_storage_io)?;
        Ok(())
    }

    fn insert_module(&self, module: &ModuleRecord) -> Result<(), StorageError> {
        self.put_child(
            &self.modules,
            &self.module_order,
            &module.id,
            &module.course_id,
            module.order_index,
            module,
        )
    }

    fn insert_lesson(&self, lesson: &LessonRecord) -> Result<(), StorageError> {
        self.put_child(
            &self.lessons,
            &self.lesson_order,
            &lesson.id,
            &lesson.module_id,
            lesson.order_index,
            lesson,
        )
    }

    fn insert_quiz_question(&self, question: &QuizQuestionRecord) -> Result<(), StorageError> {
        self.put_child(
            &self.quiz_questions,
            &self.question_order,
            &question.id,
            &question.course_id,
            question.order_index,
            question,
        )
    }

    fn insert_quiz_option(&self, option: &QuizOptionRecord) -> Result<(), StorageError> {
        self.put_child(
            &self.quiz_options,
            &self.option_order,
            &option.id,
            &option.question_id,
            option.order_index,
            option,
        )
    }

    fn publish_course(
        &self,
        course_id: &Uuid,
        published_at: DateTime<Utc>,
    ) -> Result<CourseRecord, StorageError> {
        let mut course: CourseRecord = get_record(&self.courses, course_id)?
            .ok_or_else(|| StorageError::NotFound(format!("course {}", course_id)))?;
        course.status = CourseStatus::Published;
        course.published_at = Some(published_at);
        put_record(&self.courses, course_id, &course)?;
        Ok(course)
    }

    fn get_course(&self, course_id: &Uuid) -> Result<Option<CourseRecord>, StorageError> {
        get_record(&self.courses, course_id)
    }

    fn clear_children(&self, course_id: &Uuid) -> Result<(), StorageError> {
        for module_id in self.drop_children(&self.modules, &self.module_order, course_id)? {
            self.drop_children(&self.lessons, &self.lesson_order, &module_id)?;
        }
        for question_id in
            self.drop_children(&self.quiz_questions, &self.question_order, course_id)?
        {
            self.drop_children(&self.quiz_options, &self.option_order, &question_id)?;
        }
        Ok(())
    }

    fn find_course_by_job(&self, job_id: &Uuid) -> Result<Option<CourseRecord>, StorageError> {
        let Some(raw) = self
            .course_by_job
            .get(job_id.as_bytes())
            .map_err(to_storage_io)?
        else {
            return Ok(None);
        };
        let course_id = Uuid::from_slice(&raw)
            .map_err(|e| StorageError::InvalidRecord(format!("Bad course id for job {}: {}", job_id, e)))?;
        self.get_course(&course_id)
    }

    fn list_modules(&self, course_id: &Uuid) -> Result<Vec<ModuleRecord>, StorageError> {
        self.list_children(&self.modules, &self.module_order, course_id)
    }

    fn list_lessons(&self, module_id: &Uuid) -> Result<Vec<LessonRecord>, StorageError> {
        self.list_children(&self.lessons, &self.lesson_order, module_id)
    }

    fn list_quiz_questions(
        &self,
        course_id: &Uuid,
    ) -> Result<Vec<QuizQuestionRecord>, StorageError> {
        self.list_children(&self.quiz_questions, &self.question_order, course_id)
    }

    fn list_quiz_options(&self, question_id: &Uuid) -> Result<Vec<QuizOptionRecord>, StorageError> {
        self.list_children(&self.quiz_options, &self.option_order, question_id)
    }
}

impl JobStore for SledStore {
    fn put_job(&self, job: &GenerationJob) -> Result<(), StorageError> {
        put_record(&self.jobs, &job.id, job)
    }

    fn get_job(&self, job_id: &Uuid) -> Result<Option<GenerationJob>, StorageError> {
        get_record(&self.jobs, job_id)
    }

    fn list_jobs(&self) -> Result<Vec<GenerationJob>, StorageError> {
        let mut out = Vec::new();
        for result in self.jobs.iter() {
            let (_, value) = result.map_err(to_storage_io)?;
            let job: GenerationJob = serde_json::from_slice(&value).map_err(to_storage_data)?;
            out.push(job);
        }
        out.sort_by_key(|job| std::cmp::Reverse(job.created_at));
        Ok(out)
    }

    fn append_log(&self, log: &GenerationLog) -> Result<(), StorageError> {
        let seq = self.db.generate_id().map_err(to_storage_io)?;
        let key = encode_log_key(&log.job_id, seq);
        let value = serde_json::to_vec(log).map_err(to_storage_data)?;
        self.logs
            .insert(key.as_bytes(), value)
            .map_err(to_storage_io)?;
        Ok(())
    }

    fn list_logs(&self, job_id: &Uuid) -> Result<Vec<GenerationLog>, StorageError> {
        let prefix = format!("{}:", job_id);
        let mut out = Vec::new();
        for result in self.logs.scan_prefix(prefix.as_bytes()) {
            let (_, value) = result.map_err(to_storage_io)?;
            let log: GenerationLog = serde_json::from_slice(&value).map_err(to_storage_data)?;
            out.push(log);
        }
        Ok(out)
    }
}

fn put_record<T: Serialize>(tree: &Tree, id: &Uuid, record: &T) -> Result<(), StorageError> {
    let value = serde_json::to_vec(record).map_err(to_storage_data)?;
    tree.insert(id.as_bytes(), value).map_err(to_storage_io)?;
    Ok(())
}

fn get_record<T: DeserializeOwned>(tree: &Tree, id: &Uuid) -> Result<Option<T>, StorageError> {
    let Some(raw) = tree.get(id.as_bytes()).map_err(to_storage_io)? else {
        return Ok(None);
    };
    let parsed = serde_json::from_slice(&raw).map_err(to_storage_data)?;
    Ok(Some(parsed))
}

fn encode_order_key(parent: &Uuid, order_index: u32) -> String {
    format!("{parent}:{order_index:0ORDER_KEY_PAD$}")
}

fn encode_log_key(job_id: &Uuid, seq: u64) -> String {
    format!("{job_id}:{seq:0LOG_KEY_PAD$}")
}

fn to_storage_io(err: sled::Error) -> StorageError {
    StorageError::IoError(io::Error::new(io::ErrorKind::Other, err.to_string()))
}

fn to_storage_data(err: serde_json::Error) -> StorageError {
    StorageError::InvalidRecord(err.to_string())
}
