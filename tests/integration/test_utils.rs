//! Shared test utilities for integration tests
//!
//! Scripted model provider, store wrappers that fail on demand, and a harness that
//! wires the pipeline together over a temporary sled store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coursegen::error::{PipelineError, StorageError};
use coursegen::generator::{prompts, ContentGenerator, GenerationSettings};
use coursegen::jobs::{GenerationJob, GenerationLog, JobTracker};
use coursegen::pipeline::queue::QueueConfig;
use coursegen::pipeline::PipelineOrchestrator;
use coursegen::provider::{
    ChatMessage, CompletionOptions, CompletionResponse, ModelProviderClient, TokenUsage,
};
use coursegen::store::{
    CourseRecord, CourseStore, JobStore, LessonRecord, ModuleRecord, QuizOptionRecord,
    QuizQuestionRecord, SledStore,
};
use coursegen::writer::EntityWriter;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

/// One scripted model reply.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Fail(String),
    Panic(String),
}

/// Provider that plays back fixed replies, one per call.
///
/// Outline requests consume `replies`. Lesson-content requests consume
/// `lesson_replies` and, once that runs out, answer with a generated body headed by
/// the lesson title.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Reply>>,
    lesson_replies: Mutex<VecDeque<Reply>>,
    calls: AtomicUsize,
    lesson_calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self::with_lessons(replies, Vec::new())
    }

    pub fn with_lessons(replies: Vec<Reply>, lesson_replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            lesson_replies: Mutex::new(lesson_replies.into()),
            calls: AtomicUsize::new(0),
            lesson_calls: AtomicUsize::new(0),
        }
    }

    /// Outline requests received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Lesson-content requests received.
    pub fn lesson_calls(&self) -> usize {
        self.lesson_calls.load(Ordering::SeqCst)
    }
}

/// Body returned for a lesson when no lesson reply is scripted.
pub fn lesson_body(title: &str) -> String {
    format!(
        "# {}\n\n{}",
        title,
        "Each value has a single owner and is dropped when the owner goes out of scope. "
            .repeat(3)
    )
}

/// First double-quoted string in a prompt.
fn first_quoted(prompt: &str) -> &str {
    prompt.split('"').nth(1).unwrap_or_default()
}

#[async_trait]
impl ModelProviderClient for ScriptedProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        _options: CompletionOptions,
    ) -> Result<CompletionResponse, PipelineError> {
        let is_lesson = messages
            .first()
            .is_some_and(|m| m.content == prompts::LESSON_SYSTEM_PROMPT);
        let reply = if is_lesson {
            self.lesson_calls.fetch_add(1, Ordering::SeqCst);
            let title = messages
                .get(1)
                .map(|m| first_quoted(&m.content).to_string())
                .unwrap_or_default();
            self.lesson_replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Reply::Text(lesson_body(&title)))
        } else {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Reply::Fail("script exhausted".to_string()))
        };

        let content = match reply {
            Reply::Text(text) => text,
            Reply::Fail(message) => return Err(PipelineError::external("scripted", message)),
            Reply::Panic(message) => panic!("{}", message),
        };
        Ok(CompletionResponse {
            content,
            model: "scripted-model".to_string(),
            usage: TokenUsage::default(),
            finish_reason: Some("stop".to_string()),
        })
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_name(&self) -> &str {
        "scripted-model"
    }
}

/// Course store write that `FailingCourseStore` can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Course,
    Module,
    Lesson,
    QuizQuestion,
    QuizOption,
    Publish,
}

/// Course store that fails the Nth write (1-based) of one kind and delegates the rest.
pub struct FailingCourseStore {
    inner: Arc<SledStore>,
    kind: WriteKind,
    fail_on: u32,
    seen: AtomicU32,
}

impl FailingCourseStore {
    pub fn new(inner: Arc<SledStore>, kind: WriteKind, fail_on: u32) -> Self {
        Self {
            inner,
            kind,
            fail_on,
            seen: AtomicU32::new(0),
        }
    }

    fn check(&self, kind: WriteKind) -> Result<(), StorageError> {
        if kind != self.kind {
            return Ok(());
        }
        let n = self.seen.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.fail_on {
            return Err(StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("disk unavailable on {:?} write {}", kind, n),
            )));
        }
        Ok(())
    }
}

impl CourseStore for FailingCourseStore {
    fn insert_course(&self, course: &CourseRecord) -> Result<(), StorageError> {
        self.check(WriteKind::Course)?;
        self.inner.insert_course(course)
    }

    fn insert_module(&self, module: &ModuleRecord) -> Result<(), StorageError> {
        self.check(WriteKind::Module)?;
        self.inner.insert_module(module)
    }

    fn insert_lesson(&self, lesson: &LessonRecord) -> Result<(), StorageError> {
        self.check(WriteKind::Lesson)?;
        self.inner.insert_lesson(lesson)
    }

    fn insert_quiz_question(&self, question: &QuizQuestionRecord) -> Result<(), StorageError> {
        self.check(WriteKind::QuizQuestion)?;
        self.inner.insert_quiz_question(question)
    }

    fn insert_quiz_option(&self, option: &QuizOptionRecord) -> Result<(), StorageError> {
        self.check(WriteKind::QuizOption)?;
        self.inner.insert_quiz_option(option)
    }

    fn publish_course(
        &self,
        course_id: &Uuid,
        published_at: DateTime<Utc>,
    ) -> Result<CourseRecord, StorageError> {
        self.check(WriteKind::Publish)?;
        self.inner.publish_course(course_id, published_at)
    }

    fn get_course(&self, course_id: &Uuid) -> Result<Option<CourseRecord>, StorageError> {
        self.inner.get_course(course_id)
    }

    fn clear_children(&self, course_id: &Uuid) -> Result<(), StorageError> {
        self.inner.clear_children(course_id)
    }

    fn find_course_by_job(&self, job_id: &Uuid) -> Result<Option<CourseRecord>, StorageError> {
        self.inner.find_course_by_job(job_id)
    }

    fn list_modules(&self, course_id: &Uuid) -> Result<Vec<ModuleRecord>, StorageError> {
        self.inner.list_modules(course_id)
    }

    fn list_lessons(&self, module_id: &Uuid) -> Result<Vec<LessonRecord>, StorageError> {
        self.inner.list_lessons(module_id)
    }

    fn list_quiz_questions(
        &self,
        course_id: &Uuid,
    ) -> Result<Vec<QuizQuestionRecord>, StorageError> {
        self.inner.list_quiz_questions(course_id)
    }

    fn list_quiz_options(&self, question_id: &Uuid) -> Result<Vec<QuizOptionRecord>, StorageError> {
        self.inner.list_quiz_options(question_id)
    }
}

/// Job store whose generation log rejects every append.
pub struct UnwritableLogStore {
    inner: Arc<SledStore>,
}

impl UnwritableLogStore {
    pub fn new(inner: Arc<SledStore>) -> Self {
        Self { inner }
    }
}

impl JobStore for UnwritableLogStore {
    fn put_job(&self, job: &GenerationJob) -> Result<(), StorageError> {
        self.inner.put_job(job)
    }

    fn get_job(&self, job_id: &Uuid) -> Result<Option<GenerationJob>, StorageError> {
        self.inner.get_job(job_id)
    }

    fn list_jobs(&self) -> Result<Vec<GenerationJob>, StorageError> {
        self.inner.list_jobs()
    }

    fn append_log(&self, _log: &GenerationLog) -> Result<(), StorageError> {
        Err(StorageError::InvalidRecord("log table is read-only".to_string()))
    }

    fn list_logs(&self, job_id: &Uuid) -> Result<Vec<GenerationLog>, StorageError> {
        self.inner.list_logs(job_id)
    }
}

/// Pipeline wired over a temporary sled store.
pub struct Harness {
    pub store: Arc<SledStore>,
    pub tracker: Arc<JobTracker>,
    pub provider: Arc<ScriptedProvider>,
    pub orchestrator: Arc<PipelineOrchestrator>,
    _dir: TempDir,
}

pub struct HarnessBuilder {
    replies: Vec<Reply>,
    lesson_replies: Vec<Reply>,
    fail_on: Option<(WriteKind, u32)>,
    unwritable_log: bool,
    queue: QueueConfig,
    timeout: Duration,
}

impl HarnessBuilder {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies,
            lesson_replies: Vec::new(),
            fail_on: None,
            unwritable_log: false,
            queue: QueueConfig {
                workers: 2,
                max_queue_size: 100,
            },
            timeout: Duration::from_secs(5),
        }
    }

    /// Fail the `n`th course store write of `kind`.
    pub fn fail_on(mut self, kind: WriteKind, n: u32) -> Self {
        self.fail_on = Some((kind, n));
        self
    }

    pub fn lesson_replies(mut self, replies: Vec<Reply>) -> Self {
        self.lesson_replies = replies;
        self
    }

    pub fn unwritable_log(mut self) -> Self {
        self.unwritable_log = true;
        self
    }

    pub fn queue(mut self, queue: QueueConfig) -> Self {
        self.queue = queue;
        self
    }

    pub fn build(self) -> Harness {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SledStore::open(dir.path().join("store")).unwrap());

        let job_store: Arc<dyn JobStore> = if self.unwritable_log {
            Arc::new(UnwritableLogStore::new(store.clone()))
        } else {
            store.clone()
        };
        let course_store: Arc<dyn CourseStore> = match self.fail_on {
            Some((kind, n)) => Arc::new(FailingCourseStore::new(store.clone(), kind, n)),
            None => store.clone(),
        };

        let provider = Arc::new(ScriptedProvider::with_lessons(
            self.replies,
            self.lesson_replies,
        ));
        let settings = GenerationSettings {
            timeout: self.timeout,
            ..GenerationSettings::default()
        };
        let tracker = Arc::new(JobTracker::new(job_store));
        let generator = Arc::new(ContentGenerator::new(provider.clone(), settings));
        let writer = Arc::new(EntityWriter::new(course_store));
        let orchestrator = Arc::new(PipelineOrchestrator::new(
            tracker.clone(),
            generator,
            writer,
            self.queue,
        ));

        Harness {
            store,
            tracker,
            provider,
            orchestrator,
            _dir: dir,
        }
    }
}

pub fn harness(replies: Vec<Reply>) -> Harness {
    HarnessBuilder::new(replies).build()
}

/// Outline reply in the prompt's key style: `modules` modules of `lessons` bare-title
/// lessons each, plus `questions` quiz questions with string options.
pub fn outline_reply(modules: usize, lessons: usize, questions: usize) -> String {
    let modules: Vec<_> = (1..=modules)
        .map(|m| {
            json!({
                "moduleTitle": format!("Module {}", m),
                "moduleDescription": format!("About module {}", m),
                "lessons": (1..=lessons)
                    .map(|l| format!("Lesson {}.{}", m, l))
                    .collect::<Vec<_>>(),
            })
        })
        .collect();
    let questions: Vec<_> = (1..=questions)
        .map(|q| {
            json!({
                "question": format!("Question {}?", q),
                "options": ["first", "second", "third"],
                "correctAnswerIndex": 1,
                "explanation": "Because.",
            })
        })
        .collect();
    json!({
        "courseTitle": "Intro to Rust",
        "courseDescription": "Ownership, borrowing and lifetimes",
        "modules": modules,
        "quizQuestions": questions,
    })
    .to_string()
}
