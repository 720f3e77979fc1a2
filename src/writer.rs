//! Entity Writer
//!
//! Expands a validated outline into persisted records in strict order: the course as
//! draft, then each module followed by its lessons, then each quiz question followed
//! by its options, and finally the publish flip. The first failed write aborts the
//! sequence; earlier writes are left in place. Rerunning a job first clears the
//! children an earlier attempt wrote, so only the new outline gets published.

use crate::generator::CourseOutline;
use crate::error::StorageError;
use crate::jobs::GenerationJob;
use crate::store::ids::{
    course_path, entity_id, lesson_path, module_path, option_path, question_path,
};
use crate::store::{
    CourseRecord, CourseStatus, CourseStore, LessonRecord, ModuleRecord, QuizOptionRecord,
    QuizQuestionRecord,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 1-based position of the element at `index`.
fn position(index: usize) -> u32 {
    index as u32 + 1
}

pub struct EntityWriter {
    store: Arc<dyn CourseStore>,
}

impl EntityWriter {
    pub fn new(store: Arc<dyn CourseStore>) -> Self {
        Self { store }
    }

    /// Persist the outline for `job` and publish the course. Returns the course id.
    pub fn persist(
        &self,
        outline: &CourseOutline,
        job: &GenerationJob,
    ) -> Result<Uuid, StorageError> {
        let course_id = entity_id(&job.id, &course_path());
        let course = CourseRecord {
            id: course_id,
            title: outline.title.trim().to_string(),
            description: outline.description.clone(),
            category: outline.category.clone(),
            difficulty_level: outline.difficulty_level.clone(),
            estimated_duration: outline.estimated_duration,
            created_by: job.requester_id.clone(),
            status: CourseStatus::Draft,
            generation_job_id: job.id,
            created_at: Utc::now(),
            published_at: None,
        };
        let rerun = self.store.get_course(&course_id)?.is_some();
        self.store.insert_course(&course)?;
        if rerun {
            // a previous attempt may have left rows past this outline's counts
            self.store.clear_children(&course_id)?;
            debug!(job_id = %job.id, course_id = %course_id, "Cleared rows from earlier attempt");
        }
        debug!(job_id = %job.id, course_id = %course_id, "Draft course written");

        for (m, module) in outline.modules.iter().enumerate() {
            let module_no = position(m);
            let module_id = entity_id(&job.id, &module_path(module_no));
            self.store.insert_module(&ModuleRecord {
                id: module_id,
                course_id,
                title: module.title.trim().to_string(),
                description: module.description.clone(),
                order_index: module_no,
            })?;

            for (l, lesson) in module.lessons.iter().enumerate() {
                let lesson_no = position(l);
                self.store.insert_lesson(&LessonRecord {
                    id: entity_id(&job.id, &lesson_path(module_no, lesson_no)),
                    module_id,
                    title: lesson.title.trim().to_string(),
                    content: lesson.content.clone(),
                    content_type: lesson.content_type.clone(),
                    duration: lesson.duration,
                    order_index: lesson_no,
                })?;
            }
            debug!(
                job_id = %job.id,
                module = module_no,
                lessons = module.lessons.len(),
                "Module written"
            );
        }

        for (q, question) in outline.quiz_questions.iter().enumerate() {
            let question_no = position(q);
            let correct = question.correct_option_count();
            if correct != 1 {
                warn!(
                    job_id = %job.id,
                    question = question_no,
                    correct_options = correct,
                    "Quiz question does not have exactly one correct option"
                );
            }

            let question_id = entity_id(&job.id, &question_path(question_no));
            self.store.insert_quiz_question(&QuizQuestionRecord {
                id: question_id,
                course_id,
                question: question.question.clone(),
                question_type: question.question_type.clone(),
                explanation: question.explanation.clone(),
                order_index: question_no,
            })?;

            for (o, option) in question.options.iter().enumerate() {
                let option_no = position(o);
                self.store.insert_quiz_option(&QuizOptionRecord {
                    id: entity_id(&job.id, &option_path(question_no, option_no)),
                    question_id,
                    option_text: option.text.clone(),
                    is_correct: option.is_correct,
                    order_index: option_no,
                })?;
            }
        }

        self.store.publish_course(&course_id, Utc::now())?;
        info!(
            job_id = %job.id,
            course_id = %course_id,
            modules = outline.modules.len(),
            quiz_questions = outline.quiz_questions.len(),
            "Course published"
        );
        Ok(course_id)
    }
}
