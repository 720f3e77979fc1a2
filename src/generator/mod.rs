//! Content Generator
//!
//! Turns `(topic, audience, module_count)` into a validated `CourseOutline` with exactly
//! one completion request, then writes lesson bodies with one request per lesson.
//! Upstream errors, timeouts and unusable replies all surface as
//! `PipelineError::ExternalService`; nothing is retried here.

pub mod extract;
pub mod outline;
pub mod prompts;

pub use extract::{extract_json, ExtractError};
pub use outline::{
    CourseOutline, LessonOutline, ModuleOutline, OutlineError, QuizOptionOutline,
    QuizQuestionOutline,
};

use crate::error::PipelineError;
use crate::provider::{ChatMessage, CompletionOptions, ModelProviderClient};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Service name used in external-service errors raised for unusable replies.
pub const LLM_SERVICE: &str = "llm";

/// Shortest lesson body accepted from the model, in characters.
pub const MIN_LESSON_CONTENT_CHARS: usize = 100;

/// Fixed completion settings. Not tunable per request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_tokens: 4000,
            temperature: 0.7,
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Error)]
pub enum OutlineParseError {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("unexpected structure: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid outline: {0}")]
    Shape(#[from] OutlineError),
}

/// Extract, decode and validate a raw model reply.
pub fn parse_outline(raw: &str) -> Result<CourseOutline, OutlineParseError> {
    let value = extract_json(raw)?;
    let outline: CourseOutline = serde_json::from_value(value)?;
    outline.validate()?;
    Ok(outline)
}

pub struct ContentGenerator {
    client: Arc<dyn ModelProviderClient>,
    settings: GenerationSettings,
}

impl ContentGenerator {
    pub fn new(client: Arc<dyn ModelProviderClient>, settings: GenerationSettings) -> Self {
        Self { client, settings }
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    pub async fn generate(
        &self,
        topic: &str,
        audience: &str,
        module_count: u32,
    ) -> Result<CourseOutline, PipelineError> {
        let reply = self
            .complete(
                prompts::COURSE_SYSTEM_PROMPT,
                prompts::course_structure_prompt(topic, audience, module_count),
            )
            .await?;

        let outline = parse_outline(&reply).map_err(|e| {
            warn!(
                error = %e,
                reply_chars = reply.chars().count(),
                "Unusable course structure from model"
            );
            PipelineError::external(
                LLM_SERVICE,
                format!("Invalid course structure from model: {}", e),
            )
        })?;

        info!(
            title = %outline.title,
            modules = outline.modules.len(),
            lessons = outline.lesson_count(),
            "Course structure generated"
        );
        Ok(outline)
    }

    /// Write the body of one lesson. Replies shorter than
    /// `MIN_LESSON_CONTENT_CHARS` after trimming are rejected.
    pub async fn lesson_content(
        &self,
        course_title: &str,
        module_title: &str,
        lesson_title: &str,
        audience: &str,
    ) -> Result<String, PipelineError> {
        let reply = self
            .complete(
                prompts::LESSON_SYSTEM_PROMPT,
                prompts::lesson_content_prompt(lesson_title, course_title, module_title, audience),
            )
            .await?;

        let content = reply.trim();
        if content.chars().count() < MIN_LESSON_CONTENT_CHARS {
            warn!(
                lesson = lesson_title,
                reply_chars = content.chars().count(),
                "Lesson content too short"
            );
            return Err(PipelineError::external(
                LLM_SERVICE,
                format!("Lesson content for '{}' is too short or empty", lesson_title),
            ));
        }
        Ok(content.to_string())
    }

    /// Fill in every lesson the outline left without content, one completion per
    /// lesson in outline order. The first failure aborts the rest.
    pub async fn write_lessons(
        &self,
        outline: &mut CourseOutline,
        audience: &str,
    ) -> Result<usize, PipelineError> {
        let course_title = outline.title.trim().to_string();
        let mut written = 0;
        for module in outline.modules.iter_mut() {
            let module_title = module.title.trim().to_string();
            for lesson in module.lessons.iter_mut() {
                if !lesson.content.trim().is_empty() {
                    continue;
                }
                lesson.content = self
                    .lesson_content(&course_title, &module_title, lesson.title.trim(), audience)
                    .await?;
                written += 1;
            }
        }
        debug!(lessons = written, "Lesson content written");
        Ok(written)
    }

    async fn complete(&self, system: &str, user: String) -> Result<String, PipelineError> {
        let messages = vec![ChatMessage::system(system), ChatMessage::user(user)];
        let options = CompletionOptions {
            temperature: Some(self.settings.temperature),
            max_tokens: Some(self.settings.max_tokens),
        };

        let started = Instant::now();
        let response = tokio::time::timeout(
            self.settings.timeout,
            self.client.complete(messages, options),
        )
        .await
        .map_err(|_| {
            PipelineError::external(
                self.client.provider_name(),
                format!(
                    "Request timed out after {}s",
                    self.settings.timeout.as_secs_f64()
                ),
            )
        })??;

        debug!(
            provider = self.client.provider_name(),
            model = %response.model,
            prompt_tokens = response.usage.prompt_tokens,
            completion_tokens = response.usage.completion_tokens,
            duration_ms = started.elapsed().as_millis() as u64,
            "Completion received"
        );
        Ok(response.content)
    }
}
