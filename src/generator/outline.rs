//! Typed course outline decoded from model output.
//!
//! Decoding is lenient about key style: the prompt asks for `courseTitle` /
//! `moduleTitle` / string lessons, while models sometimes answer with the persisted
//! shape (`title`, `description`, lesson objects). Both decode to the same types.
//! Decoding never enforces bounds; `CourseOutline::validate` does.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_MODULES: usize = 10;
pub const MAX_LESSONS_PER_MODULE: usize = 10;
pub const DEFAULT_CONTENT_TYPE: &str = "text";
pub const DEFAULT_LESSON_DURATION: u32 = 10;
pub const DEFAULT_QUESTION_TYPE: &str = "multiple_choice";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseOutline {
    #[serde(default, alias = "courseTitle", deserialize_with = "nullable_string")]
    pub title: String,

    #[serde(default, alias = "courseDescription", deserialize_with = "nullable_string")]
    pub description: String,

    #[serde(default, deserialize_with = "optional_string")]
    pub category: Option<String>,

    #[serde(default, alias = "difficultyLevel", deserialize_with = "optional_string")]
    pub difficulty_level: Option<String>,

    #[serde(default, alias = "estimatedDuration", deserialize_with = "lenient_u32")]
    pub estimated_duration: Option<u32>,

    #[serde(default)]
    pub modules: Vec<ModuleOutline>,

    #[serde(default, alias = "quizQuestions")]
    pub quiz_questions: Vec<QuizQuestionOutline>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleOutline {
    #[serde(default, alias = "moduleTitle", deserialize_with = "nullable_string")]
    pub title: String,

    #[serde(default, alias = "moduleDescription", deserialize_with = "nullable_string")]
    pub description: String,

    #[serde(default)]
    pub lessons: Vec<LessonOutline>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawLesson")]
pub struct LessonOutline {
    pub title: String,
    pub content: String,
    pub content_type: String,
    /// Minutes
    pub duration: u32,
}

impl LessonOutline {
    /// A lesson known only by its title.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: String::new(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            duration: DEFAULT_LESSON_DURATION,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLesson {
    Title(String),
    Detailed(RawLessonFields),
}

#[derive(Deserialize)]
struct RawLessonFields {
    #[serde(default, alias = "lessonTitle", deserialize_with = "nullable_string")]
    title: String,
    #[serde(default, deserialize_with = "nullable_string")]
    content: String,
    #[serde(default, alias = "contentType", deserialize_with = "optional_string")]
    content_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    duration: Option<u32>,
}

impl From<RawLesson> for LessonOutline {
    fn from(raw: RawLesson) -> Self {
        match raw {
            RawLesson::Title(title) => LessonOutline::titled(title),
            RawLesson::Detailed(fields) => LessonOutline {
                title: fields.title,
                content: fields.content,
                content_type: fields
                    .content_type
                    .filter(|ct| !ct.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
                duration: fields
                    .duration
                    .filter(|d| *d > 0)
                    .unwrap_or(DEFAULT_LESSON_DURATION),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawQuizQuestion")]
pub struct QuizQuestionOutline {
    pub question: String,
    pub question_type: String,
    pub explanation: Option<String>,
    pub options: Vec<QuizOptionOutline>,
}

impl QuizQuestionOutline {
    pub fn correct_option_count(&self) -> usize {
        self.options.iter().filter(|o| o.is_correct).count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizOptionOutline {
    pub text: String,
    pub is_correct: bool,
}

#[derive(Deserialize)]
struct RawQuizQuestion {
    #[serde(default, deserialize_with = "nullable_string")]
    question: String,
    #[serde(default, alias = "type", alias = "questionType", deserialize_with = "optional_string")]
    question_type: Option<String>,
    #[serde(default, deserialize_with = "optional_string")]
    explanation: Option<String>,
    #[serde(default)]
    options: Vec<RawQuizOption>,
    #[serde(default, alias = "correctAnswerIndex", deserialize_with = "lenient_u32")]
    correct_answer_index: Option<u32>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawQuizOption {
    Text(String),
    Detailed {
        #[serde(default, alias = "option_text", alias = "optionText")]
        text: String,
        #[serde(default, alias = "isCorrect")]
        is_correct: Option<bool>,
    },
}

impl From<RawQuizQuestion> for QuizQuestionOutline {
    fn from(raw: RawQuizQuestion) -> Self {
        let correct_index = raw.correct_answer_index.map(|i| i as usize);
        let options = raw
            .options
            .into_iter()
            .enumerate()
            .map(|(i, option)| match option {
                RawQuizOption::Text(text) => QuizOptionOutline {
                    text,
                    is_correct: correct_index == Some(i),
                },
                RawQuizOption::Detailed { text, is_correct } => QuizOptionOutline {
                    text,
                    is_correct: is_correct.unwrap_or(correct_index == Some(i)),
                },
            })
            .collect();

        QuizQuestionOutline {
            question: raw.question,
            question_type: raw
                .question_type
                .unwrap_or_else(|| DEFAULT_QUESTION_TYPE.to_string()),
            explanation: raw.explanation,
            options,
        }
    }
}

/// Shape violation found by `CourseOutline::validate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineError {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for OutlineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

impl std::error::Error for OutlineError {}

fn check_title(path: String, title: &str) -> Result<(), OutlineError> {
    let len = title.trim().chars().count();
    if len == 0 {
        return Err(OutlineError {
            path,
            message: "must not be empty".to_string(),
        });
    }
    if len > MAX_TITLE_CHARS {
        return Err(OutlineError {
            path,
            message: format!("must be at most {} characters (got {})", MAX_TITLE_CHARS, len),
        });
    }
    Ok(())
}

fn check_count(path: String, count: usize, max: usize) -> Result<(), OutlineError> {
    if count == 0 || count > max {
        return Err(OutlineError {
            path,
            message: format!("must contain between 1 and {} entries (got {})", max, count),
        });
    }
    Ok(())
}

impl CourseOutline {
    /// Check the shape bounds. The first violation wins.
    pub fn validate(&self) -> Result<(), OutlineError> {
        check_title("title".to_string(), &self.title)?;
        check_count("modules".to_string(), self.modules.len(), MAX_MODULES)?;
        for (m, module) in self.modules.iter().enumerate() {
            check_title(format!("modules.{}.title", m), &module.title)?;
            check_count(
                format!("modules.{}.lessons", m),
                module.lessons.len(),
                MAX_LESSONS_PER_MODULE,
            )?;
            for (l, lesson) in module.lessons.iter().enumerate() {
                check_title(format!("modules.{}.lessons.{}.title", m, l), &lesson.title)?;
            }
        }
        Ok(())
    }

    pub fn lesson_count(&self) -> usize {
        self.modules.iter().map(|m| m.lessons.len()).sum()
    }
}

fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.filter(|s| !s.trim().is_empty()))
}

/// Accepts integers, non-negative floats and numeric strings; anything else is absent.
fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f.round() as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    })
}
