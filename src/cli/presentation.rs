//! CLI presentation: job and course formatters (text tables or JSON).

use crate::error::PipelineError;
use crate::jobs::{GenerationJob, GenerationLog};
use crate::pipeline::RunOutcome;
use crate::store::{CourseRecord, ModuleRecord};
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use serde::Serialize;
use serde_json::json;

/// Everything `jobs show` and `generate` print about one job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReport {
    pub job: GenerationJob,
    pub logs: Vec<GenerationLog>,
    pub course: Option<CourseRecord>,
    pub modules: Vec<ModuleRecord>,
    pub quiz_questions: usize,
}

fn to_json<T: Serialize>(value: &T) -> Result<String, PipelineError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| PipelineError::Internal(format!("Failed to encode output: {}", e)))
}

fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}

pub fn format_job_list(jobs: &[GenerationJob], format: &str) -> Result<String, PipelineError> {
    if format == "json" {
        return to_json(&jobs);
    }
    if jobs.is_empty() {
        return Ok("No generation jobs.".to_string());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "Job", "Status", "Topic", "Audience", "Modules", "Attempts", "Created",
    ]);
    for job in jobs {
        table.add_row(vec![
            job.id.to_string(),
            job.status.to_string(),
            job.topic.clone(),
            job.audience.clone(),
            job.module_count.to_string(),
            job.attempts.to_string(),
            job.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ]);
    }
    Ok(table.to_string())
}

pub fn format_job_report(report: &JobReport, format: &str) -> Result<String, PipelineError> {
    if format == "json" {
        return to_json(report);
    }

    let job = &report.job;
    let mut out = format!(
        "Job: {}\n  Status: {}\n  Topic: {}\n  Audience: {}\n  Modules requested: {}\n  Requester: {}\n  Attempts: {}\n  Updated: {}",
        job.id,
        job.status,
        job.topic,
        job.audience,
        job.module_count,
        job.requester_id,
        job.attempts,
        job.updated_at.to_rfc3339()
    );

    match report.course {
        Some(ref course) => {
            out.push_str(&format!(
                "\n\nCourse: {} ({})\n  Title: {}\n  Status: {}\n  Quiz questions: {}",
                course.id,
                short_id(&course.id),
                course.title,
                course.status,
                report.quiz_questions
            ));
            if !report.modules.is_empty() {
                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL)
                    .set_header(vec!["#", "Module", "Id"]);
                for module in &report.modules {
                    table.add_row(vec![
                        module.order_index.to_string(),
                        module.title.clone(),
                        short_id(&module.id),
                    ]);
                }
                out.push('\n');
                out.push_str(&table.to_string());
            }
        }
        None => out.push_str("\n\nCourse: not written"),
    }

    if !report.logs.is_empty() {
        out.push_str(&format!("\n\nFailures ({}):", report.logs.len()));
        for log in &report.logs {
            out.push_str(&format!(
                "\n  - [{}] {} {}",
                log.created_at.format("%Y-%m-%d %H:%M:%S"),
                log.error_message,
                log.error_details
            ));
        }
    }
    Ok(out)
}

/// Result of a foreground run: the outcome line followed by the job report.
pub fn format_run_report(
    report: &JobReport,
    outcome: &RunOutcome,
    format: &str,
) -> Result<String, PipelineError> {
    if format == "json" {
        let outcome = match outcome {
            RunOutcome::Published { course_id } => {
                json!({ "outcome": "published", "courseId": course_id })
            }
            RunOutcome::Failed { error, code, log } => json!({
                "outcome": "error",
                "error": error,
                "code": code,
                "log": log,
            }),
        };
        return to_json(&json!({ "result": outcome, "report": report }));
    }

    let headline = match outcome {
        RunOutcome::Published { course_id } => format!("Course published: {}", course_id),
        RunOutcome::Failed { error, code, log } if log.is_degraded() => format!(
            "Generation failed ({}): {}\nWarning: failure could not be fully recorded",
            code, error
        ),
        RunOutcome::Failed { error, code, .. } => {
            format!("Generation failed ({}): {}", code, error)
        }
    };
    Ok(format!("{}\n\n{}", headline, format_job_report(report, "text")?))
}
