//! Integration tests for the detached generation pipeline
//!
//! Tests cover:
//! - Acknowledgment before any work runs
//! - Published course tree for a well-formed reply
//! - Non-JSON and shape-violating replies, short lesson bodies
//! - Partial writes when a module, lesson or quiz option write fails
//! - Identical requests, panics, degraded logging and retries

use crate::integration::test_utils::{
    harness, lesson_body, outline_reply, HarnessBuilder, Reply, WriteKind,
};
use coursegen::auth::{Requester, Role};
use coursegen::error::PipelineError;
use coursegen::jobs::{JobStatus, LogOutcome};
use coursegen::pipeline::queue::QueueConfig;
use coursegen::pipeline::{CourseGenerationRequest, RunOutcome};
use coursegen::store::{CourseStatus, CourseStore};
use std::collections::HashSet;
use std::time::Duration;

const IDLE_TIMEOUT: Duration = Duration::from_secs(10);

fn admin() -> Requester {
    Requester::admin("admin-1")
}

fn request(module_count: i64) -> CourseGenerationRequest {
    CourseGenerationRequest::new("Rust", "backend developers", module_count).unwrap()
}

#[tokio::test]
async fn test_submit_returns_fresh_ids_before_work_runs() {
    // Workers are never started, so every job stays queued.
    let h = harness(vec![]);

    let mut ids = HashSet::new();
    for _ in 0..10 {
        let ack = h.orchestrator.submit(&admin(), request(3)).await.unwrap();
        assert_eq!(ack.status, JobStatus::Started);
        assert!(ids.insert(ack.job_id), "job id reused: {}", ack.job_id);
    }

    assert_eq!(h.orchestrator.stats().pending, 10);
    assert_eq!(h.provider.calls(), 0);
    for id in &ids {
        let job = h.tracker.get(id).unwrap();
        assert_eq!(job.status, JobStatus::Started);
        assert_eq!(job.requester_id, "admin-1");
        assert_eq!(job.module_count, 3);
    }
}

#[tokio::test]
async fn test_submit_requires_admin() {
    let h = harness(vec![]);
    let student = Requester {
        user_id: "s-1".to_string(),
        role: Role::Student,
    };

    let result = h.orchestrator.submit(&student, request(3)).await;
    assert!(matches!(result, Err(PipelineError::Authorization(_))));
    assert!(h.tracker.list().unwrap().is_empty());
}

#[tokio::test]
async fn test_end_to_end_publishes_course() {
    let h = harness(vec![Reply::Text(outline_reply(3, 2, 2))]);
    h.orchestrator.start();

    let ack = h.orchestrator.submit(&admin(), request(3)).await.unwrap();
    h.orchestrator.wait_for_idle(Some(IDLE_TIMEOUT)).await.unwrap();

    let job = h.tracker.get(&ack.job_id).unwrap();
    assert_eq!(job.status, JobStatus::Published);
    assert!(h.tracker.logs(&ack.job_id).unwrap().is_empty());

    let course = h.store.find_course_by_job(&ack.job_id).unwrap().unwrap();
    assert_eq!(job.course_id, Some(course.id));
    assert_eq!(course.status, CourseStatus::Published);
    assert!(course.published_at.is_some());
    assert_eq!(course.title, "Intro to Rust");
    assert_eq!(course.created_by, "admin-1");
    assert_eq!(course.generation_job_id, ack.job_id);

    let modules = h.store.list_modules(&course.id).unwrap();
    assert_eq!(modules.len(), 3);
    for (i, module) in modules.iter().enumerate() {
        assert_eq!(module.order_index, i as u32 + 1);
        assert_eq!(module.title, format!("Module {}", i + 1));

        let lessons = h.store.list_lessons(&module.id).unwrap();
        assert_eq!(lessons.len(), 2);
        for (j, lesson) in lessons.iter().enumerate() {
            assert_eq!(lesson.order_index, j as u32 + 1);
            assert_eq!(lesson.title, format!("Lesson {}.{}", i + 1, j + 1));
            assert_eq!(lesson.content, lesson_body(&lesson.title).trim());
            assert_eq!(lesson.content_type, "text");
            assert_eq!(lesson.duration, 10);
        }
    }

    let questions = h.store.list_quiz_questions(&course.id).unwrap();
    assert_eq!(questions.len(), 2);
    for question in &questions {
        let options = h.store.list_quiz_options(&question.id).unwrap();
        let correct: Vec<_> = options.iter().filter(|o| o.is_correct).collect();
        assert_eq!(options.len(), 3);
        assert_eq!(correct.len(), 1);
        assert_eq!(correct[0].option_text, "second");
        assert_eq!(correct[0].order_index, 2);
    }

    assert_eq!(h.provider.calls(), 1);
    assert_eq!(h.provider.lesson_calls(), 6);

    let stats = h.orchestrator.stats();
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.failed, 0);
    h.orchestrator.shutdown(IDLE_TIMEOUT).await;
}

#[tokio::test]
async fn test_non_json_reply_records_error() {
    let h = harness(vec![Reply::Text(
        "I'm sorry, I can't produce a course on that topic.".to_string(),
    )]);
    h.orchestrator.start();

    let ack = h.orchestrator.submit(&admin(), request(2)).await.unwrap();
    h.orchestrator.wait_for_idle(Some(IDLE_TIMEOUT)).await.unwrap();

    let job = h.tracker.get(&ack.job_id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(h.store.find_course_by_job(&ack.job_id).unwrap().is_none());

    let logs = h.tracker.logs(&ack.job_id).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].job_type, "course_generation");
    assert_eq!(logs[0].status, "error");
    assert_eq!(logs[0].user_id, "admin-1");
    assert_eq!(logs[0].error_details["code"], "EXTERNAL_SERVICE_ERROR");
    assert_eq!(logs[0].error_details["stage"], "generating");
    assert_eq!(h.orchestrator.stats().failed, 1);
    h.orchestrator.shutdown(IDLE_TIMEOUT).await;
}

#[tokio::test]
async fn test_shape_violation_writes_nothing() {
    let reply = r#"Here you go: {"courseTitle": "Empty course", "modules": []}"#;
    let h = harness(vec![Reply::Text(reply.to_string())]);

    let (job, outcome) = h.orchestrator.run_inline(&admin(), request(3)).await.unwrap();

    match outcome {
        RunOutcome::Failed { code, ref error, .. } => {
            assert_eq!(code, "EXTERNAL_SERVICE_ERROR");
            assert!(error.contains("modules"), "unexpected error: {}", error);
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.course_id.is_none());
    assert!(h.store.find_course_by_job(&job.id).unwrap().is_none());
    assert_eq!(h.tracker.logs(&job.id).unwrap().len(), 1);
}

#[tokio::test]
async fn test_upstream_error_records_error() {
    let h = harness(vec![Reply::Fail("rate limited".to_string())]);

    let (job, outcome) = h.orchestrator.run_inline(&admin(), request(1)).await.unwrap();

    assert!(matches!(outcome, RunOutcome::Failed { .. }));
    assert_eq!(job.status, JobStatus::Failed);
    let logs = h.tracker.logs(&job.id).unwrap();
    assert_eq!(logs.len(), 1);
    assert!(logs[0].error_message.contains("rate limited"));
    assert_eq!(h.provider.calls(), 1);
}

#[tokio::test]
async fn test_failure_after_first_module_leaves_draft() {
    let h = HarnessBuilder::new(vec![Reply::Text(outline_reply(3, 2, 1))])
        .fail_on(WriteKind::Module, 2)
        .build();

    let (job, outcome) = h.orchestrator.run_inline(&admin(), request(3)).await.unwrap();

    match outcome {
        RunOutcome::Failed { code, log, .. } => {
            assert_eq!(code, "STORAGE_ERROR");
            assert_eq!(log, LogOutcome::Recorded);
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(job.status, JobStatus::Failed);

    let course = h.store.find_course_by_job(&job.id).unwrap().unwrap();
    assert_eq!(course.status, CourseStatus::Draft);
    assert!(course.published_at.is_none());
    assert_eq!(job.course_id, Some(course.id));

    let modules = h.store.list_modules(&course.id).unwrap();
    assert_eq!(modules.len(), 1);
    assert_eq!(modules[0].title, "Module 1");
    assert_eq!(modules[0].order_index, 1);
    assert_eq!(h.store.list_lessons(&modules[0].id).unwrap().len(), 2);
    assert!(h.store.list_quiz_questions(&course.id).unwrap().is_empty());

    let logs = h.tracker.logs(&job.id).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].error_details["stage"], "persisting");
}

#[tokio::test]
async fn test_short_lesson_content_fails_before_any_write() {
    let h = HarnessBuilder::new(vec![Reply::Text(outline_reply(1, 2, 0))])
        .lesson_replies(vec![Reply::Text("Coming soon.".to_string())])
        .build();

    let (job, outcome) = h.orchestrator.run_inline(&admin(), request(1)).await.unwrap();

    match outcome {
        RunOutcome::Failed { code, ref error, .. } => {
            assert_eq!(code, "EXTERNAL_SERVICE_ERROR");
            assert!(error.contains("Lesson 1.1"), "unexpected error: {}", error);
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(h.provider.lesson_calls(), 1);
    assert!(h.store.find_course_by_job(&job.id).unwrap().is_none());

    let logs = h.tracker.logs(&job.id).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].error_details["stage"], "generating");
}

#[tokio::test]
async fn test_failure_on_lesson_leaves_draft() {
    // Fifth lesson write is module 2, lesson 2.
    let h = HarnessBuilder::new(vec![Reply::Text(outline_reply(2, 3, 1))])
        .fail_on(WriteKind::Lesson, 5)
        .build();

    let (job, outcome) = h.orchestrator.run_inline(&admin(), request(2)).await.unwrap();

    match outcome {
        RunOutcome::Failed { code, log, .. } => {
            assert_eq!(code, "STORAGE_ERROR");
            assert_eq!(log, LogOutcome::Recorded);
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(job.status, JobStatus::Failed);

    let course = h.store.find_course_by_job(&job.id).unwrap().unwrap();
    assert_eq!(course.status, CourseStatus::Draft);
    assert!(course.published_at.is_none());

    let modules = h.store.list_modules(&course.id).unwrap();
    assert_eq!(modules.len(), 2);
    assert_eq!(h.store.list_lessons(&modules[0].id).unwrap().len(), 3);
    let partial = h.store.list_lessons(&modules[1].id).unwrap();
    assert_eq!(partial.len(), 1);
    assert_eq!(partial[0].title, "Lesson 2.1");
    assert!(h.store.list_quiz_questions(&course.id).unwrap().is_empty());

    let logs = h.tracker.logs(&job.id).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].error_details["stage"], "persisting");
}

#[tokio::test]
async fn test_failure_on_quiz_option_leaves_draft() {
    // Fifth option write is question 2, option 2.
    let h = HarnessBuilder::new(vec![Reply::Text(outline_reply(2, 2, 2))])
        .fail_on(WriteKind::QuizOption, 5)
        .build();

    let (job, outcome) = h.orchestrator.run_inline(&admin(), request(2)).await.unwrap();

    assert!(matches!(outcome, RunOutcome::Failed { .. }));
    assert_eq!(job.status, JobStatus::Failed);

    let course = h.store.find_course_by_job(&job.id).unwrap().unwrap();
    assert_eq!(course.status, CourseStatus::Draft);
    assert!(course.published_at.is_none());

    let modules = h.store.list_modules(&course.id).unwrap();
    assert_eq!(modules.len(), 2);
    for module in &modules {
        assert_eq!(h.store.list_lessons(&module.id).unwrap().len(), 2);
    }
    let questions = h.store.list_quiz_questions(&course.id).unwrap();
    assert_eq!(questions.len(), 2);
    assert_eq!(h.store.list_quiz_options(&questions[0].id).unwrap().len(), 3);
    let partial = h.store.list_quiz_options(&questions[1].id).unwrap();
    assert_eq!(partial.len(), 1);
    assert_eq!(partial[0].option_text, "first");

    let logs = h.tracker.logs(&job.id).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].error_details["code"], "STORAGE_ERROR");
}

#[tokio::test]
async fn test_retry_with_smaller_outline_drops_stale_rows() {
    let h = HarnessBuilder::new(vec![
        Reply::Text(outline_reply(3, 3, 1)),
        Reply::Text(outline_reply(1, 1, 0)),
    ])
    .fail_on(WriteKind::Module, 3)
    .build();

    let (job, _) = h.orchestrator.run_inline(&admin(), request(3)).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    let draft = h.store.find_course_by_job(&job.id).unwrap().unwrap();
    assert_eq!(h.store.list_modules(&draft.id).unwrap().len(), 2);

    let (retried, outcome) = h.orchestrator.retry_inline(&job.id).await.unwrap();
    assert_eq!(outcome, RunOutcome::Published { course_id: draft.id });
    assert_eq!(retried.status, JobStatus::Published);

    let modules = h.store.list_modules(&draft.id).unwrap();
    assert_eq!(modules.len(), 1);
    assert_eq!(modules[0].title, "Module 1");
    let lessons = h.store.list_lessons(&modules[0].id).unwrap();
    assert_eq!(lessons.len(), 1);
    assert_eq!(lessons[0].title, "Lesson 1.1");
    assert!(h.store.list_quiz_questions(&draft.id).unwrap().is_empty());
}

#[tokio::test]
async fn test_retry_overwrites_partial_writes() {
    let h = HarnessBuilder::new(vec![
        Reply::Text(outline_reply(3, 2, 1)),
        Reply::Text(outline_reply(3, 2, 1)),
    ])
    .fail_on(WriteKind::Module, 2)
    .build();

    let (job, _) = h.orchestrator.run_inline(&admin(), request(3)).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    let draft = h.store.find_course_by_job(&job.id).unwrap().unwrap();

    let (retried, outcome) = h.orchestrator.retry_inline(&job.id).await.unwrap();
    assert_eq!(outcome, RunOutcome::Published { course_id: draft.id });
    assert_eq!(retried.id, job.id);
    assert_eq!(retried.status, JobStatus::Published);
    assert_eq!(retried.attempts, 2);

    let course = h.store.get_course(&draft.id).unwrap().unwrap();
    assert_eq!(course.status, CourseStatus::Published);
    let modules = h.store.list_modules(&course.id).unwrap();
    assert_eq!(modules.len(), 3);
    assert_eq!(h.store.list_lessons(&modules[0].id).unwrap().len(), 2);
    // The first attempt's failure stays in the log.
    assert_eq!(h.tracker.logs(&job.id).unwrap().len(), 1);

    // Published jobs cannot be retried.
    assert!(matches!(
        h.orchestrator.retry_inline(&job.id).await,
        Err(PipelineError::Validation(_))
    ));
}

#[tokio::test]
async fn test_identical_requests_are_not_deduplicated() {
    let h = harness(vec![
        Reply::Text(outline_reply(2, 1, 0)),
        Reply::Text(outline_reply(2, 1, 0)),
    ]);
    h.orchestrator.start();

    let first = h.orchestrator.submit(&admin(), request(2)).await.unwrap();
    let second = h.orchestrator.submit(&admin(), request(2)).await.unwrap();
    h.orchestrator.wait_for_idle(Some(IDLE_TIMEOUT)).await.unwrap();

    assert_ne!(first.job_id, second.job_id);
    let a = h.store.find_course_by_job(&first.job_id).unwrap().unwrap();
    let b = h.store.find_course_by_job(&second.job_id).unwrap().unwrap();
    assert_ne!(a.id, b.id);
    assert_eq!(a.status, CourseStatus::Published);
    assert_eq!(b.status, CourseStatus::Published);
    assert_eq!(h.provider.calls(), 2);
    h.orchestrator.shutdown(IDLE_TIMEOUT).await;
}

#[tokio::test]
async fn test_panic_is_isolated_to_its_job() {
    let h = HarnessBuilder::new(vec![
        Reply::Panic("provider exploded".to_string()),
        Reply::Text(outline_reply(1, 1, 0)),
    ])
    .queue(QueueConfig {
        workers: 1,
        max_queue_size: 10,
    })
    .build();
    h.orchestrator.start();

    let doomed = h.orchestrator.submit(&admin(), request(1)).await.unwrap();
    let healthy = h.orchestrator.submit(&admin(), request(1)).await.unwrap();
    h.orchestrator.wait_for_idle(Some(IDLE_TIMEOUT)).await.unwrap();

    let failed = h.tracker.get(&doomed.job_id).unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    let logs = h.tracker.logs(&doomed.job_id).unwrap();
    assert_eq!(logs.len(), 1);
    assert!(logs[0].error_message.contains("provider exploded"));
    assert_eq!(logs[0].error_details["code"], "INTERNAL_SERVER_ERROR");

    assert_eq!(
        h.tracker.get(&healthy.job_id).unwrap().status,
        JobStatus::Published
    );
    let stats = h.orchestrator.stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.completed, 1);
    h.orchestrator.shutdown(IDLE_TIMEOUT).await;
}

#[tokio::test]
async fn test_unwritable_log_reports_degraded_outcome() {
    let h = HarnessBuilder::new(vec![Reply::Text("not json".to_string())])
        .unwritable_log()
        .build();
    h.orchestrator.start();

    let ack = h.orchestrator.submit(&admin(), request(1)).await.unwrap();
    h.orchestrator.wait_for_idle(Some(IDLE_TIMEOUT)).await.unwrap();

    // The status flip still lands even though the log row could not be written.
    assert_eq!(h.tracker.get(&ack.job_id).unwrap().status, JobStatus::Failed);
    assert!(h.tracker.logs(&ack.job_id).unwrap().is_empty());
    let stats = h.orchestrator.stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.degraded, 1);
    h.orchestrator.shutdown(IDLE_TIMEOUT).await;
}

#[tokio::test]
async fn test_full_queue_closes_rejected_job() {
    let h = HarnessBuilder::new(vec![])
        .queue(QueueConfig {
            workers: 1,
            max_queue_size: 1,
        })
        .build();

    let accepted = h.orchestrator.submit(&admin(), request(1)).await.unwrap();
    let rejected = h.orchestrator.submit(&admin(), request(1)).await;
    assert!(matches!(rejected, Err(PipelineError::Unavailable(_))));

    let jobs = h.tracker.list().unwrap();
    assert_eq!(jobs.len(), 2);
    let closed = jobs.iter().find(|j| j.id != accepted.job_id).unwrap();
    assert_eq!(closed.status, JobStatus::Failed);
    let logs = h.tracker.logs(&closed.id).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].error_details["stage"], "queue");
    assert_eq!(
        h.tracker.get(&accepted.job_id).unwrap().status,
        JobStatus::Started
    );
}
