//! In-memory store for testing and single-process deployments.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use examkit_core::error::StoreError;
use examkit_core::model::{Answer, Attempt, AttemptStatus, Exam, ExamSummary};
use examkit_core::scoring;
use examkit_core::traits::{
    ActivityKind, ActivitySink, AttemptStore, ExamRepository, Severity, SubmitReceipt,
};

/// One recorded suspicious-activity report.
#[derive(Debug, Clone)]
pub struct RecordedActivity {
    pub attempt_id: Uuid,
    pub kind: ActivityKind,
    pub severity: Severity,
}

/// An in-memory implementation of every collaborator trait.
///
/// Tracks call counts and supports failure injection so session tests can
/// prove which failures are swallowed and which block.
#[derive(Default)]
pub struct MemoryStore {
    exams: Mutex<HashMap<String, Exam>>,
    attempts: Mutex<HashMap<Uuid, Attempt>>,
    /// Attempt ids per (student, exam), ordered by retake ordinal.
    by_owner: Mutex<HashMap<(String, String), Vec<Uuid>>>,
    activities: Mutex<Vec<RecordedActivity>>,

    save_answer_calls: AtomicU32,
    submit_calls: AtomicU32,
    finalize_calls: AtomicU32,
    activity_reports: AtomicU32,

    fail_saves: AtomicBool,
    fail_submit: AtomicBool,
    fail_activity: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor seeding one exam.
    pub fn with_exam(exam: Exam) -> Self {
        let store = Self::new();
        store.insert_exam(exam);
        store
    }

    pub fn insert_exam(&self, exam: Exam) {
        self.exams.lock().unwrap().insert(exam.id.clone(), exam);
    }

    /// Snapshot of an attempt as the store last saw it.
    pub fn attempt(&self, attempt_id: Uuid) -> Option<Attempt> {
        self.attempts.lock().unwrap().get(&attempt_id).cloned()
    }

    /// All suspicious-activity reports received, in arrival order.
    pub fn activities(&self) -> Vec<RecordedActivity> {
        self.activities.lock().unwrap().clone()
    }

    pub fn save_answer_calls(&self) -> u32 {
        self.save_answer_calls.load(Ordering::Relaxed)
    }

    pub fn submit_calls(&self) -> u32 {
        self.submit_calls.load(Ordering::Relaxed)
    }

    pub fn finalize_calls(&self) -> u32 {
        self.finalize_calls.load(Ordering::Relaxed)
    }

    pub fn activity_reports(&self) -> u32 {
        self.activity_reports.load(Ordering::Relaxed)
    }

    /// Make every `save_answer` call fail with a network error.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::Relaxed);
    }

    /// Make every `submit_attempt` call fail with a network error.
    pub fn fail_submit(&self, fail: bool) {
        self.fail_submit.store(fail, Ordering::Relaxed);
    }

    /// Make every activity report fail with a network error.
    pub fn fail_activity(&self, fail: bool) {
        self.fail_activity.store(fail, Ordering::Relaxed);
    }

    fn latest_attempt_id(&self, student_id: &str, exam_id: &str) -> Option<Uuid> {
        self.by_owner
            .lock()
            .unwrap()
            .get(&(student_id.to_string(), exam_id.to_string()))
            .and_then(|ids| ids.last().copied())
    }
}

#[async_trait]
impl ExamRepository for MemoryStore {
    async fn load_exam(&self, exam_id: &str) -> anyhow::Result<Exam> {
        self.exams
            .lock()
            .unwrap()
            .get(exam_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("exam {exam_id}")).into())
    }

    async fn list_exams(&self) -> anyhow::Result<Vec<ExamSummary>> {
        let mut summaries: Vec<ExamSummary> =
            self.exams.lock().unwrap().values().map(Exam::summary).collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(summaries)
    }
}

#[async_trait]
impl AttemptStore for MemoryStore {
    async fn start_or_resume_attempt(
        &self,
        student_id: &str,
        exam_id: &str,
    ) -> anyhow::Result<Attempt> {
        if !self.exams.lock().unwrap().contains_key(exam_id) {
            return Err(StoreError::NotFound(format!("exam {exam_id}")).into());
        }

        if let Some(id) = self.latest_attempt_id(student_id, exam_id) {
            let mut attempts = self.attempts.lock().unwrap();
            let attempt = attempts.get_mut(&id).expect("indexed attempt exists");
            if attempt.status == AttemptStatus::NotStarted {
                attempt.status = AttemptStatus::InProgress;
                attempt.started_at = Some(Utc::now());
            }
            // Submitted and graded attempts come back unchanged so the
            // caller can inspect them.
            return Ok(attempt.clone());
        }

        let attempt = Attempt::new(student_id, exam_id, 0);
        self.by_owner
            .lock()
            .unwrap()
            .entry((student_id.to_string(), exam_id.to_string()))
            .or_default()
            .push(attempt.id);
        self.attempts.lock().unwrap().insert(attempt.id, attempt.clone());
        Ok(attempt)
    }

    async fn save_answer(
        &self,
        attempt_id: Uuid,
        question_id: &str,
        answer: &Answer,
    ) -> anyhow::Result<()> {
        self.save_answer_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_saves.load(Ordering::Relaxed) {
            return Err(StoreError::NetworkError("injected save failure".into()).into());
        }

        let mut attempts = self.attempts.lock().unwrap();
        let attempt = attempts
            .get_mut(&attempt_id)
            .ok_or_else(|| StoreError::NotFound(format!("attempt {attempt_id}")))?;
        if attempt.status != AttemptStatus::InProgress {
            return Err(StoreError::Rejected {
                status: 409,
                message: "attempt is not in progress".into(),
            }
            .into());
        }
        attempt.responses.record(question_id, answer.clone());
        Ok(())
    }

    async fn submit_attempt(&self, attempt_id: Uuid) -> anyhow::Result<SubmitReceipt> {
        self.submit_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_submit.load(Ordering::Relaxed) {
            return Err(StoreError::NetworkError("injected submit failure".into()).into());
        }

        let mut attempts = self.attempts.lock().unwrap();
        let attempt = attempts
            .get_mut(&attempt_id)
            .ok_or_else(|| StoreError::NotFound(format!("attempt {attempt_id}")))?;
        if attempt.status.is_closed() {
            return Ok(SubmitReceipt {
                score: attempt.score,
                status: attempt.status,
            });
        }

        attempt.status = AttemptStatus::Submitted;
        attempt.submitted_at = Some(Utc::now());
        let score = self
            .exams
            .lock()
            .unwrap()
            .get(&attempt.exam_id)
            .and_then(|exam| scoring::score(exam, &attempt.responses).ok())
            .map(|report| report.total);
        attempt.score = score;
        Ok(SubmitReceipt {
            score,
            status: attempt.status,
        })
    }

    async fn finalize_grade(
        &self,
        attempt_id: Uuid,
        score: f64,
        status: AttemptStatus,
    ) -> anyhow::Result<()> {
        self.finalize_calls.fetch_add(1, Ordering::Relaxed);

        let mut attempts = self.attempts.lock().unwrap();
        let attempt = attempts
            .get_mut(&attempt_id)
            .ok_or_else(|| StoreError::NotFound(format!("attempt {attempt_id}")))?;
        if attempt.status == AttemptStatus::InProgress {
            return Err(StoreError::Rejected {
                status: 409,
                message: "cannot grade an open attempt".into(),
            }
            .into());
        }
        attempt.score = Some(score);
        attempt.status = status;
        Ok(())
    }

    async fn begin_retake(
        &self,
        student_id: &str,
        exam_id: &str,
        previous_attempt: Uuid,
    ) -> anyhow::Result<Attempt> {
        let previous = self
            .attempts
            .lock()
            .unwrap()
            .get(&previous_attempt)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("attempt {previous_attempt}")))?;
        if !previous.status.is_closed() {
            return Err(StoreError::Rejected {
                status: 409,
                message: "previous attempt is still open".into(),
            }
            .into());
        }

        let attempt = Attempt::new(student_id, exam_id, previous.retake_count + 1);
        self.by_owner
            .lock()
            .unwrap()
            .entry((student_id.to_string(), exam_id.to_string()))
            .or_default()
            .push(attempt.id);
        self.attempts.lock().unwrap().insert(attempt.id, attempt.clone());
        Ok(attempt)
    }
}

#[async_trait]
impl ActivitySink for MemoryStore {
    async fn report_suspicious_activity(
        &self,
        attempt_id: Uuid,
        kind: ActivityKind,
        severity: Severity,
    ) -> anyhow::Result<()> {
        self.activity_reports.fetch_add(1, Ordering::Relaxed);
        if self.fail_activity.load(Ordering::Relaxed) {
            return Err(StoreError::NetworkError("injected activity failure".into()).into());
        }

        if let Some(attempt) = self.attempts.lock().unwrap().get_mut(&attempt_id) {
            attempt.suspicious_activity_count += 1;
        }
        self.activities.lock().unwrap().push(RecordedActivity {
            attempt_id,
            kind,
            severity,
        });
        Ok(())
    }
}
