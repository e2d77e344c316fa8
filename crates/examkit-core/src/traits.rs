//! Collaborator trait definitions.
//!
//! These async traits are the only seams between the core engine and the
//! surrounding application: persistence, authentication, and transport all
//! live behind them. Implemented by the `examkit-store` crate.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{Answer, Attempt, AttemptStatus, Exam, ExamSummary};

// ---------------------------------------------------------------------------
// Exam repository
// ---------------------------------------------------------------------------

/// Read access to exam definitions.
#[async_trait]
pub trait ExamRepository: Send + Sync {
    /// Load a full exam definition, questions included. The returned exam
    /// is complete; summaries come from `list_exams` and cannot be scored.
    async fn load_exam(&self, exam_id: &str) -> anyhow::Result<Exam>;

    /// List exams without their questions.
    async fn list_exams(&self) -> anyhow::Result<Vec<ExamSummary>>;
}

// ---------------------------------------------------------------------------
// Attempt store
// ---------------------------------------------------------------------------

/// What the backend records when an attempt is submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitReceipt {
    /// The backend's auto-graded score, if it computed one.
    #[serde(default)]
    pub score: Option<f64>,
    /// The attempt status after submission.
    pub status: AttemptStatus,
}

/// Persistence operations for exam attempts.
///
/// The store enforces one open attempt per (student, exam, retake ordinal);
/// the session layer drives the lifecycle through these calls.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Begin a new attempt or return the existing one for the current
    /// retake ordinal. Idempotent: an already-submitted attempt is returned
    /// unchanged so the caller can inspect it.
    async fn start_or_resume_attempt(
        &self,
        student_id: &str,
        exam_id: &str,
    ) -> anyhow::Result<Attempt>;

    /// Persist one answer. Best-effort: the session treats failures as
    /// transient and keeps its local copy authoritative.
    async fn save_answer(
        &self,
        attempt_id: Uuid,
        question_id: &str,
        answer: &Answer,
    ) -> anyhow::Result<()>;

    /// Record the submission of an attempt. Called exactly once per attempt
    /// regardless of how many submit triggers fire.
    async fn submit_attempt(&self, attempt_id: Uuid) -> anyhow::Result<SubmitReceipt>;

    /// Commit the reconciled final grade and status.
    async fn finalize_grade(
        &self,
        attempt_id: Uuid,
        score: f64,
        status: AttemptStatus,
    ) -> anyhow::Result<()>;

    /// Open a fresh attempt at the next retake ordinal. The previous
    /// attempt is retained untouched for audit.
    async fn begin_retake(
        &self,
        student_id: &str,
        exam_id: &str,
        previous_attempt: Uuid,
    ) -> anyhow::Result<Attempt>;
}

// ---------------------------------------------------------------------------
// Suspicious-activity sink
// ---------------------------------------------------------------------------

/// Classification of a suspicious client-side event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    TabSwitch,
    CopyAttempt,
    PasteAttempt,
    RightClickAttempt,
    DevtoolsAttempt,
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityKind::TabSwitch => write!(f, "tab_switch"),
            ActivityKind::CopyAttempt => write!(f, "copy_attempt"),
            ActivityKind::PasteAttempt => write!(f, "paste_attempt"),
            ActivityKind::RightClickAttempt => write!(f, "right_click_attempt"),
            ActivityKind::DevtoolsAttempt => write!(f, "devtools_attempt"),
        }
    }
}

impl FromStr for ActivityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tab_switch" => Ok(ActivityKind::TabSwitch),
            "copy_attempt" => Ok(ActivityKind::CopyAttempt),
            "paste_attempt" => Ok(ActivityKind::PasteAttempt),
            "right_click_attempt" => Ok(ActivityKind::RightClickAttempt),
            "devtools_attempt" => Ok(ActivityKind::DevtoolsAttempt),
            other => Err(format!("unknown activity kind: {other}")),
        }
    }
}

/// Severity attached to a reported activity event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Medium
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Side channel for proctoring events.
///
/// Reporting is fire-and-forget: implementations must not be relied on to
/// succeed, and callers drop events (with a local diagnostic) when the sink
/// is unavailable.
#[async_trait]
pub trait ActivitySink: Send + Sync {
    async fn report_suspicious_activity(
        &self,
        attempt_id: Uuid,
        kind: ActivityKind,
        severity: Severity,
    ) -> anyhow::Result<()>;
}
