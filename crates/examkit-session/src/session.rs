//! The attempt state machine.
//!
//! `ExamSession` owns one student's attempt at one exam and drives it
//! through `InProgress -> Submitted -> Graded`, with retakes as fresh
//! attempts. Collaborators (persistence, proctoring sink) are injected
//! explicitly; the session holds no ambient global state.
//!
//! Concurrency model: one logical thread of control per session. The local
//! response set is authoritative; remote persistence of answers is a
//! best-effort background queue. Only start, submit, and finalize are
//! awaited by callers, because only they gate state-machine progress.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use examkit_core::error::{GradingError, ScoringError, StoreError};
use examkit_core::grading::{self, FinalGrade, ManualMarks};
use examkit_core::model::{Answer, Attempt, AttemptStatus, Exam, QuestionKind};
use examkit_core::report::AttemptReport;
use examkit_core::scoring::{self, ScoreReport, PASS_PERCENTAGE};
use examkit_core::traits::{ActivitySink, AttemptStore};

use crate::proctor::{ActivityEvent, ClientSignal, ProctorMonitor};
use crate::timer::{Countdown, Tick};

/// Errors surfaced by the session layer.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The operation requires an open attempt.
    #[error("attempt is {status}, not in progress")]
    NotInProgress { status: AttemptStatus },

    /// Grading requires a submitted attempt.
    #[error("attempt is {status}; grading requires a submitted attempt")]
    NotSubmitted { status: AttemptStatus },

    /// The answered question is not part of this exam.
    #[error("question '{0}' is not part of this exam")]
    UnknownQuestion(String),

    /// The answer variant does not fit the question's kind.
    #[error("answer shape does not fit {kind} question '{question_id}'")]
    AnswerShape {
        question_id: String,
        kind: QuestionKind,
    },

    /// The retake guard rejected the request.
    #[error("retake not allowed: {0}")]
    RetakeNotAllowed(&'static str),

    /// Starting or resuming the attempt failed. Blocking: answering is not
    /// enabled until start completes.
    #[error("failed to start attempt")]
    Start(#[source] anyhow::Error),

    /// Recording the submission failed. Blocking: the attempt stays open
    /// and the caller may re-trigger explicitly.
    #[error("failed to submit attempt")]
    Submit(#[source] anyhow::Error),

    /// Committing the final grade failed.
    #[error("failed to finalize grade")]
    Finalize(#[source] anyhow::Error),

    #[error(transparent)]
    Scoring(#[from] ScoringError),

    #[error(transparent)]
    Grading(#[from] GradingError),
}

/// What caused a submit transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitTrigger {
    /// The student confirmed submission.
    Student,
    /// The countdown reached zero.
    TimeExpired,
}

// ---------------------------------------------------------------------------
// Answer-sync queue
// ---------------------------------------------------------------------------

enum SyncCommand {
    Save {
        attempt_id: Uuid,
        question_id: String,
        answer: Answer,
    },
    Flush(oneshot::Sender<()>),
}

/// Background queue that persists answers in the order they were recorded.
///
/// One drain task per session: per-question write order is preserved, and a
/// failed persist is logged and dropped rather than blocking further
/// answering.
struct AnswerSync {
    tx: mpsc::UnboundedSender<SyncCommand>,
}

impl AnswerSync {
    fn spawn(store: Arc<dyn AttemptStore>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    SyncCommand::Save {
                        attempt_id,
                        question_id,
                        answer,
                    } => {
                        if let Err(e) = store.save_answer(attempt_id, &question_id, &answer).await {
                            let transient = e
                                .downcast_ref::<StoreError>()
                                .map(StoreError::is_transient)
                                .unwrap_or(true);
                            if transient {
                                tracing::warn!(%attempt_id, question_id, "answer save failed: {e:#}");
                            } else {
                                tracing::error!(%attempt_id, question_id, "answer save rejected: {e:#}");
                            }
                        }
                    }
                    SyncCommand::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
        });
        Self { tx }
    }

    fn enqueue(&self, attempt_id: Uuid, question_id: String, answer: Answer) {
        let _ = self.tx.send(SyncCommand::Save {
            attempt_id,
            question_id,
            answer,
        });
    }

    /// Wait until every save enqueued so far has been attempted.
    async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(SyncCommand::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

// ---------------------------------------------------------------------------
// Exam session
// ---------------------------------------------------------------------------

/// One student's live attempt at one exam.
pub struct ExamSession {
    exam: Arc<Exam>,
    attempt: Attempt,
    countdown: Countdown,
    monitor: ProctorMonitor,
    store: Arc<dyn AttemptStore>,
    sink: Arc<dyn ActivitySink>,
    sync: AnswerSync,
    interim: Option<ScoreReport>,
    final_grade: Option<FinalGrade>,
}

impl std::fmt::Debug for ExamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExamSession").finish_non_exhaustive()
    }
}

impl ExamSession {
    /// Start or resume an attempt.
    ///
    /// Awaited: answering is not enabled until this completes. If the
    /// current-ordinal attempt is already submitted or graded, the session
    /// opens in that closed state for inspection and no new attempt is
    /// created.
    pub async fn start(
        exam: Arc<Exam>,
        student_id: &str,
        store: Arc<dyn AttemptStore>,
        sink: Arc<dyn ActivitySink>,
    ) -> Result<Self, SessionError> {
        if exam.questions.is_empty() {
            return Err(ScoringError::QuestionsNotLoaded(exam.id.clone()).into());
        }
        let attempt = store
            .start_or_resume_attempt(student_id, &exam.id)
            .await
            .map_err(SessionError::Start)?;
        Ok(Self::from_attempt(exam, attempt, store, sink))
    }

    fn from_attempt(
        exam: Arc<Exam>,
        attempt: Attempt,
        store: Arc<dyn AttemptStore>,
        sink: Arc<dyn ActivitySink>,
    ) -> Self {
        let countdown = Countdown::from_minutes(exam.duration_minutes);
        let monitor = ProctorMonitor::new(attempt.id, Arc::clone(&sink));
        let sync = AnswerSync::spawn(Arc::clone(&store));
        // A resumed closed attempt gets its interim report recomputed so
        // results render without another store round-trip.
        let interim = if attempt.status.is_closed() {
            scoring::score(&exam, &attempt.responses).ok()
        } else {
            None
        };
        tracing::info!(
            attempt_id = %attempt.id,
            exam_id = %exam.id,
            status = %attempt.status,
            retake = attempt.retake_count,
            "session opened"
        );
        Self {
            exam,
            attempt,
            countdown,
            monitor,
            store,
            sink,
            sync,
            interim,
            final_grade: None,
        }
    }

    // -- answering ---------------------------------------------------------

    /// Record the student's answer for one question.
    ///
    /// The local response set is updated synchronously and is authoritative;
    /// remote persistence happens in the background, fire-and-forget. The
    /// latest write for a question wins.
    pub fn record_answer(&mut self, question_id: &str, answer: Answer) -> Result<(), SessionError> {
        if self.attempt.status != AttemptStatus::InProgress {
            return Err(SessionError::NotInProgress {
                status: self.attempt.status,
            });
        }
        let question = self
            .exam
            .question(question_id)
            .ok_or_else(|| SessionError::UnknownQuestion(question_id.to_string()))?;
        if !answer.matches_kind(question.kind) {
            return Err(SessionError::AnswerShape {
                question_id: question_id.to_string(),
                kind: question.kind,
            });
        }

        self.attempt.responses.record(question_id, answer.clone());
        self.sync
            .enqueue(self.attempt.id, question_id.to_string(), answer);
        Ok(())
    }

    // -- timer -------------------------------------------------------------

    /// Advance the countdown by one second; submits on expiry.
    ///
    /// A tick arriving after submission (or after a previous expiry) is a
    /// no-op, so the expiry transition fires at most once.
    pub async fn tick(&mut self) -> Result<(), SessionError> {
        if self.attempt.status.is_closed() {
            return Ok(());
        }
        match self.countdown.tick() {
            Tick::Running(_) | Tick::AlreadyExpired => Ok(()),
            Tick::Expired => {
                tracing::info!(attempt_id = %self.attempt.id, "time expired, auto-submitting");
                self.submit(SubmitTrigger::TimeExpired).await.map(|_| ())
            }
        }
    }

    /// Drive the countdown on a one-second interval until the attempt
    /// closes. UI hosts that own their own tick cadence call `tick`
    /// directly instead.
    pub async fn run_timer(&mut self) -> Result<(), SessionError> {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        interval.tick().await;
        while !self.attempt.status.is_closed() {
            interval.tick().await;
            self.tick().await?;
        }
        Ok(())
    }

    /// Seconds left on the clock.
    pub fn remaining_secs(&self) -> u64 {
        self.countdown.remaining()
    }

    // -- submission --------------------------------------------------------

    /// Submit the attempt.
    ///
    /// Idempotent: once submitted, either trigger is a no-op returning the
    /// recorded interim report. On first fire the pending answer saves are
    /// drained, the response set freezes, the scoring engine runs once, and
    /// the store is told exactly once. A store failure leaves the attempt
    /// open; the caller may re-trigger explicitly.
    pub async fn submit(&mut self, trigger: SubmitTrigger) -> Result<ScoreReport, SessionError> {
        if self.attempt.status.is_closed() {
            tracing::debug!(attempt_id = %self.attempt.id, ?trigger, "submit after close is a no-op");
            if let Some(report) = &self.interim {
                return Ok(report.clone());
            }
            let report = scoring::score(&self.exam, &self.attempt.responses)?;
            self.interim = Some(report.clone());
            return Ok(report);
        }

        self.sync.flush().await;
        let report = scoring::score(&self.exam, &self.attempt.responses)?;
        let receipt = self
            .store
            .submit_attempt(self.attempt.id)
            .await
            .map_err(SessionError::Submit)?;

        let submitted_at = Utc::now();
        self.attempt.status = AttemptStatus::Submitted;
        self.attempt.submitted_at = Some(submitted_at);
        self.attempt.time_taken_secs = self
            .attempt
            .started_at
            .map(|started| (submitted_at - started).num_seconds().max(0) as u64);
        self.attempt.suspicious_activity_count = self.monitor.suspicious_count();
        self.attempt.score = Some(receipt.score.unwrap_or(report.total));
        self.interim = Some(report.clone());

        tracing::info!(
            attempt_id = %self.attempt.id,
            ?trigger,
            total = report.total,
            pending_manual = report.pending_manual,
            "attempt submitted"
        );
        Ok(report)
    }

    // -- grading -----------------------------------------------------------

    /// Commit instructor marks and move the attempt to `Graded`.
    ///
    /// The only transition that writes a post-manual score. Idempotent in
    /// the last-write-wins sense: re-finalizing with new marks overwrites
    /// the grade; the caller supplies the complete mark set each time.
    pub async fn finalize(&mut self, marks: &ManualMarks) -> Result<FinalGrade, SessionError> {
        if !self.attempt.status.is_closed() {
            return Err(SessionError::NotSubmitted {
                status: self.attempt.status,
            });
        }

        let grade = grading::reconcile(&self.exam, &self.attempt.responses, marks)?;
        self.store
            .finalize_grade(self.attempt.id, grade.score, AttemptStatus::Graded)
            .await
            .map_err(SessionError::Finalize)?;

        self.attempt.status = AttemptStatus::Graded;
        self.attempt.score = Some(grade.score);
        self.final_grade = Some(grade.clone());

        tracing::info!(
            attempt_id = %self.attempt.id,
            score = grade.score,
            pass = grade.pass,
            "attempt graded"
        );
        Ok(grade)
    }

    // -- retakes -----------------------------------------------------------

    fn latest_pass(&self) -> Option<bool> {
        if let Some(grade) = &self.final_grade {
            return Some(grade.pass);
        }
        // A graded attempt resumed from the store carries its final score.
        if self.attempt.status == AttemptStatus::Graded {
            if let Some(score) = self.attempt.score {
                let max = self.exam.total_points();
                let percentage = if max > 0.0 { 100.0 * score / max } else { 0.0 };
                return Some(percentage >= PASS_PERCENTAGE);
            }
        }
        self.interim.as_ref().map(|report| report.pass)
    }

    fn retake_block_reason(&self) -> Option<&'static str> {
        if !self.attempt.status.is_closed() {
            return Some("attempt is still open");
        }
        if self.latest_pass() != Some(false) {
            return Some("a passed attempt cannot be retaken");
        }
        if self.attempt.retake_count >= self.exam.retake_limit {
            return Some("retake limit reached");
        }
        None
    }

    /// Whether the retake guard would admit a fresh attempt.
    pub fn can_retake(&self) -> bool {
        self.retake_block_reason().is_none()
    }

    /// Open a fresh attempt at the next retake ordinal.
    ///
    /// The current attempt is left untouched for audit; the new session has
    /// empty responses and a fresh countdown.
    pub async fn retake(&self) -> Result<ExamSession, SessionError> {
        if let Some(reason) = self.retake_block_reason() {
            return Err(SessionError::RetakeNotAllowed(reason));
        }
        let attempt = self
            .store
            .begin_retake(&self.attempt.student_id, &self.exam.id, self.attempt.id)
            .await
            .map_err(SessionError::Start)?;
        Ok(Self::from_attempt(
            Arc::clone(&self.exam),
            attempt,
            Arc::clone(&self.store),
            Arc::clone(&self.sink),
        ))
    }

    // -- proctoring --------------------------------------------------------

    /// Feed a raw client signal to the proctoring monitor.
    pub fn observe(&self, signal: ClientSignal) -> Option<ActivityEvent> {
        self.monitor.observe(signal)
    }

    /// Suspicious signals observed during this session.
    pub fn suspicious_count(&self) -> u32 {
        self.monitor
            .suspicious_count()
            .max(self.attempt.suspicious_activity_count)
    }

    // -- inspection --------------------------------------------------------

    pub fn status(&self) -> AttemptStatus {
        self.attempt.status
    }

    pub fn attempt(&self) -> &Attempt {
        &self.attempt
    }

    pub fn exam(&self) -> &Exam {
        &self.exam
    }

    /// The interim auto-graded report, available once submitted.
    pub fn interim_report(&self) -> Option<&ScoreReport> {
        self.interim.as_ref()
    }

    /// The reconciled final grade, available once finalized.
    pub fn final_grade(&self) -> Option<&FinalGrade> {
        self.final_grade.as_ref()
    }

    /// Build the report snapshot for the results and grading surfaces.
    pub fn report(&self) -> Result<AttemptReport, SessionError> {
        let scores = match &self.interim {
            Some(report) => report.clone(),
            None => scoring::score(&self.exam, &self.attempt.responses)?,
        };
        Ok(AttemptReport {
            attempt_id: self.attempt.id,
            created_at: Utc::now(),
            exam: self.exam.summary(),
            student_id: self.attempt.student_id.clone(),
            status: self.attempt.status,
            scores,
            final_grade: self.final_grade.clone(),
            suspicious_activity_count: self.suspicious_count(),
            time_taken_secs: self.attempt.time_taken_secs,
            retake_count: self.attempt.retake_count,
        })
    }
}
