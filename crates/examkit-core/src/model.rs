//! Core data model types for examkit.
//!
//! These are the fundamental types the entire examkit system uses to
//! represent exams, questions, student answers, and exam attempts.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of a question, which determines how it is answered and graded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    MultipleChoice,
    MultipleSelect,
    TrueFalse,
    ShortAnswer,
    Essay,
}

impl QuestionKind {
    /// Whether this kind can be scored by exact/set comparison without human
    /// judgment. `ShortAnswer` and `Essay` always require manual grading;
    /// any answer key stored on them is informational only.
    pub fn is_auto_gradable(self) -> bool {
        matches!(
            self,
            QuestionKind::MultipleChoice | QuestionKind::MultipleSelect | QuestionKind::TrueFalse
        )
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionKind::MultipleChoice => write!(f, "multiple_choice"),
            QuestionKind::MultipleSelect => write!(f, "multiple_select"),
            QuestionKind::TrueFalse => write!(f, "true_false"),
            QuestionKind::ShortAnswer => write!(f, "short_answer"),
            QuestionKind::Essay => write!(f, "essay"),
        }
    }
}

impl FromStr for QuestionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "multiple_choice" => Ok(QuestionKind::MultipleChoice),
            "multiple_select" => Ok(QuestionKind::MultipleSelect),
            "true_false" => Ok(QuestionKind::TrueFalse),
            "short_answer" => Ok(QuestionKind::ShortAnswer),
            "essay" => Ok(QuestionKind::Essay),
            other => Err(format!("unknown question kind: {other}")),
        }
    }
}

/// A student's answer to one question.
///
/// The variant is resolved once, at write time, from the question's kind;
/// readers never have to sniff whether a value is a string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Answer {
    /// A single selected option identifier (`MultipleChoice`, `TrueFalse`).
    Choice(String),
    /// A set of selected option identifiers (`MultipleSelect`).
    Choices(BTreeSet<String>),
    /// Free text (`ShortAnswer`, `Essay`).
    Text(String),
}

impl Answer {
    /// An empty selection set or blank text counts as not answered.
    pub fn is_empty(&self) -> bool {
        match self {
            Answer::Choice(id) => id.is_empty(),
            Answer::Choices(ids) => ids.is_empty(),
            Answer::Text(text) => text.trim().is_empty(),
        }
    }

    /// Whether this answer variant is the one a question of `kind` expects.
    pub fn matches_kind(&self, kind: QuestionKind) -> bool {
        matches!(
            (self, kind),
            (Answer::Choice(_), QuestionKind::MultipleChoice)
                | (Answer::Choice(_), QuestionKind::TrueFalse)
                | (Answer::Choices(_), QuestionKind::MultipleSelect)
                | (Answer::Text(_), QuestionKind::ShortAnswer)
                | (Answer::Text(_), QuestionKind::Essay)
        )
    }
}

/// The canonical correct answer for a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AnswerKey {
    /// The single correct option identifier (`MultipleChoice`, `TrueFalse`).
    Single(String),
    /// The full set of correct option identifiers (`MultipleSelect`).
    Set(BTreeSet<String>),
    /// A reference answer for `ShortAnswer`. Informational only, never
    /// auto-scored.
    Text(String),
}

/// One selectable option on a choice-kind question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionOption {
    /// Identifier, unique within the question.
    pub id: String,
    /// Display text.
    pub text: String,
    /// Whether selecting this option is (part of) the correct answer.
    #[serde(default)]
    pub correct: bool,
}

/// An immutable question definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    /// Identifier, unique within the exam.
    pub id: String,
    /// Display text shown to the student.
    pub text: String,
    /// Question kind.
    pub kind: QuestionKind,
    /// Selectable options. Empty for `ShortAnswer` and `Essay`.
    #[serde(default)]
    pub options: Vec<QuestionOption>,
    /// Points awarded for a correct (or fully manually-credited) answer.
    pub points: f64,
    /// Canonical correct answer, resolved from the option flags at parse
    /// time for choice kinds.
    #[serde(default)]
    pub key: Option<AnswerKey>,
    /// Shown to the student after grading, if the exam allows review.
    #[serde(default)]
    pub explanation: Option<String>,
    /// Position within the exam; dense 0-based sequence.
    pub order_index: u32,
}

impl Question {
    /// Derive the answer key from the option `correct` flags.
    ///
    /// Returns `None` for non-choice kinds and for choice questions with no
    /// flagged option (an invariant violation caught by validation).
    pub fn derive_key(&self) -> Option<AnswerKey> {
        match self.kind {
            QuestionKind::MultipleChoice | QuestionKind::TrueFalse => self
                .options
                .iter()
                .find(|o| o.correct)
                .map(|o| AnswerKey::Single(o.id.clone())),
            QuestionKind::MultipleSelect => {
                let set: BTreeSet<String> = self
                    .options
                    .iter()
                    .filter(|o| o.correct)
                    .map(|o| o.id.clone())
                    .collect();
                if set.is_empty() {
                    None
                } else {
                    Some(AnswerKey::Set(set))
                }
            }
            QuestionKind::ShortAnswer | QuestionKind::Essay => None,
        }
    }
}

/// A complete exam definition with all questions loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exam {
    /// Unique identifier.
    pub id: String,
    /// Human-readable title.
    pub title: String,
    /// Description shown on the dashboard.
    #[serde(default)]
    pub description: String,
    /// Exam duration in minutes; the countdown starts from this.
    pub duration_minutes: u32,
    /// How many retakes a failing student is allowed. 0 = none.
    #[serde(default)]
    pub retake_limit: u32,
    /// Questions in presentation order.
    #[serde(default)]
    pub questions: Vec<Question>,
    /// Owning instructor identifier.
    pub instructor_id: String,
    /// Department or category tag.
    #[serde(default)]
    pub department: String,
    /// Whether correct answers are revealed to the student after submit.
    #[serde(default)]
    pub show_answers_after_submit: bool,
}

impl Exam {
    /// Total points across all questions. Derived, never stored.
    pub fn total_points(&self) -> f64 {
        self.questions.iter().map(|q| q.points).sum()
    }

    /// Look up a question by identifier.
    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Collapse to the summary form used for listings.
    pub fn summary(&self) -> ExamSummary {
        ExamSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            duration_minutes: self.duration_minutes,
            retake_limit: self.retake_limit,
            question_count: self.questions.len(),
            department: self.department.clone(),
        }
    }
}

/// An exam without its questions, as returned by listing endpoints.
///
/// Kept as a distinct type so a partially-loaded exam can never reach the
/// scoring engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamSummary {
    pub id: String,
    pub title: String,
    pub duration_minutes: u32,
    pub retake_limit: u32,
    pub question_count: usize,
    pub department: String,
}

/// The set of answers a student has recorded for one attempt.
///
/// One answer per question; the latest write wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseSet(std::collections::BTreeMap<String, Answer>);

impl ResponseSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert the answer for one question.
    pub fn record(&mut self, question_id: impl Into<String>, answer: Answer) {
        self.0.insert(question_id.into(), answer);
    }

    pub fn get(&self, question_id: &str) -> Option<&Answer> {
        self.0.get(question_id)
    }

    /// Number of questions with a non-empty answer.
    pub fn answered_count(&self) -> usize {
        self.0.values().filter(|a| !a.is_empty()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(question_id, answer)` pairs in question-id order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Answer)> {
        self.0.iter()
    }
}

/// Lifecycle status of one exam attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    NotStarted,
    InProgress,
    Submitted,
    Graded,
}

impl AttemptStatus {
    /// Whether the attempt has passed the point of no return for the
    /// student. Responses are frozen in these states.
    pub fn is_closed(self) -> bool {
        matches!(self, AttemptStatus::Submitted | AttemptStatus::Graded)
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptStatus::NotStarted => write!(f, "not_started"),
            AttemptStatus::InProgress => write!(f, "in_progress"),
            AttemptStatus::Submitted => write!(f, "submitted"),
            AttemptStatus::Graded => write!(f, "graded"),
        }
    }
}

impl FromStr for AttemptStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(AttemptStatus::NotStarted),
            "in_progress" => Ok(AttemptStatus::InProgress),
            "submitted" => Ok(AttemptStatus::Submitted),
            "graded" => Ok(AttemptStatus::Graded),
            other => Err(format!("unknown attempt status: {other}")),
        }
    }
}

/// One instance of a student working through one exam.
///
/// Each retake is a separate attempt; prior attempts are retained for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    /// Unique identifier.
    pub id: Uuid,
    /// The student taking the exam.
    pub student_id: String,
    /// The exam being taken.
    pub exam_id: String,
    /// Lifecycle status.
    pub status: AttemptStatus,
    /// The student's answers; authoritative locally while in progress.
    #[serde(default)]
    pub responses: ResponseSet,
    /// Null until at least auto-graded on submit; final after grading.
    #[serde(default)]
    pub score: Option<f64>,
    /// When the student started (or resumed for the first time).
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// When the attempt was submitted.
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    /// Wall-clock seconds between start and submit.
    #[serde(default)]
    pub time_taken_secs: Option<u64>,
    /// Zero-based ordinal of this attempt for (student, exam).
    #[serde(default)]
    pub retake_count: u32,
    /// Proctoring events observed during this attempt.
    #[serde(default)]
    pub suspicious_activity_count: u32,
}

impl Attempt {
    /// A fresh in-progress attempt at the given retake ordinal.
    pub fn new(student_id: impl Into<String>, exam_id: impl Into<String>, retake_count: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            student_id: student_id.into(),
            exam_id: exam_id.into(),
            status: AttemptStatus::InProgress,
            responses: ResponseSet::new(),
            score: None,
            started_at: Some(Utc::now()),
            submitted_at: None,
            time_taken_secs: None,
            retake_count,
            suspicious_activity_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_display_and_parse() {
        assert_eq!(QuestionKind::MultipleChoice.to_string(), "multiple_choice");
        assert_eq!(QuestionKind::Essay.to_string(), "essay");
        assert_eq!(
            "true_false".parse::<QuestionKind>().unwrap(),
            QuestionKind::TrueFalse
        );
        assert_eq!(
            "Multiple_Select".parse::<QuestionKind>().unwrap(),
            QuestionKind::MultipleSelect
        );
        assert!("fill_in_the_blank".parse::<QuestionKind>().is_err());
    }

    #[test]
    fn auto_gradable_kinds() {
        assert!(QuestionKind::MultipleChoice.is_auto_gradable());
        assert!(QuestionKind::MultipleSelect.is_auto_gradable());
        assert!(QuestionKind::TrueFalse.is_auto_gradable());
        assert!(!QuestionKind::ShortAnswer.is_auto_gradable());
        assert!(!QuestionKind::Essay.is_auto_gradable());
    }

    #[test]
    fn empty_answers() {
        assert!(Answer::Choices(BTreeSet::new()).is_empty());
        assert!(Answer::Text("   ".into()).is_empty());
        assert!(!Answer::Choice("o1".into()).is_empty());
        assert!(!Answer::Text("an essay".into()).is_empty());
    }

    #[test]
    fn answer_matches_kind() {
        assert!(Answer::Choice("o1".into()).matches_kind(QuestionKind::MultipleChoice));
        assert!(Answer::Choice("t".into()).matches_kind(QuestionKind::TrueFalse));
        assert!(!Answer::Choice("o1".into()).matches_kind(QuestionKind::MultipleSelect));
        assert!(Answer::Text("x".into()).matches_kind(QuestionKind::Essay));
        assert!(!Answer::Text("x".into()).matches_kind(QuestionKind::MultipleChoice));
    }

    #[test]
    fn answer_serde_is_tagged() {
        let answer = Answer::Choices(["o1".to_string(), "o2".to_string()].into());
        let json = serde_json::to_string(&answer).unwrap();
        assert!(json.contains(r#""type":"choices""#), "got: {json}");
        let back: Answer = serde_json::from_str(&json).unwrap();
        assert_eq!(back, answer);
    }

    #[test]
    fn derive_key_for_choice_kinds() {
        let question = Question {
            id: "q1".into(),
            text: "Pick two".into(),
            kind: QuestionKind::MultipleSelect,
            options: vec![
                QuestionOption { id: "a".into(), text: "A".into(), correct: true },
                QuestionOption { id: "b".into(), text: "B".into(), correct: false },
                QuestionOption { id: "c".into(), text: "C".into(), correct: true },
            ],
            points: 5.0,
            key: None,
            explanation: None,
            order_index: 0,
        };
        let key = question.derive_key().unwrap();
        assert_eq!(key, AnswerKey::Set(["a".to_string(), "c".to_string()].into()));
    }

    #[test]
    fn response_set_latest_write_wins() {
        let mut responses = ResponseSet::new();
        responses.record("q1", Answer::Choice("o1".into()));
        responses.record("q1", Answer::Choice("o2".into()));
        assert_eq!(responses.get("q1"), Some(&Answer::Choice("o2".into())));
        assert_eq!(responses.answered_count(), 1);
    }

    #[test]
    fn total_points_is_derived() {
        let exam = Exam {
            id: "e1".into(),
            title: "Statics".into(),
            description: String::new(),
            duration_minutes: 30,
            retake_limit: 1,
            questions: vec![
                Question {
                    id: "q1".into(),
                    text: "One".into(),
                    kind: QuestionKind::TrueFalse,
                    options: vec![],
                    points: 2.5,
                    key: None,
                    explanation: None,
                    order_index: 0,
                },
                Question {
                    id: "q2".into(),
                    text: "Two".into(),
                    kind: QuestionKind::Essay,
                    options: vec![],
                    points: 7.5,
                    key: None,
                    explanation: None,
                    order_index: 1,
                },
            ],
            instructor_id: "inst-1".into(),
            department: "Civil Engineering".into(),
            show_answers_after_submit: false,
        };
        assert_eq!(exam.total_points(), 10.0);
        assert_eq!(exam.summary().question_count, 2);
    }

    #[test]
    fn status_roundtrip() {
        for status in [
            AttemptStatus::NotStarted,
            AttemptStatus::InProgress,
            AttemptStatus::Submitted,
            AttemptStatus::Graded,
        ] {
            assert_eq!(status.to_string().parse::<AttemptStatus>().unwrap(), status);
        }
        assert!(AttemptStatus::Submitted.is_closed());
        assert!(!AttemptStatus::InProgress.is_closed());
    }
}
