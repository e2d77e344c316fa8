//! The scoring engine.
//!
//! `score` is a pure function from (exam, responses) to a per-question and
//! aggregate result. It is deterministic and side-effect-free; callers may
//! invoke it any number of times (re-render, re-fetch, re-submit) and get
//! identical output for identical input.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ScoringError;
use crate::model::{Answer, AnswerKey, Exam, Question, ResponseSet};

/// Fixed pass threshold, applied to the aggregate percentage.
pub const PASS_PERCENTAGE: f64 = 70.0;

/// Letter grade bands with inclusive lower bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GradeLetter {
    A,
    B,
    C,
    D,
    F,
}

impl GradeLetter {
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= 90.0 {
            GradeLetter::A
        } else if percentage >= 80.0 {
            GradeLetter::B
        } else if percentage >= 70.0 {
            GradeLetter::C
        } else if percentage >= 60.0 {
            GradeLetter::D
        } else {
            GradeLetter::F
        }
    }
}

impl fmt::Display for GradeLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            GradeLetter::A => "A",
            GradeLetter::B => "B",
            GradeLetter::C => "C",
            GradeLetter::D => "D",
            GradeLetter::F => "F",
        };
        write!(f, "{letter}")
    }
}

/// The scoring outcome for one question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionResult {
    /// The question this result belongs to.
    pub question_id: String,
    /// The student's answer, if any was recorded.
    pub answer: Option<Answer>,
    /// `Some(true|false)` for auto-graded questions; `None` when the
    /// question awaits manual grading.
    pub correct: Option<bool>,
    /// Points awarded by the engine. Always 0 for pending-manual questions;
    /// manual credit is added later by reconciliation, never guessed here.
    pub points_awarded: f64,
    /// The question's full point value.
    pub points_possible: f64,
}

/// Aggregate scoring result for one (exam, responses) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreReport {
    /// Per-question results in presentation order.
    pub per_question: Vec<QuestionResult>,
    /// Sum of awarded points (auto-graded portion only).
    pub total: f64,
    /// Sum of all question point values.
    pub max_total: f64,
    /// `100 * total / max_total`, or 0 when `max_total` is 0.
    pub percentage: f64,
    /// Letter grade band for `percentage`.
    pub grade: GradeLetter,
    /// Whether `percentage` clears the fixed pass threshold.
    pub pass: bool,
    /// Number of questions whose correctness cannot be auto-determined.
    pub pending_manual: usize,
}

/// Score an exam against a response set.
///
/// Refuses to score an exam with no questions loaded; callers must supply
/// the full definition from `ExamRepository::load_exam`, never a summary.
/// Responses keyed to questions outside the exam are rejected rather than
/// ignored.
pub fn score(exam: &Exam, responses: &ResponseSet) -> Result<ScoreReport, ScoringError> {
    if exam.questions.is_empty() {
        return Err(ScoringError::QuestionsNotLoaded(exam.id.clone()));
    }
    for (question_id, _) in responses.iter() {
        if exam.question(question_id).is_none() {
            return Err(ScoringError::UnknownQuestion(question_id.clone()));
        }
    }

    let mut per_question = Vec::with_capacity(exam.questions.len());
    let mut total = 0.0;
    let mut pending_manual = 0usize;

    for question in &exam.questions {
        let answer = responses.get(&question.id);
        let result = if question.kind.is_auto_gradable() {
            score_auto(question, answer)?
        } else {
            // Manual kinds are never auto-scored, even when a reference
            // answer is stored on the question.
            pending_manual += 1;
            QuestionResult {
                question_id: question.id.clone(),
                answer: answer.cloned(),
                correct: None,
                points_awarded: 0.0,
                points_possible: question.points,
            }
        };
        total += result.points_awarded;
        per_question.push(result);
    }

    let max_total = exam.total_points();
    let percentage = if max_total > 0.0 {
        100.0 * total / max_total
    } else {
        0.0
    };

    Ok(ScoreReport {
        per_question,
        total,
        max_total,
        percentage,
        grade: GradeLetter::from_percentage(percentage),
        pass: percentage >= PASS_PERCENTAGE,
        pending_manual,
    })
}

fn score_auto(
    question: &Question,
    answer: Option<&Answer>,
) -> Result<QuestionResult, ScoringError> {
    let key = question
        .key
        .clone()
        .or_else(|| question.derive_key())
        .ok_or_else(|| ScoringError::MissingAnswerKey(question.id.clone()))?;

    let correct = match answer {
        None => false,
        Some(a) if a.is_empty() => false,
        Some(a) => answer_matches_key(a, &key),
    };

    Ok(QuestionResult {
        question_id: question.id.clone(),
        answer: answer.cloned(),
        correct: Some(correct),
        points_awarded: if correct { question.points } else { 0.0 },
        points_possible: question.points,
    })
}

/// Exact-identifier match for single-answer keys, set equality for
/// multi-answer keys. No partial credit: any missing or extra selection
/// marks the question wrong. An answer of the wrong shape is wrong.
fn answer_matches_key(answer: &Answer, key: &AnswerKey) -> bool {
    match (answer, key) {
        (Answer::Choice(selected), AnswerKey::Single(correct)) => selected == correct,
        (Answer::Choices(selected), AnswerKey::Set(correct)) => selected == correct,
        // A lone selection on a multi-select question still compares as a set.
        (Answer::Choice(selected), AnswerKey::Set(correct)) => {
            let selected: BTreeSet<String> = std::iter::once(selected.clone()).collect();
            &selected == correct
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{QuestionKind, QuestionOption};

    fn option(id: &str, correct: bool) -> QuestionOption {
        QuestionOption {
            id: id.into(),
            text: id.to_uppercase(),
            correct,
        }
    }

    fn question(id: &str, kind: QuestionKind, points: f64, options: Vec<QuestionOption>) -> Question {
        let mut q = Question {
            id: id.into(),
            text: format!("Question {id}"),
            kind,
            options,
            points,
            key: None,
            explanation: None,
            order_index: 0,
        };
        q.key = q.derive_key();
        q
    }

    fn exam(questions: Vec<Question>) -> Exam {
        let questions = questions
            .into_iter()
            .enumerate()
            .map(|(i, mut q)| {
                q.order_index = i as u32;
                q
            })
            .collect();
        Exam {
            id: "exam-1".into(),
            title: "Thermodynamics I".into(),
            description: String::new(),
            duration_minutes: 45,
            retake_limit: 1,
            questions,
            instructor_id: "inst-1".into(),
            department: "Mechanical Engineering".into(),
            show_answers_after_submit: false,
        }
    }

    #[test]
    fn multiple_choice_exact_match() {
        let exam = exam(vec![question(
            "q1",
            QuestionKind::MultipleChoice,
            5.0,
            vec![option("o1", true), option("o2", false)],
        )]);

        let mut responses = ResponseSet::new();
        responses.record("q1", Answer::Choice("o1".into()));
        let report = score(&exam, &responses).unwrap();
        assert_eq!(report.per_question[0].correct, Some(true));
        assert_eq!(report.total, 5.0);

        let mut responses = ResponseSet::new();
        responses.record("q1", Answer::Choice("o2".into()));
        let report = score(&exam, &responses).unwrap();
        assert_eq!(report.per_question[0].correct, Some(false));
        assert_eq!(report.total, 0.0);
    }

    #[test]
    fn multiple_select_no_partial_credit() {
        let exam = exam(vec![question(
            "q1",
            QuestionKind::MultipleSelect,
            10.0,
            vec![
                option("o1", true),
                option("o2", true),
                option("o3", true),
                option("o4", false),
            ],
        )]);

        let mut responses = ResponseSet::new();
        responses.record(
            "q1",
            Answer::Choices(["o1".to_string(), "o2".to_string()].into()),
        );
        let report = score(&exam, &responses).unwrap();
        assert_eq!(report.per_question[0].correct, Some(false));
        assert_eq!(report.total, 0.0);
    }

    #[test]
    fn multiple_select_extra_selection_is_wrong() {
        let exam = exam(vec![question(
            "q1",
            QuestionKind::MultipleSelect,
            10.0,
            vec![option("o1", true), option("o2", true), option("o3", false)],
        )]);

        let mut responses = ResponseSet::new();
        responses.record(
            "q1",
            Answer::Choices(["o1".to_string(), "o2".to_string(), "o3".to_string()].into()),
        );
        let report = score(&exam, &responses).unwrap();
        assert_eq!(report.per_question[0].correct, Some(false));
    }

    #[test]
    fn multiple_select_exact_set_is_correct() {
        let exam = exam(vec![question(
            "q1",
            QuestionKind::MultipleSelect,
            10.0,
            vec![option("o1", true), option("o2", true), option("o3", false)],
        )]);

        let mut responses = ResponseSet::new();
        responses.record(
            "q1",
            Answer::Choices(["o2".to_string(), "o1".to_string()].into()),
        );
        let report = score(&exam, &responses).unwrap();
        assert_eq!(report.per_question[0].correct, Some(true));
        assert_eq!(report.total, 10.0);
    }

    #[test]
    fn unanswered_auto_gradable_is_wrong() {
        let exam = exam(vec![
            question(
                "q1",
                QuestionKind::TrueFalse,
                2.0,
                vec![option("t", true), option("f", false)],
            ),
            question(
                "q2",
                QuestionKind::MultipleSelect,
                3.0,
                vec![option("a", true), option("b", false)],
            ),
        ]);

        let mut responses = ResponseSet::new();
        // Empty selection counts the same as no answer at all.
        responses.record("q2", Answer::Choices(Default::default()));
        let report = score(&exam, &responses).unwrap();
        assert_eq!(report.per_question[0].correct, Some(false));
        assert_eq!(report.per_question[1].correct, Some(false));
        assert_eq!(report.total, 0.0);
        assert_eq!(report.pending_manual, 0);
    }

    #[test]
    fn manual_kinds_are_never_auto_scored() {
        let mut essay = question("q1", QuestionKind::Essay, 10.0, vec![]);
        // A stored reference answer is informational only.
        essay.key = Some(AnswerKey::Text("model answer".into()));
        let short = question("q2", QuestionKind::ShortAnswer, 5.0, vec![]);
        let exam = exam(vec![essay, short]);

        let mut responses = ResponseSet::new();
        responses.record("q1", Answer::Text("model answer".into()));
        let report = score(&exam, &responses).unwrap();
        assert_eq!(report.per_question[0].correct, None);
        assert_eq!(report.per_question[1].correct, None);
        assert_eq!(report.total, 0.0);
        assert_eq!(report.pending_manual, 2);
    }

    #[test]
    fn zero_max_total_never_divides_by_zero() {
        let exam = exam(vec![question(
            "q1",
            QuestionKind::TrueFalse,
            0.0,
            vec![option("t", true), option("f", false)],
        )]);

        let mut responses = ResponseSet::new();
        responses.record("q1", Answer::Choice("t".into()));
        let report = score(&exam, &responses).unwrap();
        assert_eq!(report.max_total, 0.0);
        assert_eq!(report.percentage, 0.0);
        assert!(report.percentage.is_finite());
        assert!(!report.pass);
    }

    #[test]
    fn scoring_is_deterministic() {
        let exam = exam(vec![
            question(
                "q1",
                QuestionKind::MultipleChoice,
                5.0,
                vec![option("o1", true), option("o2", false)],
            ),
            question("q2", QuestionKind::Essay, 10.0, vec![]),
        ]);
        let mut responses = ResponseSet::new();
        responses.record("q1", Answer::Choice("o1".into()));
        responses.record("q2", Answer::Text("because entropy".into()));

        let first = score(&exam, &responses).unwrap();
        let second = score(&exam, &responses).unwrap();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn grade_banding_inclusive_bounds() {
        assert_eq!(GradeLetter::from_percentage(90.0), GradeLetter::A);
        assert_eq!(GradeLetter::from_percentage(89.9), GradeLetter::B);
        assert_eq!(GradeLetter::from_percentage(80.0), GradeLetter::B);
        assert_eq!(GradeLetter::from_percentage(70.0), GradeLetter::C);
        assert_eq!(GradeLetter::from_percentage(60.0), GradeLetter::D);
        assert_eq!(GradeLetter::from_percentage(59.99), GradeLetter::F);
        assert_eq!(GradeLetter::from_percentage(0.0), GradeLetter::F);
    }

    #[test]
    fn pass_threshold_is_70() {
        let exam = exam(vec![
            question(
                "q1",
                QuestionKind::MultipleChoice,
                7.0,
                vec![option("o1", true), option("o2", false)],
            ),
            question(
                "q2",
                QuestionKind::MultipleChoice,
                3.0,
                vec![option("o1", true), option("o2", false)],
            ),
        ]);
        let mut responses = ResponseSet::new();
        responses.record("q1", Answer::Choice("o1".into()));
        let report = score(&exam, &responses).unwrap();
        assert_eq!(report.percentage, 70.0);
        assert!(report.pass);
        assert_eq!(report.grade, GradeLetter::C);
    }

    #[test]
    fn refuses_unloaded_exam() {
        let exam = exam(vec![]);
        let responses = ResponseSet::new();
        let err = score(&exam, &responses).unwrap_err();
        assert!(matches!(err, ScoringError::QuestionsNotLoaded(_)));
    }

    #[test]
    fn rejects_unknown_question_response() {
        let exam = exam(vec![question(
            "q1",
            QuestionKind::TrueFalse,
            2.0,
            vec![option("t", true), option("f", false)],
        )]);
        let mut responses = ResponseSet::new();
        responses.record("q99", Answer::Choice("t".into()));
        let err = score(&exam, &responses).unwrap_err();
        assert!(matches!(err, ScoringError::UnknownQuestion(id) if id == "q99"));
    }

    #[test]
    fn wrong_answer_shape_is_wrong_not_error() {
        let exam = exam(vec![question(
            "q1",
            QuestionKind::MultipleChoice,
            5.0,
            vec![option("o1", true), option("o2", false)],
        )]);
        let mut responses = ResponseSet::new();
        responses.record("q1", Answer::Text("o1".into()));
        let report = score(&exam, &responses).unwrap();
        assert_eq!(report.per_question[0].correct, Some(false));
    }
}
