//! Grading reconciliation.
//!
//! Merges the auto-computed score with instructor-entered manual marks for
//! free-response questions into a final grade. The auto portion is always
//! recomputed from the exam and responses; a cached score is never trusted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::GradingError;
use crate::model::{Exam, ResponseSet};
use crate::scoring::{self, GradeLetter, ScoreReport, PASS_PERCENTAGE};

/// An instructor's mark for one manually-graded question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualMark {
    /// Points awarded; must lie in `[0, question.points]`.
    pub points: f64,
    /// Optional feedback shown to the student.
    #[serde(default)]
    pub feedback: Option<String>,
}

/// The complete set of marks for one finalize call, keyed by question id.
///
/// Finalize is last-write-wins: the caller supplies the full current set
/// each time; marks omitted from a later call are *not* carried over.
pub type ManualMarks = BTreeMap<String, ManualMark>;

/// The reconciled final grade for an attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalGrade {
    /// Points from auto-graded questions, freshly recomputed.
    pub auto_total: f64,
    /// Sum of accepted manual marks.
    pub manual_total: f64,
    /// `auto_total + manual_total`.
    pub score: f64,
    /// Sum of all question point values.
    pub max_total: f64,
    /// Percentage of `score` against `max_total` (0 when `max_total` is 0).
    pub percentage: f64,
    /// Letter grade band for the final percentage.
    pub grade: GradeLetter,
    /// Whether the final percentage clears the pass threshold.
    pub pass: bool,
    /// Manually-graded questions the caller supplied no mark for. These
    /// contribute 0 and are surfaced so an omission is visible, never silent.
    pub unmarked: Vec<String>,
    /// The recomputed auto-graded report the final grade was built from.
    pub auto_report: ScoreReport,
}

/// Reconcile instructor marks with the recomputed auto score.
///
/// Marks supplied for auto-gradable questions are ignored (the engine's
/// verdict stands); marks for unknown questions and marks outside
/// `[0, points]` are rejected outright.
pub fn reconcile(
    exam: &Exam,
    responses: &ResponseSet,
    marks: &ManualMarks,
) -> Result<FinalGrade, GradingError> {
    let auto_report = scoring::score(exam, responses)?;

    let mut manual_total = 0.0;
    for (question_id, mark) in marks {
        let question = exam
            .question(question_id)
            .ok_or_else(|| GradingError::UnknownQuestion(question_id.clone()))?;

        if question.kind.is_auto_gradable() {
            tracing::warn!(
                question_id = %question_id,
                "ignoring manual mark for auto-gradable question"
            );
            continue;
        }

        if !mark.points.is_finite() || mark.points < 0.0 || mark.points > question.points {
            return Err(GradingError::MarkOutOfRange {
                question_id: question_id.clone(),
                given: mark.points,
                max: question.points,
            });
        }

        manual_total += mark.points;
    }

    let unmarked: Vec<String> = exam
        .questions
        .iter()
        .filter(|q| !q.kind.is_auto_gradable() && !marks.contains_key(&q.id))
        .map(|q| q.id.clone())
        .collect();
    if !unmarked.is_empty() {
        tracing::warn!(count = unmarked.len(), "finalizing with unmarked manual questions");
    }

    let score = auto_report.total + manual_total;
    let max_total = auto_report.max_total;
    let percentage = if max_total > 0.0 {
        100.0 * score / max_total
    } else {
        0.0
    };

    Ok(FinalGrade {
        auto_total: auto_report.total,
        manual_total,
        score,
        max_total,
        percentage,
        grade: GradeLetter::from_percentage(percentage),
        pass: percentage >= PASS_PERCENTAGE,
        unmarked,
        auto_report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Answer, Question, QuestionKind, QuestionOption};

    fn exam() -> Exam {
        Exam {
            id: "exam-1".into(),
            title: "Circuits".into(),
            description: String::new(),
            duration_minutes: 60,
            retake_limit: 0,
            questions: vec![
                Question {
                    id: "mc".into(),
                    text: "Ohm's law".into(),
                    kind: QuestionKind::MultipleChoice,
                    options: vec![
                        QuestionOption { id: "o1".into(), text: "V=IR".into(), correct: true },
                        QuestionOption { id: "o2".into(), text: "V=I/R".into(), correct: false },
                    ],
                    points: 5.0,
                    key: None,
                    explanation: None,
                    order_index: 0,
                },
                Question {
                    id: "essay".into(),
                    text: "Explain superposition".into(),
                    kind: QuestionKind::Essay,
                    options: vec![],
                    points: 10.0,
                    key: None,
                    explanation: None,
                    order_index: 1,
                },
            ],
            instructor_id: "inst-1".into(),
            department: "Electrical Engineering".into(),
            show_answers_after_submit: false,
        }
    }

    fn responses() -> ResponseSet {
        let mut responses = ResponseSet::new();
        responses.record("mc", Answer::Choice("o1".into()));
        responses.record("essay", Answer::Text("each source in turn".into()));
        responses
    }

    fn mark(points: f64) -> ManualMark {
        ManualMark { points, feedback: None }
    }

    #[test]
    fn adds_manual_marks_to_recomputed_auto_total() {
        let marks = ManualMarks::from([("essay".to_string(), mark(8.0))]);
        let grade = reconcile(&exam(), &responses(), &marks).unwrap();
        assert_eq!(grade.auto_total, 5.0);
        assert_eq!(grade.manual_total, 8.0);
        assert_eq!(grade.score, 13.0);
        assert_eq!(grade.max_total, 15.0);
        assert!(grade.unmarked.is_empty());
        assert!(grade.pass);
    }

    #[test]
    fn reconcile_is_idempotent() {
        let marks = ManualMarks::from([(
            "essay".to_string(),
            ManualMark { points: 8.0, feedback: Some("solid".into()) },
        )]);
        let first = reconcile(&exam(), &responses(), &marks).unwrap();
        let second = reconcile(&exam(), &responses(), &marks).unwrap();
        assert_eq!(first.score, second.score);
        assert_eq!(first.manual_total, second.manual_total);
    }

    #[test]
    fn mark_above_question_points_is_rejected() {
        let marks = ManualMarks::from([("essay".to_string(), mark(11.0))]);
        let err = reconcile(&exam(), &responses(), &marks).unwrap_err();
        assert!(matches!(err, GradingError::MarkOutOfRange { given, max, .. }
            if given == 11.0 && max == 10.0));
    }

    #[test]
    fn negative_mark_is_rejected() {
        let marks = ManualMarks::from([("essay".to_string(), mark(-1.0))]);
        assert!(matches!(
            reconcile(&exam(), &responses(), &marks),
            Err(GradingError::MarkOutOfRange { .. })
        ));
    }

    #[test]
    fn mark_for_unknown_question_is_rejected() {
        let marks = ManualMarks::from([("nope".to_string(), mark(3.0))]);
        assert!(matches!(
            reconcile(&exam(), &responses(), &marks),
            Err(GradingError::UnknownQuestion(id)) if id == "nope"
        ));
    }

    #[test]
    fn mark_for_auto_gradable_question_is_ignored() {
        let marks = ManualMarks::from([
            ("mc".to_string(), mark(5.0)),
            ("essay".to_string(), mark(4.0)),
        ]);
        let grade = reconcile(&exam(), &responses(), &marks).unwrap();
        // The mc mark must not double-count on top of the auto verdict.
        assert_eq!(grade.score, 9.0);
        assert_eq!(grade.manual_total, 4.0);
    }

    #[test]
    fn omitted_mark_is_surfaced_not_silent() {
        let marks = ManualMarks::new();
        let grade = reconcile(&exam(), &responses(), &marks).unwrap();
        assert_eq!(grade.score, 5.0);
        assert_eq!(grade.unmarked, vec!["essay".to_string()]);
    }

    #[test]
    fn boundary_marks_are_accepted() {
        for points in [0.0, 10.0] {
            let marks = ManualMarks::from([("essay".to_string(), mark(points))]);
            let grade = reconcile(&exam(), &responses(), &marks).unwrap();
            assert_eq!(grade.manual_total, points);
        }
    }
}
