//! Attempt report types with JSON persistence and markdown export.
//!
//! An `AttemptReport` is the record handed to the results and grading
//! surfaces once an attempt has been submitted (and, later, graded).

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::grading::FinalGrade;
use crate::model::{Answer, AttemptStatus, ExamSummary};
use crate::scoring::ScoreReport;

/// A snapshot of one attempt's outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptReport {
    /// The attempt this report describes.
    pub attempt_id: Uuid,
    /// When the report was generated.
    pub created_at: DateTime<Utc>,
    /// Summary of the exam taken.
    pub exam: ExamSummary,
    /// The student who took it.
    pub student_id: String,
    /// Attempt status at report time.
    pub status: AttemptStatus,
    /// The auto-graded (interim) scoring result.
    pub scores: ScoreReport,
    /// The reconciled final grade, present once the attempt is graded.
    #[serde(default)]
    pub final_grade: Option<FinalGrade>,
    /// Proctoring events observed during the attempt.
    pub suspicious_activity_count: u32,
    /// Wall-clock seconds between start and submit.
    #[serde(default)]
    pub time_taken_secs: Option<u64>,
    /// Zero-based retake ordinal of the attempt.
    pub retake_count: u32,
}

impl AttemptReport {
    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: AttemptReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    /// The score to display: the final grade once present, otherwise the
    /// interim auto-graded total.
    pub fn display_score(&self) -> f64 {
        self.final_grade
            .as_ref()
            .map(|g| g.score)
            .unwrap_or(self.scores.total)
    }

    /// Format the report as a markdown summary for instructor export.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!(
            "## {} — attempt {} (retake {})\n\n",
            self.exam.title, self.attempt_id, self.retake_count
        ));
        md.push_str(&format!(
            "**Student:** {} | **Status:** {} | **Score:** {:.1}/{:.1}\n\n",
            self.student_id,
            self.status,
            self.display_score(),
            self.scores.max_total
        ));

        if let Some(grade) = &self.final_grade {
            md.push_str(&format!(
                "**Final:** {:.1}% ({}) — {}\n\n",
                grade.percentage,
                grade.grade,
                if grade.pass { "Pass" } else { "Fail" }
            ));
        } else {
            md.push_str(&format!(
                "**Interim:** {:.1}% ({}) — {} question(s) pending manual grading\n\n",
                self.scores.percentage, self.scores.grade, self.scores.pending_manual
            ));
        }

        if self.suspicious_activity_count > 0 {
            md.push_str(&format!(
                "**Warning:** {} suspicious activities detected during this attempt.\n\n",
                self.suspicious_activity_count
            ));
        }

        md.push_str("| Question | Answer | Verdict | Points |\n");
        md.push_str("|----------|--------|---------|--------|\n");
        for result in &self.scores.per_question {
            let verdict = match result.correct {
                Some(true) => "correct",
                Some(false) => "incorrect",
                None => "pending",
            };
            md.push_str(&format!(
                "| {} | {} | {} | {:.1}/{:.1} |\n",
                result.question_id,
                result.answer.as_ref().map(render_answer).unwrap_or_else(|| "—".into()),
                verdict,
                result.points_awarded,
                result.points_possible
            ));
        }

        md
    }
}

fn render_answer(answer: &Answer) -> String {
    match answer {
        Answer::Choice(id) => id.clone(),
        Answer::Choices(ids) => ids.iter().cloned().collect::<Vec<_>>().join(", "),
        Answer::Text(text) => {
            // Keep the table readable for long essays.
            let mut line = text.replace('\n', " ");
            if line.len() > 60 {
                line.truncate(57);
                line.push_str("...");
            }
            line
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::{GradeLetter, QuestionResult};

    fn make_report(status: AttemptStatus, final_grade: Option<FinalGrade>) -> AttemptReport {
        let scores = ScoreReport {
            per_question: vec![
                QuestionResult {
                    question_id: "q1".into(),
                    answer: Some(Answer::Choice("o1".into())),
                    correct: Some(true),
                    points_awarded: 5.0,
                    points_possible: 5.0,
                },
                QuestionResult {
                    question_id: "q2".into(),
                    answer: Some(Answer::Text("a long-winded derivation".into())),
                    correct: None,
                    points_awarded: 0.0,
                    points_possible: 10.0,
                },
            ],
            total: 5.0,
            max_total: 15.0,
            percentage: 100.0 * 5.0 / 15.0,
            grade: GradeLetter::F,
            pass: false,
            pending_manual: 1,
        };
        AttemptReport {
            attempt_id: Uuid::nil(),
            created_at: Utc::now(),
            exam: ExamSummary {
                id: "exam-1".into(),
                title: "Circuits".into(),
                duration_minutes: 60,
                retake_limit: 1,
                question_count: 2,
                department: "Electrical Engineering".into(),
            },
            student_id: "student-1".into(),
            status,
            scores,
            final_grade,
            suspicious_activity_count: 2,
            time_taken_secs: Some(1800),
            retake_count: 0,
        }
    }

    #[test]
    fn json_roundtrip() {
        let report = make_report(AttemptStatus::Submitted, None);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attempt.json");

        report.save_json(&path).unwrap();
        let loaded = AttemptReport::load_json(&path).unwrap();

        assert_eq!(loaded.exam.id, "exam-1");
        assert_eq!(loaded.scores.per_question.len(), 2);
        assert_eq!(loaded.display_score(), 5.0);
    }

    #[test]
    fn markdown_shows_pending_and_warnings() {
        let report = make_report(AttemptStatus::Submitted, None);
        let md = report.to_markdown();
        assert!(md.contains("pending manual grading"));
        assert!(md.contains("2 suspicious activities"));
        assert!(md.contains("| q1 | o1 | correct | 5.0/5.0 |"));
    }

    #[test]
    fn display_score_prefers_final_grade() {
        let grade = FinalGrade {
            auto_total: 5.0,
            manual_total: 8.0,
            score: 13.0,
            max_total: 15.0,
            percentage: 100.0 * 13.0 / 15.0,
            grade: GradeLetter::B,
            pass: true,
            unmarked: vec![],
            auto_report: make_report(AttemptStatus::Submitted, None).scores,
        };
        let report = make_report(AttemptStatus::Graded, Some(grade));
        assert_eq!(report.display_score(), 13.0);
        assert!(report.to_markdown().contains("Pass"));
    }
}
