//! The `examkit grade` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use examkit_core::grading::{self, ManualMarks};
use examkit_core::model::ResponseSet;
use examkit_core::parser;

pub fn execute(
    exam_path: PathBuf,
    responses_path: PathBuf,
    marks_path: PathBuf,
    format: String,
) -> Result<()> {
    let exam = parser::parse_exam(&exam_path)?;
    parser::validate_exam(&exam)?;

    let responses: ResponseSet = serde_json::from_str(
        &std::fs::read_to_string(&responses_path)
            .with_context(|| format!("failed to read responses: {}", responses_path.display()))?,
    )
    .context("failed to parse responses JSON")?;

    let marks: ManualMarks = serde_json::from_str(
        &std::fs::read_to_string(&marks_path)
            .with_context(|| format!("failed to read marks: {}", marks_path.display()))?,
    )
    .context("failed to parse marks JSON")?;

    let grade = grading::reconcile(&exam, &responses, &marks)?;

    match format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&grade)?);
        }
        _ => {
            println!(
                "Final: {:.1}/{:.1} ({:.1}%)  Grade: {}  Result: {}",
                grade.score,
                grade.max_total,
                grade.percentage,
                grade.grade,
                if grade.pass { "Pass" } else { "Fail" }
            );
            println!(
                "  auto-graded: {:.1}  manual: {:.1}",
                grade.auto_total, grade.manual_total
            );
            if !grade.unmarked.is_empty() {
                println!("  unmarked manual questions: {}", grade.unmarked.join(", "));
            }
        }
    }

    Ok(())
}
