//! The `examkit report` command.

use std::path::PathBuf;

use anyhow::Result;

use examkit_core::report::AttemptReport;

pub fn execute(attempt_path: PathBuf, format: String) -> Result<()> {
    let report = AttemptReport::load_json(&attempt_path)?;

    match format.as_str() {
        "markdown" | "md" => {
            println!("{}", report.to_markdown());
        }
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            println!(
                "{} — {} (retake {})",
                report.exam.title, report.student_id, report.retake_count
            );
            println!(
                "Status: {}  Score: {:.1}/{:.1}",
                report.status,
                report.display_score(),
                report.scores.max_total
            );
            if let Some(grade) = &report.final_grade {
                println!(
                    "Final: {:.1}% ({}) — {}",
                    grade.percentage,
                    grade.grade,
                    if grade.pass { "Pass" } else { "Fail" }
                );
            } else if report.scores.pending_manual > 0 {
                println!(
                    "{} question(s) pending manual grading",
                    report.scores.pending_manual
                );
            }
            if report.suspicious_activity_count > 0 {
                println!(
                    "Warning: {} suspicious activities detected",
                    report.suspicious_activity_count
                );
            }
        }
    }

    Ok(())
}
