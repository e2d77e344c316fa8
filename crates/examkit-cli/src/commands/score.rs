//! The `examkit score` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use examkit_core::model::ResponseSet;
use examkit_core::parser;
use examkit_core::scoring;

pub fn execute(exam_path: PathBuf, responses_path: PathBuf, format: String) -> Result<()> {
    let exam = parser::parse_exam(&exam_path)?;
    parser::validate_exam(&exam)?;

    let content = std::fs::read_to_string(&responses_path)
        .with_context(|| format!("failed to read responses: {}", responses_path.display()))?;
    let responses: ResponseSet =
        serde_json::from_str(&content).context("failed to parse responses JSON")?;

    let report = scoring::score(&exam, &responses)?;

    match format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            print_table(&exam.title, &report);
        }
    }

    Ok(())
}

fn print_table(title: &str, report: &examkit_core::scoring::ScoreReport) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec!["Question", "Verdict", "Points"]);

    for result in &report.per_question {
        let verdict = match result.correct {
            Some(true) => "correct",
            Some(false) => "incorrect",
            None => "pending manual",
        };
        table.add_row(vec![
            Cell::new(&result.question_id),
            Cell::new(verdict),
            Cell::new(format!(
                "{:.1}/{:.1}",
                result.points_awarded, result.points_possible
            )),
        ]);
    }

    println!("{title}");
    println!("{table}");
    println!(
        "Score: {:.1}/{:.1} ({:.1}%)  Grade: {}  Result: {}",
        report.total,
        report.max_total,
        report.percentage,
        report.grade,
        if report.pass { "Pass" } else { "Fail" }
    );
    if report.pending_manual > 0 {
        println!(
            "{} question(s) require manual grading; the final score may change.",
            report.pending_manual
        );
    }
}
