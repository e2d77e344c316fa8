//! The `examkit init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    // Create examkit.toml
    if std::path::Path::new("examkit.toml").exists() {
        println!("examkit.toml already exists, skipping.");
    } else {
        std::fs::write("examkit.toml", SAMPLE_CONFIG)?;
        println!("Created examkit.toml");
    }

    // Create example exam
    std::fs::create_dir_all("exams")?;
    let example_path = std::path::Path::new("exams/example.toml");
    if example_path.exists() {
        println!("exams/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_EXAM)?;
        println!("Created exams/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Edit examkit.toml to point at your backend");
    println!("  2. Run: examkit validate --exam exams/example.toml");
    println!("  3. Run: examkit score --exam exams/example.toml --responses responses.json");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# examkit configuration

exam_dir = "./exams"
report_dir = "./examkit-reports"

# In-memory store, suitable for local grading runs.
[store]
type = "memory"

# Point at the REST backend instead:
# [store]
# type = "http"
# base_url = "https://exams.example.edu"
# auth_token = "${EXAMKIT_AUTH_TOKEN}"
"#;

const EXAMPLE_EXAM: &str = r#"[exam]
id = "example-101"
title = "Example Exam"
description = "A short example exam to get started"
duration_minutes = 15
retake_limit = 1
instructor = "inst-1"
department = "Computer Science Engineering"

[[questions]]
id = "q1"
text = "A stack is a FIFO data structure."
kind = "true_false"
points = 2

[[questions.options]]
id = "t"
text = "True"

[[questions.options]]
id = "f"
text = "False"
correct = true

[[questions]]
id = "q2"
text = "Which of these sorts run in O(n log n) on average?"
kind = "multiple_select"
points = 4

[[questions.options]]
id = "merge"
text = "Merge sort"
correct = true

[[questions.options]]
id = "quick"
text = "Quicksort"
correct = true

[[questions.options]]
id = "bubble"
text = "Bubble sort"

[[questions]]
id = "q3"
text = "Explain the difference between a process and a thread."
kind = "essay"
points = 10
"#;
