//! TOML exam definition parser.
//!
//! Loads exam definitions from TOML files and directories, resolves the
//! answer key for each question from the option flags, and validates the
//! structural invariants.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::InvalidExam;
use crate::model::{AnswerKey, Exam, Question, QuestionKind, QuestionOption};

/// Intermediate TOML structure for parsing exam files.
#[derive(Debug, Deserialize)]
struct TomlExamFile {
    exam: TomlExamHeader,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
}

#[derive(Debug, Deserialize)]
struct TomlExamHeader {
    id: String,
    title: String,
    #[serde(default)]
    description: String,
    duration_minutes: u32,
    #[serde(default)]
    retake_limit: u32,
    instructor: String,
    #[serde(default)]
    department: String,
    #[serde(default)]
    show_answers_after_submit: bool,
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    id: String,
    text: String,
    kind: String,
    points: f64,
    #[serde(default)]
    options: Vec<TomlOption>,
    #[serde(default)]
    answer_text: Option<String>,
    #[serde(default)]
    explanation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TomlOption {
    id: String,
    text: String,
    #[serde(default)]
    correct: bool,
}

/// Parse a single TOML file into an `Exam`.
pub fn parse_exam(path: &Path) -> Result<Exam> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read exam file: {}", path.display()))?;

    parse_exam_str(&content, path)
}

/// Parse a TOML string into an `Exam` (useful for testing).
///
/// Question order indices are assigned densely from authoring order, and
/// each choice question's answer key is resolved once, here, from its
/// option flags.
pub fn parse_exam_str(content: &str, source_path: &Path) -> Result<Exam> {
    let parsed: TomlExamFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let questions = parsed
        .questions
        .into_iter()
        .enumerate()
        .map(|(index, q)| {
            let kind: QuestionKind = q
                .kind
                .parse()
                .map_err(|e: String| anyhow::anyhow!("question '{}': {}", q.id, e))?;

            let options: Vec<QuestionOption> = q
                .options
                .into_iter()
                .map(|o| QuestionOption {
                    id: o.id,
                    text: o.text,
                    correct: o.correct,
                })
                .collect();

            let mut question = Question {
                id: q.id,
                text: q.text,
                kind,
                options,
                points: q.points,
                key: None,
                explanation: q.explanation,
                order_index: index as u32,
            };
            question.key = match kind {
                QuestionKind::ShortAnswer => q.answer_text.map(AnswerKey::Text),
                QuestionKind::Essay => None,
                _ => question.derive_key(),
            };
            Ok(question)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Exam {
        id: parsed.exam.id,
        title: parsed.exam.title,
        description: parsed.exam.description,
        duration_minutes: parsed.exam.duration_minutes,
        retake_limit: parsed.exam.retake_limit,
        questions,
        instructor_id: parsed.exam.instructor,
        department: parsed.exam.department,
        show_answers_after_submit: parsed.exam.show_answers_after_submit,
    })
}

/// Recursively load all `.toml` exam files from a directory.
pub fn load_exam_directory(dir: &Path) -> Result<Vec<Exam>> {
    let mut exams = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            exams.extend(load_exam_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_exam(&path) {
                Ok(exam) => exams.push(exam),
                Err(e) => {
                    tracing::warn!("skipping {}: {}", path.display(), e);
                }
            }
        }
    }

    Ok(exams)
}

/// A non-fatal issue found during exam validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The question id (if applicable).
    pub question_id: Option<String>,
    /// Warning message.
    pub message: String,
}

/// Validate an exam's structural invariants.
///
/// Hard invariant violations (broken answer keys, duplicate ids, bad
/// durations) are errors; advisory issues come back as warnings.
pub fn validate_exam(exam: &Exam) -> Result<Vec<ValidationWarning>, InvalidExam> {
    let mut warnings = Vec::new();

    if exam.duration_minutes == 0 {
        return Err(InvalidExam::new(&exam.id, "duration_minutes must be positive"));
    }

    let mut seen_ids = std::collections::HashSet::new();
    for question in &exam.questions {
        if !seen_ids.insert(&question.id) {
            return Err(InvalidExam::new(
                &exam.id,
                format!("duplicate question id: {}", question.id),
            ));
        }
    }

    for (index, question) in exam.questions.iter().enumerate() {
        if question.order_index != index as u32 {
            return Err(InvalidExam::new(
                &exam.id,
                format!(
                    "question '{}': order_index {} breaks the dense 0-based sequence",
                    question.id, question.order_index
                ),
            ));
        }

        if !question.points.is_finite() || question.points < 0.0 {
            return Err(InvalidExam::new(
                &exam.id,
                format!("question '{}': points must be a non-negative number", question.id),
            ));
        }

        match question.kind {
            QuestionKind::MultipleChoice | QuestionKind::TrueFalse => {
                let correct = question.options.iter().filter(|o| o.correct).count();
                if correct != 1 {
                    return Err(InvalidExam::new(
                        &exam.id,
                        format!(
                            "question '{}': {} requires exactly one correct option, found {}",
                            question.id, question.kind, correct
                        ),
                    ));
                }
                validate_key_references(&exam.id, question)?;
            }
            QuestionKind::MultipleSelect => {
                let correct = question.options.iter().filter(|o| o.correct).count();
                if correct == 0 {
                    return Err(InvalidExam::new(
                        &exam.id,
                        format!(
                            "question '{}': multiple_select requires at least one correct option",
                            question.id
                        ),
                    ));
                }
                validate_key_references(&exam.id, question)?;
            }
            QuestionKind::ShortAnswer | QuestionKind::Essay => {
                if question.key.is_some() {
                    warnings.push(ValidationWarning {
                        question_id: Some(question.id.clone()),
                        message: "answer key on a manually-graded question is informational only"
                            .into(),
                    });
                }
                if !question.options.is_empty() {
                    warnings.push(ValidationWarning {
                        question_id: Some(question.id.clone()),
                        message: "options on a free-response question are ignored".into(),
                    });
                }
            }
        }

        if question.text.trim().is_empty() {
            warnings.push(ValidationWarning {
                question_id: Some(question.id.clone()),
                message: "question text is empty".into(),
            });
        }
        if question.points == 0.0 {
            warnings.push(ValidationWarning {
                question_id: Some(question.id.clone()),
                message: "question is worth zero points".into(),
            });
        }
    }

    if exam.questions.is_empty() {
        warnings.push(ValidationWarning {
            question_id: None,
            message: "exam has no questions".into(),
        });
    }

    Ok(warnings)
}

/// Every option id named by the key must exist on the question.
fn validate_key_references(exam_id: &str, question: &Question) -> Result<(), InvalidExam> {
    let key = question.key.clone().or_else(|| question.derive_key()).ok_or_else(|| {
        InvalidExam::new(exam_id, format!("question '{}': no answer key", question.id))
    })?;

    let known = |id: &String| question.options.iter().any(|o| &o.id == id);
    let ok = match &key {
        AnswerKey::Single(id) => known(id),
        AnswerKey::Set(ids) => ids.iter().all(known),
        AnswerKey::Text(_) => true,
    };
    if !ok {
        return Err(InvalidExam::new(
            exam_id,
            format!(
                "question '{}': answer key references an option that does not exist",
                question.id
            ),
        ));
    }
    Ok(())
}
