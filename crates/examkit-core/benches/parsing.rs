use std::fmt::Write as _;
use std::path::PathBuf;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use examkit_core::parser::parse_exam_str;

fn make_toml(question_count: usize) -> String {
    let mut toml = String::from(
        r#"[exam]
id = "bench"
title = "Benchmark Exam"
duration_minutes = 60
retake_limit = 1
instructor = "bench"
department = "Benchmarks"
"#,
    );

    for i in 0..question_count {
        write!(
            toml,
            r#"
[[questions]]
id = "q{i}"
text = "Question {i}"
kind = "multiple_choice"
points = 2

[[questions.options]]
id = "a"
text = "A"
correct = true

[[questions.options]]
id = "b"
text = "B"
"#
        )
        .unwrap();
    }

    toml
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_exam");
    let path = PathBuf::from("bench.toml");

    for count in [10usize, 50, 200] {
        let toml = make_toml(count);
        group.bench_function(format!("questions={count}"), |b| {
            b.iter(|| parse_exam_str(black_box(&toml), black_box(&path)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parse);
criterion_main!(benches);
