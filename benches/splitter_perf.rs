//! Performance benchmarks for the hot decision path.
//!
//! Run with: `cargo bench --bench splitter_perf`
//!
//! The gate runs once per candidate command inside an interactive loop, so
//! the full pipeline should stay well under a millisecond for ordinary
//! commands.

use std::fmt::Write as _;

use command_safety_gate::config::GateConfig;
use command_safety_gate::gate::Gate;
use command_safety_gate::heredoc::strip_heredoc_bodies;
use command_safety_gate::normalize::normalize_segment;
use command_safety_gate::splitter::{OpaqueSplitter, Segmenter};
use command_safety_gate::transparent::TransparentSplitter;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

const SIMPLE: &str = "git status --short";

const CHAINED: &str =
    "cd /tmp && sudo env FOO=bar make install ; cat results.txt | grep -v noise || echo failed";

const NESTED: &str = r#"echo "deploy: $(git describe --tags $(git rev-parse HEAD)) at `date`""#;

fn heredoc_input(lines: usize) -> String {
    let mut content = String::from("cat <<EOF\n");
    for i in 0..lines {
        let _ = writeln!(content, "body line {i} with some filler text");
    }
    content.push_str("EOF\necho after");
    content
}

fn deeply_nested(depth: usize) -> String {
    let mut s = "echo ".to_string();
    for _ in 0..depth {
        s.push_str("$(");
    }
    s.push_str("date");
    for _ in 0..depth {
        s.push(')');
    }
    s
}

fn bench_splitters(c: &mut Criterion) {
    let mut group = c.benchmark_group("split");
    let opaque = OpaqueSplitter::new();
    let transparent = TransparentSplitter::new();
    for (name, input) in [
        ("simple", SIMPLE.to_string()),
        ("chained", CHAINED.to_string()),
        ("nested", NESTED.to_string()),
        ("deep_64", deeply_nested(64)),
    ] {
        group.bench_with_input(BenchmarkId::new("opaque", name), &input, |b, input| {
            b.iter(|| opaque.split(std::hint::black_box(input)));
        });
        group.bench_with_input(BenchmarkId::new("transparent", name), &input, |b, input| {
            b.iter(|| transparent.split(std::hint::black_box(input)));
        });
    }
    group.finish();
}

fn bench_heredoc_strip(c: &mut Criterion) {
    let mut group = c.benchmark_group("heredoc_strip");
    for lines in [5usize, 50, 500] {
        let input = heredoc_input(lines);
        group.bench_with_input(BenchmarkId::from_parameter(lines), &input, |b, input| {
            b.iter(|| strip_heredoc_bodies(std::hint::black_box(input)));
        });
    }
    group.finish();
}

fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");
    for (name, input) in [
        ("plain", "git status"),
        ("wrapped", "sudo -u deploy env RUST_LOG=debug timeout 30 cargo build"),
        ("pm_flags", "npm --prefix ./app --silent install leftpad"),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(name), input, |b, input| {
            b.iter(|| normalize_segment(std::hint::black_box(input)));
        });
    }
    group.finish();
}

fn bench_full_pipeline(c: &mut Criterion) {
    let gate = Gate::new(GateConfig::builtin_only());
    let mut group = c.benchmark_group("evaluate_command");
    for (name, input) in [
        ("allow_simple", SIMPLE.to_string()),
        ("allow_chained", CHAINED.to_string()),
        ("deny_sensitive", "cat /etc/shadow".to_string()),
        ("deny_hidden", "X=$(cat ~/.ssh/id_rsa)".to_string()),
        ("heredoc_500", heredoc_input(500)),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(name), &input, |b, input| {
            b.iter(|| gate.evaluate_command(std::hint::black_box(input)));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_splitters,
    bench_heredoc_strip,
    bench_normalize,
    bench_full_pipeline
);
criterion_main!(benches);
