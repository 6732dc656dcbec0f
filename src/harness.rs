//! Pytest runner and failure splitter. Turns raw pytest output into
//! `FailureReport`s for the diagnoser.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

use regex::Regex;
use serde::Serialize;

use crate::detectors::patterns::pick_frame;
use crate::state::FailureReport;

const OUTPUT_LIMIT: usize = 10_000;

#[derive(Debug, Clone, Serialize)]
pub struct TestRun {
    pub command: String,
    pub exit_code: i32,
    pub duration_ms: u128,
    pub success: bool,
    pub passed: usize,
    pub failed: usize,
    pub output: String,
    #[serde(skip)]
    pub raw: String,
}

pub fn run_pytest(repo_root: &Path, target: Option<&str>, base_cmd: &str) -> Result<TestRun, String> {
    let mut command = base_cmd.trim().to_string();
    if command.is_empty() {
        return Err("empty pytest command".to_string());
    }
    let target = target.unwrap_or("").trim();
    if !target.is_empty() {
        command.push(' ');
        command.push_str(target);
    }

    let started = Instant::now();
    let out = Command::new("sh")
        .arg("-lc")
        .arg(&command)
        .current_dir(repo_root)
        .output()
        .map_err(|e| e.to_string())?;
    let duration_ms = started.elapsed().as_millis();

    let mut text = String::new();
    text.push_str(&String::from_utf8_lossy(&out.stdout));
    if !out.stderr.is_empty() {
        if !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&String::from_utf8_lossy(&out.stderr));
    }

    let (passed, failed) = parse_pytest_counts(&text);

    Ok(TestRun {
        command,
        exit_code: out.status.code().unwrap_or(-1),
        duration_ms,
        success: out.status.success(),
        passed,
        failed,
        output: truncate_output(&text),
        raw: text,
    })
}

fn parse_pytest_counts(output: &str) -> (usize, usize) {
    let count = |word: &str| {
        Regex::new(&format!(r"(\d+)\s+{}", word))
            .ok()
            .and_then(|re| {
                re.captures_iter(output)
                    .last()
                    .and_then(|c| c.get(1))
                    .and_then(|m| m.as_str().parse::<usize>().ok())
            })
            .unwrap_or(0)
    };

    (count("passed"), count("failed"))
}

/// Split the FAILURES section of pytest output into one report per test.
///
/// Sections start at `____ test_name ____` headers and end at the next
/// header or the next `====` banner. The first crash line `path.py:N: ...`
/// outside installed packages supplies the source file and line hint.
pub fn split_failures(output: &str) -> Vec<FailureReport> {
    let Ok(header) = Regex::new(r"^_{3,} (.+?) _{3,}$") else {
        return Vec::new();
    };
    let Ok(crash) = Regex::new(r"^([^\s:][^:]*\.py):(\d+):(?:\s|$)") else {
        return Vec::new();
    };

    let mut reports = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;
    let mut in_failures = false;

    for line in output.lines() {
        if line.starts_with('=') {
            if let Some((name, body)) = current.take() {
                reports.push(build_report(name, &body, &crash));
            }
            in_failures = line.contains(" FAILURES ") || line.contains(" ERRORS ");
            continue;
        }
        if !in_failures {
            continue;
        }

        if let Some(c) = header.captures(line) {
            if let Some((name, body)) = current.take() {
                reports.push(build_report(name, &body, &crash));
            }
            current = Some((c[1].trim().to_string(), Vec::new()));
            continue;
        }

        if let Some((_, body)) = current.as_mut() {
            body.push(line);
        }
    }

    if let Some((name, body)) = current.take() {
        reports.push(build_report(name, &body, &crash));
    }

    reports
}

fn build_report(name: String, body: &[&str], crash: &Regex) -> FailureReport {
    let mut report = FailureReport::failed(test_function(&name), body.join("\n").trim().to_string());

    let frames = body.iter().filter_map(|l| {
        let c = crash.captures(l)?;
        let path = c.get(1)?.as_str();
        let line = c.get(2)?.as_str().parse::<usize>().ok()?;
        Some((path, line))
    });
    if let Some((path, line)) = pick_frame(frames) {
        report.source_file = Some(PathBuf::from(path));
        report.line_hint = Some(line);
    }

    report
}

/// `TestCart.test_pay[1.5-x]` -> `test_pay[1.5-x]`. The parameter id is
/// kept whole; only the qualified name before it is split.
fn test_function(header: &str) -> String {
    let (base, params) = match header.find('[') {
        Some(i) if header.ends_with(']') => header.split_at(i),
        _ => (header, ""),
    };
    let short = base.rsplit(['.', ' ']).next().unwrap_or(base);
    format!("{}{}", short, params)
}

fn truncate_output(s: &str) -> String {
    if s.chars().count() <= OUTPUT_LIMIT {
        return s.to_string();
    }

    let tail: String = s
        .chars()
        .rev()
        .take(OUTPUT_LIMIT)
        .collect::<String>()
        .chars()
        .rev()
        .collect();

    format!("...truncated...\n{}", tail)
}
