use std::time::Instant;

use crate::state::{DiagnosisLog, LogLevel, LogLine, MAX_LOGS};

pub fn log(state: &mut DiagnosisLog, level: LogLevel, msg: impl Into<String>) {
    if state.lines.len() >= MAX_LOGS {
        state.lines.pop_front();
    }

    state.lines.push_back(LogLine {
        level,
        text: msg.into(),
        at: Instant::now(),
    });
}

pub fn render(state: &DiagnosisLog) -> String {
    let Some(first) = state.lines.front() else {
        return String::new();
    };
    let origin = first.at;

    let mut out = String::new();
    for line in &state.lines {
        let tag = match line.level {
            LogLevel::Info => "info",
            LogLevel::Success => "ok",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        let ms = line.at.duration_since(origin).as_micros() as f64 / 1000.0;
        out.push_str(&format!("[{:>8.3}ms] {:<5} {}\n", ms, tag, line.text));
    }
    out
}
