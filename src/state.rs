use std::collections::VecDeque;
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

use serde::{Deserialize, Serialize};

pub const MAX_LOGS: usize = 1000;

/* ---------- driver family ---------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocatorType {
    Playwright,
    Selenium,
    #[default]
    Unknown,
}

impl LocatorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocatorType::Playwright => "playwright",
            LocatorType::Selenium => "selenium",
            LocatorType::Unknown => "unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, LocatorType::Unknown)
    }
}

impl fmt::Display for LocatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which stage recovered the locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Message,
    Structural,
    Lexical,
}

/* ---------- input ---------- */

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FailureReport {
    pub failed: bool,
    pub error_text: String,
    pub source_file: Option<PathBuf>,
    pub test_name: String,
    /// Crash line known by the caller (pytest's `path:N:` line).
    #[serde(default)]
    pub line_hint: Option<usize>,
}

impl FailureReport {
    pub fn failed(test_name: impl Into<String>, error_text: impl Into<String>) -> Self {
        Self {
            failed: true,
            error_text: error_text.into(),
            source_file: None,
            test_name: test_name.into(),
            line_hint: None,
        }
    }

    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_file = Some(path.into());
        self
    }

    pub fn with_line_hint(mut self, line: usize) -> Self {
        self.line_hint = Some(line);
        self
    }
}

/* ---------- output ---------- */

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorDiagnostic {
    pub test_file: Option<String>,
    pub test_function: String,
    pub failed_locator: Option<String>,
    pub locator_type: LocatorType,
    pub error_message: String,
    pub line_number: Option<usize>,
    pub page_url: Option<String>,
    pub strategy: Strategy,
}

/// Result of the two-tier source resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLocator {
    pub value: String,
    pub family: LocatorType,
    pub strategy: Strategy,
}

/* ---------- logging ---------- */

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Warn,
    Error,
}

#[derive(Clone, Debug)]
pub struct LogLine {
    pub level: LogLevel,
    pub text: String,
    pub at: Instant,
}

/// Ring buffer of diagnosis log lines.
#[derive(Debug, Default)]
pub struct DiagnosisLog {
    pub lines: VecDeque<LogLine>,
}

impl DiagnosisLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
