//! Failure diagnosis: recover the locator behind a failed browser test.
//!
//! Stages run in order: error-message patterns, then the test source at
//! the failing line, then navigation URL extraction. Every stage degrades
//! to "contributed nothing"; nothing here returns an error.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::{DiagConfig, DEFAULT_MESSAGE_LIMIT};
use crate::detectors::patterns::{
    message_families, navigation, pick_frame, pytest_crash_line, traceback_frame,
};
use crate::detectors::resolve_locator_within;
use crate::logger::log;
use crate::state::{
    DiagnosisLog, FailureReport, LocatorDiagnostic, LocatorType, LogLevel, ResolvedLocator,
    Strategy,
};

/// Read access to test sources, kept outside the diagnoser.
pub trait SourceProvider {
    fn read(&self, path: &Path) -> Result<String, String>;
}

/// Reads sources from disk. Paths that do not exist as given are looked up
/// under `root`, first joined, then by file name.
#[derive(Debug, Clone, Default)]
pub struct FsSource {
    root: Option<PathBuf>,
}

impl FsSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rooted(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn locate(&self, path: &Path) -> Option<PathBuf> {
        if path.is_file() {
            return Some(path.to_path_buf());
        }

        let root = self.root.as_deref()?;
        let joined = root.join(path);
        if joined.is_file() {
            return Some(joined);
        }

        let name = path.file_name()?;
        WalkDir::new(root)
            .max_depth(12)
            .into_iter()
            .filter_entry(|e| !is_ignored(e.path()))
            .filter_map(Result::ok)
            .find(|e| e.file_type().is_file() && e.file_name() == name)
            .map(|e| e.into_path())
    }
}

impl SourceProvider for FsSource {
    fn read(&self, path: &Path) -> Result<String, String> {
        let found = self
            .locate(path)
            .ok_or_else(|| format!("source not found: {}", path.display()))?;
        fs::read_to_string(&found).map_err(|e| e.to_string())
    }
}

fn is_ignored(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| matches!(n, ".git" | ".venv" | "venv" | "node_modules" | "__pycache__" | "target"))
        .unwrap_or(false)
}

pub struct Diagnoser<S> {
    source: S,
    config: DiagConfig,
}

impl<S: SourceProvider> Diagnoser<S> {
    pub fn new(source: S, config: DiagConfig) -> Self {
        Self { source, config }
    }

    pub fn diagnose(&self, report: &FailureReport) -> Option<LocatorDiagnostic> {
        let mut state = DiagnosisLog::new();
        self.diagnose_logged(report, &mut state)
    }

    pub fn diagnose_logged(
        &self,
        report: &FailureReport,
        state: &mut DiagnosisLog,
    ) -> Option<LocatorDiagnostic> {
        if !report.failed || report.error_text.is_empty() {
            return None;
        }
        let text = report.error_text.as_str();
        log(state, LogLevel::Info, format!("diagnose {}", report.test_name));

        // -----------------------------------------------------------------
        // MESSAGE
        // -----------------------------------------------------------------
        let (family, literal) = match match_message(text) {
            Some((family, literal)) => {
                log(state, LogLevel::Info, format!("message matches {} patterns", family));
                (family, literal)
            }
            None => {
                log(state, LogLevel::Info, "no driver pattern in message");
                (LocatorType::Unknown, None)
            }
        };

        let line = failure_line(text, report.line_hint);

        // -----------------------------------------------------------------
        // SOURCE
        // -----------------------------------------------------------------
        let found = match literal {
            Some(value) => Some(ResolvedLocator {
                value,
                family,
                strategy: Strategy::Message,
            }),
            None => self.from_source(report, line, family, state),
        };

        let Some(found) = found else {
            log(state, LogLevel::Warn, "no locator recovered");
            return None;
        };
        log(
            state,
            LogLevel::Success,
            format!("locator {:?} via {:?}", found.value, found.strategy),
        );

        // -----------------------------------------------------------------
        // URL
        // -----------------------------------------------------------------
        let page_url = extract_url(text);
        if let Some(url) = &page_url {
            log(state, LogLevel::Info, format!("page url {}", url));
        }

        let locator_type = if family.is_known() {
            family
        } else {
            found.family
        };

        Some(LocatorDiagnostic {
            test_file: report
                .source_file
                .as_ref()
                .map(|p| p.display().to_string()),
            test_function: report.test_name.clone(),
            failed_locator: Some(found.value),
            locator_type,
            error_message: truncate(text, self.config.message_limit.min(DEFAULT_MESSAGE_LIMIT)),
            line_number: line,
            page_url,
            strategy: found.strategy,
        })
    }

    fn from_source(
        &self,
        report: &FailureReport,
        line: Option<usize>,
        family: LocatorType,
        state: &mut DiagnosisLog,
    ) -> Option<ResolvedLocator> {
        let Some(path) = report.source_file.as_deref() else {
            log(state, LogLevel::Info, "no source file; source stage skipped");
            return None;
        };
        let Some(line) = line else {
            log(state, LogLevel::Warn, "no failing line in error text");
            return None;
        };

        let source = match self.source.read(path) {
            Ok(s) => s,
            Err(e) => {
                log(state, LogLevel::Warn, format!("source stage skipped: {}", e));
                return None;
            }
        };

        log(
            state,
            LogLevel::Info,
            format!("resolve {}:{}", path.display(), line),
        );
        resolve_locator_within(&source, line, family, self.config.window)
    }
}

/// Diagnose with on-disk sources and default settings.
pub fn diagnose(report: &FailureReport) -> Option<LocatorDiagnostic> {
    Diagnoser::new(FsSource::new(), DiagConfig::default()).diagnose(report)
}

/// First family whose patterns match, with the first literal any of that
/// family's patterns capture.
pub fn match_message(text: &str) -> Option<(LocatorType, Option<String>)> {
    for (family, patterns) in message_families() {
        if !patterns.iter().any(|p| p.re.is_match(text)) {
            continue;
        }

        let literal = patterns
            .iter()
            .find_map(|p| p.re.captures(text).and_then(|c| p.value(&c)));
        return Some((family, literal));
    }
    None
}

/// Failing line: the first traceback frame outside installed packages,
/// then the same rule over pytest crash lines, then the caller's hint.
pub fn failure_line(text: &str, hint: Option<usize>) -> Option<usize> {
    let frame_line = |re: Option<&'static regex::Regex>| {
        let frames = re.into_iter().flat_map(|re| re.captures_iter(text)).filter_map(|c| {
            let path = c.get(1)?.as_str();
            let line = c.get(2)?.as_str().parse::<usize>().ok()?;
            Some((path, line))
        });
        pick_frame(frames).map(|(_, line)| line)
    };

    frame_line(traceback_frame())
        .or_else(|| frame_line(pytest_crash_line()))
        .or(hint)
}

pub fn extract_url(text: &str) -> Option<String> {
    navigation()
        .iter()
        .find_map(|p| p.re.captures(text).and_then(|c| p.value(&c)))
}

fn truncate(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}
