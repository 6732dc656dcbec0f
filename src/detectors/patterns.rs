//! detectors/patterns.rs
//!
//! Declarative regex tables used by the diagnoser and the lexical resolver.
//! Each table is an ordered list of `(pattern, extraction rule)` pairs;
//! order is significant everywhere it is consumed.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::state::LocatorType;

/// How a matched pattern turns into a locator value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extract {
    /// Group 1 if it participated, else group 2.
    Capture,
    /// Same as `Capture`, prefixed with a locator engine tag.
    Prefixed(&'static str),
    /// Same as `Capture`, with JSON-style `\"` and `\\` escapes undone.
    Unescaped,
    /// Classifies the text; carries no value.
    Flag,
}

#[derive(Debug)]
pub struct Pattern {
    pub re: Regex,
    pub extract: Extract,
}

impl Pattern {
    pub fn value(&self, caps: &Captures) -> Option<String> {
        let raw = || {
            caps.get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str().to_string())
        };

        match self.extract {
            Extract::Flag => None,
            Extract::Capture => raw(),
            Extract::Prefixed(prefix) => raw().map(|v| format!("{}{}", prefix, v)),
            Extract::Unescaped => raw().map(|v| v.replace("\\\"", "\"").replace("\\\\", "\\")),
        }
    }
}

/* ============================================================
   Raw tables
   ============================================================ */

const PLAYWRIGHT_SOURCE: &[(&str, Extract)] = &[
    (r#"\.locator\(\s*(?:"([^"\n]+)"|'([^'\n]+)')"#, Extract::Capture),
    (
        r#"(?:"([^"\n]*:has-text\([^)\n]*\)[^"\n]*)"|'([^'\n]*:has-text\([^)\n]*\)[^'\n]*)')"#,
        Extract::Capture,
    ),
    (r#"\.get_by_text\(\s*(?:"([^"\n]+)"|'([^'\n]+)')"#, Extract::Prefixed("text=")),
    (r#"\.get_by_role\(\s*(?:"([^"\n]+)"|'([^'\n]+)')"#, Extract::Prefixed("role=")),
];

const SELENIUM_SOURCE: &[(&str, Extract)] = &[
    (
        r#"find_element\(\s*By\.[A-Z_]+\s*,\s*(?:"([^"\n]+)"|'([^'\n]+)')"#,
        Extract::Capture,
    ),
    (
        r#"find_element\(\s*[^,()\n]+,\s*(?:"([^"\n]+)"|'([^'\n]+)')"#,
        Extract::Capture,
    ),
    (
        r#"find_elements\(\s*[^,()\n]+,\s*(?:"([^"\n]+)"|'([^'\n]+)')"#,
        Extract::Capture,
    ),
    (
        r#"find_element_by_[a-z_]+\(\s*(?:"([^"\n]+)"|'([^'\n]+)')"#,
        Extract::Capture,
    ),
];

// Capturing patterns come before the bare classifiers.
const PLAYWRIGHT_MESSAGE: &[(&str, Extract)] = &[
    (
        r#"(?:TimeoutError|waiting for)[^\n]*?locator\(\s*(?:"([^"\n]+)"|'([^'\n]+)')\s*\)"#,
        Extract::Capture,
    ),
    (
        r#"waiting for selector\s+(?:"([^"\n]+)"|'([^'\n]+)')"#,
        Extract::Capture,
    ),
    (r#"waiting for (get_by_\w+\([^\n]*\))"#, Extract::Capture),
    (r#"TimeoutError"#, Extract::Flag),
    (r#"Timeout \d+ms exceeded"#, Extract::Flag),
];

const SELENIUM_MESSAGE: &[(&str, Extract)] = &[
    (
        r#"Unable to locate element:\s*\{\s*"method"\s*:\s*"[^"]*"\s*,\s*"selector"\s*:\s*"((?:[^"\\]|\\.)*)""#,
        Extract::Unescaped,
    ),
    (r#"NoSuchElementException"#, Extract::Flag),
    (r#"no such element"#, Extract::Flag),
    (r#"TimeoutException"#, Extract::Flag),
];

const NAVIGATION: &[(&str, Extract)] = &[
    (r#"navigating to (?:"([^"\n]+)"|'([^'\n]+)')"#, Extract::Capture),
    (r#"url:\s*(?:"([^"\n]+)"|'([^'\n]+)')"#, Extract::Capture),
    (r#"\.goto\(\s*(?:"([^"\n]+)"|'([^'\n]+)')"#, Extract::Capture),
    (r#"driver\.get\(\s*(?:"([^"\n]+)"|'([^'\n]+)')"#, Extract::Capture),
];

// Rewrite templates. `{q}` is the quote, `{old}` the escaped old value.
// Groups: 1 call prefix, 2 text before, 3 text after, 4 call suffix.
// Within a family the first template that matches is the one applied.
pub const PLAYWRIGHT_REWRITE: &[&str] = &[
    r#"(page\.locator\(\s*){q}([^{q}\n]*?){old}([^{q}\n]*){q}(\s*[,)])"#,
    r#"(\.locator\(\s*){q}([^{q}\n]*?){old}([^{q}\n]*){q}(\s*[,)])"#,
];

pub const SELENIUM_REWRITE: &[&str] = &[
    r#"(find_element\(\s*[^,()\n]+,\s*){q}(){old}(){q}(\s*\))"#,
    r#"(find_elements\(\s*[^,()\n]+,\s*){q}(){old}(){q}(\s*\))"#,
];

/// Engine-tagged values map back to the call that produced them.
pub const PREFIXED_REWRITE: &[(&str, &str)] = &[
    ("text=", r#"(\.get_by_text\(\s*){q}(){old}(){q}(\s*[,)])"#),
    ("role=", r#"(\.get_by_role\(\s*){q}(){old}(){q}(\s*[,)])"#),
];

pub const QUOTES: [char; 2] = ['"', '\''];

const TRACEBACK_FRAME: &str = r#"File "([^"\n]+)", line (\d+)"#;
const PYTEST_CRASH_LINE: &str = r#"(?m)^([^\s:][^:\n]*\.py):(\d+):"#;

/* ============================================================
   Compiled tables
   ============================================================ */

fn compile(table: &[(&str, Extract)]) -> Vec<Pattern> {
    table
        .iter()
        .filter_map(|(src, extract)| {
            Regex::new(src).ok().map(|re| Pattern {
                re,
                extract: *extract,
            })
        })
        .collect()
}

macro_rules! table {
    ($name:ident, $raw:ident) => {
        pub fn $name() -> &'static [Pattern] {
            static CELL: OnceLock<Vec<Pattern>> = OnceLock::new();
            CELL.get_or_init(|| compile($raw))
        }
    };
}

table!(playwright_source, PLAYWRIGHT_SOURCE);
table!(selenium_source, SELENIUM_SOURCE);
table!(playwright_message, PLAYWRIGHT_MESSAGE);
table!(selenium_message, SELENIUM_MESSAGE);
table!(navigation, NAVIGATION);

pub fn traceback_frame() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    CELL.get_or_init(|| Regex::new(TRACEBACK_FRAME).ok()).as_ref()
}

pub fn pytest_crash_line() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    CELL.get_or_init(|| Regex::new(PYTEST_CRASH_LINE).ok()).as_ref()
}

/// Instantiate a rewrite template for one quote style and a literal old
/// value.
pub fn rewrite_pattern(template: &str, quote: char, old: &str) -> Option<Regex> {
    let q = regex::escape(quote.encode_utf8(&mut [0; 4]));
    let src = template.replace("{q}", &q).replace("{old}", &regex::escape(old));
    Regex::new(&src).ok()
}

/// Installed third-party code, as opposed to the project's own tests.
pub fn is_library_path(path: &str) -> bool {
    path.split(['/', '\\'])
        .any(|part| part == "site-packages" || part == "dist-packages")
}

/// First `(path, line)` frame outside installed packages, or the first
/// frame at all when every frame is library code.
pub fn pick_frame<'t>(frames: impl IntoIterator<Item = (&'t str, usize)>) -> Option<(&'t str, usize)> {
    let mut fallback = None;
    for (path, line) in frames {
        if !is_library_path(path) {
            return Some((path, line));
        }
        fallback.get_or_insert((path, line));
    }
    fallback
}

/// Source patterns for a family hint. An unknown hint yields the union,
/// Playwright first.
pub fn source_patterns(hint: LocatorType) -> Vec<(LocatorType, &'static Pattern)> {
    let tag = |family: LocatorType, list: &'static [Pattern]| {
        list.iter().map(move |p| (family, p))
    };

    match hint {
        LocatorType::Playwright => tag(LocatorType::Playwright, playwright_source()).collect(),
        LocatorType::Selenium => tag(LocatorType::Selenium, selenium_source()).collect(),
        LocatorType::Unknown => tag(LocatorType::Playwright, playwright_source())
            .chain(tag(LocatorType::Selenium, selenium_source()))
            .collect(),
    }
}

/// Message patterns in the order they are tried.
pub fn message_families() -> [(LocatorType, &'static [Pattern]); 2] {
    [
        (LocatorType::Playwright, playwright_message()),
        (LocatorType::Selenium, selenium_message()),
    ]
}
