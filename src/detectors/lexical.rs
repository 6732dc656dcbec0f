//! detectors/lexical.rs
//!
//! Regex fallback for sources the structural resolver cannot handle.
//! Scans a window of lines around the failure and keeps the match
//! closest to it.

use crate::detectors::patterns::source_patterns;
use crate::state::LocatorType;

pub const DEFAULT_WINDOW: usize = 10;

/// Lines `line ± window` clamped to `1..=len`, 1-based and inclusive.
/// None when `line` itself is outside the source.
pub fn window_bounds(line: usize, window: usize, len: usize) -> Option<(usize, usize)> {
    if line < 1 || line > len {
        return None;
    }
    let first = line.saturating_sub(window).max(1);
    let last = line.saturating_add(window).min(len);
    Some((first, last))
}

struct Candidate {
    distance: usize,
    family: LocatorType,
    value: String,
}

pub fn find_nearest_locator(
    source: &str,
    line: usize,
    hint: LocatorType,
    window: usize,
) -> Option<(LocatorType, String)> {
    let lines: Vec<&str> = source.lines().collect();
    let (first, last) = window_bounds(line, window, lines.len())?;
    let block = lines[first - 1..last].join("\n");

    let mut candidates = Vec::new();
    for (family, pattern) in source_patterns(hint) {
        for caps in pattern.re.captures_iter(&block) {
            let Some(m) = caps.get(0) else {
                continue;
            };
            let Some(value) = pattern.value(&caps) else {
                continue;
            };

            let at = first + block[..m.start()].matches('\n').count();
            candidates.push(Candidate {
                distance: at.abs_diff(line),
                family,
                value,
            });
        }
    }

    // stable: ties keep pattern order, then position
    candidates.sort_by_key(|c| c.distance);
    candidates
        .into_iter()
        .next()
        .map(|c| (c.family, c.value))
}
