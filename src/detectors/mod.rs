//! detectors
//!
//! Two-tier source locator resolution: structural first, lexical when the
//! tree gives nothing. `replace` writes a new value back over a resolved
//! locator.

pub mod ast;
pub mod lexical;
pub mod patterns;
pub mod replace;

use crate::state::{LocatorType, ResolvedLocator, Strategy};

pub use lexical::DEFAULT_WINDOW;
pub use replace::{replace_locator, replace_locator_within};

pub fn resolve_locator(source: &str, line: usize, hint: LocatorType) -> Option<ResolvedLocator> {
    resolve_locator_within(source, line, hint, DEFAULT_WINDOW)
}

pub fn resolve_locator_within(
    source: &str,
    line: usize,
    hint: LocatorType,
    window: usize,
) -> Option<ResolvedLocator> {
    if let Some((family, value)) = ast::find_locator_call(source, line) {
        return Some(ResolvedLocator {
            value,
            family,
            strategy: Strategy::Structural,
        });
    }

    lexical::find_nearest_locator(source, line, hint, window).map(|(family, value)| {
        ResolvedLocator {
            value,
            family,
            strategy: Strategy::Lexical,
        }
    })
}
