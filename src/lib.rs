//! Recover the UI locator behind a failed Playwright or Selenium pytest
//! test, from the error text first and the test source second.

pub mod config;
pub mod detectors;
pub mod diagnose;
pub mod harness;
pub mod logger;
pub mod state;
pub mod urls;

pub use config::DiagConfig;
pub use detectors::{replace_locator, resolve_locator};
pub use diagnose::{diagnose, Diagnoser, FsSource, SourceProvider};
pub use state::{FailureReport, LocatorDiagnostic, LocatorType, Strategy};
pub use urls::normalize_url;
