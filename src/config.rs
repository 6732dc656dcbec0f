use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::detectors::DEFAULT_WINDOW;

pub const DEFAULT_MESSAGE_LIMIT: usize = 500;
const LOCAL_FILE: &str = ".locator-diag.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagConfig {
    /// Lines scanned on each side of the failure by the lexical resolver.
    pub window: usize,
    /// Max chars of error text kept in a diagnostic.
    pub message_limit: usize,
    pub verbose: bool,
    pub pytest_cmd: String,
}

impl Default for DiagConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            message_limit: DEFAULT_MESSAGE_LIMIT,
            verbose: false,
            pytest_cmd: "python -m pytest -rf".to_string(),
        }
    }
}

fn config_path() -> PathBuf {
    let mut dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    dir.push("locator-diag");
    dir.push("config.toml");
    dir
}

/// Local file first, then the user config dir, then env overrides.
pub fn load(root: &Path) -> DiagConfig {
    let cfg = [root.join(LOCAL_FILE), config_path()]
        .iter()
        .find_map(|p| load_file(p))
        .unwrap_or_default();

    apply_env(cfg, |key| std::env::var(key).ok())
}

fn load_file(path: &Path) -> Option<DiagConfig> {
    let raw = fs::read_to_string(path).ok()?;
    toml::from_str(&raw).ok()
}

pub fn apply_env(mut cfg: DiagConfig, get: impl Fn(&str) -> Option<String>) -> DiagConfig {
    if let Some(v) = get("LOCATOR_DIAG_VERBOSE") {
        cfg.verbose = truthy(&v);
    }
    if let Some(n) = get("LOCATOR_DIAG_WINDOW").and_then(|v| v.trim().parse().ok()) {
        cfg.window = n;
    }
    if let Some(n) = get("LOCATOR_DIAG_MESSAGE_LIMIT").and_then(|v| v.trim().parse().ok()) {
        cfg.message_limit = n;
    }
    cfg
}

fn truthy(val: &str) -> bool {
    let v = val.to_ascii_lowercase();
    matches!(v.as_str(), "1" | "true" | "yes" | "on")
}
