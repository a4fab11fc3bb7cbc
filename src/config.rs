use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use x11rb::protocol::xproto::ModMask;

use crate::error::{Error, Result};

pub const DEFAULT_RESIZE_STEP: f64 = 0.025;

/// Tunables read from `splitwm.toml`. Every field is optional in the file;
/// missing ones keep their compiled-in value.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// `"alt"` (Mod1) or `"super"` (Mod4).
    pub mod_key: String,
    /// Smallest split share and the step of the grow/shrink bindings.
    pub resize_step: f64,
    pub terminal: Vec<String>,
    pub launcher: Vec<String>,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    /// Extra bindings such as `"Mod+Shift+Return" = "Spawn xterm"`.
    pub bindings: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mod_key: "alt".to_string(),
            resize_step: DEFAULT_RESIZE_STEP,
            terminal: vec!["st".to_string()],
            launcher: vec!["dmenu_run".to_string(), "-m".to_string(), "0".to_string()],
            log_level: "info".to_string(),
            log_file: None,
            bindings: BTreeMap::new(),
        }
    }
}

impl Config {
    /// `$XDG_CONFIG_HOME/splitwm/splitwm.toml`, or `splitwm.toml` when there
    /// is no config directory.
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .map(|p| p.join("splitwm").join("splitwm.toml"))
            .unwrap_or_else(|| PathBuf::from("splitwm.toml"))
    }

    /// Read the overlay at `path`. `Ok(None)` when there is no such file.
    pub fn read(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::parse(&content).map(Some)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Reset out-of-range values to their defaults, returning one message per
    /// rejected value.
    pub fn sanitize(&mut self) -> Vec<String> {
        let mut rejected = Vec::new();

        if !(self.resize_step > 0.0 && self.resize_step < 0.5) {
            rejected.push(format!(
                "resize_step {} is outside (0, 0.5), using {}",
                self.resize_step, DEFAULT_RESIZE_STEP
            ));
            self.resize_step = DEFAULT_RESIZE_STEP;
        }
        if !matches!(self.mod_key.to_lowercase().as_str(), "alt" | "super") {
            rejected.push(format!("unknown mod_key {:?}, using \"alt\"", self.mod_key));
            self.mod_key = "alt".to_string();
        }
        if self.log_level.parse::<log::LevelFilter>().is_err() {
            rejected.push(format!(
                "unknown log_level {:?}, using \"info\"",
                self.log_level
            ));
            self.log_level = "info".to_string();
        }

        rejected
    }

    /// Modifier standing for `Mod` in bindings.
    pub fn mod_mask(&self) -> u16 {
        if self.mod_key.eq_ignore_ascii_case("super") {
            u16::from(ModMask::M4)
        } else {
            u16::from(ModMask::M1)
        }
    }

    pub fn level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }

    /// Configured log file, or a timestamped one in the temp directory.
    pub fn log_path(&self) -> PathBuf {
        self.log_file.clone().unwrap_or_else(|| {
            std::env::temp_dir().join(format!(
                "splitwm-{}.log",
                chrono::Local::now().format("%Y%m%d-%H%M%S")
            ))
        })
    }
}
