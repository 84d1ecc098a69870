//! Persistent configuration for droidscope.
//!
//! Stores engine tuning in `~/.droidscope/config.json`: lookup and settle
//! timings, the labels tried when submitting a text field, the widget classes
//! an inventory pass queries, and where exported snapshots go.
//!
//! # Example
//!
//! ```no_run
//! use droidscope_core::config::EngineConfig;
//!
//! // Load (returns defaults if file doesn't exist)
//! let config = EngineConfig::load();
//! config.validate().expect("invalid configuration");
//!
//! println!("lookup timeout: {:?}", config.lookup_timeout());
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const CONFIG_FILENAME: &str = "config.json";

/// Widget classes queried individually by a default inventory pass.
pub const DEFAULT_FOCUS_CLASSES: [&str; 21] = [
    "android.widget.Button",
    "android.widget.TextView",
    "android.widget.EditText",
    "android.widget.ImageView",
    "android.widget.ImageButton",
    "android.widget.CheckBox",
    "android.widget.RadioButton",
    "android.widget.Switch",
    "android.widget.SeekBar",
    "android.widget.Spinner",
    "android.widget.ListView",
    "android.widget.RecyclerView",
    "android.widget.ScrollView",
    "android.widget.ViewPager",
    "android.widget.TabHost",
    "android.widget.ToggleButton",
    "android.view.ViewGroup",
    "android.widget.LinearLayout",
    "android.widget.RelativeLayout",
    "android.widget.FrameLayout",
    "android.widget.ConstraintLayout",
];

/// Returns the droidscope home directory (`~/.droidscope/`).
///
/// Creates the directory if it doesn't exist. Falls back to the system
/// temp directory when no home directory can be determined.
pub fn droidscope_dir() -> PathBuf {
    let dir = dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".droidscope");
    std::fs::create_dir_all(&dir).ok();
    dir
}

/// Errors that can occur when loading, saving or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A field holds a value the engine cannot work with.
    #[error("invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Engine configuration with named defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Bounded wait per locator candidate.
    pub lookup_timeout_ms: u64,
    /// Wait after a successful click before returning.
    pub settle_ms: u64,
    /// Wait after clicking a text field to focus it.
    pub focus_delay_ms: u64,
    /// Wait after clearing a text field.
    pub clear_delay_ms: u64,
    /// Wait after writing the new value into a text field.
    pub type_settle_ms: u64,
    /// Labels of submit controls, tried in order after text entry.
    pub submit_labels: Vec<String>,
    /// Bounded wait per submit label.
    pub submit_timeout_ms: u64,
    /// Wait after each backup coordinate tap.
    pub coordinate_settle_ms: u64,
    /// Upper bound on elements introspected per inventory pass.
    pub max_elements: usize,
    /// Widget classes queried individually during an inventory pass.
    pub focus_classes: Vec<String>,
    /// Directory exported snapshots are written to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lookup_timeout_ms: 1000,
            settle_ms: 1000,
            focus_delay_ms: 1000,
            clear_delay_ms: 500,
            type_settle_ms: 1000,
            submit_labels: vec!["搜索".to_string(), "确认".to_string()],
            submit_timeout_ms: 2000,
            coordinate_settle_ms: 1000,
            max_elements: 500,
            focus_classes: DEFAULT_FOCUS_CLASSES.iter().map(|c| c.to_string()).collect(),
            export_dir: None,
        }
    }
}

impl EngineConfig {
    /// Load config from `~/.droidscope/config.json`.
    ///
    /// Returns [`Default`] if the file does not exist or cannot be parsed.
    pub fn load() -> Self {
        Self::load_from(&droidscope_dir().join(CONFIG_FILENAME)).unwrap_or_default()
    }

    /// Load config from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Save config to `~/.droidscope/config.json`.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&droidscope_dir().join(CONFIG_FILENAME))
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Check the values once, before any component is built from them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.submit_labels.is_empty() {
            return Err(ConfigError::Invalid {
                field: "submit_labels",
                reason: "at least one label is required".to_string(),
            });
        }
        if self.submit_labels.iter().any(|l| l.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                field: "submit_labels",
                reason: "labels must not be blank".to_string(),
            });
        }
        if self.max_elements == 0 {
            return Err(ConfigError::Invalid {
                field: "max_elements",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.focus_classes.iter().any(|c| c.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                field: "focus_classes",
                reason: "class names must not be blank".to_string(),
            });
        }
        Ok(())
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn focus_delay(&self) -> Duration {
        Duration::from_millis(self.focus_delay_ms)
    }

    pub fn clear_delay(&self) -> Duration {
        Duration::from_millis(self.clear_delay_ms)
    }

    pub fn type_settle(&self) -> Duration {
        Duration::from_millis(self.type_settle_ms)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }

    pub fn coordinate_settle(&self) -> Duration {
        Duration::from_millis(self.coordinate_settle_ms)
    }

    /// The snapshot directory, defaulting to `~/.droidscope/snapshots`.
    pub fn export_dir(&self) -> PathBuf {
        self.export_dir
            .clone()
            .unwrap_or_else(|| droidscope_dir().join("snapshots"))
    }
}
