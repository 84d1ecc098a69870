//! Host collaborator traits for backend-agnostic Android UI automation.
//!
//! The engine drives a third-party application through two surfaces the host
//! provides:
//!
//! - [`DeviceControl`] wakes the device, reports screen dimensions, launches
//!   applications, synthesizes key presses and raw taps, and blocks for a
//!   requested duration.
//! - [`AccessibilitySurface`] answers [`Query`]s against the live
//!   accessibility tree, either as a bounded wait for the first match or as
//!   a one-shot listing of every match.
//!
//! Backends implement both traits; the locator, executor and inventory
//! builder only ever see the trait objects.
//!
//! # Example
//!
//! ```
//! use droidscope_core::host::{Predicate, Query};
//! use droidscope_core::element::EDIT_TEXT;
//!
//! let query = Query::id("com.example:id/search").with_class(EDIT_TEXT);
//! assert_eq!(query.to_string(), "id == \"com.example:id/search\" && class == \"android.widget.EditText\"");
//! assert!(matches!(query.predicate, Predicate::Id(_)));
//! ```

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::element::{Capability, ElementRef};

/// Errors that can occur while talking to the host.
///
/// Absence of an element is never reported through this type; lookups
/// return `Ok(None)` or an empty list for that.
#[derive(Error, Debug, Clone)]
pub enum HostError {
    /// A host command or action failed with the given message.
    #[error("Command failed: {0}")]
    CommandFailed(String),

    /// No device is attached or authorised.
    #[error("No device available: {0}")]
    DeviceUnavailable(String),

    /// The host produced output that could not be interpreted.
    #[error("Parse error: {0}")]
    Parse(String),

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for HostError {
    fn from(e: std::io::Error) -> Self {
        HostError::Io(e.to_string())
    }
}

/// Symbolic key codes the engine synthesizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyCode {
    Enter,
    Back,
    Home,
    Menu,
    AppSwitch,
    Power,
    Wakeup,
    Clear,
    VolumeUp,
    VolumeDown,
    VolumeMute,
}

impl KeyCode {
    /// The platform key code name understood by `input keyevent`.
    pub fn as_keycode(&self) -> &'static str {
        match self {
            KeyCode::Enter => "KEYCODE_ENTER",
            KeyCode::Back => "KEYCODE_BACK",
            KeyCode::Home => "KEYCODE_HOME",
            KeyCode::Menu => "KEYCODE_MENU",
            KeyCode::AppSwitch => "KEYCODE_APP_SWITCH",
            KeyCode::Power => "KEYCODE_POWER",
            KeyCode::Wakeup => "KEYCODE_WAKEUP",
            KeyCode::Clear => "KEYCODE_CLEAR",
            KeyCode::VolumeUp => "KEYCODE_VOLUME_UP",
            KeyCode::VolumeDown => "KEYCODE_VOLUME_DOWN",
            KeyCode::VolumeMute => "KEYCODE_VOLUME_MUTE",
        }
    }
}

impl std::str::FromStr for KeyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        let name = upper.strip_prefix("KEYCODE_").unwrap_or(&upper);
        match name {
            "ENTER" => Ok(KeyCode::Enter),
            "BACK" => Ok(KeyCode::Back),
            "HOME" => Ok(KeyCode::Home),
            "MENU" => Ok(KeyCode::Menu),
            "APP_SWITCH" | "APPSELECT" => Ok(KeyCode::AppSwitch),
            "POWER" => Ok(KeyCode::Power),
            "WAKEUP" => Ok(KeyCode::Wakeup),
            "CLEAR" => Ok(KeyCode::Clear),
            "VOLUME_UP" => Ok(KeyCode::VolumeUp),
            "VOLUME_DOWN" => Ok(KeyCode::VolumeDown),
            "VOLUME_MUTE" => Ok(KeyCode::VolumeMute),
            _ => Err(format!("unknown key code '{}'", s)),
        }
    }
}

/// A single matching criterion against the accessibility tree.
///
/// All string comparisons are exact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum Predicate {
    Id(String),
    Description(String),
    Text(String),
    ClassName(String),
    Capability(Capability),
    VisibleToUser,
    /// The element currently holds input focus.
    Focused,
}

/// A [`Predicate`] with an optional class-name restriction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub predicate: Predicate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
}

impl Query {
    pub fn new(predicate: Predicate) -> Self {
        Self {
            predicate,
            class_name: None,
        }
    }

    pub fn id(id: impl Into<String>) -> Self {
        Self::new(Predicate::Id(id.into()))
    }

    pub fn description(desc: impl Into<String>) -> Self {
        Self::new(Predicate::Description(desc.into()))
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(Predicate::Text(text.into()))
    }

    pub fn class_name(class_name: impl Into<String>) -> Self {
        Self::new(Predicate::ClassName(class_name.into()))
    }

    pub fn capability(capability: Capability) -> Self {
        Self::new(Predicate::Capability(capability))
    }

    pub fn visible() -> Self {
        Self::new(Predicate::VisibleToUser)
    }

    pub fn focused() -> Self {
        Self::new(Predicate::Focused)
    }

    /// Restrict matches to elements of the given class.
    pub fn with_class(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    /// Restrict matches to the given class if one is supplied.
    pub fn with_class_opt(mut self, class_name: Option<&str>) -> Self {
        self.class_name = class_name.map(str::to_string);
        self
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.predicate {
            Predicate::Id(v) => write!(f, "id == {:?}", v)?,
            Predicate::Description(v) => write!(f, "desc == {:?}", v)?,
            Predicate::Text(v) => write!(f, "text == {:?}", v)?,
            Predicate::ClassName(v) => write!(f, "class == {:?}", v)?,
            Predicate::Capability(c) => write!(f, "{} == true", c.name())?,
            Predicate::VisibleToUser => write!(f, "visible_to_user == true")?,
            Predicate::Focused => write!(f, "focused == true")?,
        }
        if let Some(class_name) = &self.class_name {
            write!(f, " && class == {:?}", class_name)?;
        }
        Ok(())
    }
}

/// Device-level services: screen, launcher, keys, raw taps and waiting.
#[async_trait]
pub trait DeviceControl: Send + Sync {
    /// Turn the screen on.
    async fn wake(&self) -> Result<(), HostError>;

    /// Screen dimensions in pixels as `(width, height)`.
    async fn screen_size(&self) -> Result<(u32, u32), HostError>;

    /// Launch an application by package (or launcher) name.
    async fn launch_app(&self, name: &str) -> Result<(), HostError>;

    /// Synthesize a single key press.
    async fn press_key(&self, key: KeyCode) -> Result<(), HostError>;

    /// Tap at raw screen coordinates.
    async fn tap(&self, x: i32, y: i32) -> Result<(), HostError>;

    /// Type text into whatever currently holds input focus.
    async fn type_text(&self, text: &str) -> Result<(), HostError>;

    /// Block for the given duration.
    ///
    /// The default uses [`tokio::time::sleep`], which keeps waits visible to
    /// a paused test clock.
    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Query access to the live accessibility tree.
#[async_trait]
pub trait AccessibilitySurface: Send + Sync {
    /// Wait up to `timeout` for the first element matching `query`.
    ///
    /// Returns `Ok(None)` when nothing matched within the timeout.
    async fn find_one(
        &self,
        query: &Query,
        timeout: Duration,
    ) -> Result<Option<ElementRef>, HostError>;

    /// Every element currently matching `query`, in tree order.
    async fn find_all(&self, query: &Query) -> Result<Vec<ElementRef>, HostError>;

    /// Returns true if at least one element matches right now.
    async fn exists(&self, query: &Query) -> Result<bool, HostError> {
        Ok(self.find_one(query, Duration::ZERO).await?.is_some())
    }
}
