//! Live element handles exposed by the host accessibility layer.
//!
//! This module defines the opaque [`ElementRef`] handle together with the
//! [`LiveElement`] trait a host backend implements for each node of its
//! on-screen accessibility tree. The engine never constructs nodes itself;
//! it only receives handles from an
//! [`AccessibilitySurface`](crate::host::AccessibilitySurface) and holds them
//! for the duration of one resolution and action cycle.
//!
//! Every attribute read is independently failable. A [`ReadError::Unavailable`]
//! only costs the caller that one field, while [`ReadError::Detached`] means
//! the node has left the tree and nothing else can be read from it either.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::host::HostError;

/// Fully qualified class name of the standard editable text field.
pub const EDIT_TEXT: &str = "android.widget.EditText";
/// Fully qualified class name of the standard text view.
pub const TEXT_VIEW: &str = "android.widget.TextView";
/// Fully qualified class name of the standard image view.
pub const IMAGE_VIEW: &str = "android.widget.ImageView";
/// Fully qualified class name of the legacy list container.
pub const LIST_VIEW: &str = "android.widget.ListView";
/// Class name reported for recycler containers.
pub const RECYCLER_VIEW: &str = "android.widget.RecyclerView";

/// Errors that can occur while reading a single attribute of a live element.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    /// The attribute could not be read; only this field is lost.
    #[error("attribute '{attribute}' unavailable: {reason}")]
    Unavailable {
        /// Name of the attribute that failed.
        attribute: &'static str,
        /// Host-supplied reason.
        reason: String,
    },

    /// The node is no longer part of the live tree.
    #[error("element detached from the accessibility tree: {0}")]
    Detached(String),
}

impl ReadError {
    /// Shorthand for [`ReadError::Unavailable`].
    pub fn unavailable(attribute: &'static str, reason: impl Into<String>) -> Self {
        ReadError::Unavailable {
            attribute,
            reason: reason.into(),
        }
    }
}

/// Identity of the underlying node within one host snapshot.
///
/// Two handles that reach the same node through different queries carry
/// the same key, which is what screen inventory deduplication relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey(pub u64);

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Interaction capabilities an element can advertise and be queried by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Clickable,
    Editable,
    Scrollable,
    LongClickable,
    Checkable,
}

impl Capability {
    /// The capability predicates queried by a screen inventory pass, in order.
    pub const INVENTORY_ORDER: [Capability; 5] = [
        Capability::Clickable,
        Capability::Editable,
        Capability::Scrollable,
        Capability::LongClickable,
        Capability::Checkable,
    ];

    /// Returns a short, static name suitable for log fields.
    pub fn name(&self) -> &'static str {
        match self {
            Capability::Clickable => "clickable",
            Capability::Editable => "editable",
            Capability::Scrollable => "scrollable",
            Capability::LongClickable => "long_clickable",
            Capability::Checkable => "checkable",
        }
    }
}

/// Screen-space rectangle of an element as reported by the host.
///
/// Coordinates are in device pixels with the origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn center_x(&self) -> i32 {
        self.left + self.width() / 2
    }

    pub fn center_y(&self) -> i32 {
        self.top + self.height() / 2
    }

    /// Returns true if the point lies inside the rectangle (right/bottom exclusive).
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }
}

/// A node in the host application's live accessibility tree.
///
/// Reads are synchronous and operate on whatever the host last observed;
/// actions are asynchronous requests the host applies on its own schedule.
#[async_trait]
pub trait LiveElement: Send + Sync {
    /// Stable identity of the node within the current snapshot.
    fn key(&self) -> NodeKey;

    fn text(&self) -> Result<Option<String>, ReadError>;
    fn description(&self) -> Result<Option<String>, ReadError>;
    /// The resource identifier (e.g. `com.example:id/search`).
    fn identifier(&self) -> Result<Option<String>, ReadError>;
    fn class_name(&self) -> Result<Option<String>, ReadError>;
    fn bounds(&self) -> Result<Option<Rect>, ReadError>;
    fn clickable(&self) -> Result<bool, ReadError>;
    fn checkable(&self) -> Result<bool, ReadError>;
    fn checked(&self) -> Result<bool, ReadError>;
    fn scrollable(&self) -> Result<bool, ReadError>;
    fn editable(&self) -> Result<bool, ReadError>;
    fn enabled(&self) -> Result<bool, ReadError>;
    fn focusable(&self) -> Result<bool, ReadError>;
    fn focused(&self) -> Result<bool, ReadError>;
    fn selected(&self) -> Result<bool, ReadError>;
    fn long_clickable(&self) -> Result<bool, ReadError>;
    fn depth(&self) -> Result<u32, ReadError>;
    fn package_name(&self) -> Result<Option<String>, ReadError>;
    fn visible_to_user(&self) -> Result<bool, ReadError>;

    /// Placeholder hint shown by an empty text field.
    fn hint(&self) -> Result<Option<String>, ReadError> {
        Ok(None)
    }

    /// Input type flags of a text field, as the host renders them.
    fn input_type(&self) -> Result<Option<String>, ReadError> {
        Ok(None)
    }

    fn text_size(&self) -> Result<Option<f32>, ReadError> {
        Ok(None)
    }

    fn text_color(&self) -> Result<Option<String>, ReadError> {
        Ok(None)
    }

    fn drawable(&self) -> Result<Option<String>, ReadError> {
        Ok(None)
    }

    fn child_count(&self) -> Result<u32, ReadError> {
        Ok(0)
    }

    /// One-line rendering used when a record has to be degraded.
    fn describe(&self) -> String {
        self.key().to_string()
    }

    async fn click(&self) -> Result<(), HostError>;
    async fn long_click(&self) -> Result<(), HostError>;
    async fn set_text(&self, text: &str) -> Result<(), HostError>;
}

/// Opaque, short-lived handle to a live element.
///
/// Cloning is cheap and yields another handle to the same node. Handles must
/// not be kept across screen transitions: the tree they point into may have
/// been replaced.
#[derive(Clone)]
pub struct ElementRef(Arc<dyn LiveElement>);

impl ElementRef {
    pub fn new(node: Arc<dyn LiveElement>) -> Self {
        Self(node)
    }

    /// Identity of the underlying node.
    pub fn key(&self) -> NodeKey {
        self.0.key()
    }

    /// Borrow the live node behind this handle.
    pub fn node(&self) -> &dyn LiveElement {
        self.0.as_ref()
    }

    /// Returns true if both handles point at the same underlying node.
    pub fn same_node(&self, other: &ElementRef) -> bool {
        self.key() == other.key()
    }
}

impl fmt::Debug for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ElementRef").field(&self.0.describe()).finish()
    }
}

/// Coarse widget families used by [`find_elements_by_type`](crate::inventory::InventoryBuilder::find_elements_by_type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Button,
    Input,
    Text,
    Image,
    List,
    Scroll,
    Checkbox,
    Radio,
    Switch,
    Seekbar,
    Spinner,
    Layout,
}

impl ElementKind {
    /// Widget class names that make up this family, queried in order.
    pub fn class_names(&self) -> &'static [&'static str] {
        match self {
            ElementKind::Button => &["android.widget.Button", "android.widget.ImageButton"],
            ElementKind::Input => &[EDIT_TEXT],
            ElementKind::Text => &[TEXT_VIEW],
            ElementKind::Image => &[IMAGE_VIEW],
            ElementKind::List => &[LIST_VIEW, RECYCLER_VIEW],
            ElementKind::Scroll => &["android.widget.ScrollView"],
            ElementKind::Checkbox => &["android.widget.CheckBox"],
            ElementKind::Radio => &["android.widget.RadioButton"],
            ElementKind::Switch => &["android.widget.Switch"],
            ElementKind::Seekbar => &["android.widget.SeekBar"],
            ElementKind::Spinner => &["android.widget.Spinner"],
            ElementKind::Layout => &[
                "android.widget.LinearLayout",
                "android.widget.RelativeLayout",
                "android.widget.FrameLayout",
            ],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ElementKind::Button => "button",
            ElementKind::Input => "input",
            ElementKind::Text => "text",
            ElementKind::Image => "image",
            ElementKind::List => "list",
            ElementKind::Scroll => "scroll",
            ElementKind::Checkbox => "checkbox",
            ElementKind::Radio => "radio",
            ElementKind::Switch => "switch",
            ElementKind::Seekbar => "seekbar",
            ElementKind::Spinner => "spinner",
            ElementKind::Layout => "layout",
        }
    }
}

impl std::str::FromStr for ElementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "button" => Ok(ElementKind::Button),
            "input" => Ok(ElementKind::Input),
            "text" => Ok(ElementKind::Text),
            "image" => Ok(ElementKind::Image),
            "list" => Ok(ElementKind::List),
            "scroll" => Ok(ElementKind::Scroll),
            "checkbox" => Ok(ElementKind::Checkbox),
            "radio" => Ok(ElementKind::Radio),
            "switch" => Ok(ElementKind::Switch),
            "seekbar" => Ok(ElementKind::Seekbar),
            "spinner" => Ok(ElementKind::Spinner),
            "layout" => Ok(ElementKind::Layout),
            other => Err(format!("unknown element type '{}'", other)),
        }
    }
}
