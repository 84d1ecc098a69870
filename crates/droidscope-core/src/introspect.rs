//! Attribute extraction from live elements.
//!
//! [`introspect`] turns an [`ElementRef`] into an [`ElementRecord`], a value
//! snapshot of the node at one instant. Every attribute is read on its own:
//! an unreadable field falls back to its empty value and is listed in
//! [`ElementInfo::unreadable`], while the rest of the record survives. Only
//! a node that has left the tree altogether produces a
//! [`ElementRecord::Degraded`] record.

use serde::{Deserialize, Serialize};

use crate::element::{
    ElementRef, LiveElement, ReadError, Rect, EDIT_TEXT, IMAGE_VIEW, LIST_VIEW, RECYCLER_VIEW,
    TEXT_VIEW,
};

/// Geometry of an element with derived size and center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub width: i32,
    pub height: i32,
    pub center_x: i32,
    pub center_y: i32,
}

impl From<Rect> for Bounds {
    fn from(rect: Rect) -> Self {
        Self {
            left: rect.left,
            top: rect.top,
            right: rect.right,
            bottom: rect.bottom,
            width: rect.width(),
            height: rect.height(),
            center_x: rect.center_x(),
            center_y: rect.center_y(),
        }
    }
}

/// Class-conditional attributes.
///
/// Text fields carry a hint and input type; text-bearing views carry size
/// and color; image views carry their drawable; list containers carry their
/// child count. Other classes carry nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extras {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_size: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drawable: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_count: Option<u32>,
}

impl Extras {
    pub fn is_empty(&self) -> bool {
        *self == Extras::default()
    }
}

/// Snapshot of one element's attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementInfo {
    /// 1-based position in discovery order.
    pub index: usize,
    pub text: String,
    #[serde(rename = "desc")]
    pub description: String,
    #[serde(rename = "id")]
    pub identifier: String,
    pub class_name: String,
    pub clickable: bool,
    pub checkable: bool,
    pub checked: bool,
    pub scrollable: bool,
    pub editable: bool,
    pub enabled: bool,
    pub focusable: bool,
    pub focused: bool,
    pub selected: bool,
    pub long_clickable: bool,
    pub bounds: Option<Bounds>,
    pub depth: u32,
    pub package_name: String,
    pub visible_to_user: bool,
    #[serde(flatten)]
    pub extras: Extras,
    /// Attributes that could not be read and hold their empty value.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unreadable: Vec<String>,
}

impl ElementInfo {
    /// The most descriptive non-empty label: text, then description, then
    /// identifier, then class name.
    pub fn display_name(&self) -> &str {
        [&self.text, &self.description, &self.identifier, &self.class_name]
            .into_iter()
            .find(|s| !s.is_empty())
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Returns true if the element carries any text, description,
    /// identifier or interaction capability.
    pub fn is_notable(&self) -> bool {
        !self.text.is_empty()
            || !self.description.is_empty()
            || !self.identifier.is_empty()
            || self.clickable
            || self.editable
            || self.scrollable
            || self.long_clickable
            || self.checkable
    }
}

/// Stand-in for an element whose attributes could not be read at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegradedRecord {
    pub index: usize,
    pub error: String,
    /// Host rendering of the node, for diagnostics.
    #[serde(rename = "element")]
    pub raw: String,
}

/// Introspection result for one element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ElementRecord {
    Element(ElementInfo),
    Degraded(DegradedRecord),
}

impl ElementRecord {
    pub fn index(&self) -> usize {
        match self {
            ElementRecord::Element(info) => info.index,
            ElementRecord::Degraded(degraded) => degraded.index,
        }
    }

    pub fn info(&self) -> Option<&ElementInfo> {
        match self {
            ElementRecord::Element(info) => Some(info),
            ElementRecord::Degraded(_) => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, ElementRecord::Degraded(_))
    }
}

/// Tracks per-field read failures while a record is assembled.
#[derive(Default)]
struct FieldReader {
    unreadable: Vec<String>,
}

impl FieldReader {
    /// Unwraps one attribute read. Unavailable fields degrade to their
    /// default; a detached node aborts the whole record.
    fn read<T: Default>(&mut self, result: Result<T, ReadError>) -> Result<T, String> {
        match result {
            Ok(value) => Ok(value),
            Err(ReadError::Unavailable { attribute, .. }) => {
                self.unreadable.push(attribute.to_string());
                Ok(T::default())
            }
            Err(e @ ReadError::Detached(_)) => Err(e.to_string()),
        }
    }
}

/// Extract a normalized record from a live element.
///
/// Never fails: a node that vanished mid-read yields
/// [`ElementRecord::Degraded`].
pub fn introspect(element: &ElementRef, index: usize) -> ElementRecord {
    let node = element.node();
    match read_info(node, index) {
        Ok(info) => ElementRecord::Element(info),
        Err(error) => ElementRecord::Degraded(DegradedRecord {
            index,
            error,
            raw: node.describe(),
        }),
    }
}

fn read_info(node: &dyn LiveElement, index: usize) -> Result<ElementInfo, String> {
    let mut r = FieldReader::default();

    let class_name = r.read(node.class_name())?.unwrap_or_default();
    let info = ElementInfo {
        index,
        text: r.read(node.text())?.unwrap_or_default(),
        description: r.read(node.description())?.unwrap_or_default(),
        identifier: r.read(node.identifier())?.unwrap_or_default(),
        clickable: r.read(node.clickable())?,
        checkable: r.read(node.checkable())?,
        checked: r.read(node.checked())?,
        scrollable: r.read(node.scrollable())?,
        editable: r.read(node.editable())?,
        enabled: r.read(node.enabled())?,
        focusable: r.read(node.focusable())?,
        focused: r.read(node.focused())?,
        selected: r.read(node.selected())?,
        long_clickable: r.read(node.long_clickable())?,
        bounds: r.read(node.bounds())?.map(Bounds::from),
        depth: r.read(node.depth())?,
        package_name: r.read(node.package_name())?.unwrap_or_default(),
        visible_to_user: r.read(node.visible_to_user())?,
        extras: read_extras(node, &class_name),
        class_name,
        unreadable: Vec::new(),
    };

    Ok(ElementInfo {
        unreadable: r.unreadable,
        ..info
    })
}

/// Extras are best-effort: any failure simply leaves the field empty.
fn read_extras(node: &dyn LiveElement, class_name: &str) -> Extras {
    let mut extras = Extras::default();

    if class_name == EDIT_TEXT {
        extras.hint = node.hint().ok().flatten();
        extras.input_type = node.input_type().ok().flatten();
    }
    if class_name == TEXT_VIEW || class_name == EDIT_TEXT {
        extras.text_size = node.text_size().ok().flatten();
        extras.text_color = node.text_color().ok().flatten();
    }
    if class_name == IMAGE_VIEW {
        extras.drawable = node.drawable().ok().flatten();
    }
    if class_name == LIST_VIEW || class_name == RECYCLER_VIEW {
        extras.child_count = node.child_count().ok();
    }

    extras
}
