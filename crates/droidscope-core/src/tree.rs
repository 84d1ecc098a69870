//! Offline accessibility tree loaded from a JSON screen dump.
//!
//! [`ScreenTree`] implements both host traits over a captured tree, so the
//! locator, executor and inventory builder can run without a device. A dump
//! is either a bare root node or an object with a `screen` size and a
//! `root` node:
//!
//! ```json
//! {
//!   "screen": { "width": 1080, "height": 2400 },
//!   "root": {
//!     "class": "android.widget.FrameLayout",
//!     "bounds": [0, 0, 1080, 2400],
//!     "children": [
//!       { "id": "com.example:id/search", "class": "android.widget.EditText",
//!         "bounds": [40, 120, 1040, 240], "clickable": true, "editable": true,
//!         "hint": "Search" }
//!     ]
//!   }
//! }
//! ```
//!
//! Node identity is the pre-order position in the dump. A node may list
//! attribute names under `unreadable` or set `detached` to reproduce the
//! read failures a live tree produces.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::element::{Capability, ElementRef, LiveElement, NodeKey, ReadError, Rect};
use crate::host::{AccessibilitySurface, DeviceControl, HostError, KeyCode, Predicate, Query};

/// Errors that can occur while loading a screen dump.
#[derive(Error, Debug)]
pub enum TreeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid screen dump: {0}")]
    Json(#[from] serde_json::Error),
}

fn default_true() -> bool {
    true
}

/// One node of a screen dump, as written on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DumpNode {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default, rename = "class")]
    pub class_name: Option<String>,
    /// `[left, top, right, bottom]`.
    #[serde(default)]
    pub bounds: Option<[i32; 4]>,
    #[serde(default)]
    pub clickable: bool,
    #[serde(default)]
    pub long_clickable: bool,
    #[serde(default)]
    pub editable: bool,
    #[serde(default)]
    pub scrollable: bool,
    #[serde(default)]
    pub checkable: bool,
    #[serde(default)]
    pub checked: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub focusable: bool,
    #[serde(default)]
    pub focused: bool,
    #[serde(default)]
    pub selected: bool,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub package: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub input_type: Option<String>,
    #[serde(default)]
    pub text_size: Option<f32>,
    #[serde(default)]
    pub text_color: Option<String>,
    #[serde(default)]
    pub drawable: Option<String>,
    /// Attribute names whose reads fail.
    #[serde(default)]
    pub unreadable: Vec<String>,
    /// Every read fails as if the node had left the tree.
    #[serde(default)]
    pub detached: bool,
    #[serde(default)]
    pub children: Vec<DumpNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DumpFile {
    Framed {
        #[serde(default)]
        screen: Option<ScreenSize>,
        root: DumpNode,
    },
    Bare(DumpNode),
}

/// Key of the node holding input focus, shared by all nodes of one tree.
type FocusOwner = Arc<Mutex<Option<NodeKey>>>;

/// A flattened dump node with its mutable state.
struct TreeNode {
    key: NodeKey,
    attrs: DumpNode,
    depth: u32,
    child_count: u32,
    text: Mutex<Option<String>>,
    focus: FocusOwner,
}

impl TreeNode {
    fn is_focused(&self) -> bool {
        self.focus.lock().map(|owner| *owner == Some(self.key)).unwrap_or(false)
    }

    /// Moves input focus to this node, away from whichever node held it.
    fn take_focus(&self) {
        if let Ok(mut owner) = self.focus.lock() {
            *owner = Some(self.key);
        }
    }

    fn check(&self, attribute: &'static str) -> Result<(), ReadError> {
        if self.attrs.detached {
            return Err(ReadError::Detached(format!("{} is no longer on screen", self.key)));
        }
        if self.attrs.unreadable.iter().any(|a| a == attribute) {
            return Err(ReadError::unavailable(attribute, "marked unreadable in dump"));
        }
        Ok(())
    }

    fn current_text(&self) -> Option<String> {
        self.text.lock().map(|t| t.clone()).unwrap_or_default()
    }

    fn rect(&self) -> Option<Rect> {
        self.attrs.bounds.map(|[l, t, r, b]| Rect::new(l, t, r, b))
    }

    fn matches(&self, query: &Query) -> bool {
        let a = &self.attrs;
        let hit = match &query.predicate {
            Predicate::Id(id) => a.id.as_deref() == Some(id.as_str()),
            Predicate::Description(desc) => a.desc.as_deref() == Some(desc.as_str()),
            Predicate::Text(text) => self.current_text().as_deref() == Some(text.as_str()),
            Predicate::ClassName(class_name) => a.class_name.as_deref() == Some(class_name.as_str()),
            Predicate::Capability(capability) => match capability {
                Capability::Clickable => a.clickable,
                Capability::Editable => a.editable,
                Capability::Scrollable => a.scrollable,
                Capability::LongClickable => a.long_clickable,
                Capability::Checkable => a.checkable,
            },
            Predicate::VisibleToUser => a.visible,
            Predicate::Focused => self.is_focused(),
        };
        hit && query
            .class_name
            .as_deref()
            .map_or(true, |c| a.class_name.as_deref() == Some(c))
    }
}

#[async_trait]
impl LiveElement for TreeNode {
    fn key(&self) -> NodeKey {
        self.key
    }

    fn text(&self) -> Result<Option<String>, ReadError> {
        self.check("text")?;
        Ok(self.current_text())
    }

    fn description(&self) -> Result<Option<String>, ReadError> {
        self.check("description")?;
        Ok(self.attrs.desc.clone())
    }

    fn identifier(&self) -> Result<Option<String>, ReadError> {
        self.check("identifier")?;
        Ok(self.attrs.id.clone())
    }

    fn class_name(&self) -> Result<Option<String>, ReadError> {
        self.check("class_name")?;
        Ok(self.attrs.class_name.clone())
    }

    fn bounds(&self) -> Result<Option<Rect>, ReadError> {
        self.check("bounds")?;
        Ok(self.rect())
    }

    fn clickable(&self) -> Result<bool, ReadError> {
        self.check("clickable")?;
        Ok(self.attrs.clickable)
    }

    fn checkable(&self) -> Result<bool, ReadError> {
        self.check("checkable")?;
        Ok(self.attrs.checkable)
    }

    fn checked(&self) -> Result<bool, ReadError> {
        self.check("checked")?;
        Ok(self.attrs.checked)
    }

    fn scrollable(&self) -> Result<bool, ReadError> {
        self.check("scrollable")?;
        Ok(self.attrs.scrollable)
    }

    fn editable(&self) -> Result<bool, ReadError> {
        self.check("editable")?;
        Ok(self.attrs.editable)
    }

    fn enabled(&self) -> Result<bool, ReadError> {
        self.check("enabled")?;
        Ok(self.attrs.enabled)
    }

    fn focusable(&self) -> Result<bool, ReadError> {
        self.check("focusable")?;
        Ok(self.attrs.focusable)
    }

    fn focused(&self) -> Result<bool, ReadError> {
        self.check("focused")?;
        Ok(self.is_focused())
    }

    fn selected(&self) -> Result<bool, ReadError> {
        self.check("selected")?;
        Ok(self.attrs.selected)
    }

    fn long_clickable(&self) -> Result<bool, ReadError> {
        self.check("long_clickable")?;
        Ok(self.attrs.long_clickable)
    }

    fn depth(&self) -> Result<u32, ReadError> {
        self.check("depth")?;
        Ok(self.depth)
    }

    fn package_name(&self) -> Result<Option<String>, ReadError> {
        self.check("package_name")?;
        Ok(self.attrs.package.clone())
    }

    fn visible_to_user(&self) -> Result<bool, ReadError> {
        self.check("visible_to_user")?;
        Ok(self.attrs.visible)
    }

    fn hint(&self) -> Result<Option<String>, ReadError> {
        self.check("hint")?;
        Ok(self.attrs.hint.clone())
    }

    fn input_type(&self) -> Result<Option<String>, ReadError> {
        self.check("input_type")?;
        Ok(self.attrs.input_type.clone())
    }

    fn text_size(&self) -> Result<Option<f32>, ReadError> {
        self.check("text_size")?;
        Ok(self.attrs.text_size)
    }

    fn text_color(&self) -> Result<Option<String>, ReadError> {
        self.check("text_color")?;
        Ok(self.attrs.text_color.clone())
    }

    fn drawable(&self) -> Result<Option<String>, ReadError> {
        self.check("drawable")?;
        Ok(self.attrs.drawable.clone())
    }

    fn child_count(&self) -> Result<u32, ReadError> {
        self.check("child_count")?;
        Ok(self.child_count)
    }

    fn describe(&self) -> String {
        let class_name = self.attrs.class_name.as_deref().unwrap_or("?");
        match &self.attrs.id {
            Some(id) => format!("{} {} [{}]", self.key, class_name, id),
            None => format!("{} {}", self.key, class_name),
        }
    }

    async fn click(&self) -> Result<(), HostError> {
        if self.attrs.detached {
            return Err(HostError::CommandFailed(format!("{} is gone", self.key)));
        }
        if !self.attrs.enabled {
            return Err(HostError::CommandFailed(format!("{} is disabled", self.key)));
        }
        if self.attrs.editable {
            self.take_focus();
        }
        Ok(())
    }

    async fn long_click(&self) -> Result<(), HostError> {
        if !self.attrs.long_clickable {
            return Err(HostError::CommandFailed(format!("{} is not long-clickable", self.key)));
        }
        Ok(())
    }

    async fn set_text(&self, text: &str) -> Result<(), HostError> {
        if !self.attrs.editable {
            return Err(HostError::CommandFailed(format!("{} is not editable", self.key)));
        }
        let mut current = self
            .text
            .lock()
            .map_err(|_| HostError::CommandFailed("text state poisoned".to_string()))?;
        *current = if text.is_empty() { None } else { Some(text.to_string()) };
        Ok(())
    }
}

/// A captured screen that answers queries and raw input offline.
pub struct ScreenTree {
    screen: Option<ScreenSize>,
    nodes: Vec<Arc<TreeNode>>,
    focus: FocusOwner,
}

impl ScreenTree {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TreeError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self, TreeError> {
        let (screen, root) = match serde_json::from_str::<DumpFile>(json)? {
            DumpFile::Framed { screen, root } => (screen, root),
            DumpFile::Bare(root) => (None, root),
        };
        Ok(Self::from_root(screen, root))
    }

    pub fn from_root(screen: Option<ScreenSize>, root: DumpNode) -> Self {
        let mut nodes = Vec::new();
        let focus = FocusOwner::default();
        flatten(root, 0, &focus, &mut nodes);
        debug!(nodes = nodes.len(), "screen tree loaded");
        Self { screen, nodes, focus }
    }

    /// Number of nodes in the tree.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn handle(node: &Arc<TreeNode>) -> ElementRef {
        ElementRef::new(node.clone())
    }

    fn matching<'a>(&'a self, query: &'a Query) -> impl Iterator<Item = &'a Arc<TreeNode>> + 'a {
        self.nodes.iter().filter(move |n| n.matches(query))
    }

    /// The deepest visible node containing the point.
    fn hit_test(&self, x: i32, y: i32) -> Option<&Arc<TreeNode>> {
        self.nodes
            .iter()
            .filter(|n| n.attrs.visible && n.rect().is_some_and(|r| r.contains(x, y)))
            .max_by_key(|n| n.depth)
    }

    fn focused_field(&self) -> Option<&Arc<TreeNode>> {
        self.nodes
            .iter()
            .find(|n| n.attrs.editable && n.is_focused())
    }
}

/// Pre-order flattening. The first node marked `focused` in the dump owns
/// the initial focus.
fn flatten(mut node: DumpNode, depth: u32, focus: &FocusOwner, out: &mut Vec<Arc<TreeNode>>) {
    let children = std::mem::take(&mut node.children);
    let key = NodeKey(out.len() as u64);
    if node.focused {
        if let Ok(mut owner) = focus.lock() {
            owner.get_or_insert(key);
        }
    }
    out.push(Arc::new(TreeNode {
        key,
        depth,
        child_count: children.len() as u32,
        text: Mutex::new(node.text.clone()),
        focus: focus.clone(),
        attrs: node,
    }));
    for child in children {
        flatten(child, depth + 1, focus, out);
    }
}

#[async_trait]
impl AccessibilitySurface for ScreenTree {
    async fn find_one(&self, query: &Query, timeout: Duration) -> Result<Option<ElementRef>, HostError> {
        if let Some(node) = self.matching(query).next() {
            return Ok(Some(Self::handle(node)));
        }
        // A captured screen never changes, so waiting only burns the timeout.
        tokio::time::sleep(timeout).await;
        Ok(None)
    }

    async fn find_all(&self, query: &Query) -> Result<Vec<ElementRef>, HostError> {
        Ok(self.matching(query).map(Self::handle).collect())
    }
}

#[async_trait]
impl DeviceControl for ScreenTree {
    async fn wake(&self) -> Result<(), HostError> {
        Ok(())
    }

    /// The `screen` size from the dump, else the root bounds.
    async fn screen_size(&self) -> Result<(u32, u32), HostError> {
        if let Some(screen) = self.screen {
            return Ok((screen.width, screen.height));
        }
        self.nodes
            .first()
            .and_then(|root| root.rect())
            .map(|r| (r.width().max(0) as u32, r.height().max(0) as u32))
            .ok_or_else(|| HostError::Parse("dump has no screen size or root bounds".to_string()))
    }

    async fn launch_app(&self, name: &str) -> Result<(), HostError> {
        Err(HostError::CommandFailed(format!(
            "cannot launch '{}' on a captured screen",
            name
        )))
    }

    async fn press_key(&self, key: KeyCode) -> Result<(), HostError> {
        debug!(key = key.as_keycode(), "key press on captured screen");
        Ok(())
    }

    async fn tap(&self, x: i32, y: i32) -> Result<(), HostError> {
        if let Ok(mut owner) = self.focus.lock() {
            *owner = None;
        }
        if let Some(node) = self.hit_test(x, y) {
            debug!(node = %node.key, x, y, "tap hit");
            if node.attrs.editable && node.attrs.enabled {
                node.take_focus();
            }
        }
        Ok(())
    }

    async fn type_text(&self, text: &str) -> Result<(), HostError> {
        let field = self
            .focused_field()
            .ok_or_else(|| HostError::CommandFailed("no focused text field".to_string()))?;
        let mut current = field
            .text
            .lock()
            .map_err(|_| HostError::CommandFailed("text state poisoned".to_string()))?;
        current.get_or_insert_with(String::new).push_str(text);
        Ok(())
    }
}
