//! Shared test helpers for droidscope-core integration tests.
//!
//! [`MockScreen`] implements both host traits over a scripted list of
//! elements and journals every call it receives, so tests can assert on
//! exactly which queries, taps and key presses the engine issued.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use droidscope_core::config::EngineConfig;
use droidscope_core::element::{Capability, ElementRef, LiveElement, NodeKey, ReadError, Rect};
use droidscope_core::events::CollectingSink;
use droidscope_core::executor::ActionExecutor;
use droidscope_core::host::{AccessibilitySurface, DeviceControl, HostError, KeyCode, Predicate, Query};
use droidscope_core::snapshot::{SnapshotError, SnapshotSink};

// ---------------------------------------------------------------------------
// Journal
// ---------------------------------------------------------------------------

/// One call the engine made into the mock host.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    FindOne(Query),
    FindAll(Query),
    Tap(i32, i32),
    Key(KeyCode),
    TypeText(String),
    Click(NodeKey),
    LongClick(NodeKey),
    SetText(NodeKey, String),
}

#[derive(Default)]
pub struct Journal(Mutex<Vec<Call>>);

impl Journal {
    fn record(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn find_one_queries(&self) -> Vec<Query> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::FindOne(q) => Some(q),
                _ => None,
            })
            .collect()
    }

    pub fn taps(&self) -> Vec<(i32, i32)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Tap(x, y) => Some((x, y)),
                _ => None,
            })
            .collect()
    }

    pub fn keys(&self) -> Vec<KeyCode> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Key(k) => Some(k),
                _ => None,
            })
            .collect()
    }

    /// Non-empty values written through `set_text`.
    pub fn written(&self) -> Vec<(NodeKey, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::SetText(key, value) if !value.is_empty() => Some((key, value)),
                _ => None,
            })
            .collect()
    }

    pub fn clicks(&self) -> Vec<NodeKey> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Click(key) => Some(key),
                _ => None,
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Scripted elements
// ---------------------------------------------------------------------------

/// Attributes and failure switches of one scripted element.
#[derive(Debug, Clone, Default)]
pub struct ElementSpec {
    pub id: Option<String>,
    pub text: Option<String>,
    pub desc: Option<String>,
    pub class_name: Option<String>,
    pub clickable: bool,
    pub editable: bool,
    pub scrollable: bool,
    pub long_clickable: bool,
    pub checkable: bool,
    pub hidden: bool,
    pub bounds: Option<Rect>,
    pub fail_bounds: bool,
    /// Attribute reads that report `ReadError::Unavailable`.
    pub unreadable: Vec<&'static str>,
    pub hint: Option<String>,
    pub detached: bool,
    pub click_error: Option<String>,
    pub set_text_error: Option<String>,
    /// The element only matches queries once this many taps happened.
    pub appears_after_taps: usize,
}

impl ElementSpec {
    pub fn new(class_name: &str) -> Self {
        Self {
            class_name: Some(class_name.to_string()),
            bounds: Some(Rect::new(0, 0, 100, 50)),
            ..Default::default()
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn desc(mut self, desc: &str) -> Self {
        self.desc = Some(desc.to_string());
        self
    }

    pub fn clickable(mut self) -> Self {
        self.clickable = true;
        self
    }

    pub fn editable(mut self) -> Self {
        self.editable = true;
        self
    }

    pub fn scrollable(mut self) -> Self {
        self.scrollable = true;
        self
    }

    pub fn long_clickable(mut self) -> Self {
        self.long_clickable = true;
        self
    }

    pub fn checkable(mut self) -> Self {
        self.checkable = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn fail_bounds(mut self) -> Self {
        self.fail_bounds = true;
        self
    }

    pub fn unreadable(mut self, attribute: &'static str) -> Self {
        self.unreadable.push(attribute);
        self
    }

    pub fn hint(mut self, hint: &str) -> Self {
        self.hint = Some(hint.to_string());
        self
    }

    pub fn detached(mut self) -> Self {
        self.detached = true;
        self
    }

    pub fn click_error(mut self, msg: &str) -> Self {
        self.click_error = Some(msg.to_string());
        self
    }

    pub fn set_text_error(mut self, msg: &str) -> Self {
        self.set_text_error = Some(msg.to_string());
        self
    }

    pub fn appears_after_taps(mut self, taps: usize) -> Self {
        self.appears_after_taps = taps;
        self
    }
}

pub struct MockNode {
    key: NodeKey,
    spec: ElementSpec,
    text: Mutex<Option<String>>,
    journal: Arc<Journal>,
}

impl MockNode {
    fn check(&self, attribute: &'static str) -> Result<(), ReadError> {
        if self.spec.detached {
            return Err(ReadError::Detached("node recycled".to_string()));
        }
        if attribute == "bounds" && self.spec.fail_bounds {
            return Err(ReadError::unavailable("bounds", "no layout pass"));
        }
        if self.spec.unreadable.contains(&attribute) {
            return Err(ReadError::unavailable(attribute, "not exposed by node"));
        }
        Ok(())
    }

    pub fn current_text(&self) -> Option<String> {
        self.text.lock().unwrap().clone()
    }

    fn matches(&self, predicate: &Predicate) -> bool {
        let s = &self.spec;
        match predicate {
            Predicate::Id(v) => s.id.as_deref() == Some(v.as_str()),
            Predicate::Description(v) => s.desc.as_deref() == Some(v.as_str()),
            Predicate::Text(v) => self.current_text().as_deref() == Some(v.as_str()),
            Predicate::ClassName(v) => s.class_name.as_deref() == Some(v.as_str()),
            Predicate::Capability(c) => match c {
                Capability::Clickable => s.clickable,
                Capability::Editable => s.editable,
                Capability::Scrollable => s.scrollable,
                Capability::LongClickable => s.long_clickable,
                Capability::Checkable => s.checkable,
            },
            Predicate::VisibleToUser => !s.hidden,
            // Tap-gated fields model an input that gains focus when tapped.
            Predicate::Focused => s.appears_after_taps > 0,
        }
    }
}

#[async_trait]
impl LiveElement for MockNode {
    fn key(&self) -> NodeKey {
        self.key
    }
    fn text(&self) -> Result<Option<String>, ReadError> {
        self.check("text")?;
        Ok(self.current_text())
    }
    fn description(&self) -> Result<Option<String>, ReadError> {
        self.check("description")?;
        Ok(self.spec.desc.clone())
    }
    fn identifier(&self) -> Result<Option<String>, ReadError> {
        self.check("identifier")?;
        Ok(self.spec.id.clone())
    }
    fn class_name(&self) -> Result<Option<String>, ReadError> {
        self.check("class_name")?;
        Ok(self.spec.class_name.clone())
    }
    fn bounds(&self) -> Result<Option<Rect>, ReadError> {
        self.check("bounds")?;
        Ok(self.spec.bounds)
    }
    fn hint(&self) -> Result<Option<String>, ReadError> {
        self.check("hint")?;
        Ok(self.spec.hint.clone())
    }
    fn clickable(&self) -> Result<bool, ReadError> {
        self.check("clickable")?;
        Ok(self.spec.clickable)
    }
    fn checkable(&self) -> Result<bool, ReadError> {
        Ok(self.spec.checkable)
    }
    fn checked(&self) -> Result<bool, ReadError> {
        Ok(false)
    }
    fn scrollable(&self) -> Result<bool, ReadError> {
        Ok(self.spec.scrollable)
    }
    fn editable(&self) -> Result<bool, ReadError> {
        Ok(self.spec.editable)
    }
    fn enabled(&self) -> Result<bool, ReadError> {
        Ok(true)
    }
    fn focusable(&self) -> Result<bool, ReadError> {
        Ok(self.spec.editable)
    }
    fn focused(&self) -> Result<bool, ReadError> {
        Ok(false)
    }
    fn selected(&self) -> Result<bool, ReadError> {
        Ok(false)
    }
    fn long_clickable(&self) -> Result<bool, ReadError> {
        Ok(self.spec.long_clickable)
    }
    fn depth(&self) -> Result<u32, ReadError> {
        Ok(1)
    }
    fn package_name(&self) -> Result<Option<String>, ReadError> {
        Ok(Some("com.example.app".to_string()))
    }
    fn visible_to_user(&self) -> Result<bool, ReadError> {
        Ok(!self.spec.hidden)
    }

    async fn click(&self) -> Result<(), HostError> {
        self.journal.record(Call::Click(self.key));
        match &self.spec.click_error {
            Some(msg) => Err(HostError::CommandFailed(msg.clone())),
            None => Ok(()),
        }
    }

    async fn long_click(&self) -> Result<(), HostError> {
        self.journal.record(Call::LongClick(self.key));
        match &self.spec.click_error {
            Some(msg) => Err(HostError::CommandFailed(msg.clone())),
            None => Ok(()),
        }
    }

    async fn set_text(&self, text: &str) -> Result<(), HostError> {
        self.journal.record(Call::SetText(self.key, text.to_string()));
        if let Some(msg) = &self.spec.set_text_error {
            return Err(HostError::CommandFailed(msg.clone()));
        }
        *self.text.lock().unwrap() = Some(text.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockScreen
// ---------------------------------------------------------------------------

/// Scripted host implementing both [`DeviceControl`] and
/// [`AccessibilitySurface`].
pub struct MockScreen {
    pub journal: Arc<Journal>,
    nodes: Mutex<Vec<Arc<MockNode>>>,
    failing_queries: Mutex<HashSet<String>>,
    taps: AtomicUsize,
    taps_fail: AtomicBool,
    screen_size: Option<(u32, u32)>,
}

impl MockScreen {
    pub fn new() -> Arc<Self> {
        Self::with_screen(Some((1080, 2400)))
    }

    /// `None` makes `screen_size` fail.
    pub fn with_screen(screen_size: Option<(u32, u32)>) -> Arc<Self> {
        Arc::new(Self {
            journal: Arc::new(Journal::default()),
            nodes: Mutex::new(Vec::new()),
            failing_queries: Mutex::new(HashSet::new()),
            taps: AtomicUsize::new(0),
            taps_fail: AtomicBool::new(false),
            screen_size,
        })
    }

    /// Add an element; keys are assigned in insertion order.
    pub fn add(&self, spec: ElementSpec) -> NodeKey {
        let mut nodes = self.nodes.lock().unwrap();
        let key = NodeKey(nodes.len() as u64);
        nodes.push(Arc::new(MockNode {
            key,
            text: Mutex::new(spec.text.clone()),
            spec,
            journal: self.journal.clone(),
        }));
        key
    }

    pub fn node(&self, key: NodeKey) -> Arc<MockNode> {
        self.nodes.lock().unwrap()[key.0 as usize].clone()
    }

    /// Make every tap fail at the host.
    pub fn fail_taps(&self) {
        self.taps_fail.store(true, Ordering::SeqCst);
    }

    /// Make every query with this rendering fail at the host.
    pub fn fail_query(&self, query: &Query) {
        self.failing_queries.lock().unwrap().insert(query.to_string());
    }

    fn check_query(&self, query: &Query) -> Result<(), HostError> {
        if self.failing_queries.lock().unwrap().contains(&query.to_string()) {
            return Err(HostError::CommandFailed(format!("query rejected: {}", query)));
        }
        Ok(())
    }

    fn matching(&self, query: &Query) -> Vec<ElementRef> {
        let taps = self.taps.load(Ordering::SeqCst);
        self.nodes
            .lock()
            .unwrap()
            .iter()
            .filter(|n| taps >= n.spec.appears_after_taps)
            .filter(|n| n.matches(&query.predicate))
            .filter(|n| {
                query
                    .class_name
                    .as_deref()
                    .map_or(true, |c| n.spec.class_name.as_deref() == Some(c))
            })
            .map(|n| ElementRef::new(n.clone()))
            .collect()
    }
}

#[async_trait]
impl AccessibilitySurface for MockScreen {
    async fn find_one(&self, query: &Query, timeout: Duration) -> Result<Option<ElementRef>, HostError> {
        self.journal.record(Call::FindOne(query.clone()));
        self.check_query(query)?;
        if let Some(element) = self.matching(query).into_iter().next() {
            return Ok(Some(element));
        }
        tokio::time::sleep(timeout).await;
        Ok(None)
    }

    async fn find_all(&self, query: &Query) -> Result<Vec<ElementRef>, HostError> {
        self.journal.record(Call::FindAll(query.clone()));
        self.check_query(query)?;
        Ok(self.matching(query))
    }
}

#[async_trait]
impl DeviceControl for MockScreen {
    async fn wake(&self) -> Result<(), HostError> {
        Ok(())
    }

    async fn screen_size(&self) -> Result<(u32, u32), HostError> {
        self.screen_size
            .ok_or_else(|| HostError::DeviceUnavailable("no display".to_string()))
    }

    async fn launch_app(&self, _name: &str) -> Result<(), HostError> {
        Ok(())
    }

    async fn press_key(&self, key: KeyCode) -> Result<(), HostError> {
        self.journal.record(Call::Key(key));
        Ok(())
    }

    async fn tap(&self, x: i32, y: i32) -> Result<(), HostError> {
        self.journal.record(Call::Tap(x, y));
        if self.taps_fail.load(Ordering::SeqCst) {
            return Err(HostError::CommandFailed("input injection denied".to_string()));
        }
        self.taps.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn type_text(&self, text: &str) -> Result<(), HostError> {
        self.journal.record(Call::TypeText(text.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Snapshot sink
// ---------------------------------------------------------------------------

/// Keeps exported snapshots in memory, or fails every write.
#[derive(Default)]
pub struct MemorySink {
    pub written: Mutex<Vec<(String, String)>>,
    pub fail: bool,
}

impl MemorySink {
    pub fn failing() -> Self {
        Self {
            written: Mutex::new(Vec::new()),
            fail: true,
        }
    }
}

impl SnapshotSink for MemorySink {
    fn write(&self, name: &str, contents: &str) -> Result<String, SnapshotError> {
        if self.fail {
            return Err(SnapshotError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        self.written
            .lock()
            .unwrap()
            .push((name.to_string(), contents.to_string()));
        Ok(format!("memory://{}", name))
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// Executor over `screen` with default timing and a collecting sink.
pub fn executor(screen: &Arc<MockScreen>) -> (ActionExecutor, Arc<CollectingSink>) {
    let events = CollectingSink::new();
    let executor = ActionExecutor::new(
        screen.clone(),
        screen.clone(),
        events.clone(),
        EngineConfig::default(),
    );
    (executor, events)
}
