//! Structured diagnostics emitted by the engine.
//!
//! Every component receives an `Arc<dyn EventSink>` at construction and
//! reports what it is doing as [`EngineEvent`]s instead of writing to a
//! shared console. [`TracingSink`] forwards events to `tracing`;
//! [`CollectingSink`] keeps them in memory so tests can assert on them.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::introspect::ElementInfo;
use crate::locator::StrategyKind;

/// Something the engine did or observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Resolution of a logical target started.
    LookupStarted { label: String },

    /// One candidate of one strategy is about to be waited for.
    StrategyAttempt {
        label: String,
        strategy: StrategyKind,
        candidate: String,
    },

    /// A strategy query failed at the host; the chain moves on.
    StrategyErrored {
        label: String,
        strategy: StrategyKind,
        candidate: String,
        error: String,
    },

    /// The target resolved.
    Resolved {
        label: String,
        strategy: StrategyKind,
        candidate: String,
    },

    /// Every strategy was exhausted without a match.
    NotFound { label: String },

    /// A native element action is about to run.
    ActionStarted { label: String, action: String },

    /// A native element action completed.
    ActionCompleted { label: String, action: String },

    /// A native element action failed; the cause is attached.
    ActionFailed {
        label: String,
        action: String,
        cause: String,
    },

    /// Text was written into a field.
    TextEntered { label: String, value: String },

    /// A submit control was found and clicked.
    SubmitClicked { label: String },

    /// No submit control was found; an enter key press was synthesized.
    EnterKeySent,

    /// The coordinate fallback path was entered.
    CoordinateFallback { label: String, candidates: usize },

    /// A raw coordinate tap was issued.
    CoordinateTap { x: i32, y: i32 },

    /// A coordinate tap activated an editable field.
    FieldActivated { x: i32, y: i32 },

    /// The coordinate fallback path ran out of candidates.
    FallbackExhausted { label: String },

    /// An inventory pass started.
    InventoryStarted {
        device_width: u32,
        device_height: u32,
        detailed: bool,
        include_non_clickable: bool,
        max_elements: usize,
    },

    /// A batch predicate query returned.
    PredicateQueried { predicate: String, count: usize },

    /// A batch predicate query failed and contributes nothing.
    PredicateFailed { predicate: String, error: String },

    /// The unioned set was truncated.
    InventoryTruncated { discovered: usize, kept: usize },

    /// An element worth showing was introspected.
    ElementListed {
        index: usize,
        display: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<Box<ElementInfo>>,
    },

    /// An element could only be recorded in degraded form.
    ElementDegraded { index: usize, error: String },

    /// Aggregate counts at the end of an inventory pass.
    InventorySummary {
        total: usize,
        clickable: usize,
        editable: usize,
        scrollable: usize,
        long_clickable: usize,
        checkable: usize,
        with_text: usize,
        with_description: usize,
        with_identifier: usize,
        classes: Vec<(String, usize)>,
    },

    /// A snapshot export was written.
    ExportWritten { location: String },

    /// A snapshot export failed; the inventory is unaffected.
    ExportFailed { error: String },
}

/// Receiver for engine diagnostics.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

/// Forwards events to `tracing` with structured fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TracingSink {
    pub fn shared() -> Arc<dyn EventSink> {
        Arc::new(TracingSink)
    }
}

impl EventSink for TracingSink {
    fn emit(&self, event: EngineEvent) {
        match event {
            EngineEvent::LookupStarted { label } => debug!(%label, "looking up element"),
            EngineEvent::StrategyAttempt { label, strategy, candidate } => {
                debug!(%label, strategy = strategy.name(), %candidate, "trying candidate")
            }
            EngineEvent::StrategyErrored { label, strategy, candidate, error } => {
                warn!(%label, strategy = strategy.name(), %candidate, %error, "strategy query failed")
            }
            EngineEvent::Resolved { label, strategy, candidate } => {
                info!(%label, strategy = strategy.name(), %candidate, "element resolved")
            }
            EngineEvent::NotFound { label } => info!(%label, "no strategy matched"),
            EngineEvent::ActionStarted { label, action } => debug!(%label, %action, "action started"),
            EngineEvent::ActionCompleted { label, action } => info!(%label, %action, "action completed"),
            EngineEvent::ActionFailed { label, action, cause } => {
                warn!(%label, %action, %cause, "action failed")
            }
            EngineEvent::TextEntered { label, value } => info!(%label, %value, "text entered"),
            EngineEvent::SubmitClicked { label } => info!(%label, "submit control clicked"),
            EngineEvent::EnterKeySent => info!("no submit control, sent enter key"),
            EngineEvent::CoordinateFallback { label, candidates } => {
                info!(%label, candidates, "falling back to coordinates")
            }
            EngineEvent::CoordinateTap { x, y } => debug!(x, y, "coordinate tap"),
            EngineEvent::FieldActivated { x, y } => info!(x, y, "editable field activated"),
            EngineEvent::FallbackExhausted { label } => warn!(%label, "no backup coordinate worked"),
            EngineEvent::InventoryStarted {
                device_width,
                device_height,
                detailed,
                include_non_clickable,
                max_elements,
            } => info!(
                device_width,
                device_height,
                detailed,
                include_non_clickable,
                max_elements,
                "inventory pass started"
            ),
            EngineEvent::PredicateQueried { predicate, count } => {
                debug!(%predicate, count, "predicate queried")
            }
            EngineEvent::PredicateFailed { predicate, error } => {
                warn!(%predicate, %error, "predicate query failed")
            }
            EngineEvent::InventoryTruncated { discovered, kept } => {
                info!(discovered, kept, "inventory truncated")
            }
            EngineEvent::ElementListed { index, display: shown, detail } => match detail {
                Some(info) => {
                    let bounds = info.bounds.map(|b| {
                        format!(
                            "({},{})-({},{}) {}x{} @({},{})",
                            b.left, b.top, b.right, b.bottom, b.width, b.height, b.center_x, b.center_y
                        )
                    });
                    info!(
                        index,
                        display = %shown,
                        text = %info.text,
                        desc = %info.description,
                        id = %info.identifier,
                        bounds = bounds.as_deref().unwrap_or("-"),
                        "element"
                    )
                }
                None => info!(index, display = %shown, "element"),
            },
            EngineEvent::ElementDegraded { index, error } => warn!(index, %error, "element degraded"),
            EngineEvent::InventorySummary {
                total,
                clickable,
                editable,
                scrollable,
                long_clickable,
                checkable,
                with_text,
                with_description,
                with_identifier,
                classes,
            } => {
                info!(
                    total,
                    clickable,
                    editable,
                    scrollable,
                    long_clickable,
                    checkable,
                    with_text,
                    with_description,
                    with_identifier,
                    "inventory summary"
                );
                for (class_name, count) in classes {
                    debug!(%class_name, count, "class histogram");
                }
            }
            EngineEvent::ExportWritten { location } => info!(%location, "snapshot exported"),
            EngineEvent::ExportFailed { error } => warn!(%error, "snapshot export failed"),
        }
    }
}

/// Keeps every emitted event in memory, in order.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<EngineEvent>>,
}

impl CollectingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A copy of everything emitted so far.
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Number of emitted events matching the predicate.
    pub fn count(&self, pred: impl Fn(&EngineEvent) -> bool) -> usize {
        self.events
            .lock()
            .map(|e| e.iter().filter(|ev| pred(ev)).count())
            .unwrap_or(0)
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: EngineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
