//! Action execution with verification and coordinate fallback.
//!
//! This module provides the [`ActionExecutor`] type, which performs actions
//! (click, long-click, text entry) on targets resolved by the
//! [`LocatorChain`]. Failures of a single action are caught and turned into an
//! [`Outcome`]; they never abort the caller.
//!
//! Text entry has two tiers. The semantic tier resolves an editable field,
//! focuses it, replaces its content and optionally submits. If the field
//! cannot be resolved or any semantic step fails, the coordinate tier taps
//! the backup coordinates in order until one of them activates an editable
//! field, then writes the value there and reports [`Outcome::Degraded`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use droidscope_core::config::EngineConfig;
//! use droidscope_core::events::TracingSink;
//! use droidscope_core::executor::{ActionExecutor, InputOptions};
//! use droidscope_core::locator::LocatorSpec;
//! use droidscope_core::tree::ScreenTree;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // A captured screen serves as both the device and the accessibility
//! // surface, so taps move focus in the same tree the queries read.
//! let screen = Arc::new(ScreenTree::load("screen.json")?);
//! let executor = ActionExecutor::new(
//!     screen.clone(),
//!     screen,
//!     TracingSink::shared(),
//!     EngineConfig::default(),
//! );
//!
//! let search = LocatorSpec::new("search box").texts(["搜索"]);
//! let outcome = executor
//!     .input_text(&search, "咖啡", &InputOptions::default().backup([(540, 180)]))
//!     .await;
//! println!("{}", outcome);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info_span, Instrument};

use crate::config::EngineConfig;
use crate::element::{ElementRef, EDIT_TEXT};
use crate::events::{EngineEvent, EventSink};
use crate::host::{AccessibilitySurface, DeviceControl, HostError, KeyCode, Query};
use crate::locator::{LocatorChain, LocatorSpec};

/// Result of an executor operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The primary path succeeded.
    Ok,
    /// A fallback path succeeded instead of the primary one.
    Degraded,
    /// No target could be found; nothing was touched.
    NotFound,
    /// The target was found but the action failed; the cause is attached.
    ActionFailed(String),
}

impl Outcome {
    /// Returns true for [`Outcome::Ok`] and [`Outcome::Degraded`].
    pub fn succeeded(&self) -> bool {
        matches!(self, Outcome::Ok | Outcome::Degraded)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Outcome::Ok => "ok",
            Outcome::Degraded => "degraded",
            Outcome::NotFound => "not_found",
            Outcome::ActionFailed(_) => "action_failed",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::ActionFailed(cause) => write!(f, "action_failed: {}", cause),
            other => f.write_str(other.name()),
        }
    }
}

/// Options for [`ActionExecutor::click`].
#[derive(Debug, Clone)]
pub struct ClickOptions {
    /// Name used in diagnostics.
    pub label: String,
    /// Wait after a successful click. `None` uses the configured settle delay.
    pub settle: Option<Duration>,
}

impl ClickOptions {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            settle: None,
        }
    }

    pub fn settle(mut self, settle: Duration) -> Self {
        self.settle = Some(settle);
        self
    }
}

impl Default for ClickOptions {
    fn default() -> Self {
        Self::new("element")
    }
}

/// Options for [`ActionExecutor::input_text`].
#[derive(Debug, Clone)]
pub struct InputOptions {
    /// Submit after typing: click a submit control, or press enter.
    pub press_enter: bool,
    /// Coordinates tried when the semantic path fails. When empty, the
    /// spec's own coordinates are used.
    pub backup_coordinates: Vec<(i32, i32)>,
}

impl Default for InputOptions {
    fn default() -> Self {
        Self {
            press_enter: true,
            backup_coordinates: Vec::new(),
        }
    }
}

impl InputOptions {
    pub fn press_enter(mut self, press_enter: bool) -> Self {
        self.press_enter = press_enter;
        self
    }

    pub fn backup(mut self, coordinates: impl IntoIterator<Item = (i32, i32)>) -> Self {
        self.backup_coordinates = coordinates.into_iter().collect();
        self
    }
}

/// Performs actions against resolved elements and raw coordinates.
pub struct ActionExecutor {
    device: Arc<dyn DeviceControl>,
    locator: LocatorChain,
    events: Arc<dyn EventSink>,
    config: EngineConfig,
}

impl ActionExecutor {
    /// Creates a new executor over the given host surfaces.
    pub fn new(
        device: Arc<dyn DeviceControl>,
        surface: Arc<dyn AccessibilitySurface>,
        events: Arc<dyn EventSink>,
        config: EngineConfig,
    ) -> Self {
        Self {
            device,
            locator: LocatorChain::new(surface, events.clone())
                .with_default_timeout(config.lookup_timeout()),
            events,
            config,
        }
    }

    pub fn locator(&self) -> &LocatorChain {
        &self.locator
    }

    pub fn device(&self) -> &Arc<dyn DeviceControl> {
        &self.device
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Click a resolved element.
    ///
    /// `None` reports [`Outcome::NotFound`] without touching the screen. A
    /// failing native click reports [`Outcome::ActionFailed`]. After a
    /// successful click the executor waits for the settle delay, since the
    /// host applies the click asynchronously.
    pub async fn click(&self, target: Option<&ElementRef>, opts: &ClickOptions) -> Outcome {
        let span = info_span!("click", label = %opts.label);
        async {
            let Some(element) = target else {
                self.events.emit(EngineEvent::NotFound {
                    label: opts.label.clone(),
                });
                return Outcome::NotFound;
            };

            let start = Instant::now();
            self.events.emit(EngineEvent::ActionStarted {
                label: opts.label.clone(),
                action: "click".to_string(),
            });

            match element.node().click().await {
                Ok(()) => {
                    self.device
                        .pause(opts.settle.unwrap_or_else(|| self.config.settle()))
                        .await;
                    debug!(elapsed_ms = start.elapsed().as_millis() as u64, "click settled");
                    self.events.emit(EngineEvent::ActionCompleted {
                        label: opts.label.clone(),
                        action: "click".to_string(),
                    });
                    Outcome::Ok
                }
                Err(e) => self.action_failed(&opts.label, "click", &e),
            }
        }
        .instrument(span)
        .await
    }

    /// Long-click a resolved element. Same reporting rules as [`click`](Self::click).
    pub async fn long_click(&self, target: Option<&ElementRef>, opts: &ClickOptions) -> Outcome {
        let Some(element) = target else {
            self.events.emit(EngineEvent::NotFound {
                label: opts.label.clone(),
            });
            return Outcome::NotFound;
        };

        self.events.emit(EngineEvent::ActionStarted {
            label: opts.label.clone(),
            action: "long_click".to_string(),
        });
        match element.node().long_click().await {
            Ok(()) => {
                self.device
                    .pause(opts.settle.unwrap_or_else(|| self.config.settle()))
                    .await;
                self.events.emit(EngineEvent::ActionCompleted {
                    label: opts.label.clone(),
                    action: "long_click".to_string(),
                });
                Outcome::Ok
            }
            Err(e) => self.action_failed(&opts.label, "long_click", &e),
        }
    }

    /// Resolve `spec` and click it, tapping the spec's coordinates if the
    /// element cannot be found or the click fails.
    ///
    /// The first backup coordinate whose tap goes through yields
    /// [`Outcome::Degraded`]. Without usable coordinates the semantic
    /// outcome is returned unchanged.
    pub async fn find_and_click(&self, spec: &LocatorSpec, opts: &ClickOptions) -> Outcome {
        let target = self.locator.resolve(spec).await;
        let outcome = self.click(target.as_ref(), opts).await;
        if outcome == Outcome::Ok || spec.coordinates.is_empty() {
            return outcome;
        }

        self.events.emit(EngineEvent::CoordinateFallback {
            label: spec.label.clone(),
            candidates: spec.coordinates.len(),
        });
        for &(x, y) in &spec.coordinates {
            self.events.emit(EngineEvent::CoordinateTap { x, y });
            match self.device.tap(x, y).await {
                Ok(()) => {
                    self.device
                        .pause(opts.settle.unwrap_or_else(|| self.config.settle()))
                        .await;
                    return Outcome::Degraded;
                }
                Err(e) => {
                    self.action_failed(&spec.label, "tap", &e);
                }
            }
        }

        self.events.emit(EngineEvent::FallbackExhausted {
            label: spec.label.clone(),
        });
        outcome
    }

    /// Enter `value` into the editable field described by `spec`.
    ///
    /// Returns [`Outcome::Ok`] when the semantic path succeeded,
    /// [`Outcome::Degraded`] when a backup coordinate had to be used, and
    /// [`Outcome::NotFound`] when neither path reached a field.
    pub async fn input_text(&self, spec: &LocatorSpec, value: &str, opts: &InputOptions) -> Outcome {
        let span = info_span!("input_text", label = %spec.label);
        async {
            let field_spec = LocatorSpec {
                class_name: Some(EDIT_TEXT.to_string()),
                ..spec.clone()
            };

            if let Some(field) = self.locator.resolve(&field_spec).await {
                match self.enter_into_field(&field, &spec.label, value, opts.press_enter).await {
                    Ok(()) => return Outcome::Ok,
                    Err(e) => {
                        self.action_failed(&spec.label, "input_text", &e);
                    }
                }
            }

            let coordinates = if opts.backup_coordinates.is_empty() {
                &spec.coordinates
            } else {
                &opts.backup_coordinates
            };
            self.input_by_coordinates(&spec.label, coordinates, value, opts.press_enter)
                .await
        }
        .instrument(span)
        .await
    }

    /// Coordinate tier of text entry.
    ///
    /// Taps each coordinate in order; after each tap checks whether an
    /// editable field is active anywhere on screen. The first one that is
    /// receives `value`.
    pub async fn input_by_coordinates(
        &self,
        label: &str,
        coordinates: &[(i32, i32)],
        value: &str,
        press_enter: bool,
    ) -> Outcome {
        if coordinates.is_empty() {
            self.events.emit(EngineEvent::FallbackExhausted {
                label: label.to_string(),
            });
            return Outcome::NotFound;
        }

        self.events.emit(EngineEvent::CoordinateFallback {
            label: label.to_string(),
            candidates: coordinates.len(),
        });

        let active_field = Query::focused().with_class(EDIT_TEXT);
        for &(x, y) in coordinates {
            self.events.emit(EngineEvent::CoordinateTap { x, y });
            if let Err(e) = self.device.tap(x, y).await {
                self.action_failed(label, "tap", &e);
                continue;
            }
            self.device.pause(self.config.coordinate_settle()).await;

            let field = match self.locator.surface().find_one(&active_field, Duration::ZERO).await {
                Ok(Some(field)) => field,
                Ok(None) => continue,
                Err(e) => {
                    self.action_failed(label, "check_field", &e);
                    continue;
                }
            };
            self.events.emit(EngineEvent::FieldActivated { x, y });

            if let Err(e) = field.node().set_text(value).await {
                self.action_failed(label, "set_text", &e);
                continue;
            }
            self.device.pause(self.config.type_settle()).await;
            self.events.emit(EngineEvent::TextEntered {
                label: label.to_string(),
                value: value.to_string(),
            });

            if press_enter {
                match self.device.press_key(KeyCode::Enter).await {
                    Ok(()) => self.events.emit(EngineEvent::EnterKeySent),
                    Err(e) => {
                        self.action_failed(label, "press_enter", &e);
                    }
                }
            }
            return Outcome::Degraded;
        }

        self.events.emit(EngineEvent::FallbackExhausted {
            label: label.to_string(),
        });
        Outcome::NotFound
    }

    /// Semantic tier of text entry: focus, clear, type, submit.
    async fn enter_into_field(
        &self,
        field: &ElementRef,
        label: &str,
        value: &str,
        press_enter: bool,
    ) -> Result<(), HostError> {
        let node = field.node();
        node.click().await?;
        self.device.pause(self.config.focus_delay()).await;

        node.set_text("").await?;
        self.device.pause(self.config.clear_delay()).await;
        node.set_text(value).await?;
        self.device.pause(self.config.type_settle()).await;

        self.events.emit(EngineEvent::TextEntered {
            label: label.to_string(),
            value: value.to_string(),
        });

        if press_enter {
            self.submit().await?;
        }
        Ok(())
    }

    /// Click the first submit control that materializes, or press enter.
    async fn submit(&self) -> Result<(), HostError> {
        let spec = LocatorSpec::new("submit")
            .texts(self.config.submit_labels.iter().cloned())
            .timeout(self.config.submit_timeout());

        match self.locator.locate(&spec).await {
            Some(resolved) => {
                resolved.element.node().click().await?;
                self.events.emit(EngineEvent::SubmitClicked {
                    label: resolved.candidate,
                });
            }
            None => {
                self.device.press_key(KeyCode::Enter).await?;
                self.events.emit(EngineEvent::EnterKeySent);
            }
        }
        Ok(())
    }

    fn action_failed(&self, label: &str, action: &str, cause: &HostError) -> Outcome {
        self.events.emit(EngineEvent::ActionFailed {
            label: label.to_string(),
            action: action.to_string(),
            cause: cause.to_string(),
        });
        Outcome::ActionFailed(cause.to_string())
    }
}
