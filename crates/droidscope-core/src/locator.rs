//! Multi-strategy element resolution.
//!
//! A [`LocatorSpec`] names a logical target by several independent kinds of
//! evidence: resource identifiers, accessibility descriptions and visible
//! texts. [`LocatorChain::resolve`] tries them in a fixed priority order
//! ([`StrategyKind::PRIORITY`]) and returns the first element that
//! materializes within the per-candidate timeout.
//!
//! The priority order is data, not control flow: each strategy attempt
//! yields a [`StrategyOutcome`] and the attempts are combined by
//! [`first_success`]. The same combinator drives the candidates inside one
//! strategy.
//!
//! Coordinates carried by a spec are never used here. A coordinate is a place
//! to act, not an element to resolve; the
//! [`ActionExecutor`](crate::executor::ActionExecutor) owns that fallback.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use droidscope_core::events::TracingSink;
//! use droidscope_core::locator::{LocatorChain, LocatorSpec};
//! use droidscope_core::tree::ScreenTree;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let tree = Arc::new(ScreenTree::load("screen.json")?);
//! let chain = LocatorChain::new(tree, TracingSink::shared());
//!
//! let spec = LocatorSpec::new("delivery tab")
//!     .ids(["com.sankuai.meituan:id/waimai_channel_icon"])
//!     .descriptions(["外卖"])
//!     .texts(["外卖"]);
//!
//! match chain.resolve(&spec).await {
//!     Some(element) => println!("found {:?}", element),
//!     None => println!("not on this screen"),
//! }
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::element::ElementRef;
use crate::events::{EngineEvent, EventSink};
use crate::host::{AccessibilitySurface, Query};

/// Default bounded wait per candidate.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_millis(1000);

/// One lookup method of the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Identifier,
    Description,
    Text,
}

impl StrategyKind {
    /// The fixed order strategies are tried in.
    pub const PRIORITY: [StrategyKind; 3] = [
        StrategyKind::Identifier,
        StrategyKind::Description,
        StrategyKind::Text,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::Identifier => "identifier",
            StrategyKind::Description => "description",
            StrategyKind::Text => "text",
        }
    }

    /// Build the host query for one candidate of this strategy.
    pub fn query(&self, candidate: &str, class_name: Option<&str>) -> Query {
        let query = match self {
            StrategyKind::Identifier => Query::id(candidate),
            StrategyKind::Description => Query::description(candidate),
            StrategyKind::Text => Query::text(candidate),
        };
        query.with_class_opt(class_name)
    }
}

/// Result of one strategy (or one candidate) attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyOutcome<T> {
    /// The attempt produced a value; stop here.
    Matched(T),
    /// The attempt had nothing to offer: no candidates, or none materialized.
    NotApplicable,
    /// The attempt failed at the host. Already reported; the chain moves on.
    Errored(String),
}

impl<T> StrategyOutcome<T> {
    pub fn is_matched(&self) -> bool {
        matches!(self, StrategyOutcome::Matched(_))
    }
}

/// Runs `attempt` over `items` in order and returns the first match.
///
/// Later items are not attempted once one matches. `NotApplicable` and
/// `Errored` outcomes both fall through to the next item.
pub async fn first_success<I, F, Fut, T>(items: I, mut attempt: F) -> Option<T>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = StrategyOutcome<T>>,
{
    for item in items {
        match attempt(item).await {
            StrategyOutcome::Matched(value) => return Some(value),
            StrategyOutcome::NotApplicable | StrategyOutcome::Errored(_) => continue,
        }
    }
    None
}

/// Immutable description of a logical UI target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocatorSpec {
    #[serde(default)]
    pub identifiers: Vec<String>,
    #[serde(default)]
    pub descriptions: Vec<String>,
    #[serde(default)]
    pub texts: Vec<String>,
    /// Restricts every strategy to elements of this class.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    /// Backup tap locations, used only by the executor.
    #[serde(default)]
    pub coordinates: Vec<(i32, i32)>,
    /// Bounded wait per candidate. `None` uses the chain's default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Human-readable name used in diagnostics.
    #[serde(default = "default_label")]
    pub label: String,
}

fn default_label() -> String {
    "element".to_string()
}

impl Default for LocatorSpec {
    fn default() -> Self {
        Self::new(default_label())
    }
}

impl LocatorSpec {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            identifiers: Vec::new(),
            descriptions: Vec::new(),
            texts: Vec::new(),
            class_name: None,
            coordinates: Vec::new(),
            timeout_ms: None,
            label: label.into(),
        }
    }

    pub fn ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.identifiers = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn descriptions<I, S>(mut self, descriptions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.descriptions = descriptions.into_iter().map(Into::into).collect();
        self
    }

    pub fn texts<I, S>(mut self, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.texts = texts.into_iter().map(Into::into).collect();
        self
    }

    pub fn class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    pub fn coordinates(mut self, coordinates: impl IntoIterator<Item = (i32, i32)>) -> Self {
        self.coordinates = coordinates.into_iter().collect();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// The per-candidate wait, or `default` when none was set.
    pub fn timeout_or(&self, default: Duration) -> Duration {
        self.timeout_ms.map_or(default, Duration::from_millis)
    }

    /// Candidates for one strategy, in the order given.
    pub fn candidates(&self, kind: StrategyKind) -> &[String] {
        match kind {
            StrategyKind::Identifier => &self.identifiers,
            StrategyKind::Description => &self.descriptions,
            StrategyKind::Text => &self.texts,
        }
    }

    /// Returns true if at least one semantic strategy has candidates.
    pub fn has_semantic_criteria(&self) -> bool {
        StrategyKind::PRIORITY
            .iter()
            .any(|kind| !self.candidates(*kind).is_empty())
    }

    /// Upper bound on how long [`LocatorChain::resolve`] can wait in total,
    /// given the chain's default per-candidate wait.
    pub fn worst_case_wait(&self, default: Duration) -> Duration {
        let candidates = self.identifiers.len() + self.descriptions.len() + self.texts.len();
        self.timeout_or(default) * candidates as u32
    }
}

/// A resolved element together with the evidence that found it.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub element: ElementRef,
    pub strategy: StrategyKind,
    pub candidate: String,
}

/// Resolves [`LocatorSpec`]s against an accessibility surface.
#[derive(Clone)]
pub struct LocatorChain {
    surface: Arc<dyn AccessibilitySurface>,
    events: Arc<dyn EventSink>,
    default_timeout: Duration,
}

impl LocatorChain {
    pub fn new(surface: Arc<dyn AccessibilitySurface>, events: Arc<dyn EventSink>) -> Self {
        Self {
            surface,
            events,
            default_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    /// Per-candidate wait for specs that do not set their own.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub fn surface(&self) -> &Arc<dyn AccessibilitySurface> {
        &self.surface
    }

    /// Resolve a target to a live element, or `None` if nothing matched.
    ///
    /// Absence is an expected outcome and is never reported as an error.
    pub async fn resolve(&self, spec: &LocatorSpec) -> Option<ElementRef> {
        self.locate(spec).await.map(|resolved| resolved.element)
    }

    /// Like [`resolve`](Self::resolve) but also reports which strategy and
    /// candidate matched.
    pub async fn locate(&self, spec: &LocatorSpec) -> Option<Resolved> {
        self.events.emit(EngineEvent::LookupStarted {
            label: spec.label.clone(),
        });

        let found = first_success(StrategyKind::PRIORITY, |kind| self.try_strategy(spec, kind)).await;

        match &found {
            Some(resolved) => self.events.emit(EngineEvent::Resolved {
                label: spec.label.clone(),
                strategy: resolved.strategy,
                candidate: resolved.candidate.clone(),
            }),
            None => self.events.emit(EngineEvent::NotFound {
                label: spec.label.clone(),
            }),
        }
        found
    }

    async fn try_strategy(&self, spec: &LocatorSpec, kind: StrategyKind) -> StrategyOutcome<Resolved> {
        let candidates = spec.candidates(kind);
        if candidates.is_empty() {
            return StrategyOutcome::NotApplicable;
        }

        let errored = AtomicUsize::new(0);
        let errored_ref = &errored;
        let found = first_success(candidates, move |candidate| async move {
            let outcome = self.try_candidate(spec, kind, candidate).await;
            if matches!(outcome, StrategyOutcome::Errored(_)) {
                errored_ref.fetch_add(1, Ordering::Relaxed);
            }
            outcome
        })
        .await;

        match found {
            Some(resolved) => StrategyOutcome::Matched(resolved),
            None if errored.load(Ordering::Relaxed) == candidates.len() => {
                StrategyOutcome::Errored(format!(
                    "all {} {} candidates errored",
                    candidates.len(),
                    kind.name()
                ))
            }
            None => StrategyOutcome::NotApplicable,
        }
    }

    async fn try_candidate(
        &self,
        spec: &LocatorSpec,
        kind: StrategyKind,
        candidate: &str,
    ) -> StrategyOutcome<Resolved> {
        self.events.emit(EngineEvent::StrategyAttempt {
            label: spec.label.clone(),
            strategy: kind,
            candidate: candidate.to_string(),
        });

        let query = kind.query(candidate, spec.class_name.as_deref());
        match self.surface.find_one(&query, spec.timeout_or(self.default_timeout)).await {
            Ok(Some(element)) => StrategyOutcome::Matched(Resolved {
                element,
                strategy: kind,
                candidate: candidate.to_string(),
            }),
            Ok(None) => StrategyOutcome::NotApplicable,
            Err(e) => {
                self.events.emit(EngineEvent::StrategyErrored {
                    label: spec.label.clone(),
                    strategy: kind,
                    candidate: candidate.to_string(),
                    error: e.to_string(),
                });
                StrategyOutcome::Errored(e.to_string())
            }
        }
    }
}
