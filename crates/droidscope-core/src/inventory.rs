//! Whole-screen element inventory.
//!
//! [`InventoryBuilder::build`] characterizes the interactive surface of the
//! current screen. It queries five capability predicates and a list of
//! widget classes, optionally adds every visible element, deduplicates the
//! union by node identity, truncates it, introspects what remains and
//! computes aggregate statistics. An optional snapshot of the result is
//! exported through a [`SnapshotSink`].
//!
//! Every step is fault tolerant. A predicate query that fails contributes
//! nothing and the pass continues; a failed export is reported and leaves
//! the returned records untouched.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use droidscope_core::config::EngineConfig;
//! use droidscope_core::events::TracingSink;
//! use droidscope_core::inventory::{InventoryBuilder, InventoryOptions};
//! use droidscope_core::snapshot::DirectorySink;
//! use droidscope_core::tree::ScreenTree;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EngineConfig::load();
//! let tree = Arc::new(ScreenTree::load("screen.json")?);
//! let builder = InventoryBuilder::new(
//!     tree.clone(),
//!     tree,
//!     TracingSink::shared(),
//!     Arc::new(DirectorySink::new(config.export_dir())),
//! );
//!
//! let inventory = builder.build(&InventoryOptions::from_config(&config)).await;
//! println!("{} elements, {} clickable", inventory.stats.total, inventory.stats.clickable);
//! # Ok(())
//! # }
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info_span, Instrument};

use crate::config::EngineConfig;
use crate::element::{Capability, ElementKind, ElementRef, NodeKey};
use crate::events::{EngineEvent, EventSink};
use crate::host::{AccessibilitySurface, DeviceControl, Query};
use crate::introspect::{introspect, ElementInfo, ElementRecord};
use crate::snapshot::{self, DeviceInfo, InventorySnapshot, SnapshotSink};

/// Element cap used by [`InventoryBuilder::quick_inventory`].
pub const QUICK_INVENTORY_MAX: usize = 200;

/// Options for one inventory pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryOptions {
    /// Attach full records to per-element diagnostics.
    pub detailed: bool,
    /// Also include every element visible to the user.
    pub include_non_clickable: bool,
    /// Upper bound on introspected elements, in discovery order.
    pub max_elements: usize,
    /// Write an [`InventorySnapshot`] after the pass.
    pub export_snapshot: bool,
    /// Widget classes queried individually.
    pub focus_classes: Vec<String>,
}

impl Default for InventoryOptions {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl InventoryOptions {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            detailed: false,
            include_non_clickable: true,
            max_elements: config.max_elements,
            export_snapshot: false,
            focus_classes: config.focus_classes.clone(),
        }
    }
}

/// Aggregate counts over the introspected records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryStats {
    pub total: usize,
    pub clickable: usize,
    pub editable: usize,
    pub scrollable: usize,
    pub long_clickable: usize,
    pub checkable: usize,
    pub with_text: usize,
    pub with_description: usize,
    pub with_identifier: usize,
    pub degraded: usize,
    /// Class histogram, most frequent first; ties ordered by class name.
    pub classes: Vec<(String, usize)>,
}

impl InventoryStats {
    pub fn from_records(records: &[ElementRecord]) -> Self {
        let infos: Vec<&ElementInfo> = records.iter().filter_map(ElementRecord::info).collect();
        let count = |f: fn(&ElementInfo) -> bool| infos.iter().filter(|i| f(i)).count();

        let mut histogram: HashMap<&str, usize> = HashMap::new();
        for info in &infos {
            if !info.class_name.is_empty() {
                *histogram.entry(info.class_name.as_str()).or_default() += 1;
            }
        }
        let mut classes: Vec<(String, usize)> = histogram
            .into_iter()
            .map(|(name, n)| (name.to_string(), n))
            .collect();
        classes.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        Self {
            total: records.len(),
            clickable: count(|i| i.clickable),
            editable: count(|i| i.editable),
            scrollable: count(|i| i.scrollable),
            long_clickable: count(|i| i.long_clickable),
            checkable: count(|i| i.checkable),
            with_text: count(|i| !i.text.is_empty()),
            with_description: count(|i| !i.description.is_empty()),
            with_identifier: count(|i| !i.identifier.is_empty()),
            degraded: records.len() - infos.len(),
            classes,
        }
    }
}

/// Result of one inventory pass.
#[derive(Debug, Clone)]
pub struct Inventory {
    /// Every introspected element, in discovery order.
    pub records: Vec<ElementRecord>,
    pub stats: InventoryStats,
    pub device: DeviceInfo,
    /// Where the snapshot went, if one was requested and written.
    pub exported_to: Option<String>,
}

/// Ordered union of element handles, deduplicated by node identity.
#[derive(Default)]
struct Discovery {
    seen: HashSet<NodeKey>,
    elements: Vec<ElementRef>,
}

impl Discovery {
    fn extend(&mut self, elements: Vec<ElementRef>) {
        for element in elements {
            if self.seen.insert(element.key()) {
                self.elements.push(element);
            }
        }
    }
}

/// Builds screen inventories from an accessibility surface.
pub struct InventoryBuilder {
    device: Arc<dyn DeviceControl>,
    surface: Arc<dyn AccessibilitySurface>,
    events: Arc<dyn EventSink>,
    sink: Arc<dyn SnapshotSink>,
}

impl InventoryBuilder {
    pub fn new(
        device: Arc<dyn DeviceControl>,
        surface: Arc<dyn AccessibilitySurface>,
        events: Arc<dyn EventSink>,
        sink: Arc<dyn SnapshotSink>,
    ) -> Self {
        Self {
            device,
            surface,
            events,
            sink,
        }
    }

    /// Run a full inventory pass.
    pub async fn build(&self, opts: &InventoryOptions) -> Inventory {
        let span = info_span!("inventory", max_elements = opts.max_elements);
        self.build_inner(opts).instrument(span).await
    }

    /// Clickable-oriented pass: no visible-only elements, at most
    /// [`QUICK_INVENTORY_MAX`] records, no export.
    pub async fn quick_inventory(&self) -> Inventory {
        let opts = InventoryOptions {
            detailed: false,
            include_non_clickable: false,
            max_elements: QUICK_INVENTORY_MAX,
            ..InventoryOptions::default()
        };
        self.build(&opts).await
    }

    /// Introspect every element of one widget family.
    ///
    /// Each class of the family is queried on its own; a failing query is
    /// reported and skipped. Indices run across the whole family.
    pub async fn find_elements_by_type(&self, kind: ElementKind) -> Vec<ElementRecord> {
        let mut records = Vec::new();
        for class_name in kind.class_names() {
            let query = Query::class_name(*class_name);
            for element in self.query_all(&query).await {
                records.push(introspect(&element, records.len() + 1));
            }
        }
        records
    }

    async fn build_inner(&self, opts: &InventoryOptions) -> Inventory {
        let device = match self.device.screen_size().await {
            Ok((width, height)) => DeviceInfo { width, height },
            Err(e) => {
                self.events.emit(EngineEvent::PredicateFailed {
                    predicate: "screen_size".to_string(),
                    error: e.to_string(),
                });
                DeviceInfo { width: 0, height: 0 }
            }
        };

        self.events.emit(EngineEvent::InventoryStarted {
            device_width: device.width,
            device_height: device.height,
            detailed: opts.detailed,
            include_non_clickable: opts.include_non_clickable,
            max_elements: opts.max_elements,
        });

        let mut discovery = Discovery::default();
        for capability in Capability::INVENTORY_ORDER {
            discovery.extend(self.query_all(&Query::capability(capability)).await);
        }
        for class_name in &opts.focus_classes {
            discovery.extend(self.query_all(&Query::class_name(class_name.as_str())).await);
        }
        if opts.include_non_clickable {
            discovery.extend(self.query_all(&Query::visible()).await);
        }

        let mut elements = discovery.elements;
        if elements.len() > opts.max_elements {
            self.events.emit(EngineEvent::InventoryTruncated {
                discovered: elements.len(),
                kept: opts.max_elements,
            });
            elements.truncate(opts.max_elements);
        }

        let records: Vec<ElementRecord> = elements
            .iter()
            .enumerate()
            .map(|(i, element)| {
                let record = introspect(element, i + 1);
                self.report_record(&record, opts.detailed);
                record
            })
            .collect();

        let stats = InventoryStats::from_records(&records);
        self.events.emit(EngineEvent::InventorySummary {
            total: stats.total,
            clickable: stats.clickable,
            editable: stats.editable,
            scrollable: stats.scrollable,
            long_clickable: stats.long_clickable,
            checkable: stats.checkable,
            with_text: stats.with_text,
            with_description: stats.with_description,
            with_identifier: stats.with_identifier,
            classes: stats.classes.clone(),
        });

        let exported_to = if opts.export_snapshot {
            self.export(device, &records)
        } else {
            None
        };

        Inventory {
            records,
            stats,
            device,
            exported_to,
        }
    }

    /// One batch query; failure is reported and contributes nothing.
    async fn query_all(&self, query: &Query) -> Vec<ElementRef> {
        match self.surface.find_all(query).await {
            Ok(elements) => {
                self.events.emit(EngineEvent::PredicateQueried {
                    predicate: query.to_string(),
                    count: elements.len(),
                });
                elements
            }
            Err(e) => {
                self.events.emit(EngineEvent::PredicateFailed {
                    predicate: query.to_string(),
                    error: e.to_string(),
                });
                Vec::new()
            }
        }
    }

    fn report_record(&self, record: &ElementRecord, detailed: bool) {
        match record {
            ElementRecord::Element(info) if info.is_notable() => {
                self.events.emit(EngineEvent::ElementListed {
                    index: info.index,
                    display: info.display_name().to_string(),
                    detail: detailed.then(|| Box::new(info.clone())),
                });
            }
            ElementRecord::Element(_) => {}
            ElementRecord::Degraded(degraded) => {
                self.events.emit(EngineEvent::ElementDegraded {
                    index: degraded.index,
                    error: degraded.error.clone(),
                });
            }
        }
    }

    fn export(&self, device: DeviceInfo, records: &[ElementRecord]) -> Option<String> {
        let snapshot = InventorySnapshot::new(device, records.to_vec());
        match snapshot::export(self.sink.as_ref(), &snapshot) {
            Ok(location) => {
                self.events.emit(EngineEvent::ExportWritten {
                    location: location.clone(),
                });
                Some(location)
            }
            Err(e) => {
                self.events.emit(EngineEvent::ExportFailed {
                    error: e.to_string(),
                });
                None
            }
        }
    }
}
