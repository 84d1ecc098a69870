//! # droidscope-core
//!
//! Element resolution, interaction and screen inventory for automating
//! third-party Android applications through their accessibility tree.
//!
//! The engine never owns the device. It talks to two host traits, and any
//! backend that implements them can drive it:
//!
//! - [`host::DeviceControl`] for keys, raw taps, screen size and waiting
//! - [`host::AccessibilitySurface`] for queries against the live tree
//!
//! ## Modules
//!
//! - [`element`] - Live element handles and the per-attribute read contract
//! - [`host`] - Host traits, queries and key codes
//! - [`locator`] - Identifier, description and text lookup strategies
//! - [`executor`] - Click and text entry with coordinate fallback
//! - [`introspect`] - Attribute extraction into serializable records
//! - [`inventory`] - Whole-screen element inventory and statistics
//! - [`snapshot`] - Exported inventory snapshots
//! - [`events`] - Diagnostic events and sinks
//! - [`config`] - Timing and inventory configuration
//! - [`adb`] - `adb`-backed device control
//! - [`tree`] - Offline accessibility tree from a JSON screen dump
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use droidscope_core::config::EngineConfig;
//! use droidscope_core::events::TracingSink;
//! use droidscope_core::executor::{ActionExecutor, ClickOptions};
//! use droidscope_core::locator::LocatorSpec;
//! use droidscope_core::tree::ScreenTree;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let tree = Arc::new(ScreenTree::load("screen.json")?);
//! let executor = ActionExecutor::new(tree.clone(), tree, TracingSink::shared(), EngineConfig::load());
//!
//! let confirm = LocatorSpec::new("confirm")
//!     .ids(["com.example:id/confirm"])
//!     .texts(["确认", "OK"])
//!     .coordinates([(540, 2200)]);
//! let outcome = executor.find_and_click(&confirm, &ClickOptions::new("confirm")).await;
//! assert!(outcome.succeeded());
//! # Ok(())
//! # }
//! ```

pub mod adb;
pub mod config;
pub mod element;
pub mod events;
pub mod executor;
pub mod host;
pub mod introspect;
pub mod inventory;
pub mod locator;
pub mod snapshot;
pub mod tree;
