//! CLI for Android screen inventory and element lookup via droidscope.
//!
//! Offline commands work on a captured accessibility dump (see
//! `droidscope_core::tree`); device commands drive a phone over `adb`.
//!
//! # Usage
//!
//! ```bash
//! # Inventory every interactive element of a captured screen
//! droidscope inventory screen.json
//!
//! # Full records, clickable-oriented pass only, write a snapshot
//! droidscope inventory screen.json --detailed --clickable-only --export
//!
//! # Resolve a target through the identifier → description → text chain
//! droidscope find screen.json --id com.example:id/search --text 搜索 --class android.widget.EditText
//!
//! # List every button on the screen
//! droidscope by-type screen.json button
//!
//! # Drive a device
//! droidscope -s emulator-5554 screen-size
//! droidscope tap 540 1200
//! droidscope key ENTER
//! droidscope send-keys "hello world"
//! droidscope launch com.example.food
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use droidscope_core::adb::AdbDevice;
use droidscope_core::config::EngineConfig;
use droidscope_core::element::ElementKind;
use droidscope_core::events::TracingSink;
use droidscope_core::host::{DeviceControl, HostError, KeyCode};
use droidscope_core::introspect::{introspect, ElementInfo, ElementRecord};
use droidscope_core::inventory::{InventoryBuilder, InventoryOptions};
use droidscope_core::locator::{LocatorChain, LocatorSpec};
use droidscope_core::snapshot::DirectorySink;
use droidscope_core::tree::ScreenTree;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// CLI for Android screen inventory and element lookup.
#[derive(Parser)]
#[command(name = "droidscope")]
#[command(about = "Inspect Android screens and drive devices through the accessibility tree")]
#[command(version)]
struct Cli {
    /// Device serial passed to adb
    #[arg(short, long, env = "DROIDSCOPE_SERIAL")]
    serial: Option<String>,

    /// Output format: text or json
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    /// Configuration file (defaults to ~/.droidscope/config.json)
    #[arg(long, env = "DROIDSCOPE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Inventory the elements of a captured screen
    Inventory {
        /// Path to the screen dump
        dump: PathBuf,
        /// Attach full records to per-element diagnostics
        #[arg(long)]
        detailed: bool,
        /// Skip the pass over every visible element
        #[arg(long)]
        clickable_only: bool,
        /// Maximum number of elements to introspect
        #[arg(long)]
        max: Option<usize>,
        /// Write a snapshot to the export directory
        #[arg(long)]
        export: bool,
    },

    /// Resolve a target on a captured screen
    Find {
        /// Path to the screen dump
        dump: PathBuf,
        /// Resource identifier candidates, tried first
        #[arg(long = "id")]
        ids: Vec<String>,
        /// Content description candidates
        #[arg(long = "desc")]
        descriptions: Vec<String>,
        /// Visible text candidates, tried last
        #[arg(long = "text")]
        texts: Vec<String>,
        /// Restrict every query to this widget class
        #[arg(long = "class")]
        class_name: Option<String>,
        /// Wait per candidate in milliseconds
        #[arg(short = 'o', long)]
        timeout: Option<u64>,
    },

    /// List every element of one widget family on a captured screen
    ByType {
        /// Path to the screen dump
        dump: PathBuf,
        /// Family: button, input, text, image, list, scroll, checkbox, radio,
        /// switch, seekbar, spinner, layout
        kind: ElementKind,
    },

    /// Print the device screen size
    ScreenSize,

    /// Wake the device screen
    Wake,

    /// Tap at screen coordinates
    Tap {
        /// X coordinate
        x: i32,
        /// Y coordinate
        y: i32,
    },

    /// Press a key (e.g. ENTER, BACK, KEYCODE_HOME)
    Key {
        key: KeyCode,
    },

    /// Launch an application by package name
    Launch {
        package: String,
    },

    /// Type text into the focused field
    SendKeys {
        /// Text to type
        text: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            debug!(error = ?e, "command failed");
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

#[derive(Debug)]
enum CliError {
    NotFound(String),
    Device(String),
    Input(String),
}

impl CliError {
    fn exit_code(&self) -> ExitCode {
        match self {
            CliError::NotFound(_) => ExitCode::from(1),
            CliError::Device(_) => ExitCode::from(2),
            CliError::Input(_) => ExitCode::from(3),
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::NotFound(msg) => write!(f, "Not found: {}", msg),
            CliError::Device(msg) => write!(f, "Device error: {}", msg),
            CliError::Input(msg) => write!(f, "Invalid input: {}", msg),
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, CliError> {
    let config = match path {
        Some(path) => EngineConfig::load_from(path).map_err(|e| CliError::Input(e.to_string()))?,
        None => EngineConfig::load(),
    };
    if let Err(e) = config.validate() {
        warn!(error = %e, "rejecting configuration");
        return Err(CliError::Input(e.to_string()));
    }
    debug!(
        lookup_timeout_ms = config.lookup_timeout_ms,
        max_elements = config.max_elements,
        "configuration loaded"
    );
    Ok(config)
}

fn load_tree(dump: &Path) -> Result<Arc<ScreenTree>, CliError> {
    ScreenTree::load(dump)
        .map(Arc::new)
        .map_err(|e| CliError::Input(format!("{}: {}", dump.display(), e)))
}

fn print_json(value: &serde_json::Value) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| CliError::Input(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let Cli {
        serial,
        format,
        quiet,
        config,
        command,
    } = cli;
    let config = load_config(config.as_deref())?;

    match command {
        Command::Inventory {
            dump,
            detailed,
            clickable_only,
            max,
            export,
        } => {
            let tree = load_tree(&dump)?;
            let builder = InventoryBuilder::new(
                tree.clone(),
                tree,
                TracingSink::shared(),
                Arc::new(DirectorySink::new(config.export_dir())),
            );
            let opts = InventoryOptions {
                detailed,
                include_non_clickable: !clickable_only,
                max_elements: max.unwrap_or(config.max_elements),
                export_snapshot: export,
                ..InventoryOptions::from_config(&config)
            };
            let inventory = builder.build(&opts).await;

            if format == OutputFormat::Json {
                print_json(&serde_json::json!({
                    "device": inventory.device,
                    "stats": inventory.stats,
                    "exportedTo": inventory.exported_to,
                    "elements": inventory.records,
                }))?;
            } else {
                for record in &inventory.records {
                    println!("{}", format_record(record));
                }
                if !quiet {
                    eprintln!(
                        "{} elements ({} clickable, {} editable, {} scrollable)",
                        inventory.stats.total,
                        inventory.stats.clickable,
                        inventory.stats.editable,
                        inventory.stats.scrollable
                    );
                    if let Some(location) = &inventory.exported_to {
                        eprintln!("snapshot written to {}", location);
                    }
                }
            }
            Ok(())
        }
        Command::Find {
            dump,
            ids,
            descriptions,
            texts,
            class_name,
            timeout,
        } => {
            let tree = load_tree(&dump)?;
            let mut spec = LocatorSpec::new("target")
                .ids(ids)
                .descriptions(descriptions)
                .texts(texts);
            if let Some(ms) = timeout {
                spec = spec.timeout(Duration::from_millis(ms));
            }
            if let Some(class_name) = class_name {
                spec = spec.class_name(class_name);
            }
            if !spec.has_semantic_criteria() {
                return Err(CliError::Input("give at least one of --id, --desc, --text".to_string()));
            }

            let chain = LocatorChain::new(tree, TracingSink::shared())
                .with_default_timeout(config.lookup_timeout());
            let resolved = chain
                .locate(&spec)
                .await
                .ok_or_else(|| CliError::NotFound("no candidate matched".to_string()))?;
            let record = introspect(&resolved.element, 1);

            if format == OutputFormat::Json {
                print_json(&serde_json::json!({
                    "strategy": resolved.strategy,
                    "candidate": resolved.candidate,
                    "element": record,
                }))?;
            } else {
                println!("{}", format_record(&record));
                if !quiet {
                    eprintln!("matched by {} {:?}", resolved.strategy.name(), resolved.candidate);
                }
            }
            Ok(())
        }
        Command::ByType { dump, kind } => {
            let tree = load_tree(&dump)?;
            let builder = InventoryBuilder::new(
                tree.clone(),
                tree,
                TracingSink::shared(),
                Arc::new(DirectorySink::new(config.export_dir())),
            );
            let records = builder.find_elements_by_type(kind).await;

            if format == OutputFormat::Json {
                print_json(&serde_json::json!({ "kind": kind, "elements": records }))?;
            } else {
                for record in &records {
                    println!("{}", format_record(record));
                }
                if !quiet {
                    eprintln!("{} {} elements", records.len(), kind.name());
                }
            }
            Ok(())
        }
        device_command => run_device(AdbDevice::new(serial), device_command, format).await,
    }
}

async fn run_device(device: AdbDevice, command: Command, format: OutputFormat) -> Result<(), CliError> {
    let device_err = |e: HostError| CliError::Device(e.to_string());
    debug!(serial = device.serial().unwrap_or("default"), "sending device command");

    let result = match command {
        Command::ScreenSize => {
            let (width, height) = device.screen_size().await.map_err(device_err)?;
            if format == OutputFormat::Json {
                print_json(&serde_json::json!({ "width": width, "height": height }))?;
            } else {
                println!("{}x{}", width, height);
            }
            return Ok(());
        }
        Command::Wake => device.wake().await,
        Command::Tap { x, y } => device.tap(x, y).await,
        Command::Key { key } => device.press_key(key).await,
        Command::Launch { package } => device.launch_app(&package).await,
        Command::SendKeys { text } => device.type_text(&text).await,
        // Offline commands are handled in `run`
        Command::Inventory { .. } | Command::Find { .. } | Command::ByType { .. } => unreachable!(),
    };
    result.map_err(device_err)?;

    if format == OutputFormat::Json {
        print_json(&serde_json::json!({ "success": true }))?;
    }
    Ok(())
}

/// Capability flags set on an element, comma separated.
fn capability_flags(info: &ElementInfo) -> String {
    [
        (info.clickable, "clickable"),
        (info.editable, "editable"),
        (info.scrollable, "scrollable"),
        (info.long_clickable, "long-clickable"),
        (info.checkable, "checkable"),
    ]
    .iter()
    .filter(|(set, _)| *set)
    .map(|(_, name)| *name)
    .collect::<Vec<_>>()
    .join(",")
}

/// Format a record as `  3. [Button] id "text" desc="..." @(x,y) clickable`
fn format_record(record: &ElementRecord) -> String {
    let info = match record {
        ElementRecord::Element(info) => info,
        ElementRecord::Degraded(d) => {
            return format!("{:>3}. <unreadable> {} ({})", d.index, d.raw, d.error);
        }
    };

    let short_class = info.class_name.rsplit('.').next().unwrap_or("");
    let mut parts = vec![
        format!("{:>3}.", info.index),
        format!("[{}]", if short_class.is_empty() { "?" } else { short_class }),
    ];
    if !info.identifier.is_empty() {
        parts.push(info.identifier.clone());
    }
    if !info.text.is_empty() {
        parts.push(format!("\"{}\"", info.text));
    }
    if !info.description.is_empty() {
        parts.push(format!("desc=\"{}\"", info.description));
    }
    if let Some(bounds) = info.bounds {
        parts.push(format!("@({},{})", bounds.center_x, bounds.center_y));
    }
    let flags = capability_flags(info);
    if !flags.is_empty() {
        parts.push(flags);
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use droidscope_core::introspect::DegradedRecord;

    fn record(json: serde_json::Value) -> ElementRecord {
        serde_json::from_value(json).unwrap()
    }

    fn button() -> ElementRecord {
        record(serde_json::json!({
            "index": 4, "text": "搜索", "desc": "", "id": "com.example:id/go",
            "className": "android.widget.Button", "clickable": true, "checkable": false,
            "checked": false, "scrollable": false, "editable": false, "enabled": true,
            "focusable": true, "focused": false, "selected": false, "longClickable": true,
            "bounds": {"left": 0, "top": 0, "right": 100, "bottom": 40, "width": 100,
                       "height": 40, "centerX": 50, "centerY": 20},
            "depth": 2, "packageName": "com.example", "visibleToUser": true
        }))
    }

    #[test]
    fn test_format_record() {
        assert_eq!(
            format_record(&button()),
            "  4. [Button] com.example:id/go \"搜索\" @(50,20) clickable,long-clickable"
        );
    }

    #[test]
    fn test_format_degraded_record() {
        let degraded = ElementRecord::Degraded(DegradedRecord {
            index: 12,
            error: "gone".to_string(),
            raw: "node#12".to_string(),
        });
        assert_eq!(format_record(&degraded), " 12. <unreadable> node#12 (gone)");
    }

    #[test]
    fn test_cli_error_exit_codes() {
        assert_eq!(CliError::NotFound("x".into()).exit_code(), ExitCode::from(1));
        assert_eq!(CliError::Device("x".into()).exit_code(), ExitCode::from(2));
        assert_eq!(CliError::Input("x".into()).exit_code(), ExitCode::from(3));
    }
}
