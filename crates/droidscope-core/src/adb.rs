//! Device control through the Android Debug Bridge.
//!
//! [`AdbDevice`] implements [`DeviceControl`] by shelling out to
//! `adb shell input ...`, `wm size` and `monkey`. Each command runs on the
//! blocking thread pool so the async caller never stalls the runtime.
//!
//! # Requirements
//!
//! `adb` must be on `PATH` and exactly one device attached, or a serial
//! passed to [`AdbDevice::new`].

use std::process::{Command, Output};

use async_trait::async_trait;
use tracing::debug;

use crate::host::{DeviceControl, HostError, KeyCode};

/// A device reachable through `adb`.
#[derive(Debug, Clone, Default)]
pub struct AdbDevice {
    serial: Option<String>,
}

impl AdbDevice {
    /// Target a specific device by serial, or the only attached one.
    pub fn new(serial: Option<String>) -> Self {
        Self { serial }
    }

    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    /// Full argument list for `adb shell <args>`.
    fn shell_args(&self, args: &[&str]) -> Vec<String> {
        let mut full = Vec::with_capacity(args.len() + 3);
        if let Some(serial) = &self.serial {
            full.push("-s".to_string());
            full.push(serial.clone());
        }
        full.push("shell".to_string());
        full.extend(args.iter().map(|a| a.to_string()));
        full
    }

    async fn shell(&self, args: &[&str]) -> Result<String, HostError> {
        let full = self.shell_args(args);
        debug!(args = ?full, "adb");
        let output = tokio::task::spawn_blocking(move || Command::new("adb").args(&full).output())
            .await
            .map_err(|e| HostError::CommandFailed(format!("adb task failed: {}", e)))??;
        check_output(output)
    }
}

fn check_output(output: Output) -> Result<String, HostError> {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !output.status.success() {
        if stderr.contains("no devices") || stderr.contains("device offline") || stderr.contains("not found") {
            return Err(HostError::DeviceUnavailable(stderr.trim().to_string()));
        }
        return Err(HostError::CommandFailed(stderr.trim().to_string()));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Parse `wm size` output. An override size wins over the physical one.
pub fn parse_wm_size(output: &str) -> Result<(u32, u32), HostError> {
    let mut physical = None;
    let mut overridden = None;

    for line in output.lines() {
        let Some((label, value)) = line.split_once(':') else {
            continue;
        };
        let size = parse_dimensions(value.trim());
        match label.trim() {
            "Physical size" => physical = size,
            "Override size" => overridden = size,
            _ => {}
        }
    }

    overridden
        .or(physical)
        .ok_or_else(|| HostError::Parse(format!("unrecognized wm size output: {:?}", output.trim())))
}

fn parse_dimensions(value: &str) -> Option<(u32, u32)> {
    let (w, h) = value.split_once('x')?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

/// Encode text for `input text`: spaces become `%s` and shell
/// metacharacters are escaped.
pub fn encode_text(text: &str) -> String {
    let mut encoded = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            ' ' => encoded.push_str("%s"),
            '\'' | '"' | '\\' | '&' | '|' | ';' | '<' | '>' | '(' | ')' | '$' | '`' | '*' | '?'
            | '~' | '#' => {
                encoded.push('\\');
                encoded.push(c);
            }
            _ => encoded.push(c),
        }
    }
    encoded
}

#[async_trait]
impl DeviceControl for AdbDevice {
    async fn wake(&self) -> Result<(), HostError> {
        self.press_key(KeyCode::Wakeup).await
    }

    async fn screen_size(&self) -> Result<(u32, u32), HostError> {
        let output = self.shell(&["wm", "size"]).await?;
        parse_wm_size(&output)
    }

    async fn launch_app(&self, name: &str) -> Result<(), HostError> {
        let output = self
            .shell(&["monkey", "-p", name, "-c", "android.intent.category.LAUNCHER", "1"])
            .await?;
        if output.contains("No activities found") || output.contains("monkey aborted") {
            return Err(HostError::CommandFailed(format!("cannot launch '{}'", name)));
        }
        Ok(())
    }

    async fn press_key(&self, key: KeyCode) -> Result<(), HostError> {
        self.shell(&["input", "keyevent", key.as_keycode()]).await.map(|_| ())
    }

    async fn tap(&self, x: i32, y: i32) -> Result<(), HostError> {
        let (x, y) = (x.to_string(), y.to_string());
        self.shell(&["input", "tap", &x, &y]).await.map(|_| ())
    }

    async fn type_text(&self, text: &str) -> Result<(), HostError> {
        let encoded = encode_text(text);
        self.shell(&["input", "text", &encoded]).await.map(|_| ())
    }
}
