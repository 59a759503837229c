//! Progress and console output utilities for the CLI
//!
//! Walking every registered interface class can take a few seconds on a
//! busy machine, so enumeration runs under a spinner that suspends cleanly
//! when something is printed.

use crate::device::Device;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

// ============================================================================
// Styles
// ============================================================================

/// Get the spinner style for enumeration
fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⣾⣽⣻⢿⡿⣟⣯⣷")
}

// ============================================================================
// Console output helpers
// ============================================================================

/// Print a header section with a box
pub fn print_header(title: &str) {
    let width = 68;
    let title_padded = format!("{:^width$}", title, width = width - 4);
    println!();
    println!("╔{}╗", "═".repeat(width - 2));
    println!("║{}║", title_padded);
    println!("╚{}╝", "═".repeat(width - 2));
    println!();
}

/// Print a section divider
pub fn print_divider() {
    println!("{}", "─".repeat(60));
}

/// Print a success message with checkmark
pub fn print_success(msg: &str) {
    println!("  ✓ {}", msg);
}

/// Print an info message with bullet
pub fn print_info(msg: &str) {
    println!("  • {}", msg);
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    println!("  ⚠ {}", msg);
}

// ============================================================================
// Enumeration progress
// ============================================================================

/// Spinner tracking devices and interfaces read so far
pub struct EnumerationProgress {
    devices: AtomicUsize,
    interfaces: AtomicUsize,
    spinner: ProgressBar,
    start_time: Instant,
}

impl EnumerationProgress {
    /// Create a visible spinner
    pub fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(spinner_style());
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner.set_message("Reading device registry...");
        Self::with_bar(spinner)
    }

    /// Track counts without drawing anything (JSON output, tests)
    pub fn hidden() -> Self {
        Self::with_bar(ProgressBar::hidden())
    }

    fn with_bar(spinner: ProgressBar) -> Self {
        Self {
            devices: AtomicUsize::new(0),
            interfaces: AtomicUsize::new(0),
            spinner,
            start_time: Instant::now(),
        }
    }

    /// Record one device pulled from the enumeration
    pub fn device_read(&self, device: &Device) {
        let devices = self.devices.fetch_add(1, Ordering::Relaxed) + 1;
        let interfaces = self
            .interfaces
            .fetch_add(device.interfaces().len(), Ordering::Relaxed)
            + device.interfaces().len();
        self.spinner.set_message(format!(
            "Reading: {} devices, {} interfaces",
            devices, interfaces
        ));
    }

    /// Finish the spinner with a summary
    pub fn finish(&self) {
        let (devices, interfaces) = self.counts();
        self.spinner.finish_and_clear();
        log::info!(
            "Read {} devices and {} interfaces in {}",
            devices,
            interfaces,
            format_duration(self.start_time.elapsed())
        );
    }

    pub fn counts(&self) -> (usize, usize) {
        (
            self.devices.load(Ordering::Relaxed),
            self.interfaces.load(Ordering::Relaxed),
        )
    }
}

impl Default for EnumerationProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Format duration as human-readable string
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}

// ============================================================================
// Dual writer for file + console logging
// ============================================================================

/// A writer that writes to both console and file
pub struct DualWriter {
    pub console: std::io::Stderr,
    pub file: std::fs::File,
}

impl Write for DualWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let _ = self.console.write(buf);
        self.file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let _ = self.console.flush();
        self.file.flush()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{enumerate, EnumerationOptions};
    use crate::testdb::MockRegistry;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(30)), "30.0s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
    }

    #[test]
    fn test_progress_counts_interfaces() {
        let registry = MockRegistry::sample();
        let progress = EnumerationProgress::hidden();
        for device in enumerate(&registry, EnumerationOptions::all()) {
            progress.device_read(&device);
        }
        let (devices, interfaces) = progress.counts();
        assert_eq!(devices, 3);
        assert_eq!(interfaces, 3);
        progress.finish();
    }
}
