//! Terminal output helpers.
//!
//! Results go to stdout; progress, warnings and errors go to stderr so the
//! result lines stay pipeable.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossterm::style::Stylize;
use tether_core::{Progress, ProgressFn};

pub fn success(msg: &str) {
    println!("{} {msg}", "✓".green().bold());
}

pub fn info(msg: &str) {
    println!("{} {msg}", "•".cyan());
}

pub fn warn(msg: &str) {
    eprintln!("{} {msg}", "!".yellow().bold());
}

pub fn error(msg: &str) {
    eprintln!("{} {msg}", "✗".red().bold());
}

/// Human-readable byte count (`1.5 MB`).
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

/// Single rewritten stderr line showing download progress.
#[derive(Debug, Clone, Default)]
pub struct DownloadLine {
    started: Arc<AtomicBool>,
}

impl DownloadLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reporter(&self) -> ProgressFn {
        let started = self.started.clone();
        Arc::new(move |progress| {
            started.store(true, Ordering::Relaxed);
            let text = match progress {
                Progress::Percent(pct) => format!("{pct:>3}%"),
                Progress::Indeterminate { downloaded } => format_bytes(downloaded),
            };
            let mut err = std::io::stderr().lock();
            let _ = write!(err, "\r  {} {text}    ", "Downloading".dim());
            let _ = err.flush();
        })
    }

    /// End the progress line, if one was drawn.
    pub fn finish(&self) {
        if self.started.swap(false, Ordering::Relaxed) {
            eprintln!();
        }
    }
}
