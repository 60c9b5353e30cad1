// src/progress.rs

//! Progress reporting and cooperative cancellation
//!
//! Long-running operations report progress through the [`ProgressTracker`] trait so the
//! same code drives a terminal progress bar, log output, or nothing at all. Cancellation
//! is a separate [`CancellationToken`] that operations poll at defined points.
//!
//! # Example
//!
//! ```ignore
//! use tpexport::progress::{LogProgress, ProgressTracker};
//!
//! let progress = LogProgress::new("Mirroring", 8);
//! let artifacts = progress.child("artifacts", 120);
//! artifacts.increment(1);
//! ```

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::info;

/// Progress sink for a unit of work with a known number of steps
pub trait ProgressTracker: Send + Sync {
    /// Describe what is currently happening
    fn set_message(&self, message: &str);

    /// Advance by `amount` steps
    fn increment(&self, amount: u64);

    /// Change the total number of steps
    fn set_length(&self, length: u64);

    fn position(&self) -> u64;

    fn length(&self) -> u64;

    fn finish_with_message(&self, message: &str);

    fn finish_with_error(&self, message: &str);

    fn is_finished(&self) -> bool;

    /// Tracker for a nested piece of work with its own step count
    fn child(&self, message: &str, length: u64) -> Box<dyn ProgressTracker>;
}

/// Shared flag checked by operations at their suspension points
///
/// Clones observe the same flag; cancelling any clone cancels all of them.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct Counters {
    position: AtomicU64,
    length: AtomicU64,
    finished: AtomicBool,
}

impl Counters {
    fn with_length(length: u64) -> Self {
        Self {
            length: AtomicU64::new(length),
            ..Default::default()
        }
    }
}

/// Tracker that records positions but prints nothing
#[derive(Debug, Default)]
pub struct SilentProgress {
    counters: Counters,
}

impl SilentProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_length(length: u64) -> Self {
        Self {
            counters: Counters::with_length(length),
        }
    }
}

impl ProgressTracker for SilentProgress {
    fn set_message(&self, _message: &str) {}

    fn increment(&self, amount: u64) {
        self.counters.position.fetch_add(amount, Ordering::Relaxed);
    }

    fn set_length(&self, length: u64) {
        self.counters.length.store(length, Ordering::Relaxed);
    }

    fn position(&self) -> u64 {
        self.counters.position.load(Ordering::Relaxed)
    }

    fn length(&self) -> u64 {
        self.counters.length.load(Ordering::Relaxed)
    }

    fn finish_with_message(&self, _message: &str) {
        self.counters.finished.store(true, Ordering::Relaxed);
    }

    fn finish_with_error(&self, _message: &str) {
        self.counters.finished.store(true, Ordering::Relaxed);
    }

    fn is_finished(&self) -> bool {
        self.counters.finished.load(Ordering::Relaxed)
    }

    fn child(&self, _message: &str, length: u64) -> Box<dyn ProgressTracker> {
        Box::new(SilentProgress::with_length(length))
    }
}

/// Tracker that reports through `tracing` at info level
///
/// Step changes are logged about ten times over the whole run to keep logs short.
#[derive(Debug)]
pub struct LogProgress {
    name: String,
    counters: Counters,
}

impl LogProgress {
    pub fn new(name: impl Into<String>, length: u64) -> Self {
        Self {
            name: name.into(),
            counters: Counters::with_length(length),
        }
    }

    fn interval(&self) -> u64 {
        (self.length() / 10).max(1)
    }
}

impl ProgressTracker for LogProgress {
    fn set_message(&self, message: &str) {
        info!("{}: {}", self.name, message);
    }

    fn increment(&self, amount: u64) {
        let before = self.counters.position.fetch_add(amount, Ordering::Relaxed);
        let after = before + amount;
        let length = self.length();
        let interval = self.interval();
        if length > 0 && after / interval > before / interval {
            info!(
                "{}: {}% ({}/{})",
                self.name,
                (after.min(length) * 100) / length,
                after,
                length
            );
        }
    }

    fn set_length(&self, length: u64) {
        self.counters.length.store(length, Ordering::Relaxed);
    }

    fn position(&self) -> u64 {
        self.counters.position.load(Ordering::Relaxed)
    }

    fn length(&self) -> u64 {
        self.counters.length.load(Ordering::Relaxed)
    }

    fn finish_with_message(&self, message: &str) {
        self.counters.finished.store(true, Ordering::Relaxed);
        info!("{}: {}", self.name, message);
    }

    fn finish_with_error(&self, message: &str) {
        self.counters.finished.store(true, Ordering::Relaxed);
        info!("{}: ERROR - {}", self.name, message);
    }

    fn is_finished(&self) -> bool {
        self.counters.finished.load(Ordering::Relaxed)
    }

    fn child(&self, message: &str, length: u64) -> Box<dyn ProgressTracker> {
        Box::new(LogProgress::new(format!("{}:{}", self.name, message), length))
    }
}

/// Terminal progress bar backed by indicatif
pub struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    pub fn new(message: &str, length: u64) -> Self {
        let bar = ProgressBar::new(length);
        if let Ok(style) =
            ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.set_message(message.to_string());
        Self { bar }
    }
}

impl ProgressTracker for CliProgress {
    fn set_message(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    fn increment(&self, amount: u64) {
        self.bar.inc(amount);
    }

    fn set_length(&self, length: u64) {
        self.bar.set_length(length);
    }

    fn position(&self) -> u64 {
        self.bar.position()
    }

    fn length(&self) -> u64 {
        self.bar.length().unwrap_or(0)
    }

    fn finish_with_message(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    fn finish_with_error(&self, message: &str) {
        self.bar.abandon_with_message(message.to_string());
    }

    fn is_finished(&self) -> bool {
        self.bar.is_finished()
    }

    fn child(&self, message: &str, length: u64) -> Box<dyn ProgressTracker> {
        // Children only relabel the parent bar
        self.bar.set_message(message.to_string());
        Box::new(SilentProgress::with_length(length))
    }
}
