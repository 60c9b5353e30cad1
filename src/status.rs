// src/status.rs

//! Hierarchical operation status
//!
//! Bulk operations such as artifact mirroring report partial failures as data, not as
//! errors: a tree of severity-levelled messages. A [`Status`] is immutable once built;
//! use [`MultiStatus`] to accumulate children while an operation runs.

use serde::Serialize;
use std::fmt;

/// Status severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Ok,
    Info,
    Warning,
    Error,
    /// The operation was cancelled before it completed
    Cancel,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Ok => write!(f, "ok"),
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Cancel => write!(f, "cancel"),
        }
    }
}

/// One node of a status tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    severity: Severity,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<Status>,
}

impl Status {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            children: Vec::new(),
        }
    }

    pub fn ok(message: impl Into<String>) -> Self {
        Self::new(Severity::Ok, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn cancel(message: impl Into<String>) -> Self {
        Self::new(Severity::Cancel, message)
    }

    /// Highest severity of this node and all its descendants
    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn children(&self) -> &[Status] {
        &self.children
    }

    pub fn is_ok(&self) -> bool {
        self.severity == Severity::Ok
    }

    /// True when something worse than an informational note happened
    pub fn exceeds_info(&self) -> bool {
        self.severity > Severity::Info
    }

    /// Messages of every node, depth first, whose severity exceeds `Info`
    ///
    /// This is what a front-end shows the user; an empty list means success.
    pub fn problems(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_problems(&mut out);
        out
    }

    fn collect_problems<'a>(&'a self, out: &mut Vec<&'a str>) {
        if self.exceeds_info() {
            out.push(&self.message);
        }
        for child in &self.children {
            child.collect_problems(out);
        }
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        writeln!(
            f,
            "{:indent$}[{}] {}",
            "",
            self.severity,
            self.message,
            indent = depth * 2
        )?;
        for child in &self.children {
            child.fmt_indented(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

/// Accumulator for a status with children
///
/// The resulting severity is the maximum over all added children.
#[derive(Debug, Default)]
pub struct MultiStatus {
    message: String,
    severity: Severity,
    children: Vec<Status>,
}

impl MultiStatus {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Ok,
            children: Vec::new(),
        }
    }

    pub fn add(&mut self, child: Status) {
        self.severity = self.severity.max(child.severity);
        self.children.push(child);
    }

    pub fn finish(self) -> Status {
        Status {
            severity: self.severity,
            message: self.message,
            children: self.children,
        }
    }
}
