//! Enumerations and field types for lifecycle processes.
//!
//! This module defines the closed sets of values used across templates and
//! instances: process kinds, task statuses for weighted programs, and the
//! overall status of a process instance.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The lifecycle process a template or instance belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessKind {
    #[serde(alias = "Onboarding", alias = "ONBOARDING")]
    Onboarding,
    #[serde(alias = "Offboarding", alias = "OFFBOARDING")]
    Offboarding,
}

impl ProcessKind {
    pub const ALL: [ProcessKind; 2] = [ProcessKind::Onboarding, ProcessKind::Offboarding];

    /// Stable lowercase name, used in document file names.
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessKind::Onboarding => "onboarding",
            ProcessKind::Offboarding => "offboarding",
        }
    }
}

impl fmt::Display for ProcessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a task inside a weighted onboarding program.
///
/// Stored documents carry free-form strings; anything unrecognised reads as
/// `Todo` so that it contributes no completion weight.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(from = "String", into = "&'static str")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
    Verified,
}

impl TaskStatus {
    /// Wire representation of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Todo => "TODO",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Done => "DONE",
            TaskStatus::Verified => "VERIFIED",
        }
    }
}

impl From<String> for TaskStatus {
    fn from(s: String) -> Self {
        parse_task_status(&s)
    }
}

impl From<TaskStatus> for &'static str {
    fn from(s: TaskStatus) -> Self {
        s.as_str()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall status of a process instance.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessStatus {
    #[default]
    InProgress,
    Completed,
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessStatus::InProgress => f.write_str("IN_PROGRESS"),
            ProcessStatus::Completed => f.write_str("COMPLETED"),
        }
    }
}

/// Parse a task status string, accepting the common spellings.
pub fn parse_task_status(s: &str) -> TaskStatus {
    let normalised: String = s
        .trim()
        .chars()
        .map(|c| if c == '-' || c.is_whitespace() { '_' } else { c.to_ascii_uppercase() })
        .collect();
    match normalised.as_str() {
        "IN_PROGRESS" | "INPROGRESS" => TaskStatus::InProgress,
        "DONE" => TaskStatus::Done,
        "VERIFIED" => TaskStatus::Verified,
        _ => TaskStatus::Todo, // Default fallback
    }
}

/// Parse a process kind from user or document input.
pub fn parse_process_kind(s: &str) -> Option<ProcessKind> {
    match s.trim().to_lowercase().as_str() {
        "onboarding" => Some(ProcessKind::Onboarding),
        "offboarding" => Some(ProcessKind::Offboarding),
        _ => None,
    }
}
