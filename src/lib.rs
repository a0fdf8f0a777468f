//! # process_tracker - Onboarding and offboarding progress
//!
//! Tracks per-employee lifecycle processes built from a shared, editable
//! template.
//!
//! ## Key Features
//!
//! - **Templates**: one settings document per process kind, an ordered list of
//!   stages each holding ordered tasks. Hand-authored gaps (missing ids or
//!   titles) are filled in on read and reported.
//! - **Materialization**: a subject's instance is a fresh copy of the
//!   template, optionally narrowed to the tasks their position allows.
//! - **Resync**: later template edits merge into an existing instance. Text
//!   changes propagate, recorded completion never regresses, and the
//!   template decides the structure.
//! - **Progress**: per-stage integer percentages averaged per process, plus a
//!   weighted one-decimal figure for status-tracked onboarding programs.
//! - **Storage**: a `DocumentStore` trait with a JSON-file store and an
//!   in-memory store.
//!
//! ## Quick Start
//!
//! ```no_run
//! use chrono::Utc;
//! use process_tracker::{JsonFileStore, ProcessKind, ProcessService, StoreConfig};
//!
//! # fn main() -> process_tracker::Result<()> {
//! let store = JsonFileStore::open(StoreConfig::resolve(None))?;
//! let mut service = ProcessService::new(store);
//! service.subscribe(|kind: ProcessKind, subject: &str| {
//!     println!("{subject} finished {kind}");
//! });
//!
//! let loaded = service.load_or_initialize(ProcessKind::Onboarding, "emp-42", Some("backend-dev"), Utc::now())?;
//! if let Some(stage) = loaded.instance.stages.first() {
//!     let task_id = stage.tasks[0].id.clone();
//!     service.toggle_task(ProcessKind::Onboarding, "emp-42", &stage.id, &task_id, true, Utc::now())?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! All mutations take the current time as an argument so that results are
//! reproducible; the pure functions in [`sync`] and [`progress`] never touch
//! storage.

pub mod config;
pub mod db;
pub mod error;
pub mod fields;
pub mod process;
pub mod program;
pub mod progress;
pub mod service;
pub mod sync;
pub mod task;
pub mod template;

pub use config::StoreConfig;
pub use db::{DocumentStore, JsonFileStore, MemoryStore};
pub use error::{Error, Result};
pub use fields::{ProcessKind, ProcessStatus, TaskStatus};
pub use process::{OverdueTask, ProcessInstance, ProcessSummary, TaskDetails, Transition};
pub use program::{Program, ProgramStage, ProgramTask};
pub use service::{LoadedProcess, ProcessObserver, ProcessService, TemplateState};
pub use sync::{materialize, merge, merge_with_allow_list, AllowList};
pub use task::{StageInstance, StageTemplate, TaskInstance, TaskTemplate};
pub use template::{Position, ProcessTemplate, TemplateRepair};
