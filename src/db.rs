//! Document store boundary and its implementations.
//!
//! The `DocumentStore` trait is the only place the crate touches persistence.
//! Two stores ship with it: `JsonFileStore`, one JSON file per document in a
//! data directory, and `MemoryStore`, a map-backed store for tests and
//! embedding. Writes are whole-document replaces; the last writer wins.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::fields::ProcessKind;
use crate::process::ProcessInstance;
use crate::template::{Position, ProcessTemplate};

/// Reads and writes the documents a process depends on.
pub trait DocumentStore {
    /// The settings document for `kind`; `None` when it was never configured.
    fn load_template(&self, kind: ProcessKind) -> Result<Option<ProcessTemplate>>;

    fn save_template(&mut self, kind: ProcessKind, template: &ProcessTemplate) -> Result<()>;

    fn load_position(&self, position_id: &str) -> Result<Option<Position>>;

    fn save_position(&mut self, position: &Position) -> Result<()>;

    fn load_instance(&self, kind: ProcessKind, subject_id: &str) -> Result<Option<ProcessInstance>>;

    /// Replace the stored instance for `instance.subject_id`.
    fn save_instance(&mut self, instance: &ProcessInstance) -> Result<()>;

    /// Remove an instance. Returns whether one existed.
    fn delete_instance(&mut self, kind: ProcessKind, subject_id: &str) -> Result<bool>;
}

/// File-backed store: one JSON document per file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    config: StoreConfig,
}

impl JsonFileStore {
    /// Open a store, creating its data directory if needed.
    pub fn open(config: StoreConfig) -> Result<Self> {
        config.ensure_dir()?;
        Ok(JsonFileStore { config })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

/// Read a JSON document; a missing file reads as `None`.
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let buf = match fs::read_to_string(path) {
        Ok(buf) => buf,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    match serde_json::from_str(&buf) {
        Ok(doc) => Ok(Some(doc)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable document");
            Err(e.into())
        }
    }
}

/// Write a JSON document atomically (temp file + rename).
fn write_json<T: Serialize>(path: &Path, value: &T, pretty: bool) -> Result<()> {
    let data = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    let write = || -> std::io::Result<()> {
        let tmp = path.with_extension("json.tmp");
        let mut f = File::create(&tmp)?;
        f.write_all(data.as_bytes())?;
        f.flush()?;
        fs::rename(tmp, path)
    };
    write().map_err(|e| {
        warn!(path = %path.display(), error = %e, "document write failed");
        Error::WriteFailure {
            document: path.display().to_string(),
            reason: e.to_string(),
        }
    })?;
    debug!(path = %path.display(), "document written");
    Ok(())
}

impl DocumentStore for JsonFileStore {
    fn load_template(&self, kind: ProcessKind) -> Result<Option<ProcessTemplate>> {
        read_json(&self.config.template_path(kind))
    }

    fn save_template(&mut self, kind: ProcessKind, template: &ProcessTemplate) -> Result<()> {
        write_json(&self.config.template_path(kind), template, self.config.pretty)
    }

    fn load_position(&self, position_id: &str) -> Result<Option<Position>> {
        read_json(&self.config.position_path(position_id))
    }

    fn save_position(&mut self, position: &Position) -> Result<()> {
        write_json(&self.config.position_path(&position.id), position, self.config.pretty)
    }

    fn load_instance(&self, kind: ProcessKind, subject_id: &str) -> Result<Option<ProcessInstance>> {
        let path = self.config.instance_path(kind, subject_id);
        let Some(instance) = read_json::<ProcessInstance>(&path)? else {
            return Ok(None);
        };
        if instance.kind != kind || instance.subject_id != subject_id {
            warn!(path = %path.display(), expected = subject_id, found = %instance.subject_id, "instance owned by another subject");
            return Err(Error::OwnerMismatch {
                document: path.display().to_string(),
                expected: subject_id.to_string(),
                found: instance.subject_id,
            });
        }
        Ok(Some(instance))
    }

    fn save_instance(&mut self, instance: &ProcessInstance) -> Result<()> {
        let path = self.config.instance_path(instance.kind, &instance.subject_id);
        write_json(&path, instance, self.config.pretty)
    }

    fn delete_instance(&mut self, kind: ProcessKind, subject_id: &str) -> Result<bool> {
        match fs::remove_file(self.config.instance_path(kind, subject_id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory store. Setting `reject_writes` makes every write fail.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    templates: HashMap<ProcessKind, ProcessTemplate>,
    positions: HashMap<String, Position>,
    instances: HashMap<(ProcessKind, String), ProcessInstance>,
    pub reject_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    fn check_writable(&self, document: String) -> Result<()> {
        if self.reject_writes {
            return Err(Error::WriteFailure {
                document,
                reason: "store is read-only".to_string(),
            });
        }
        Ok(())
    }
}

impl DocumentStore for MemoryStore {
    fn load_template(&self, kind: ProcessKind) -> Result<Option<ProcessTemplate>> {
        Ok(self.templates.get(&kind).cloned())
    }

    fn save_template(&mut self, kind: ProcessKind, template: &ProcessTemplate) -> Result<()> {
        self.check_writable(format!("settings/{kind}"))?;
        self.templates.insert(kind, template.clone());
        Ok(())
    }

    fn load_position(&self, position_id: &str) -> Result<Option<Position>> {
        Ok(self.positions.get(position_id).cloned())
    }

    fn save_position(&mut self, position: &Position) -> Result<()> {
        self.check_writable(format!("positions/{}", position.id))?;
        self.positions.insert(position.id.clone(), position.clone());
        Ok(())
    }

    fn load_instance(&self, kind: ProcessKind, subject_id: &str) -> Result<Option<ProcessInstance>> {
        Ok(self.instances.get(&(kind, subject_id.to_string())).cloned())
    }

    fn save_instance(&mut self, instance: &ProcessInstance) -> Result<()> {
        self.check_writable(format!("{}/{}", instance.kind, instance.subject_id))?;
        self.instances
            .insert((instance.kind, instance.subject_id.clone()), instance.clone());
        Ok(())
    }

    fn delete_instance(&mut self, kind: ProcessKind, subject_id: &str) -> Result<bool> {
        self.check_writable(format!("{kind}/{subject_id}"))?;
        Ok(self.instances.remove(&(kind, subject_id.to_string())).is_some())
    }
}
