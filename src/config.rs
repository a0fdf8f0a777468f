//! Store configuration and document naming.
//!
//! Documents live as individual JSON files in a single data directory:
//!
//! - `settings_<kind>.json`: the process template for a kind
//! - `position_<id>.json`: a position record
//! - `<kind>_<subject>.json`: one subject's process instance

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fields::ProcessKind;

/// Environment variable overriding the data directory.
pub const DIR_ENV_VAR: &str = "PROCESS_TRACKER_DIR";

const DEFAULT_DIR_NAME: &str = ".process-tracker";

fn default_pretty() -> bool {
    true
}

/// Where and how the JSON file store keeps its documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    /// Pretty-print written documents.
    #[serde(default = "default_pretty")]
    pub pretty: bool,
}

impl StoreConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        StoreConfig {
            data_dir: data_dir.into(),
            pretty: default_pretty(),
        }
    }

    /// Resolve the data directory: explicit path, then `$PROCESS_TRACKER_DIR`,
    /// then `$HOME/.process-tracker`, then `./.process-tracker`.
    pub fn resolve(explicit: Option<&Path>) -> Self {
        resolve_from(
            explicit,
            std::env::var(DIR_ENV_VAR).ok(),
            std::env::var("HOME").ok(),
        )
    }

    /// Read a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let buf = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&buf)?)
    }

    /// Create the data directory if needed.
    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }

    pub fn template_path(&self, kind: ProcessKind) -> PathBuf {
        self.data_dir.join(format!("settings_{}.json", kind.as_str()))
    }

    pub fn position_path(&self, position_id: &str) -> PathBuf {
        self.data_dir
            .join(format!("position_{}.json", sanitize_document_id(position_id)))
    }

    pub fn instance_path(&self, kind: ProcessKind, subject_id: &str) -> PathBuf {
        self.data_dir.join(format!(
            "{}_{}.json",
            kind.as_str(),
            sanitize_document_id(subject_id)
        ))
    }
}

fn resolve_from(explicit: Option<&Path>, env_dir: Option<String>, home: Option<String>) -> StoreConfig {
    if let Some(dir) = explicit {
        return StoreConfig::new(dir);
    }
    if let Some(dir) = env_dir.filter(|d| !d.trim().is_empty()) {
        return StoreConfig::new(dir);
    }
    let home = home.unwrap_or_else(|| ".".to_string());
    StoreConfig::new(PathBuf::from(home).join(DEFAULT_DIR_NAME))
}

/// Encode a document id as a file name fragment.
///
/// Lowercase ASCII letters and digits pass through; every other byte becomes
/// `_` followed by two lowercase hex digits. The mapping is injective, and
/// stays so on case-insensitive filesystems, so two ids never share a file.
pub fn sanitize_document_id(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for b in raw.bytes() {
        if b.is_ascii_lowercase() || b.is_ascii_digit() {
            out.push(char::from(b));
        } else {
            out.push_str(&format!("_{:02x}", b));
        }
    }
    out
}
