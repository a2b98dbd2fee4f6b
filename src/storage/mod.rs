//! Keyed binary container for model groups and sample sets
//!
//! One container file holds any number of named entries. Saving an entry
//! rewrites the container with that key replaced and every other key
//! preserved (read-modify-write through a temp file + rename). Loads are
//! lenient: a missing file, a missing key, a corrupt body or a wrong-typed
//! entry all come back as `None` with a warning — the caller treats that as
//! "not trained yet" and trains from scratch. Write failures are real
//! errors; the caller decides whether they are fatal.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::{debug, warn};

use crate::data::SampleSet;
use crate::error::{NeurotrackError, Result};
use crate::model::NetworkModel;

/// Magic bytes identifying a neurotrack container file.
const MAGIC: [u8; 4] = *b"NTRC";
/// Current container format version.
const VERSION: u32 = 1;

/// A named collection of trained models plus the metadata needed to use them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelGroup {
    pub models: Vec<NetworkModel>,
    pub input_names: Vec<String>,
    pub target_name: String,
    /// ISO-8601 timestamp of the training run.
    pub trained_at: String,
}

impl ModelGroup {
    pub fn new(models: Vec<NetworkModel>, input_names: Vec<String>, target_name: String) -> Self {
        Self {
            models,
            input_names,
            target_name,
            trained_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// A named sample table: the set plus its column names, so the table stays
/// inspectable without the training code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleGroup {
    pub set: SampleSet,
    pub input_names: Vec<String>,
    pub target_name: String,
}

impl SampleGroup {
    pub fn new(set: SampleSet, input_names: Vec<String>, target_name: String) -> Self {
        Self {
            set,
            input_names,
            target_name,
        }
    }
}

/// One keyed entry; the closed set of storable kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ContainerEntry {
    Models(ModelGroup),
    Samples(SampleGroup),
}

impl ContainerEntry {
    fn kind(&self) -> &'static str {
        match self {
            Self::Models(_) => "models",
            Self::Samples(_) => "samples",
        }
    }
}

/// On-disk envelope around the entry map.
#[derive(Serialize, Deserialize)]
struct ContainerFile {
    magic: [u8; 4],
    version: u32,
    checksum: u64,
    body: Vec<u8>,
}

/// FNV-1a over the serialized body.
fn fnv1a(data: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 14695981039346656037;
    const FNV_PRIME: u64 = 1099511628211;

    let mut hash = FNV_OFFSET;
    for byte in data {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

type EntryMap = BTreeMap<String, ContainerEntry>;

/// Read the entry map, treating every defect as "no entries".
fn read_entries_lenient(path: &Path) -> EntryMap {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "container does not exist yet");
            return EntryMap::new();
        }
        Err(err) => {
            warn!(path = %path.display(), %err, "container unreadable");
            return EntryMap::new();
        }
    };

    let container: ContainerFile = match bincode::deserialize_from(BufReader::new(file)) {
        Ok(container) => container,
        Err(err) => {
            warn!(path = %path.display(), %err, "container is not a valid container file");
            return EntryMap::new();
        }
    };
    if container.magic != MAGIC {
        warn!(path = %path.display(), "bad magic bytes; not a neurotrack container");
        return EntryMap::new();
    }
    if container.version != VERSION {
        warn!(
            path = %path.display(),
            version = container.version,
            "unsupported container version"
        );
        return EntryMap::new();
    }
    if fnv1a(&container.body) != container.checksum {
        warn!(path = %path.display(), "checksum mismatch; container body is corrupt");
        return EntryMap::new();
    }

    match bincode::deserialize(&container.body) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(path = %path.display(), %err, "container body does not deserialize");
            EntryMap::new()
        }
    }
}

/// Write the entry map atomically: temp file in the same directory, then rename.
fn write_entries(path: &Path, entries: &EntryMap) -> Result<()> {
    let body = bincode::serialize(entries)
        .map_err(|e| NeurotrackError::SerializationError(e.to_string()))?;
    let container = ContainerFile {
        magic: MAGIC,
        version: VERSION,
        checksum: fnv1a(&body),
        body,
    };

    let tmp_path = path.with_extension("tmp");
    let file = File::create(&tmp_path)?;
    bincode::serialize_into(BufWriter::new(file), &container)
        .map_err(|e| NeurotrackError::SerializationError(e.to_string()))?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Store or replace an entry under `key`, preserving all other entries.
pub fn save_entry(path: &Path, key: &str, entry: ContainerEntry) -> Result<()> {
    let mut entries = read_entries_lenient(path);
    entries.insert(key.to_string(), entry);
    write_entries(path, &entries)
}

/// Store or replace a model group.
pub fn save_models(path: &Path, key: &str, group: ModelGroup) -> Result<()> {
    save_entry(path, key, ContainerEntry::Models(group))
}

/// Store or replace a sample table.
pub fn save_samples(path: &Path, key: &str, group: SampleGroup) -> Result<()> {
    save_entry(path, key, ContainerEntry::Samples(group))
}

/// Remove an entry if present; other entries are preserved.
pub fn remove_entry(path: &Path, key: &str) -> Result<()> {
    let mut entries = read_entries_lenient(path);
    if entries.remove(key).is_some() {
        write_entries(path, &entries)?;
    }
    Ok(())
}

/// Load a model group, or `None` if absent or unusable.
pub fn load_models(path: &Path, key: &str) -> Option<ModelGroup> {
    match read_entries_lenient(path).remove(key) {
        Some(ContainerEntry::Models(group)) => Some(group),
        Some(other) => {
            warn!(key, kind = other.kind(), "entry exists but is not a model group; skipping");
            None
        }
        None => None,
    }
}

/// Load a sample table, or `None` if absent or unusable.
pub fn load_samples(path: &Path, key: &str) -> Option<SampleGroup> {
    match read_entries_lenient(path).remove(key) {
        Some(ContainerEntry::Samples(group)) => Some(group),
        Some(other) => {
            warn!(key, kind = other.kind(), "entry exists but is not a sample set; skipping");
            None
        }
        None => None,
    }
}

/// Names and kinds of every entry, for inspection.
pub fn list_entries(path: &Path) -> Vec<(String, String)> {
    read_entries_lenient(path)
        .iter()
        .map(|(key, entry)| {
            let detail = match entry {
                ContainerEntry::Models(group) => {
                    format!("models ({})", group.models.len())
                }
                ContainerEntry::Samples(group) => {
                    format!(
                        "samples ({} rows, {} inputs)",
                        group.set.len(),
                        group.set.n_inputs()
                    )
                }
            };
            (key.clone(), detail)
        })
        .collect()
}
