//! Save/Load functionality for persisting sessions
//!
//! A [`Snapshot`] is encoded with bincode behind a version check. Every
//! collection in the snapshot is ordered, so saving the same state twice
//! produces the same bytes. Where the bytes go is a [`SaveStore`]: files on
//! disk, or memory for tests and tooling.

use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use ascension_logic::snapshot::{Snapshot, SNAPSHOT_VERSION};
use thiserror::Error;

/// Save file extension used by [`FileSaveStore`].
pub const SAVE_EXTENSION: &str = "sav";

/// Errors that can occur during save/load
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Bincode(#[from] Box<bincode::ErrorKind>),
    #[error("save version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("no save in slot `{0}`")]
    MissingSlot(String),
    #[error("invalid slot name `{0}`")]
    InvalidSlot(String),
    #[error("session is aborted; resume it from its last save")]
    SessionAborted,
}

/// Write a snapshot to a writer
pub fn save_snapshot<W: Write>(writer: W, snapshot: &Snapshot) -> Result<(), SaveError> {
    bincode::serialize_into(writer, snapshot)?;
    Ok(())
}

/// Read a snapshot from a reader, rejecting other format versions
pub fn load_snapshot<R: Read>(reader: R) -> Result<Snapshot, SaveError> {
    let snapshot: Snapshot = bincode::deserialize_from(reader)?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(SaveError::VersionMismatch {
            expected: SNAPSHOT_VERSION,
            found: snapshot.version,
        });
    }
    Ok(snapshot)
}

/// Encode to bytes.
pub fn encode_snapshot(snapshot: &Snapshot) -> Result<Vec<u8>, SaveError> {
    let mut buffer = Vec::new();
    save_snapshot(&mut buffer, snapshot)?;
    Ok(buffer)
}

/// Where saves live.
pub trait SaveStore {
    fn save(&mut self, slot: &str, snapshot: &Snapshot) -> Result<(), SaveError>;

    /// `Ok(None)` when the slot is empty.
    fn load(&self, slot: &str) -> Result<Option<Snapshot>, SaveError>;

    fn list_slots(&self) -> Result<Vec<String>, SaveError>;

    fn delete_slot(&mut self, slot: &str) -> Result<(), SaveError>;
}

fn check_slot(slot: &str) -> Result<(), SaveError> {
    let valid = !slot.is_empty()
        && slot
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(SaveError::InvalidSlot(slot.to_string()))
    }
}

// ── File store ─────────────────────────────────────────────────────────

/// One `<slot>.sav` file per slot under a directory.
#[derive(Debug, Clone)]
pub struct FileSaveStore {
    dir: PathBuf,
}

impl FileSaveStore {
    /// The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, slot: &str) -> Result<PathBuf, SaveError> {
        check_slot(slot)?;
        Ok(self.dir.join(format!("{}.{}", slot, SAVE_EXTENSION)))
    }
}

impl SaveStore for FileSaveStore {
    fn save(&mut self, slot: &str, snapshot: &Snapshot) -> Result<(), SaveError> {
        let path = self.path(slot)?;
        fs::create_dir_all(&self.dir)?;
        // Write to a sibling first so a crash never leaves a torn save.
        let staging = path.with_extension("tmp");
        {
            let file = fs::File::create(&staging)?;
            let mut writer = std::io::BufWriter::new(file);
            save_snapshot(&mut writer, snapshot)?;
            writer.flush()?;
        }
        fs::rename(&staging, &path)?;
        log::debug!("Saved slot {} to {}", slot, path.display());
        Ok(())
    }

    fn load(&self, slot: &str) -> Result<Option<Snapshot>, SaveError> {
        let path = self.path(slot)?;
        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        load_snapshot(std::io::BufReader::new(file)).map(Some)
    }

    fn list_slots(&self) -> Result<Vec<String>, SaveError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut slots = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SAVE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                slots.push(stem.to_string());
            }
        }
        slots.sort();
        Ok(slots)
    }

    fn delete_slot(&mut self, slot: &str) -> Result<(), SaveError> {
        let path = self.path(slot)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SaveError::MissingSlot(slot.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

// ── Memory store ───────────────────────────────────────────────────────

/// Encoded saves held in memory. Clones share the same slots.
#[derive(Debug, Clone, Default)]
pub struct MemorySaveStore {
    slots: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl MemorySaveStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw encoded bytes of a slot.
    pub fn bytes(&self, slot: &str) -> Option<Vec<u8>> {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(slot)
            .cloned()
    }
}

impl SaveStore for MemorySaveStore {
    fn save(&mut self, slot: &str, snapshot: &Snapshot) -> Result<(), SaveError> {
        check_slot(slot)?;
        let bytes = encode_snapshot(snapshot)?;
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(slot.to_string(), bytes);
        Ok(())
    }

    fn load(&self, slot: &str) -> Result<Option<Snapshot>, SaveError> {
        match self.bytes(slot) {
            Some(bytes) => load_snapshot(&bytes[..]).map(Some),
            None => Ok(None),
        }
    }

    fn list_slots(&self) -> Result<Vec<String>, SaveError> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(slots.keys().cloned().collect())
    }

    fn delete_slot(&mut self, slot: &str) -> Result<(), SaveError> {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(slot)
            .map(|_| ())
            .ok_or_else(|| SaveError::MissingSlot(slot.to_string()))
    }
}
