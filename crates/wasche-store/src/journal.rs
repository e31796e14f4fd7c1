use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
use crate::memory::MemoryStore;
use crate::model::{MachineReading, MachineStatus};
use crate::Store;

/// One line of the journal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum JournalRecord {
    Reading(MachineReading),
    Status(MachineStatus),
}

/// Append-only JSON-lines journal with in-memory query indexes.
///
/// Every reading and every status upsert is written as one line and flushed
/// before the in-memory indexes are updated. On open the journal is replayed;
/// an unterminated final line left by a crash is cut off, any complete line
/// that does not parse is reported as [`StoreError::Corrupt`].
pub struct JournalStore {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
    index: MemoryStore,
}

impl JournalStore {
    /// Open a journal for appending, replaying any existing records.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let index = MemoryStore::new();
        let replay = if path.exists() {
            replay(&path, &index)?
        } else {
            Replay::default()
        };

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        if file.metadata()?.len() > replay.valid_len {
            warn!(?path, valid_len = replay.valid_len, "truncating torn journal tail");
            file.set_len(replay.valid_len)?;
        }

        let mut writer = BufWriter::new(file);
        if replay.needs_newline {
            writer.write_all(b"\n")?;
            writer.flush()?;
        }

        info!(?path, records = replay.records, "journal opened");
        Ok(Self {
            path,
            writer: Mutex::new(writer),
            index,
        })
    }

    /// Load a journal's contents without opening it for writing.
    pub fn load(path: impl AsRef<Path>) -> Result<MemoryStore> {
        let index = MemoryStore::new();
        replay(path.as_ref(), &index)?;
        Ok(index)
    }

    /// Path of the journal file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, record: JournalRecord) -> Result<()> {
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        // Hold the writer while indexing so file order and index order agree.
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(line.as_bytes())?;
        writer.flush()?;
        apply(&self.index, record)
    }
}

impl Store for JournalStore {
    fn append_reading(&self, reading: MachineReading) -> Result<()> {
        self.write(JournalRecord::Reading(reading))
    }

    fn upsert_status(&self, status: MachineStatus) -> Result<()> {
        self.write(JournalRecord::Status(status))
    }

    fn get_status(&self, node_id: u16) -> Result<Option<MachineStatus>> {
        self.index.get_status(node_id)
    }

    fn list_statuses(&self) -> Result<Vec<MachineStatus>> {
        self.index.list_statuses()
    }

    fn list_readings(&self, node_id: u16, since: DateTime<Utc>) -> Result<Vec<MachineReading>> {
        self.index.list_readings(node_id, since)
    }

    fn recent_readings(&self, node_id: u16, limit: usize) -> Result<Vec<MachineReading>> {
        self.index.recent_readings(node_id, limit)
    }
}

impl std::fmt::Debug for JournalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalStore")
            .field("path", &self.path)
            .finish()
    }
}

#[derive(Debug, Default)]
struct Replay {
    records: usize,
    /// Byte length of the well-formed prefix of the file.
    valid_len: u64,
    /// The well-formed prefix does not end in a newline.
    needs_newline: bool,
}

fn replay(path: &Path, index: &MemoryStore) -> Result<Replay> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut replay = Replay::default();
    let mut line = String::new();
    let mut line_no = 0usize;

    loop {
        line.clear();
        let n = reader.read_line(&mut line)?;
        if n == 0 {
            break;
        }
        line_no += 1;

        let trimmed = line.trim();
        if trimmed.is_empty() {
            replay.valid_len += n as u64;
            continue;
        }

        match serde_json::from_str::<JournalRecord>(trimmed) {
            Ok(record) => {
                apply(index, record)?;
                replay.records += 1;
                replay.valid_len += n as u64;
                replay.needs_newline = !line.ends_with('\n');
            }
            // Records are written with their newline in one write, so only an
            // unterminated final line can be the remains of an interrupted append.
            Err(err) if !line.ends_with('\n') => {
                debug!(line = line_no, %err, "ignoring torn journal record");
            }
            Err(err) => {
                return Err(StoreError::Corrupt {
                    line: line_no,
                    reason: err.to_string(),
                })
            }
        }
    }

    Ok(replay)
}

fn apply(index: &MemoryStore, record: JournalRecord) -> Result<()> {
    match record {
        JournalRecord::Reading(reading) => index.append_reading(reading),
        JournalRecord::Status(status) => index.upsert_status(status),
    }
}
