//! Chain storage backends
//!
//! The chain persists every entry through a [`ChainStorage`] before it
//! advances its head. Backends:
//! - [`MemoryStorage`]: nothing durable
//! - [`JournalStorage`]: append-only JSON-lines file with fsync per entry

use crate::entry::AuditEntry;
use crate::error::PersistenceError;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Durable home of committed entries
pub trait ChainStorage: Send + Sync + std::fmt::Debug {
    /// All committed entries in sequence order
    ///
    /// # Errors
    /// Returns [`PersistenceError`] if the backend cannot be read
    fn load(&self) -> Result<Vec<AuditEntry>, PersistenceError>;

    /// Durably record one entry
    ///
    /// Must either persist the whole entry or leave storage as it was.
    ///
    /// # Errors
    /// Returns [`PersistenceError`] if the entry was not persisted
    fn persist(&self, entry: &AuditEntry) -> Result<(), PersistenceError>;
}

/// Storage that keeps nothing beyond the chain's own memory
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryStorage;

impl ChainStorage for MemoryStorage {
    fn load(&self) -> Result<Vec<AuditEntry>, PersistenceError> {
        Ok(Vec::new())
    }

    fn persist(&self, _entry: &AuditEntry) -> Result<(), PersistenceError> {
        Ok(())
    }
}

#[derive(Debug)]
struct JournalFile {
    file: File,
    len: u64,
}

/// Append-only journal, one JSON entry per line
///
/// A crash mid-append can leave an unterminated last line;
/// [`JournalStorage::open`] truncates it so the previous head remains the
/// true head. Every newline-terminated line must parse: a malformed one,
/// the last included, is reported as corruption and never dropped.
#[derive(Debug)]
pub struct JournalStorage {
    path: PathBuf,
    inner: Mutex<JournalFile>,
}

impl JournalStorage {
    /// Open or create the journal at `path`, discarding a torn tail
    ///
    /// # Errors
    /// Returns [`PersistenceError`] on I/O failure or a malformed complete line
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        let scan = scan_journal(&path, &bytes)?;

        if scan.valid_len < bytes.len() as u64 {
            tracing::warn!(
                path = %path.display(),
                discarded_bytes = bytes.len() as u64 - scan.valid_len,
                "discarding torn journal tail"
            );
            file.set_len(scan.valid_len)?;
            file.sync_data()?;
        }
        file.seek(SeekFrom::Start(scan.valid_len))?;

        tracing::debug!(path = %path.display(), entries = scan.entries.len(), "journal opened");
        Ok(Self {
            path,
            inner: Mutex::new(JournalFile {
                file,
                len: scan.valid_len,
            }),
        })
    }

    /// Read a journal without modifying it
    ///
    /// A torn tail is ignored rather than truncated.
    ///
    /// # Errors
    /// Returns [`PersistenceError`] on I/O failure or a malformed complete line
    pub fn read_entries(path: impl AsRef<Path>) -> Result<Vec<AuditEntry>, PersistenceError> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        Ok(scan_journal(path, &bytes)?.entries)
    }

    /// Journal location
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ChainStorage for JournalStorage {
    fn load(&self) -> Result<Vec<AuditEntry>, PersistenceError> {
        let mut guard = self.inner.lock();
        let mut bytes = Vec::new();
        guard.file.seek(SeekFrom::Start(0))?;
        guard.file.read_to_end(&mut bytes)?;
        let end = guard.len;
        guard.file.seek(SeekFrom::Start(end))?;
        let valid = usize::try_from(end).unwrap_or(bytes.len()).min(bytes.len());
        Ok(scan_journal(&self.path, &bytes[..valid])?.entries)
    }

    fn persist(&self, entry: &AuditEntry) -> Result<(), PersistenceError> {
        let mut line = serde_json::to_vec(entry).map_err(PersistenceError::Encode)?;
        line.push(b'\n');

        let mut guard = self.inner.lock();
        let start = guard.len;
        let file = &mut guard.file;
        let written = file.write_all(&line).and_then(|()| file.sync_data());

        if let Err(err) = written {
            // roll back to the last complete line
            let rolled_back = file
                .set_len(start)
                .and_then(|()| file.seek(SeekFrom::Start(start)).map(|_| ()));
            if let Err(rollback) = rolled_back {
                tracing::error!(error = %rollback, path = %self.path.display(), "journal rollback failed");
            }
            return Err(PersistenceError::Io(err));
        }

        guard.len = start + line.len() as u64;
        Ok(())
    }
}

struct JournalScan {
    entries: Vec<AuditEntry>,
    valid_len: u64,
}

fn scan_journal(path: &Path, bytes: &[u8]) -> Result<JournalScan, PersistenceError> {
    let mut entries = Vec::new();
    let mut offset = 0usize;
    let mut valid_len = 0usize;
    let mut line_no = 0usize;

    while offset < bytes.len() {
        line_no += 1;
        let rest = &bytes[offset..];
        let Some(newline) = rest.iter().position(|b| *b == b'\n') else {
            // unterminated last line: torn write
            break;
        };
        let line = &rest[..newline];
        let next = offset + newline + 1;

        if line.iter().all(u8::is_ascii_whitespace) {
            offset = next;
            valid_len = next;
            continue;
        }

        match serde_json::from_slice::<AuditEntry>(line) {
            Ok(entry) => {
                entries.push(entry);
                valid_len = next;
            }
            Err(err) => {
                return Err(PersistenceError::Corrupt {
                    path: path.to_path_buf(),
                    line: line_no,
                    reason: err.to_string(),
                })
            }
        }
        offset = next;
    }

    Ok(JournalScan {
        entries,
        valid_len: valid_len as u64,
    })
}
