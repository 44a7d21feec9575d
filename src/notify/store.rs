// src/notify/store.rs
//! Durable log of delivered fingerprints.
//!
//! The file format is plain text, one lowercase hex fingerprint per line,
//! appended as deliveries are confirmed. It is read once at startup.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{info, warn};

use crate::model::Fingerprint;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("history store {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("history store {path} is corrupt at line {line}: {content:?}")]
    Corrupt {
        path: String,
        line: usize,
        content: String,
    },
}

/// Append-only fingerprint storage. `append` must be durable before it returns.
pub trait FingerprintStore: Send {
    fn load_all(&mut self) -> Result<HashSet<Fingerprint>, StoreError>;
    fn append(&mut self, fp: &Fingerprint) -> Result<(), StoreError>;
    fn truncate(&mut self) -> Result<(), StoreError>;
    fn location(&self) -> String;
    fn exists(&self) -> bool;
}

#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn open_append(&self) -> Result<File, StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_err(e))
    }
}

impl FingerprintStore for FileStore {
    fn load_all(&mut self) -> Result<HashSet<Fingerprint>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(target: "notify", path = %self.path.display(), "history file absent, starting empty");
                return Ok(HashSet::new());
            }
            Err(e) => return Err(self.io_err(e)),
        };
        let text = String::from_utf8(bytes).map_err(|e| {
            self.io_err(io::Error::new(io::ErrorKind::InvalidData, e))
        })?;

        let mut set = HashSet::new();
        let mut offset = 0usize;
        let mut segments = text.split('\n').enumerate().peekable();
        while let Some((idx, segment)) = segments.next() {
            let is_tail = segments.peek().is_none();
            let line = segment.trim();
            if !line.is_empty() {
                match Fingerprint::parse(line) {
                    Some(fp) => {
                        set.insert(fp);
                        if is_tail {
                            // valid but unterminated: terminate it so the next append starts clean
                            let mut f = self.open_append()?;
                            f.write_all(b"\n").map_err(|e| self.io_err(e))?;
                            f.sync_data().map_err(|e| self.io_err(e))?;
                        }
                    }
                    None if is_tail => {
                        warn!(
                            target: "notify",
                            path = %self.path.display(),
                            line = idx + 1,
                            "torn tail in history file, truncating"
                        );
                        let f = OpenOptions::new()
                            .write(true)
                            .open(&self.path)
                            .map_err(|e| self.io_err(e))?;
                        f.set_len(offset as u64).map_err(|e| self.io_err(e))?;
                        f.sync_data().map_err(|e| self.io_err(e))?;
                    }
                    None => {
                        return Err(StoreError::Corrupt {
                            path: self.path.display().to_string(),
                            line: idx + 1,
                            content: line.chars().take(80).collect(),
                        })
                    }
                }
            }
            offset += segment.len() + 1;
        }

        info!(target: "notify", path = %self.path.display(), count = set.len(), "history loaded");
        Ok(set)
    }

    /// Synchronous; callers on a runtime run it inline between deliveries.
    fn append(&mut self, fp: &Fingerprint) -> Result<(), StoreError> {
        let mut f = self.open_append()?;
        // one write per entry; a line is either fully present or absent
        f.write_all(format!("{fp}\n").as_bytes())
            .map_err(|e| self.io_err(e))?;
        f.sync_data().map_err(|e| self.io_err(e))
    }

    fn truncate(&mut self) -> Result<(), StoreError> {
        let f = File::create(&self.path).map_err(|e| self.io_err(e))?;
        f.sync_all().map_err(|e| self.io_err(e))
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn exists(&self) -> bool {
        self.path.exists()
    }
}

/// In-memory store for tests and dry runs. Clones share the same log, so a
/// clone can be handed to a fresh notifier to simulate a restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    log: Arc<Mutex<Vec<Fingerprint>>>,
    fail_appends: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent appends fail (simulates a full disk).
    pub fn set_fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    pub fn entries(&self) -> Vec<Fingerprint> {
        self.log.lock().expect("memory store poisoned").clone()
    }
}

impl FingerprintStore for MemoryStore {
    fn load_all(&mut self) -> Result<HashSet<Fingerprint>, StoreError> {
        Ok(self.entries().into_iter().collect())
    }

    fn append(&mut self, fp: &Fingerprint) -> Result<(), StoreError> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(StoreError::Io {
                path: self.location(),
                source: io::Error::other("append rejected"),
            });
        }
        self.log
            .lock()
            .expect("memory store poisoned")
            .push(fp.clone());
        Ok(())
    }

    fn truncate(&mut self) -> Result<(), StoreError> {
        self.log.lock().expect("memory store poisoned").clear();
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }

    fn exists(&self) -> bool {
        true
    }
}
