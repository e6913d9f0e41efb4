//! Persistent thread map.
//!
//! Bindings live in `threads.json` under the configured state path.  The
//! map is opened once at process start: an exclusive advisory lock on
//! `threads.lock` is taken and held until the map is dropped, so a second
//! process pointed at the same state directory fails to start instead of
//! racing on the file.  Inside the process all access goes through one
//! `RwLock`; every `bind` is written through to disk atomically
//! (temp file in the same directory, then rename).

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use tb_domain::error::{Error, Result};
use tb_domain::trace::TraceEvent;

use crate::thread_key::ThreadKey;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Binding
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One chat thread bound to one assistant session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadBinding {
    pub thread_key: String,
    pub session_id: String,
    pub bound_at: DateTime<Utc>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Thread map
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ThreadMap {
    path: PathBuf,
    bindings: RwLock<HashMap<String, ThreadBinding>>,
    /// Held for the lifetime of the map; the OS lock drops with the handle.
    _lock: File,
}

impl ThreadMap {
    /// Open (or create) the map at `state_path/threads.json`.
    pub fn open(state_path: &Path) -> Result<Self> {
        std::fs::create_dir_all(state_path)?;

        let lock_path = state_path.join("threads.lock");
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .read(true)
            .open(&lock_path)?;
        lock.try_lock_exclusive().map_err(|_| {
            Error::Other(format!(
                "thread map {} is held by another process",
                state_path.display()
            ))
        })?;

        let path = state_path.join("threads.json");
        let bindings = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            match serde_json::from_str::<HashMap<String, ThreadBinding>>(&raw) {
                Ok(map) => map,
                Err(e) => {
                    let aside = path.with_extension("json.corrupt");
                    std::fs::rename(&path, &aside)?;
                    tracing::warn!(
                        path = %path.display(),
                        moved_to = %aside.display(),
                        error = %e,
                        "thread map unreadable, moved aside and starting empty"
                    );
                    HashMap::new()
                }
            }
        } else {
            HashMap::new()
        };

        tracing::info!(
            threads = bindings.len(),
            path = %path.display(),
            "thread map loaded"
        );

        Ok(Self {
            path,
            bindings: RwLock::new(bindings),
            _lock: lock,
        })
    }

    /// Session bound to `key`, if any.  Exact match only.
    pub fn lookup(&self, key: &ThreadKey) -> Option<String> {
        self.bindings
            .read()
            .get(key.as_str())
            .map(|b| b.session_id.clone())
    }

    /// Bind `key` to `session_id`, replacing any earlier binding, and
    /// write the map to disk before returning.
    pub fn bind(&self, key: &ThreadKey, session_id: &str) -> Result<()> {
        let mut bindings = self.bindings.write();
        bindings.insert(
            key.as_str().to_owned(),
            ThreadBinding {
                thread_key: key.as_str().to_owned(),
                session_id: session_id.to_owned(),
                bound_at: Utc::now(),
            },
        );
        self.persist(&bindings)?;
        drop(bindings);

        TraceEvent::ThreadBound {
            thread_key: key.as_str().to_owned(),
            session_id: session_id.to_owned(),
        }
        .emit();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.bindings.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.read().is_empty()
    }

    fn persist(&self, bindings: &HashMap<String, ThreadBinding>) -> Result<()> {
        let json = serde_json::to_vec_pretty(bindings)?;
        let dir = self.path.parent().unwrap_or(Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
