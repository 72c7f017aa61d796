//! File-per-key storage.
//!
//! Layout: `<root>/<namespace>/<blake3(key)>.rec`, where `namespace` is the key text
//! before the first `:`. Each record is a one-line JSON header followed by the raw
//! value bytes. Writes go to a temp file in the same directory and are persisted
//! over the final path, so readers never observe a half-written record.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::{KvStore, StorageError, StorageResult, is_expired};

const RECORD_EXTENSION: &str = "rec";

const DEFAULT_NAMESPACE: &str = "_";

#[derive(Debug, Serialize, Deserialize)]
struct RecordHeader {
    key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

struct Record {
    header: RecordHeader,
    value: Vec<u8>,
}

/// Durable [`KvStore`] rooted at a directory.
#[derive(Debug, Clone)]
pub struct FsKvStore {
    root: Arc<PathBuf>,
}

impl FsKvStore {
    /// Opens (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|_| StorageError::StorageUnavailable { path: root.clone() })?;
        Ok(Self {
            root: Arc::new(root),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn blocking<T, F>(&self, f: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> StorageResult<T> + Send + 'static,
    {
        let root = Arc::clone(&self.root);
        tokio::task::spawn_blocking(move || f(&root))
            .await
            .map_err(|e| StorageError::TaskFailed(e.to_string()))?
    }
}

fn namespace_of(key: &str) -> &str {
    match key.split_once(':') {
        Some((ns, _)) if !ns.is_empty() => ns,
        _ => DEFAULT_NAMESPACE,
    }
}

fn namespace_dir(root: &Path, namespace: &str) -> PathBuf {
    let safe: String = namespace
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    root.join(safe)
}

fn record_path(root: &Path, key: &str) -> PathBuf {
    let digest = blake3::hash(key.as_bytes()).to_hex();
    namespace_dir(root, namespace_of(key)).join(format!("{}.{}", digest, RECORD_EXTENSION))
}

fn read_record(path: &Path) -> StorageResult<Option<Record>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let split = bytes
        .iter()
        .position(|b| *b == b'\n')
        .ok_or_else(|| StorageError::Corrupt {
            path: path.to_path_buf(),
            reason: "missing header terminator".to_string(),
        })?;

    let header: RecordHeader =
        serde_json::from_slice(&bytes[..split]).map_err(|e| StorageError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    Ok(Some(Record {
        header,
        value: bytes[split + 1..].to_vec(),
    }))
}

fn write_record(root: &Path, key: &str, value: &[u8], expires_at: Option<DateTime<Utc>>) -> StorageResult<()> {
    let dir = namespace_dir(root, namespace_of(key));
    fs::create_dir_all(&dir)?;

    let header = serde_json::to_vec(&RecordHeader {
        key: key.to_string(),
        expires_at,
    })?;

    let mut temp = NamedTempFile::new_in(&dir)?;
    temp.write_all(&header)?;
    temp.write_all(b"\n")?;
    temp.write_all(value)?;
    temp.as_file().sync_all()?;

    temp.persist(record_path(root, key))
        .map_err(|e| StorageError::WriteFailed {
            key: key.to_string(),
            reason: e.error.to_string(),
        })?;
    Ok(())
}

/// Every record in the namespace directories that `prefix` can match.
fn records_under(root: &Path, prefix: &str) -> StorageResult<Vec<Record>> {
    let dirs: Vec<PathBuf> = if prefix.contains(':') {
        vec![namespace_dir(root, namespace_of(prefix))]
    } else {
        match fs::read_dir(root) {
            Ok(rd) => rd
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_dir())
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        }
    };

    let mut records = Vec::new();
    for dir in dirs {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let path = entry?.path();
            if path.extension().is_none_or(|ext| ext != RECORD_EXTENSION) {
                continue;
            }
            match read_record(&path) {
                Ok(Some(record)) if record.header.key.starts_with(prefix) => records.push(record),
                Ok(_) => {}
                Err(StorageError::Corrupt { path, reason }) => {
                    tracing::warn!(path = %path.display(), %reason, "Skipping corrupt record");
                }
                Err(e) => return Err(e),
            }
        }
    }
    Ok(records)
}

#[async_trait]
impl KvStore for FsKvStore {
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let key = key.to_string();
        self.blocking(move |root| {
            let now = Utc::now();
            Ok(read_record(&record_path(root, &key))?
                .filter(|r| r.header.key == key && !is_expired(r.header.expires_at, now))
                .map(|r| r.value))
        })
        .await
    }

    async fn put(
        &self,
        key: &str,
        value: Vec<u8>,
        expires_at: Option<DateTime<Utc>>,
    ) -> StorageResult<()> {
        let key = key.to_string();
        self.blocking(move |root| write_record(root, &key, &value, expires_at))
            .await
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        let key = key.to_string();
        self.blocking(move |root| match fs::remove_file(record_path(root, &key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        })
        .await
    }

    async fn list_expired(&self, prefix: &str, now: DateTime<Utc>) -> StorageResult<Vec<String>> {
        let prefix = prefix.to_string();
        self.blocking(move |root| {
            let mut keys: Vec<String> = records_under(root, &prefix)?
                .into_iter()
                .filter(|r| is_expired(r.header.expires_at, now))
                .map(|r| r.header.key)
                .collect();
            keys.sort();
            Ok(keys)
        })
        .await
    }

    async fn scan(&self, prefix: &str) -> StorageResult<Vec<(String, Vec<u8>)>> {
        let prefix = prefix.to_string();
        self.blocking(move |root| {
            let now = Utc::now();
            let mut out: Vec<(String, Vec<u8>)> = records_under(root, &prefix)?
                .into_iter()
                .filter(|r| !is_expired(r.header.expires_at, now))
                .map(|r| (r.header.key, r.value))
                .collect();
            out.sort_by(|a, b| a.0.cmp(&b.0));
            Ok(out)
        })
        .await
    }
}
