// src/store.rs
//! # Response Store
//! Flat-file, content-addressed persistence for captured responses.
//!
//! Two artifacts per response:
//! - a metadata record under `<meta_dir>/<YYYY>/<MM>/`, named
//!   `<YYYYmmdd-HHMMSS>-<source id>-<hash prefix>.json`;
//! - the payload bytes under `<payload_dir>/<h0h1>/<h2h3>/<h4h5>/<hash>`.
//!
//! Every write is create-if-absent: bytes land in a private temp file which is
//! then hard-linked into place, so an existing artifact is never rewritten and
//! concurrent runs against the same directories cannot corrupt each other.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::model::{Response, ResponseMeta};

/// Length of the hash prefix embedded in metadata file names.
const META_HASH_PREFIX: usize = 10;

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "store_artifacts_written_total",
            "Metadata records and payload blobs newly written."
        );
        describe_counter!(
            "store_artifacts_skipped_total",
            "Writes skipped because the artifact already existed."
        );
    });
}

/// Which artifacts a call to [`ResponseStore::store`] actually created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreOutcome {
    pub meta_written: bool,
    pub payload_written: bool,
}

impl StoreOutcome {
    pub fn is_noop(&self) -> bool {
        !self.meta_written && !self.payload_written
    }
}

#[derive(Debug, Clone)]
pub struct ResponseStore {
    meta_dir: PathBuf,
    payload_dir: PathBuf,
}

impl ResponseStore {
    /// Open a store over two existing directories.
    pub fn open(meta_dir: impl Into<PathBuf>, payload_dir: impl Into<PathBuf>) -> Result<Self> {
        let meta_dir = meta_dir.into();
        let payload_dir = payload_dir.into();
        for d in [&meta_dir, &payload_dir] {
            if !d.is_dir() {
                return Err(Error::NotADirectory(d.clone()));
            }
        }
        Ok(Self {
            meta_dir,
            payload_dir,
        })
    }

    /// Like [`open`](Self::open) but creates missing root directories first.
    pub fn create(meta_dir: impl Into<PathBuf>, payload_dir: impl Into<PathBuf>) -> Result<Self> {
        let meta_dir = meta_dir.into();
        let payload_dir = payload_dir.into();
        ensure_dir(&meta_dir)?;
        ensure_dir(&payload_dir)?;
        Self::open(meta_dir, payload_dir)
    }

    pub fn meta_dir(&self) -> &Path {
        &self.meta_dir
    }

    pub fn payload_dir(&self) -> &Path {
        &self.payload_dir
    }

    pub fn meta_path(&self, source_id: &str, meta: &ResponseMeta) -> Result<PathBuf> {
        let hash = checked_hash(&meta.content_hash)?;
        let ts = meta.timestamp;
        let prefix = &hash[..hash.len().min(META_HASH_PREFIX)];
        let file_name = format!(
            "{}-{}-{}.json",
            ts.format("%Y%m%d-%H%M%S"),
            sanitize_source_id(source_id),
            prefix
        );
        Ok(self
            .meta_dir
            .join(ts.format("%Y").to_string())
            .join(ts.format("%m").to_string())
            .join(file_name))
    }

    pub fn payload_path(&self, hash: &str) -> Result<PathBuf> {
        let hash = checked_hash(hash)?;
        Ok(self
            .payload_dir
            .join(&hash[0..2])
            .join(&hash[2..4])
            .join(&hash[4..6])
            .join(hash))
    }

    /// Persist `response` captured by `source_id`. Artifacts already on disk are
    /// left untouched; storing the same response twice is a no-op.
    pub fn store(&self, source_id: &str, response: &Response) -> Result<StoreOutcome> {
        ensure_metrics_described();

        let meta_path = self.meta_path(source_id, &response.meta)?;
        let payload_path = self.payload_path(&response.meta.content_hash)?;

        let meta_bytes = serde_json::to_vec(&response.meta).map_err(|source| Error::Json {
            path: meta_path.clone(),
            source,
        })?;

        // Payload before record: a blob without a record is never replayed,
        // a record without its blob aborts every replay.
        let payload_written = write_if_absent(&payload_path, &response.payload)?;
        let meta_written = write_if_absent(&meta_path, &meta_bytes)?;
        let outcome = StoreOutcome {
            meta_written,
            payload_written,
        };

        for written in [outcome.meta_written, outcome.payload_written] {
            if written {
                counter!("store_artifacts_written_total").increment(1);
            } else {
                counter!("store_artifacts_skipped_total").increment(1);
            }
        }
        tracing::debug!(
            target: "podcast_metrics::store",
            hash = %response.meta.content_hash,
            source_id,
            meta_written = outcome.meta_written,
            payload_written = outcome.payload_written,
            "stored response"
        );
        Ok(outcome)
    }

    /// Lazily replay every stored response. Each call starts a fresh walk.
    pub fn find(&self) -> ResponseIter<'_> {
        ResponseIter {
            store: self,
            walker: WalkDir::new(&self.meta_dir)
                .sort_by_file_name()
                .into_iter(),
        }
    }

    /// Number of metadata records currently on disk.
    pub fn len(&self) -> Result<usize> {
        let mut n = 0;
        for entry in WalkDir::new(&self.meta_dir) {
            let entry = entry.map_err(|e| walk_error(&self.meta_dir, e))?;
            if entry.file_type().is_file() && is_meta_file(entry.path()) {
                n += 1;
            }
        }
        Ok(n)
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.len().map(|n| n == 0)
    }

    fn hydrate(&self, meta_path: &Path) -> Result<Response> {
        let raw = fs::read(meta_path).map_err(|e| Error::io(meta_path, e))?;
        let meta: ResponseMeta = serde_json::from_slice(&raw).map_err(|source| Error::Json {
            path: meta_path.to_path_buf(),
            source,
        })?;
        let payload_path = self.payload_path(&meta.content_hash)?;
        let payload = match fs::read(&payload_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::MissingPayload {
                    hash: meta.content_hash,
                    meta_path: meta_path.to_path_buf(),
                })
            }
            Err(e) => return Err(Error::io(payload_path, e)),
        };
        Ok(Response { meta, payload })
    }
}

/// Iterator returned by [`ResponseStore::find`].
pub struct ResponseIter<'a> {
    store: &'a ResponseStore,
    walker: walkdir::IntoIter,
}

impl Iterator for ResponseIter<'_> {
    type Item = Result<Response>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(walk_error(&self.store.meta_dir, e))),
            };
            if entry.file_type().is_file() && is_meta_file(entry.path()) {
                return Some(self.store.hydrate(entry.path()));
            }
        }
    }
}

fn is_meta_file(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s.starts_with('.'));
    !hidden && path.extension().and_then(|s| s.to_str()) == Some("json")
}

fn walk_error(root: &Path, e: walkdir::Error) -> Error {
    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
    let source = e
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::new(ErrorKind::Other, "filesystem loop"));
    Error::io(path, source)
}

fn checked_hash(hash: &str) -> Result<&str> {
    if hash.len() < 6 || !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::InvalidHash(hash.to_string()));
    }
    Ok(hash)
}

fn sanitize_source_id(source_id: &str) -> String {
    source_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.exists() && !dir.is_dir() {
        return Err(Error::NotADirectory(dir.to_path_buf()));
    }
    match fs::create_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
        Err(e) => Err(Error::io(dir, e)),
    }
}

/// Returns `true` if the file was created, `false` if it already existed.
fn write_if_absent(path: &Path, bytes: &[u8]) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    let dir = match path.parent() {
        Some(d) => d,
        None => return Err(Error::NotADirectory(path.to_path_buf())),
    };
    ensure_dir(dir)?;

    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("artifact");
    let tmp = dir.join(format!(
        ".{}.{}.{}.tmp",
        file_name,
        std::process::id(),
        TMP_SEQ.fetch_add(1, Ordering::Relaxed)
    ));

    let staged = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&tmp)
        .and_then(|mut f| {
            f.write_all(bytes)?;
            f.sync_all()
        });
    if let Err(e) = staged {
        let _ = fs::remove_file(&tmp);
        return Err(Error::io(&tmp, e));
    }

    let linked = match fs::hard_link(&tmp, path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(Error::io(path, e)),
    };
    let _ = fs::remove_file(&tmp);
    linked
}
