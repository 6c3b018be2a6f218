//! In-memory file buffers for a single session.
//!
//! Uploads arrive as an ordered chunk stream against a declared size. While
//! in flight a file holds its chunks as received; on completion they are
//! concatenated into one contiguous buffer and the chunk list is freed.
//! Completed buffers are immutable and shared zero-copy into downloads.
//!
//! The store is purely in-memory and carries no quota of its own; the
//! transport's per-frame cap is the only hard limit. Files larger than
//! available RAM are out of scope by design.

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::{Bytes, BytesMut};
use thiserror::Error;

use protocol::ids::new_file_id;
use protocol::messages::FileMeta;

/// Errors from file buffer operations.
#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    /// No file with this id in the session.
    #[error("file not found: {0}")]
    NotFound(String),

    /// The chunk would push the file past its declared size.
    #[error("chunk overflows declared size: {received} + {chunk} > {declared}")]
    Overflow {
        received: u64,
        chunk: u64,
        declared: u64,
    },

    /// The file already completed; no more chunks are accepted.
    #[error("file already complete: {0}")]
    AlreadyComplete(String),

    /// Completion was requested before all declared bytes arrived, or after
    /// more arrived than declared.
    #[error("received {received} bytes of a declared {declared}")]
    SizeMismatch { received: u64, declared: u64 },
}

/// Body of a stored file.
#[derive(Debug)]
enum FileBody {
    /// Upload in flight: ordered chunks, `received <= declared size`.
    Open { chunks: Vec<Bytes>, received: u64 },
    /// Upload finished: one contiguous buffer, `len == declared size`.
    Complete { bytes: Bytes },
}

/// A file owned by a session, either in flight or complete.
#[derive(Debug)]
pub struct StoredFile {
    pub id: String,
    pub original_name: String,
    /// Size declared by the uploader in `file_start`.
    pub size: u64,
    pub mimetype: String,
    pub uploaded_at: SystemTime,
    pub uploader_id: String,
    body: FileBody,
}

impl StoredFile {
    /// Whether the declared bytes have all arrived and been sealed.
    pub fn is_complete(&self) -> bool {
        matches!(self.body, FileBody::Complete { .. })
    }

    /// Bytes received so far (equals `size` once complete).
    pub fn received(&self) -> u64 {
        match &self.body {
            FileBody::Open { received, .. } => *received,
            FileBody::Complete { bytes } => bytes.len() as u64,
        }
    }

    /// The complete contents, if sealed. Cloning is cheap; the buffer is
    /// shared, not copied.
    pub fn bytes(&self) -> Option<Bytes> {
        match &self.body {
            FileBody::Complete { bytes } => Some(bytes.clone()),
            FileBody::Open { .. } => None,
        }
    }

    /// Wire-format metadata for this file.
    pub fn meta(&self) -> FileMeta {
        FileMeta {
            id: self.id.clone(),
            original_name: self.original_name.clone(),
            size: self.size,
            mimetype: self.mimetype.clone(),
            uploaded_at: millis_since_epoch(self.uploaded_at),
            uploader_id: self.uploader_id.clone(),
        }
    }
}

fn millis_since_epoch(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Per-session mapping from file id to buffered file.
#[derive(Debug, Default)]
pub struct FileStore {
    files: HashMap<String, StoredFile>,
}

impl FileStore {
    /// Open a new in-flight file and return its freshly minted id.
    pub fn begin(&mut self, uploader_id: &str, name: &str, size: u64, mimetype: &str) -> String {
        let id = new_file_id();
        self.files.insert(
            id.clone(),
            StoredFile {
                id: id.clone(),
                original_name: name.to_string(),
                size,
                mimetype: mimetype.to_string(),
                uploaded_at: SystemTime::now(),
                uploader_id: uploader_id.to_string(),
                body: FileBody::Open {
                    chunks: Vec::new(),
                    received: 0,
                },
            },
        );
        id
    }

    /// Append a chunk to an in-flight file.
    ///
    /// Returns `(received, declared)` byte counts after the append. A chunk
    /// that would exceed the declared size is rejected without being
    /// buffered; the file then simply never completes and ages out.
    pub fn append(&mut self, file_id: &str, chunk: Bytes) -> Result<(u64, u64), StoreError> {
        let file = self
            .files
            .get_mut(file_id)
            .ok_or_else(|| StoreError::NotFound(file_id.to_string()))?;

        let declared = file.size;
        match &mut file.body {
            FileBody::Complete { .. } => Err(StoreError::AlreadyComplete(file_id.to_string())),
            FileBody::Open { chunks, received } => {
                let chunk_len = chunk.len() as u64;
                if *received + chunk_len > declared {
                    return Err(StoreError::Overflow {
                        received: *received,
                        chunk: chunk_len,
                        declared,
                    });
                }
                *received += chunk_len;
                chunks.push(chunk);
                Ok((*received, declared))
            }
        }
    }

    /// Seal an in-flight file whose declared bytes have all arrived.
    ///
    /// On success the chunks are concatenated into one immutable buffer and
    /// the chunk list is freed. On a size mismatch the file stays Open and
    /// untouched; the janitor will reclaim it.
    pub fn complete(&mut self, file_id: &str) -> Result<FileMeta, StoreError> {
        let file = self
            .files
            .get_mut(file_id)
            .ok_or_else(|| StoreError::NotFound(file_id.to_string()))?;

        match &mut file.body {
            FileBody::Complete { .. } => Err(StoreError::AlreadyComplete(file_id.to_string())),
            FileBody::Open { chunks, received } => {
                if *received != file.size {
                    return Err(StoreError::SizeMismatch {
                        received: *received,
                        declared: file.size,
                    });
                }

                let mut buf = BytesMut::with_capacity(*received as usize);
                for chunk in chunks.drain(..) {
                    buf.extend_from_slice(&chunk);
                }
                file.body = FileBody::Complete {
                    bytes: buf.freeze(),
                };
                Ok(file.meta())
            }
        }
    }

    /// Look up a file by id.
    pub fn get(&self, file_id: &str) -> Option<&StoredFile> {
        self.files.get(file_id)
    }

    /// Remove a file, returning it if present. Idempotent.
    pub fn remove(&mut self, file_id: &str) -> Option<StoredFile> {
        self.files.remove(file_id)
    }

    /// Metadata of every completed file, for `existing_files`.
    ///
    /// In-flight uploads are not advertised.
    pub fn complete_metas(&self) -> Vec<FileMeta> {
        self.files
            .values()
            .filter(|f| f.is_complete())
            .map(StoredFile::meta)
            .collect()
    }

    /// Drop every file older than `ttl` as of `now`, returning their
    /// metadata. Open and complete files age out alike.
    pub fn expire_older_than(&mut self, ttl: Duration, now: SystemTime) -> Vec<FileMeta> {
        let expired: Vec<String> = self
            .files
            .values()
            .filter(|f| {
                now.duration_since(f.uploaded_at)
                    .map(|age| age > ttl)
                    .unwrap_or(false)
            })
            .map(|f| f.id.clone())
            .collect();

        expired
            .into_iter()
            .filter_map(|id| self.files.remove(&id))
            .map(|f| f.meta())
            .collect()
    }

    /// Number of files, in any state.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the store holds no files.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
