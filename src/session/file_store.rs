//! Sharded key→path mapping and atomic file primitives.
//!
//! A key is split into a shard directory (its first three characters) and a
//! file name (the remainder), under one of two parallel namespaces so user
//! IDs and session tokens can never collide on disk:
//!
//! ```text
//! <base>/tokens/<shard>/<rest>   session records
//! <base>/index/<shard>/<rest>    per-user token lists
//! ```
//!
//! Sharding keeps per-directory entry counts bounded, which keeps lookups
//! and the sweep's directory listings cheap.

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// Number of leading key characters that form the shard directory name.
const SHARD_WIDTH: usize = 3;

/// The two on-disk namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    /// Session records keyed by token.
    Tokens,
    /// Per-user token lists keyed by user ID.
    Index,
}

impl Namespace {
    fn dir(self) -> &'static str {
        match self {
            Namespace::Tokens => "tokens",
            Namespace::Index => "index",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShardedFileStore {
    base_dir: PathBuf,
}

impl ShardedFileStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    /// Compute the on-disk path for a key.
    ///
    /// Keys no longer than the shard width use the whole key as the shard
    /// directory and `_` as the file name, so no path component is empty.
    pub fn path_for(&self, ns: Namespace, key: &str) -> PathBuf {
        let (shard_dir, file_name) = self.split_key(ns, key);
        shard_dir.join(file_name)
    }

    fn split_key<'a>(&self, ns: Namespace, key: &'a str) -> (PathBuf, &'a str) {
        // Keys are ASCII (hex tokens, user IDs); the boundary check keeps
        // an exotic key from panicking the split.
        let (shard, rest) = if key.len() > SHARD_WIDTH && key.is_char_boundary(SHARD_WIDTH) {
            key.split_at(SHARD_WIDTH)
        } else {
            (key, "_")
        };
        (self.base_dir.join(ns.dir()).join(shard), rest)
    }

    /// Write the full payload for a key, replacing any existing file.
    ///
    /// Writes to a temporary sibling first and renames it into place so a
    /// partial write is never visible under the final name.
    pub async fn write(&self, ns: Namespace, key: &str, bytes: &[u8]) -> io::Result<()> {
        let (shard_dir, file_name) = self.split_key(ns, key);
        fs::create_dir_all(&shard_dir).await?;

        let path = shard_dir.join(file_name);
        let tmp = shard_dir.join(format!(".tmp-{}", Uuid::new_v4()));
        fs::write(&tmp, bytes).await?;
        match fs::rename(&tmp, &path).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let _ = fs::remove_file(&tmp).await;
                Err(e)
            }
        }
    }

    /// Read the payload for a key; `None` when absent.
    pub async fn read(&self, ns: Namespace, key: &str) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.path_for(ns, key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Remove the file for a key; absence is not an error.
    pub async fn delete(&self, ns: Namespace, key: &str) -> io::Result<()> {
        match fs::remove_file(self.path_for(ns, key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub async fn exists(&self, ns: Namespace, key: &str) -> bool {
        fs::metadata(self.path_for(ns, key)).await.is_ok()
    }

    /// List the paths of every stored entry in a namespace.
    ///
    /// Used by the expiry sweep. Temporary files left behind by an
    /// interrupted write are skipped.
    pub async fn list_entries(&self, ns: Namespace) -> io::Result<Vec<PathBuf>> {
        let ns_dir = self.base_dir.join(ns.dir());
        let mut shards = match fs::read_dir(&ns_dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut entries = Vec::new();
        while let Some(shard) = shards.next_entry().await? {
            if !shard.file_type().await?.is_dir() {
                continue;
            }
            let mut files = fs::read_dir(shard.path()).await?;
            while let Some(file) = files.next_entry().await? {
                if !file.file_type().await?.is_file() {
                    continue;
                }
                if is_temp_file(&file.path()) {
                    continue;
                }
                entries.push(file.path());
            }
        }
        Ok(entries)
    }
}

fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with(".tmp-"))
        .unwrap_or(false)
}
