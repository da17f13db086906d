//! File handles as registry values, plus the process-wide default file cache.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use path_absolutize::Absolutize;
use tracing::{debug, warn};

use crate::cache::DescriptorCache;
use crate::config::AutocloseConfig;
use crate::descriptors::Inserted;
use crate::error::{CloseError, DescriptorError, DescriptorResult};
use crate::openable::Openable;
use crate::time::SystemClock;

pub type FileCache = DescriptorCache<PathBuf, OpenFile>;

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenMode {
    Read,
    /// Create or truncate.
    Write,
    /// Create if missing, write at the end.
    Append,
    /// Existing file, read and write.
    ReadWrite,
    /// Must not exist yet.
    Create,
}

impl OpenMode {
    pub fn is_writable(&self) -> bool { !matches!(self, OpenMode::Read) }

    fn options(&self) -> OpenOptions {
        let mut o = OpenOptions::new();
        match self {
            OpenMode::Read => { o.read(true); }
            OpenMode::Write => { o.write(true).create(true).truncate(true); }
            OpenMode::Append => { o.append(true).create(true); }
            OpenMode::ReadWrite => { o.read(true).write(true); }
            OpenMode::Create => { o.write(true).create_new(true); }
        }
        o
    }
}

/// One open instance of a file. Two opens of the same path are distinct values.
#[derive(Debug)]
pub struct OpenFile {
    path: PathBuf,
    mode: OpenMode,
    instance_id: u64,
    file: Option<File>,
}

impl PartialEq for OpenFile {
    fn eq(&self, other: &Self) -> bool { self.instance_id == other.instance_id && self.path == other.path }
}

impl OpenFile {
    pub fn open(path: impl AsRef<Path>, mode: OpenMode) -> DescriptorResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = mode.options().open(&path).map_err(|source| DescriptorError::Open { path: path.clone(), source })?;
        let instance_id = NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed);
        debug!(target: "pathfd::files", path = %path.display(), ?mode, instance_id, "opened");
        Ok(Self { path, mode, instance_id, file: Some(file) })
    }

    pub fn path(&self) -> &Path { &self.path }
    pub fn mode(&self) -> OpenMode { self.mode }
    pub fn instance_id(&self) -> u64 { self.instance_id }
    pub fn is_open(&self) -> bool { self.file.is_some() }
    pub fn file(&self) -> Option<&File> { self.file.as_ref() }
    pub fn file_mut(&mut self) -> Option<&mut File> { self.file.as_mut() }
}

impl Openable for OpenFile {
    /// Flushes writable handles to disk, then releases the descriptor. A failed flush
    /// keeps the handle open.
    fn close(&mut self) -> Result<(), CloseError> {
        let Some(file) = self.file.take() else {
            return Err(CloseError::AlreadyClosed(self.path.display().to_string()));
        };
        if self.mode.is_writable() {
            if let Err(source) = file.sync_all() {
                self.file = Some(file);
                return Err(CloseError::Io { path: self.path.clone(), source });
            }
        }
        drop(file);
        debug!(target: "pathfd::files", path = %self.path.display(), instance_id = self.instance_id, "closed");
        Ok(())
    }
}

impl DescriptorCache<PathBuf, OpenFile> {
    /// Open `path` and register the handle under its absolute path, returning the key.
    /// A handle previously registered under the same key is closed, even when the
    /// on-insert autoclose pass fails.
    pub fn open(&self, path: impl AsRef<Path>, mode: OpenMode) -> DescriptorResult<PathBuf> {
        let key = path.as_ref().absolutize()?.to_path_buf();
        let file = OpenFile::open(&key, mode)?;
        let outcome = self.insert(key.clone(), file);
        if let Inserted::Replaced(mut old) = outcome.inserted {
            if let Err(e) = old.close() {
                warn!(target: "pathfd::files", path = %key.display(), "closing replaced handle failed: {}", e);
            }
        }
        if let Some(Err(e)) = outcome.autoclose {
            return Err(e);
        }
        Ok(key)
    }
}

static FILES: Lazy<FileCache> = Lazy::new(|| {
    let config = AutocloseConfig::from_env().unwrap_or_else(|e| {
        warn!(target: "pathfd::files", code = e.code(), "ignoring autoclose settings: {}", e);
        AutocloseConfig::default()
    });
    DescriptorCache::from_config(&config, Arc::new(SystemClock)).unwrap_or_else(|e| {
        warn!(target: "pathfd::files", code = e.code(), "autoclose disabled: {}", e);
        DescriptorCache::new()
    })
});

/// The process-wide file cache.
///
/// Built on first use from [`AutocloseConfig::from_env`]. Code that can hold its own
/// [`FileCache`] should prefer that; this exists for call sites with nowhere to keep one.
pub fn global() -> &'static FileCache { &FILES }

#[cfg(test)]
#[path = "files_tests.rs"]
mod files_tests;
