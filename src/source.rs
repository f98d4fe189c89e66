//! Log byte sources.
//!
//! Every pipeline stage works on `&[u8]`. [`LogSource`] is how a log gets into
//! one: a read-only memory map for large files, or an owned buffer when the
//! bytes need to be rewritten (redaction) or came from somewhere else.

use std::fs::{self, File};
use std::io::Write;
use std::ops::Deref;
use std::path::Path;

use anyhow::{Context, Result};
use memmap2::{Mmap, MmapOptions};

pub enum LogSource {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl LogSource {
    /// Memory-map a log file. Empty files cannot be mapped and are returned
    /// as an empty owned buffer.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        let len = file
            .metadata()
            .with_context(|| format!("Failed to stat log file {}", path.display()))?
            .len();
        if len == 0 {
            return Ok(LogSource::Owned(Vec::new()));
        }
        // SAFETY: the map is read-only. A log still being appended to only
        // grows, and bytes past the mapped length are never touched.
        let mmap = unsafe { MmapOptions::new().map(&file) }
            .with_context(|| format!("Failed to map log file {}", path.display()))?;
        Ok(LogSource::Mapped(mmap))
    }

    /// Read a whole log file into memory.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read log file {}", path.display()))?;
        Ok(LogSource::Owned(bytes))
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        LogSource::Owned(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            LogSource::Mapped(mmap) => &mmap[..],
            LogSource::Owned(bytes) => bytes.as_slice(),
        }
    }

    /// Mutable access, only available for owned buffers.
    pub fn as_mut_bytes(&mut self) -> Option<&mut [u8]> {
        match self {
            LogSource::Mapped(_) => None,
            LogSource::Owned(bytes) => Some(bytes.as_mut_slice()),
        }
    }

    /// Copy a mapped source into memory so it can be modified.
    pub fn into_owned(self) -> Vec<u8> {
        match self {
            LogSource::Mapped(mmap) => mmap.to_vec(),
            LogSource::Owned(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self, LogSource::Mapped(_))
    }

    /// Write the current bytes to `path`, replacing any existing file.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut file =
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        file.write_all(self.as_bytes())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}

impl Deref for LogSource {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl AsRef<[u8]> for LogSource {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl std::fmt::Debug for LogSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = if self.is_mapped() { "Mapped" } else { "Owned" };
        write!(f, "LogSource::{kind}({} bytes)", self.len())
    }
}
