//! RoflFile - packed trees on disk.
//!
//! Writing goes through [`PackedTree::write_to_path`], which refuses to
//! replace an existing file. Reading maps the file read-only and hands out
//! [`DbReader`]s that borrow the mapping.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use tracing::debug;

use crate::common::{Error, Result};

use super::layout::MIN_FILE_LEN;
use super::reader::DbReader;
use super::writer::PackedTree;

impl PackedTree {
    /// Write the packed bytes to a new file at `path` and sync it.
    ///
    /// # Errors
    /// Returns an `Io` error if the file already exists or cannot be written.
    pub fn write_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        file.write_all(self.as_bytes())?;
        file.sync_all()?;

        debug!(path = %path.display(), bytes = self.len(), "wrote rofldb file");
        Ok(())
    }
}

/// A RoflDB file mapped into memory.
///
/// # Example
/// ```no_run
/// use rofldb::RoflFile;
///
/// let file = RoflFile::open("index.rofl")?;
/// let reader = file.reader()?;
/// if let Some(value) = reader.get("key042")? {
///     println!("{}", String::from_utf8_lossy(value));
/// }
/// # Ok::<(), rofldb::Error>(())
/// ```
#[derive(Debug)]
pub struct RoflFile {
    mmap: Mmap,
    path: PathBuf,
}

impl RoflFile {
    /// Map the file at `path` and check its header.
    ///
    /// # Errors
    /// Returns `Io` if the file cannot be opened or mapped, and `Corrupt` if
    /// it is not a well-formed RoflDB file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;

        let file_len = file.metadata()?.len();
        if file_len < MIN_FILE_LEN as u64 {
            return Err(Error::corrupt(format!(
                "{} is {} bytes, too short for a rofldb file",
                path.display(),
                file_len
            )));
        }

        // SAFETY: the mapping is read-only and every access is bounds-checked
        // against its length. Files are written once through create_new and
        // never modified afterwards.
        let mmap = unsafe { Mmap::map(&file)? };

        DbReader::new(&mmap)?;
        debug!(path = %path.display(), bytes = mmap.len(), "mapped rofldb file");

        Ok(Self {
            mmap,
            path: path.to_path_buf(),
        })
    }

    /// A reader over the mapping. Readers are cheap and independent.
    pub fn reader(&self) -> Result<DbReader<'_>> {
        DbReader::new(&self.mmap)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
