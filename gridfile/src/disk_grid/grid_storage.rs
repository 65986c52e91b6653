//! File and mapping primitives for the grid artifacts.
//!
//! A grid is four files sharing a base name: `<name>` (header),
//! `<name>scale`, `<name>directory` and `<name>buckets`. Every file is sized
//! once at creation and never grows. All integer words are little-endian.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use memmap2::{MmapMut, MmapOptions};

use super::grid_constants::{BUCKETS_SUFFIX, DIRECTORY_SUFFIX, SCALE_SUFFIX, WORD_SIZE};
use super::grid_types::{GridError, GridHeader, GridResult};

/// Paths of the four artifacts of one grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridPaths {
    pub header: PathBuf,
    pub scale: PathBuf,
    pub directory: PathBuf,
    pub buckets: PathBuf,
}

impl GridPaths {
    pub fn new(base_dir: &Path, name: &str) -> Self {
        Self {
            header: base_dir.join(name),
            scale: base_dir.join(format!("{}{}", name, SCALE_SUFFIX)),
            directory: base_dir.join(format!("{}{}", name, DIRECTORY_SUFFIX)),
            buckets: base_dir.join(format!("{}{}", name, BUCKETS_SUFFIX)),
        }
    }

    pub fn all(&self) -> [&Path; 4] {
        [&self.header, &self.scale, &self.directory, &self.buckets]
    }
}

/// Create (or truncate) a file with its final size. Owner read/write only.
pub fn create_file(path: &Path, size: u64) -> GridResult<File> {
    let mut options = OpenOptions::new();
    options.read(true).write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let file = options.open(path)?;
    file.set_len(size)?;
    Ok(file)
}

/// Open an existing artifact for read/write, checking its size
pub fn open_file(path: &Path, expected_size: u64) -> GridResult<File> {
    let file = OpenOptions::new().read(true).write(true).open(path)?;
    let actual = file.metadata()?.len();
    if actual != expected_size {
        return Err(GridError::Corrupted(format!(
            "{} is {} bytes, expected {}",
            path.display(),
            actual,
            expected_size
        )));
    }
    Ok(file)
}

/// Map `len` bytes of `file` starting at `offset` for read/write
pub fn map_region(file: &File, offset: u64, len: usize) -> GridResult<MmapMut> {
    // SAFETY: the grid files are private to a single owner (see module docs);
    // nothing truncates them while a map is alive.
    let map = unsafe { MmapOptions::new().offset(offset).len(len).map_mut(file)? };
    Ok(map)
}

/// Write the header artifact
pub fn write_header(path: &Path, header: &GridHeader) -> GridResult<()> {
    let bytes = bincode::serde::encode_to_vec(header, bincode::config::legacy())
        .map_err(|e| GridError::Serialization(e.to_string()))?;

    let mut file = create_file(path, 0)?;
    file.write_all(&bytes)?;
    file.sync_all()?;
    Ok(())
}

/// Read and validate the header artifact
pub fn read_header(path: &Path) -> GridResult<GridHeader> {
    let mut buffer = Vec::new();
    File::open(path)?.read_to_end(&mut buffer)?;
    let header: GridHeader = bincode::serde::decode_from_slice(&buffer, bincode::config::legacy())
        .map(|(header, _)| header)
        .map_err(|e| GridError::Serialization(e.to_string()))?;
    header.validate()?;
    Ok(header)
}

/// Read the word at byte offset `offset`
#[inline]
pub fn read_word(buf: &[u8], offset: usize) -> i64 {
    let mut word = [0u8; WORD_SIZE];
    word.copy_from_slice(&buf[offset..offset + WORD_SIZE]);
    i64::from_le_bytes(word)
}

/// Write the word at byte offset `offset`
#[inline]
pub fn write_word(buf: &mut [u8], offset: usize, value: i64) {
    buf[offset..offset + WORD_SIZE].copy_from_slice(&value.to_le_bytes());
}
