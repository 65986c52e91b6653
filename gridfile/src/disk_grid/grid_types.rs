//! Core types and data structures for the disk-based grid file.
//!
//! This module defines the fundamental types used throughout the grid:
//! - Error types and result types
//! - Cell addressing, axes and propagation directions
//! - Directory entries and bucket records
//! - Statistics and the persisted file header

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use thiserror::Error;

use super::grid_constants::{
    ENTRY_SIZE, MAGIC, PAGE_HEADER_SIZE, RECORD_HEADER_SIZE, VERSION, WORD_SIZE,
};
use super::grid_storage::{read_word, write_word};

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur in grid file operations
#[derive(Debug, Error)]
pub enum GridError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("Partition {0} already exists")]
    DuplicateValue(i64),

    #[error("No record at ({x}, {y})")]
    NotFound { x: i64, y: i64 },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Corrupted grid: {0}")]
    Corrupted(String),

    #[error("Grid is not loaded")]
    NotLoaded,
}

/// Result type for grid operations
pub type GridResult<T> = Result<T, GridError>;

/// Bucket address - index of a fixed-size page in the bucket file
pub type BucketAddr = u64;

// ============================================================================
// Addressing
// ============================================================================

/// One of the two partitioned axes.
///
/// `X` boundaries are vertical lines and index `lon`; `Y` boundaries are
/// horizontal lines and index `lat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    pub fn other(self) -> Axis {
        match self {
            Axis::X => Axis::Y,
            Axis::Y => Axis::X,
        }
    }

    /// Pick this axis' component of a coordinate pair
    pub fn coordinate(self, x: i64, y: i64) -> i64 {
        match self {
            Axis::X => x,
            Axis::Y => y,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::X => write!(f, "vertical"),
            Axis::Y => write!(f, "horizontal"),
        }
    }
}

/// Which neighbors a probe or propagation may visit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Only `lon - 1` / `lat - 1`
    Backward,
    /// Only `lon + 1` / `lat + 1`
    Forward,
    /// All four neighbors
    Both,
}

impl Direction {
    pub fn allows_backward(self) -> bool {
        matches!(self, Direction::Backward | Direction::Both)
    }

    pub fn allows_forward(self) -> bool {
        matches!(self, Direction::Forward | Direction::Both)
    }
}

/// A `(lon, lat)` cell index pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Cell {
    pub lon: u64,
    pub lat: u64,
}

impl Cell {
    pub fn new(lon: u64, lat: u64) -> Self {
        Self { lon, lat }
    }

    pub fn index(&self, axis: Axis) -> u64 {
        match axis {
            Axis::X => self.lon,
            Axis::Y => self.lat,
        }
    }

    /// The neighbor one step back along `axis`, if any
    pub fn backward(&self, axis: Axis) -> Option<Cell> {
        match axis {
            Axis::X => self.lon.checked_sub(1).map(|lon| Cell::new(lon, self.lat)),
            Axis::Y => self.lat.checked_sub(1).map(|lat| Cell::new(self.lon, lat)),
        }
    }

    /// The neighbor one step forward along `axis`, bounded by `last` inclusive
    pub fn forward(&self, axis: Axis, last: u64) -> Option<Cell> {
        match axis {
            Axis::X if self.lon < last => Some(Cell::new(self.lon + 1, self.lat)),
            Axis::Y if self.lat < last => Some(Cell::new(self.lon, self.lat + 1)),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.lon, self.lat)
    }
}

/// Outcome of a pairing probe around a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairProbe {
    /// Axis along which the paired neighbor differs
    pub axis: Axis,
    /// Whether the neighbor sits at the higher index
    pub forward: bool,
    pub neighbor: Cell,
}

// ============================================================================
// Directory Entry
// ============================================================================

/// Per-cell metadata. Aliased cells carry identical copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirectoryEntry {
    /// Σ(24 + rsize) over the bucket's live records
    pub nbytes: u64,
    pub nrecords: u64,
    pub sum_x: i64,
    pub sum_y: i64,
    pub bucket: BucketAddr,
}

impl DirectoryEntry {
    /// Free space left in the entry's bucket page
    pub fn capacity(&self, page_size: u64) -> u64 {
        page_size
            .saturating_sub(PAGE_HEADER_SIZE as u64)
            .saturating_sub(self.nbytes)
    }

    /// Coordinate sum along `axis`
    pub fn sum(&self, axis: Axis) -> i64 {
        match axis {
            Axis::X => self.sum_x,
            Axis::Y => self.sum_y,
        }
    }

    pub(crate) fn add_record(&mut self, x: i64, y: i64, rsize: u64) {
        self.nbytes += RECORD_HEADER_SIZE as u64 + rsize;
        self.nrecords += 1;
        self.sum_x = self.sum_x.wrapping_add(x);
        self.sum_y = self.sum_y.wrapping_add(y);
    }

    pub(crate) fn remove_record(&mut self, x: i64, y: i64, rsize: u64) {
        self.nbytes = self
            .nbytes
            .saturating_sub(RECORD_HEADER_SIZE as u64 + rsize);
        self.nrecords = self.nrecords.saturating_sub(1);
        self.sum_x = self.sum_x.wrapping_sub(x);
        self.sum_y = self.sum_y.wrapping_sub(y);
    }

    pub fn to_bytes(&self) -> [u8; ENTRY_SIZE] {
        let mut buf = [0u8; ENTRY_SIZE];
        write_word(&mut buf, 0, self.nbytes as i64);
        write_word(&mut buf, WORD_SIZE, self.nrecords as i64);
        write_word(&mut buf, 2 * WORD_SIZE, self.sum_x);
        write_word(&mut buf, 3 * WORD_SIZE, self.sum_y);
        write_word(&mut buf, 4 * WORD_SIZE, self.bucket as i64);
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Self {
        Self {
            nbytes: read_word(buf, 0) as u64,
            nrecords: read_word(buf, WORD_SIZE) as u64,
            sum_x: read_word(buf, 2 * WORD_SIZE),
            sum_y: read_word(buf, 3 * WORD_SIZE),
            bucket: read_word(buf, 4 * WORD_SIZE) as u64,
        }
    }
}

// ============================================================================
// Records
// ============================================================================

/// A record returned to the caller, payload copied out of its page
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridRecord {
    pub x: i64,
    pub y: i64,
    pub payload: Vec<u8>,
}

impl GridRecord {
    pub fn new(x: i64, y: i64, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            x,
            y,
            payload: payload.into(),
        }
    }

    /// On-page footprint of this record
    pub fn encoded_len(&self) -> u64 {
        (RECORD_HEADER_SIZE + self.payload.len()) as u64
    }
}

/// Records matched by a range query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeResult {
    pub records: Vec<GridRecord>,
    /// Σ(24 + rsize) over `records`
    pub total_bytes: u64,
}

impl RangeResult {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn push(&mut self, record: GridRecord) {
        self.total_bytes += record.encoded_len();
        self.records.push(record);
    }
}

/// Result of trying to place a record into a cell's bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placement {
    Stored,
    Full,
}

// ============================================================================
// Statistics
// ============================================================================

/// Statistics about the grid and the current session
#[derive(Debug, Clone, Default)]
pub struct GridStats {
    pub total_records: u64,
    pub distinct_buckets: u64,
    pub next_bucket_address: u64,
    pub x_partitions: u64,
    pub y_partitions: u64,
    pub grid_splits: u64,
    pub bucket_splits: u64,
    pub bucket_maps: u64,
}

// ============================================================================
// File Header
// ============================================================================

/// Header stored in the `<name>` artifact, records the creation parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GridHeader {
    pub magic: u32,
    pub version: u32,
    pub max_partitions: u64,
    pub page_size: u64,
}

impl GridHeader {
    pub fn new(max_partitions: u64, page_size: u64) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            max_partitions,
            page_size,
        }
    }

    pub fn validate(&self) -> GridResult<()> {
        if self.magic != MAGIC {
            return Err(GridError::Corrupted(
                "Invalid file format (bad magic)".into(),
            ));
        }
        if self.version != VERSION {
            return Err(GridError::Corrupted(format!(
                "Unsupported file format version {}",
                self.version
            )));
        }
        Ok(())
    }
}
