//! Constants for the disk-based grid file layout.

/// Every persisted integer is one 8-byte little-endian word
pub const WORD_SIZE: usize = 8;

/// Words per directory entry: nbytes, nrecords, sum_x, sum_y, bucket
pub const ENTRY_WORDS: usize = 5;

/// Bytes per directory entry
pub const ENTRY_SIZE: usize = ENTRY_WORDS * WORD_SIZE;

/// Leading counter in the directory file (next bucket address)
pub const DIRECTORY_HEADER_SIZE: usize = WORD_SIZE;

/// Bucket page header: used bytes + record count
pub const PAGE_HEADER_SIZE: usize = 2 * WORD_SIZE;

/// Per-record header inside a bucket page: x, y, payload size
pub const RECORD_HEADER_SIZE: usize = 3 * WORD_SIZE;

/// Default maximum partitions per axis
pub const DEFAULT_MAX_PARTITIONS: u64 = 64;

/// Default bucket page size (4KB)
pub const DEFAULT_PAGE_SIZE: u64 = 4096;

/// Magic number for the `<name>` header artifact
pub const MAGIC: u32 = 0x47524446; // "GRDF"

/// File format version
pub const VERSION: u32 = 1;

/// Artifact suffixes appended to the grid name
pub const SCALE_SUFFIX: &str = "scale";
pub const DIRECTORY_SUFFIX: &str = "directory";
pub const BUCKETS_SUFFIX: &str = "buckets";
