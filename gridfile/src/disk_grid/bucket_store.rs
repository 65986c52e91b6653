//! Fixed-size bucket pages.
//!
//! The bucket file holds `N x N` pages of `page_size` bytes, allocated once.
//! Page layout:
//! ```text
//! +------------+--------------+------------------------------------------+
//! | used bytes | record count | records: x | y | rsize | payload ...      |
//! +------------+--------------+------------------------------------------+
//!    8 bytes      8 bytes        24 + rsize bytes each, insertion order
//! ```
//! Pages are mapped per access through [`BucketPage`], which unmaps on drop.

use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use memmap2::MmapMut;

use super::grid_constants::{PAGE_HEADER_SIZE, RECORD_HEADER_SIZE, WORD_SIZE};
use super::grid_storage::{create_file, map_region, open_file, read_word, write_word};
use super::grid_types::{BucketAddr, GridError, GridRecord, GridResult};

pub struct BucketStore {
    file: File,
    page_size: u64,
    page_count: u64,
    maps: AtomicU64,
}

impl BucketStore {
    pub fn size_for(n: u64, page_size: u64) -> u64 {
        n * n * page_size
    }

    /// Create the bucket file with all `n * n` pages zeroed
    pub fn create(path: &Path, n: u64, page_size: u64) -> GridResult<Self> {
        let file = create_file(path, Self::size_for(n, page_size))?;
        Ok(Self::with_file(file, n, page_size))
    }

    pub fn open(path: &Path, n: u64, page_size: u64) -> GridResult<Self> {
        let file = open_file(path, Self::size_for(n, page_size))?;
        Ok(Self::with_file(file, n, page_size))
    }

    fn with_file(file: File, n: u64, page_size: u64) -> Self {
        Self {
            file,
            page_size,
            page_count: n * n,
            maps: AtomicU64::new(0),
        }
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn page_count(&self) -> u64 {
        self.page_count
    }

    /// Number of page maps taken this session
    pub fn map_count(&self) -> u64 {
        self.maps.load(Ordering::Relaxed)
    }

    /// Map the page at `addr`
    pub fn map_bucket(&self, addr: BucketAddr) -> GridResult<BucketPage> {
        if addr >= self.page_count {
            return Err(GridError::InvalidArgument(format!(
                "bucket {} beyond page count {}",
                addr, self.page_count
            )));
        }
        let map = map_region(&self.file, addr * self.page_size, self.page_size as usize)?;
        self.maps.fetch_add(1, Ordering::Relaxed);
        Ok(BucketPage { addr, map })
    }

    /// Copy of the raw page at `addr`, header included
    pub fn snapshot_page(&self, addr: BucketAddr) -> GridResult<Vec<u8>> {
        let page = self.map_bucket(addr)?;
        Ok(page.map.to_vec())
    }

    /// Overwrite the page at `addr` with bytes taken by
    /// [`BucketStore::snapshot_page`]
    pub fn restore_page(&self, addr: BucketAddr, bytes: &[u8]) -> GridResult<()> {
        let mut page = self.map_bucket(addr)?;
        if bytes.len() != page.map.len() {
            return Err(GridError::Corrupted(format!(
                "page snapshot is {} bytes, expected {}",
                bytes.len(),
                page.map.len()
            )));
        }
        page.map.copy_from_slice(bytes);
        Ok(())
    }

    pub fn sync(&self) -> GridResult<()> {
        self.file.sync_all()?;
        Ok(())
    }
}

/// A record viewed in place inside a mapped page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketRecord<'a> {
    pub x: i64,
    pub y: i64,
    pub payload: &'a [u8],
}

impl BucketRecord<'_> {
    pub fn encoded_len(&self) -> u64 {
        (RECORD_HEADER_SIZE + self.payload.len()) as u64
    }

    pub fn to_record(&self) -> GridRecord {
        GridRecord::new(self.x, self.y, self.payload)
    }
}

/// One mapped bucket page. Changes are visible in the file once written;
/// the map is released when the page is dropped.
pub struct BucketPage {
    addr: BucketAddr,
    map: MmapMut,
}

impl BucketPage {
    /// Bytes used by records, excluding the page header
    pub fn used_bytes(&self) -> u64 {
        read_word(&self.map, 0) as u64
    }

    pub fn record_count(&self) -> u64 {
        read_word(&self.map, WORD_SIZE) as u64
    }

    /// Free bytes left in the page
    pub fn capacity(&self) -> u64 {
        (self.map.len() as u64)
            .saturating_sub(PAGE_HEADER_SIZE as u64)
            .saturating_sub(self.used_bytes())
    }

    /// Append a record after the last one. The caller checks `capacity()`
    /// first; the page is not grown or bounds-checked here.
    pub fn append_record(&mut self, x: i64, y: i64, payload: &[u8]) {
        let size = RECORD_HEADER_SIZE + payload.len();
        debug_assert!(size as u64 <= self.capacity());

        let used = self.used_bytes() as usize;
        let offset = PAGE_HEADER_SIZE + used;
        write_word(&mut self.map, offset, x);
        write_word(&mut self.map, offset + WORD_SIZE, y);
        write_word(&mut self.map, offset + 2 * WORD_SIZE, payload.len() as i64);
        let start = offset + RECORD_HEADER_SIZE;
        self.map[start..start + payload.len()].copy_from_slice(payload);

        let count = self.record_count();
        self.set_header(used as u64 + size as u64, count + 1);
    }

    /// Byte offset of record `index`, found by walking from the header
    pub fn entry_at(&self, index: u64) -> GridResult<usize> {
        let count = self.record_count();
        if index >= count {
            return Err(GridError::InvalidArgument(format!(
                "entry {} beyond {} records in bucket {}",
                index, count, self.addr
            )));
        }
        let mut offset = PAGE_HEADER_SIZE;
        for _ in 0..index {
            offset += self.record_size(offset)?;
        }
        Ok(offset)
    }

    /// View the record starting at byte `offset`
    pub fn record_at(&self, offset: usize) -> GridResult<BucketRecord<'_>> {
        let size = self.record_size(offset)?;
        let start = offset + RECORD_HEADER_SIZE;
        Ok(BucketRecord {
            x: read_word(&self.map, offset),
            y: read_word(&self.map, offset + WORD_SIZE),
            payload: &self.map[start..offset + size],
        })
    }

    /// All records in page order
    pub fn records(&self) -> GridResult<Vec<BucketRecord<'_>>> {
        let count = self.record_count();
        let mut records = Vec::with_capacity(count as usize);
        let mut offset = PAGE_HEADER_SIZE;
        for _ in 0..count {
            let record = self.record_at(offset)?;
            offset += record.encoded_len() as usize;
            records.push(record);
        }
        Ok(records)
    }

    /// Index of the first record at `(x, y)`
    pub fn position_of(&self, x: i64, y: i64) -> GridResult<Option<u64>> {
        Ok(self
            .records()?
            .iter()
            .position(|r| r.x == x && r.y == y)
            .map(|i| i as u64))
    }

    /// Remove record `index`, compacting the records behind it.
    /// Returns the removed record's footprint.
    pub fn delete_entry(&mut self, index: u64) -> GridResult<u64> {
        let offset = self.entry_at(index)?;
        let size = self.record_size(offset)?;
        let used = self.used_bytes();
        let end = PAGE_HEADER_SIZE + used as usize;

        self.map.copy_within(offset + size..end, offset);
        self.map[end - size..end].fill(0);

        let count = self.record_count();
        self.set_header(used - size as u64, count - 1);
        Ok(size as u64)
    }

    /// Drop every record
    pub fn reset(&mut self) {
        let end = PAGE_HEADER_SIZE + self.used_bytes() as usize;
        let end = end.min(self.map.len());
        self.map[..end].fill(0);
    }

    pub fn flush(&self) -> GridResult<()> {
        self.map.flush()?;
        Ok(())
    }

    fn set_header(&mut self, used: u64, count: u64) {
        write_word(&mut self.map, 0, used as i64);
        write_word(&mut self.map, WORD_SIZE, count as i64);
    }

    /// Footprint of the record at `offset`, checked against the used area
    fn record_size(&self, offset: usize) -> GridResult<usize> {
        let end = PAGE_HEADER_SIZE as u64 + self.used_bytes();
        if offset as u64 + RECORD_HEADER_SIZE as u64 > end || end > self.map.len() as u64 {
            return Err(self.corrupted(offset));
        }
        let rsize = read_word(&self.map, offset + 2 * WORD_SIZE);
        if rsize < 0 {
            return Err(self.corrupted(offset));
        }
        let size = RECORD_HEADER_SIZE as u64 + rsize as u64;
        if offset as u64 + size > end {
            return Err(self.corrupted(offset));
        }
        Ok(size as usize)
    }

    fn corrupted(&self, offset: usize) -> GridError {
        GridError::Corrupted(format!(
            "bucket {} has a malformed record at offset {}",
            self.addr, offset
        ))
    }
}
