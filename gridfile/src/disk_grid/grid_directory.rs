//! Cell directory: one bucket-address counter followed by `N x N` entries.
//!
//! Entry `(lon, lat)` lives at `8 + (lon * N + lat) * 40`. Only cells inside
//! the live range `0..=count` of each axis may be addressed.

use memmap2::MmapMut;

use super::grid_constants::{DIRECTORY_HEADER_SIZE, ENTRY_SIZE};
use super::grid_storage::{read_word, write_word};
use super::grid_types::{BucketAddr, Cell, DirectoryEntry, GridError, GridResult};

pub struct GridDirectory {
    map: MmapMut,
    capacity: u64,
}

impl GridDirectory {
    /// Bytes needed for a directory of capacity `n`
    pub fn size_for(n: u64) -> u64 {
        n * n * ENTRY_SIZE as u64 + DIRECTORY_HEADER_SIZE as u64
    }

    /// Format a freshly created directory. Cell (0, 0) owns page 0,
    /// so the counter starts past it.
    pub fn initialize(mut map: MmapMut, capacity: u64) -> GridResult<Self> {
        check_len(&map, capacity)?;
        write_word(&mut map, 0, 1);
        Ok(Self { map, capacity })
    }

    pub fn open(map: MmapMut, capacity: u64) -> GridResult<Self> {
        check_len(&map, capacity)?;
        let directory = Self { map, capacity };
        let next = directory.next_bucket_address();
        if next < 1 || next > capacity * capacity {
            return Err(GridError::Corrupted(format!(
                "bucket counter {} outside 1..={}",
                next,
                capacity * capacity
            )));
        }
        Ok(directory)
    }

    /// Next unused bucket address
    pub fn next_bucket_address(&self) -> BucketAddr {
        read_word(&self.map, 0) as u64
    }

    /// Hand out the next bucket address. Pages never grow, so the
    /// counter stops at `N * N`.
    pub fn allocate_bucket_address(&mut self) -> GridResult<BucketAddr> {
        let next = self.next_bucket_address();
        if next >= self.capacity * self.capacity {
            return Err(GridError::CapacityExceeded(format!(
                "all {} bucket pages are allocated",
                self.capacity * self.capacity
            )));
        }
        write_word(&mut self.map, 0, (next + 1) as i64);
        Ok(next)
    }

    /// Whether another bucket can still be allocated
    pub fn has_free_bucket(&self) -> bool {
        self.next_bucket_address() < self.capacity * self.capacity
    }

    /// Byte offset of `cell`, bounded by the highest live cell `last`
    pub fn entry_offset(&self, cell: Cell, last: Cell) -> GridResult<usize> {
        if cell.lon > last.lon || cell.lat > last.lat {
            return Err(GridError::InvalidArgument(format!(
                "cell {} outside live range {}",
                cell, last
            )));
        }
        Ok(self.raw_offset(cell))
    }

    pub fn read_entry(&self, cell: Cell, last: Cell) -> GridResult<DirectoryEntry> {
        let offset = self.entry_offset(cell, last)?;
        Ok(DirectoryEntry::from_bytes(
            &self.map[offset..offset + ENTRY_SIZE],
        ))
    }

    pub fn write_entry(
        &mut self,
        cell: Cell,
        last: Cell,
        entry: &DirectoryEntry,
    ) -> GridResult<()> {
        let offset = self.entry_offset(cell, last)?;
        self.map[offset..offset + ENTRY_SIZE].copy_from_slice(&entry.to_bytes());
        Ok(())
    }

    /// Copy the entry at `from` over the one at `to`. Both cells must lie
    /// within the capacity; grid splits use this while the scale already
    /// counts the new partition.
    pub fn copy_entry(&mut self, from: Cell, to: Cell) -> GridResult<()> {
        let limit = Cell::new(self.capacity - 1, self.capacity - 1);
        let src = self.entry_offset(from, limit)?;
        let dst = self.entry_offset(to, limit)?;
        self.map.copy_within(src..src + ENTRY_SIZE, dst);
        Ok(())
    }

    pub fn flush(&self) -> GridResult<()> {
        self.map.flush()?;
        Ok(())
    }

    /// Copy of the counter and every entry
    pub fn snapshot(&self) -> Vec<u8> {
        self.map.to_vec()
    }

    pub fn restore(&mut self, bytes: &[u8]) -> GridResult<()> {
        if bytes.len() != self.map.len() {
            return Err(GridError::Corrupted(format!(
                "directory snapshot is {} bytes, expected {}",
                bytes.len(),
                self.map.len()
            )));
        }
        self.map.copy_from_slice(bytes);
        Ok(())
    }

    fn raw_offset(&self, cell: Cell) -> usize {
        DIRECTORY_HEADER_SIZE + ((cell.lon * self.capacity + cell.lat) as usize) * ENTRY_SIZE
    }
}

fn check_len(map: &MmapMut, capacity: u64) -> GridResult<()> {
    if map.len() as u64 != GridDirectory::size_for(capacity) {
        return Err(GridError::Corrupted(format!(
            "directory is {} bytes, expected {} for N = {}",
            map.len(),
            GridDirectory::size_for(capacity),
            capacity
        )));
    }
    Ok(())
}
