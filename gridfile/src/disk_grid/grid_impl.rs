//! DiskGridFile implementation.

use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::io;
use std::path::Path;
use std::sync::Arc;

use crate::config::GridConfig;
use crate::grid_index::GridIndex;
use crate::grid_rect::GridRect;

use super::bucket_store::BucketStore;
use super::grid_constants::{PAGE_HEADER_SIZE, RECORD_HEADER_SIZE};
use super::grid_directory::GridDirectory;
use super::grid_scale::GridScale;
use super::grid_storage::{create_file, map_region, open_file, read_header, write_header, GridPaths};
use super::grid_types::{
    Axis, BucketAddr, Cell, DirectoryEntry, Direction, GridError, GridHeader, GridResult,
    GridStats, Placement, RangeResult,
};
use super::persistence::IntegrityReport;

/// A grid file stored in four artifacts under one base name.
///
/// Data operations require the grid to be loaded: [`DiskGridFile::create`]
/// returns a loaded grid, [`DiskGridFile::open`] an unloaded one.
pub struct DiskGridFile {
    inner: Arc<DiskGridInner>,
}

struct DiskGridInner {
    config: GridConfig,
    paths: GridPaths,
    loaded: RwLock<Option<LoadedGrid>>,
}

/// The long-lived mappings of a loaded grid plus session counters
pub(crate) struct LoadedGrid {
    pub(crate) scale: GridScale,
    pub(crate) directory: GridDirectory,
    pub(crate) buckets: BucketStore,
    pub(crate) page_size: u64,
    pub(crate) grid_splits: u64,
    pub(crate) bucket_splits: u64,
}

impl DiskGridFile {
    /// Create a new, empty grid and load it.
    ///
    /// Existing artifacts with the same name are truncated.
    pub fn create(config: GridConfig) -> GridResult<Self> {
        config.validate()?;
        std::fs::create_dir_all(config.base_dir())?;

        let paths = config.paths();
        let header = GridHeader::new(config.max_partitions(), config.page_size());
        write_header(&paths.header, &header)?;
        let grid = LoadedGrid::create(&paths, config.max_partitions(), config.page_size())?;

        log::info!(
            "Created grid '{}' in {} (N = {}, page size {})",
            config.name(),
            config.base_dir().display(),
            config.max_partitions(),
            config.page_size()
        );

        Ok(Self {
            inner: Arc::new(DiskGridInner {
                config,
                paths,
                loaded: RwLock::new(Some(grid)),
            }),
        })
    }

    /// Open an existing grid without mapping it.
    ///
    /// Only the header is read; call [`DiskGridFile::load`] before use.
    pub fn open(base_dir: impl AsRef<Path>, name: &str) -> GridResult<Self> {
        let paths = GridPaths::new(base_dir.as_ref(), name);
        let header = read_header(&paths.header)?;
        if let Some(missing) = paths.all().iter().find(|p| !p.exists()) {
            return Err(GridError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("grid artifact {} is missing", missing.display()),
            )));
        }

        let config = GridConfig::new(name)
            .with_max_partitions(header.max_partitions)
            .with_page_size(header.page_size)
            .with_base_dir(base_dir);
        config.validate()?;

        Ok(Self {
            inner: Arc::new(DiskGridInner {
                config,
                paths,
                loaded: RwLock::new(None),
            }),
        })
    }

    pub fn config(&self) -> &GridConfig {
        &self.inner.config
    }

    /// Map the scale and directory for the session. Loading a loaded grid
    /// is a no-op.
    pub fn load(&self) -> GridResult<()> {
        let mut loaded = self.inner.loaded.write();
        if loaded.is_some() {
            return Ok(());
        }
        let config = &self.inner.config;
        let grid = LoadedGrid::open(&self.inner.paths, config.max_partitions(), config.page_size())?;
        log::debug!(
            "Loaded grid '{}' ({} x {} partitions)",
            config.name(),
            grid.scale.count(Axis::X),
            grid.scale.count(Axis::Y)
        );
        *loaded = Some(grid);
        Ok(())
    }

    /// Flush and release the session mappings
    pub fn unload(&self) -> GridResult<()> {
        let grid = self.inner.loaded.write().take();
        if let Some(grid) = grid {
            grid.flush()?;
            log::debug!("Unloaded grid '{}'", self.inner.config.name());
        }
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.loaded.read().is_some()
    }

    /// Write mapped changes back to the files
    pub fn flush(&self) -> GridResult<()> {
        self.read_loaded(|grid| grid.flush())
    }

    /// Live partition boundaries of `axis`, ascending
    pub fn partitions(&self, axis: Axis) -> GridResult<Vec<i64>> {
        self.read_loaded(|grid| Ok(grid.scale.boundaries(axis)))
    }

    /// Directory entry of cell `(lon, lat)`
    pub fn entry(&self, lon: u64, lat: u64) -> GridResult<DirectoryEntry> {
        self.read_loaded(|grid| grid.entry(Cell::new(lon, lat)))
    }

    /// The cell `(x, y)` currently falls in
    pub fn locate(&self, x: i64, y: i64) -> GridResult<Cell> {
        self.read_loaded(|grid| Ok(grid.scale.locate(x, y)))
    }

    pub fn stats(&self) -> GridResult<GridStats> {
        self.read_loaded(|grid| grid.stats())
    }

    /// Verify the persisted structure against itself
    pub fn check_integrity(&self) -> GridResult<IntegrityReport> {
        self.read_loaded(|grid| grid.check_integrity())
    }

    fn read_loaded<R>(&self, f: impl FnOnce(&LoadedGrid) -> GridResult<R>) -> GridResult<R> {
        let loaded = self.inner.loaded.read();
        let grid = loaded.as_ref().ok_or(GridError::NotLoaded)?;
        f(grid)
    }

    fn write_loaded<R>(&self, f: impl FnOnce(&mut LoadedGrid) -> GridResult<R>) -> GridResult<R> {
        let mut loaded = self.inner.loaded.write();
        let grid = loaded.as_mut().ok_or(GridError::NotLoaded)?;
        f(grid)
    }

    #[cfg(test)]
    pub(crate) fn with_loaded<R>(&self, f: impl FnOnce(&mut LoadedGrid) -> GridResult<R>) -> GridResult<R> {
        self.write_loaded(f)
    }
}

impl Drop for DiskGridInner {
    fn drop(&mut self) {
        if let Some(grid) = self.loaded.get_mut().as_ref() {
            if let Err(e) = grid.flush() {
                log::warn!("Failed to flush grid '{}' on drop: {}", self.config.name(), e);
            }
        }
    }
}

// ============================================================================
// GridIndex Implementation
// ============================================================================

impl GridIndex for DiskGridFile {
    fn insert(&self, x: i64, y: i64, payload: &[u8]) -> GridResult<()> {
        self.write_loaded(|grid| grid.insert(x, y, payload))
    }

    fn find(&self, x: i64, y: i64) -> GridResult<Vec<u8>> {
        self.read_loaded(|grid| grid.find(x, y))
    }

    fn delete(&self, x: i64, y: i64) -> GridResult<()> {
        self.write_loaded(|grid| grid.delete(x, y))
    }

    fn range_query(&self, rect: &GridRect) -> GridResult<RangeResult> {
        self.read_loaded(|grid| grid.range_query(rect))
    }

    fn size(&self) -> GridResult<u64> {
        self.read_loaded(|grid| Ok(grid.stats()?.total_records))
    }
}

// ============================================================================
// Loaded grid
// ============================================================================

impl LoadedGrid {
    fn create(paths: &GridPaths, n: u64, page_size: u64) -> GridResult<Self> {
        let scale_size = GridScale::size_for(n);
        let scale_file = create_file(&paths.scale, scale_size)?;
        let scale = GridScale::initialize(map_region(&scale_file, 0, scale_size as usize)?, n)?;

        let directory_size = GridDirectory::size_for(n);
        let directory_file = create_file(&paths.directory, directory_size)?;
        let directory =
            GridDirectory::initialize(map_region(&directory_file, 0, directory_size as usize)?, n)?;

        let buckets = BucketStore::create(&paths.buckets, n, page_size)?;
        Ok(Self::new(scale, directory, buckets, page_size))
    }

    fn open(paths: &GridPaths, n: u64, page_size: u64) -> GridResult<Self> {
        let scale_size = GridScale::size_for(n);
        let scale_file = open_file(&paths.scale, scale_size)?;
        let scale = GridScale::open(map_region(&scale_file, 0, scale_size as usize)?)?;
        if scale.capacity() != n {
            return Err(GridError::Corrupted(format!(
                "scale capacity {} does not match header N = {}",
                scale.capacity(),
                n
            )));
        }

        let directory_size = GridDirectory::size_for(n);
        let directory_file = open_file(&paths.directory, directory_size)?;
        let directory =
            GridDirectory::open(map_region(&directory_file, 0, directory_size as usize)?, n)?;

        let buckets = BucketStore::open(&paths.buckets, n, page_size)?;
        Ok(Self::new(scale, directory, buckets, page_size))
    }

    fn new(scale: GridScale, directory: GridDirectory, buckets: BucketStore, page_size: u64) -> Self {
        Self {
            scale,
            directory,
            buckets,
            page_size,
            grid_splits: 0,
            bucket_splits: 0,
        }
    }

    pub(crate) fn last_cell(&self) -> Cell {
        self.scale.last_cell()
    }

    pub(crate) fn entry(&self, cell: Cell) -> GridResult<DirectoryEntry> {
        self.directory.read_entry(cell, self.last_cell())
    }

    pub(crate) fn set_entry(&mut self, cell: Cell, entry: &DirectoryEntry) -> GridResult<()> {
        let last = self.last_cell();
        self.directory.write_entry(cell, last, entry)
    }

    fn flush(&self) -> GridResult<()> {
        self.scale.flush()?;
        self.directory.flush()?;
        self.buckets.sync()
    }

    /// Distinct buckets referenced by the live directory, with their entries
    fn live_buckets(&self) -> GridResult<Vec<DirectoryEntry>> {
        let last = self.last_cell();
        let mut seen = BTreeSet::new();
        let mut entries = Vec::new();
        for lon in 0..=last.lon {
            for lat in 0..=last.lat {
                let entry = self.entry(Cell::new(lon, lat))?;
                if seen.insert(entry.bucket) {
                    entries.push(entry);
                }
            }
        }
        Ok(entries)
    }

    fn stats(&self) -> GridResult<GridStats> {
        let buckets = self.live_buckets()?;
        Ok(GridStats {
            total_records: buckets.iter().map(|e| e.nrecords).sum(),
            distinct_buckets: buckets.len() as u64,
            next_bucket_address: self.directory.next_bucket_address(),
            x_partitions: self.scale.count(Axis::X),
            y_partitions: self.scale.count(Axis::Y),
            grid_splits: self.grid_splits,
            bucket_splits: self.bucket_splits,
            bucket_maps: self.buckets.map_count(),
        })
    }

    pub(crate) fn insert(&mut self, x: i64, y: i64, payload: &[u8]) -> GridResult<()> {
        let size = (RECORD_HEADER_SIZE + payload.len()) as u64;
        let room = self.page_size - PAGE_HEADER_SIZE as u64;
        if size > room {
            return Err(GridError::InvalidArgument(format!(
                "record of {} bytes exceeds page capacity {}",
                size, room
            )));
        }

        // taken before the first split so a failed insert can be undone
        let mut journal: Option<InsertJournal> = None;
        loop {
            let cell = self.scale.locate(x, y);
            let step = match self.try_store(cell, x, y, payload) {
                Ok(Placement::Stored) => return Ok(()),
                Ok(Placement::Full) => {
                    let journal = journal.get_or_insert_with(|| InsertJournal::begin(self));
                    self.make_room(cell, x, y, journal)
                }
                Err(e) => Err(e),
            };

            if let Err(e) = step {
                if let Some(journal) = journal.take() {
                    journal.rollback(self)?;
                }
                return Err(e);
            }
        }
    }

    /// Append to the cell's bucket if it has room, then broadcast the new
    /// aggregates to aliased cells
    fn try_store(&mut self, cell: Cell, x: i64, y: i64, payload: &[u8]) -> GridResult<Placement> {
        let mut entry = self.entry(cell)?;
        if (RECORD_HEADER_SIZE + payload.len()) as u64 > entry.capacity(self.page_size) {
            return Ok(Placement::Full);
        }

        let mut page = self.buckets.map_bucket(entry.bucket)?;
        page.append_record(x, y, payload);
        drop(page);

        entry.add_record(x, y, payload.len() as u64);
        self.set_entry(cell, &entry)?;
        self.update_paired_buckets(Direction::Both, None, cell, entry.bucket)?;
        Ok(Placement::Stored)
    }

    /// Free space for the full `cell`: separate it from a paired neighbor,
    /// or else cut the grid through it
    fn make_room(
        &mut self,
        cell: Cell,
        x: i64,
        y: i64,
        journal: &mut InsertJournal,
    ) -> GridResult<()> {
        if !self.directory.has_free_bucket() {
            log::warn!("Cell {} is full and every bucket page is allocated", cell);
            return Err(GridError::CapacityExceeded(format!(
                "cell {} is full and every bucket page is allocated",
                cell
            )));
        }

        if let Some(probe) = self.has_paired(Direction::Both, cell)? {
            let (src, dst) = if probe.forward {
                (cell, probe.neighbor)
            } else {
                (probe.neighbor, cell)
            };
            journal.save_page(&self.buckets, self.entry(src)?.bucket)?;
            journal.save_page(&self.buckets, self.directory.next_bucket_address())?;
            self.split_bucket(probe.axis, src, dst)?;
            return Ok(());
        }

        let preferred = if self.scale.count(Axis::Y) < self.scale.count(Axis::X) {
            Axis::Y
        } else {
            Axis::X
        };
        for axis in [preferred, preferred.other()] {
            match self.split_grid(axis, cell, x, y) {
                Ok(_) => return Ok(()),
                Err(GridError::CapacityExceeded(_)) | Err(GridError::DuplicateValue(_)) => {
                    log::trace!("Cell {} cannot be split on the {} axis", cell, axis);
                }
                Err(e) => return Err(e),
            }
        }

        log::warn!("Cell {} is full and neither axis can be split", cell);
        Err(GridError::CapacityExceeded(format!(
            "cell {} is full and neither axis can be split",
            cell
        )))
    }

    pub(crate) fn find(&self, x: i64, y: i64) -> GridResult<Vec<u8>> {
        let entry = self.entry(self.scale.locate(x, y))?;
        let page = self.buckets.map_bucket(entry.bucket)?;
        let records = page.records()?;
        records
            .iter()
            .find(|r| r.x == x && r.y == y)
            .map(|r| r.payload.to_vec())
            .ok_or(GridError::NotFound { x, y })
    }

    pub(crate) fn delete(&mut self, x: i64, y: i64) -> GridResult<()> {
        let cell = self.scale.locate(x, y);
        let mut entry = self.entry(cell)?;

        let mut page = self.buckets.map_bucket(entry.bucket)?;
        let index = page
            .position_of(x, y)?
            .ok_or(GridError::NotFound { x, y })?;
        let removed = page.delete_entry(index)?;
        drop(page);

        entry.remove_record(x, y, removed - RECORD_HEADER_SIZE as u64);
        self.set_entry(cell, &entry)?;
        self.update_paired_buckets(Direction::Both, None, cell, entry.bucket)
    }

    pub(crate) fn range_query(&self, rect: &GridRect) -> GridResult<RangeResult> {
        if !rect.is_valid() {
            return Err(GridError::InvalidArgument(format!("{} is inverted", rect)));
        }
        let low = self.scale.locate(rect.min_x, rect.min_y);
        let high = self.scale.locate(rect.max_x, rect.max_y);

        let mut result = RangeResult::default();
        for lon in low.lon..=high.lon {
            for lat in low.lat..=high.lat {
                let cell = Cell::new(lon, lat);
                if !self.is_canonical_in(cell, low)? {
                    continue;
                }
                let entry = self.entry(cell)?;
                if entry.nrecords == 0 {
                    continue;
                }
                let page = self.buckets.map_bucket(entry.bucket)?;
                let records = page.records()?;
                for record in records {
                    if rect.contains_point(record.x, record.y) {
                        result.push(record.to_record());
                    }
                }
            }
        }
        Ok(result)
    }
}

/// State an insert may change while making room, saved so that a failed
/// insert leaves the grid as it found it
struct InsertJournal {
    scale: Vec<u8>,
    directory: Vec<u8>,
    pages: Vec<(BucketAddr, Vec<u8>)>,
    grid_splits: u64,
    bucket_splits: u64,
}

impl InsertJournal {
    fn begin(grid: &LoadedGrid) -> Self {
        Self {
            scale: grid.scale.snapshot(),
            directory: grid.directory.snapshot(),
            pages: Vec::new(),
            grid_splits: grid.grid_splits,
            bucket_splits: grid.bucket_splits,
        }
    }

    /// Save page `addr` unless an earlier split already saved it
    fn save_page(&mut self, buckets: &BucketStore, addr: BucketAddr) -> GridResult<()> {
        if self.pages.iter().any(|(saved, _)| *saved == addr) {
            return Ok(());
        }
        self.pages.push((addr, buckets.snapshot_page(addr)?));
        Ok(())
    }

    fn rollback(self, grid: &mut LoadedGrid) -> GridResult<()> {
        for (addr, bytes) in &self.pages {
            grid.buckets.restore_page(*addr, bytes)?;
        }
        grid.directory.restore(&self.directory)?;
        grid.scale.restore(&self.scale)?;
        grid.grid_splits = self.grid_splits;
        grid.bucket_splits = self.bucket_splits;
        log::debug!(
            "Rolled back failed insert ({} bucket pages restored)",
            self.pages.len()
        );
        Ok(())
    }
}
