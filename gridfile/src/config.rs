//! Creation-time configuration of a grid file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::disk_grid::grid_constants::{
    DEFAULT_MAX_PARTITIONS, DEFAULT_PAGE_SIZE, DIRECTORY_HEADER_SIZE, ENTRY_SIZE,
    PAGE_HEADER_SIZE, RECORD_HEADER_SIZE,
};
use crate::disk_grid::grid_storage::GridPaths;
use crate::disk_grid::grid_types::{GridError, GridResult};

/// Parameters fixed when a grid is created.
///
/// # Examples
///
/// ```rust,ignore
/// use gridfile::GridConfig;
///
/// let config = GridConfig::new("cities")
///     .with_max_partitions(16)
///     .with_page_size(1024)
///     .with_base_dir("/var/lib/cities");
/// assert_eq!(config.max_partitions(), 16);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridConfig {
    name: String,
    max_partitions: u64,
    page_size: u64,
    base_dir: PathBuf,
}

impl GridConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_partitions: DEFAULT_MAX_PARTITIONS,
            page_size: DEFAULT_PAGE_SIZE,
            base_dir: PathBuf::from("."),
        }
    }

    /// Cap on cells per axis (N)
    pub fn with_max_partitions(mut self, max_partitions: u64) -> Self {
        self.max_partitions = max_partitions;
        self
    }

    /// Bytes per bucket page
    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    /// Directory that holds the grid artifacts
    pub fn with_base_dir(mut self, base_dir: impl AsRef<Path>) -> Self {
        self.base_dir = base_dir.as_ref().to_path_buf();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_partitions(&self) -> u64 {
        self.max_partitions
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn paths(&self) -> GridPaths {
        GridPaths::new(&self.base_dir, &self.name)
    }

    pub fn validate(&self) -> GridResult<()> {
        if self.name.is_empty() {
            return Err(GridError::InvalidArgument("grid name is empty".into()));
        }
        if self.max_partitions < 1 {
            return Err(GridError::InvalidArgument(
                "max partitions must be at least 1".into(),
            ));
        }
        let min_page = (PAGE_HEADER_SIZE + RECORD_HEADER_SIZE) as u64;
        if self.page_size < min_page {
            return Err(GridError::InvalidArgument(format!(
                "page size {} cannot hold a record (minimum {})",
                self.page_size, min_page
            )));
        }

        let cells = self.max_partitions.checked_mul(self.max_partitions);
        let bucket_bytes = cells.and_then(|c| c.checked_mul(self.page_size));
        let directory_bytes = cells
            .and_then(|c| c.checked_mul(ENTRY_SIZE as u64))
            .and_then(|b| b.checked_add(DIRECTORY_HEADER_SIZE as u64));
        let fits = |bytes: Option<u64>| bytes.is_some_and(|b| usize::try_from(b).is_ok());
        if !fits(bucket_bytes) || !fits(directory_bytes) {
            return Err(GridError::InvalidArgument(format!(
                "a {0} x {0} grid of {1}-byte pages is too large",
                self.max_partitions, self.page_size
            )));
        }
        Ok(())
    }
}
