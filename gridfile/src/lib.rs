//! # Grid File - Disk-Backed Two-Dimensional Index
//!
//! This crate maps integer `(x, y)` keys to variable-length opaque records,
//! keeping every disk page bounded in size while supporting point insert,
//! lookup and delete plus inclusive rectangular range queries.
//!
//! ## Features
//!
//! - **Fixed Layout**: Four files sized once at creation, never grown
//! - **Memory Mapped**: Scale and directory mapped for the session, bucket pages per access
//! - **Adaptive Grid**: Full buckets are split between aliased cells or by a new partition line
//! - **Persistent**: Data survives unload and process restarts
//! - **Integrity Checks**: Verify directory aggregates against bucket contents
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gridfile::{DiskGridFile, GridConfig, GridIndex, GridRect};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GridConfig::new("cities")
//!     .with_max_partitions(16)
//!     .with_page_size(1024)
//!     .with_base_dir("/tmp/grids");
//! let grid = DiskGridFile::create(config)?;
//!
//! grid.insert(10, 20, b"berlin")?;
//! assert_eq!(grid.find(10, 20)?, b"berlin");
//!
//! let hits = grid.range_query(&GridRect::new(0, 0, 50, 50))?;
//! assert_eq!(hits.len(), 1);
//!
//! grid.unload()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod disk_grid;
pub mod grid_index;
pub mod grid_rect;

pub use config::GridConfig;
pub use disk_grid::{
    Axis, BucketAddr, Cell, DirectoryEntry, DiskGridFile, GridError, GridRecord, GridResult,
    GridStats, IntegrityReport, RangeResult,
};
pub use grid_index::GridIndex;
pub use grid_rect::GridRect;
