//! Disk-based grid file.
//!
//! The grid partitions the plane with two independent sorted scales. Each
//! cell of the resulting grid has a directory entry naming the bucket page
//! that holds its records, and neighbouring cells may share one bucket until
//! it fills. A full bucket is either split between the cells sharing it or,
//! when it is not shared, the grid gains a partition line through the cell.
//!
//! - The scale and the directory stay mapped while the grid is loaded
//! - Bucket pages are mapped per access and unmapped when the access ends
//! - Every file is sized at creation and never grows

pub mod grid_types;
pub mod grid_constants;
pub mod grid_storage;
pub mod grid_scale;
pub mod grid_directory;
pub mod bucket_store;
pub mod persistence;
mod pairing;
mod split;
mod grid_impl;

pub use grid_types::{
    GridError, GridResult, BucketAddr, Axis, Direction, Cell, PairProbe, DirectoryEntry,
    GridRecord, RangeResult, GridStats, GridHeader,
};
pub use grid_constants::{DEFAULT_MAX_PARTITIONS, DEFAULT_PAGE_SIZE};
pub use grid_storage::GridPaths;
pub use bucket_store::{BucketStore, BucketPage, BucketRecord};
pub use grid_impl::DiskGridFile;
pub use persistence::IntegrityReport;
