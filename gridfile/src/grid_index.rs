//! GridIndex trait definition for point-keyed record storage.

use crate::disk_grid::grid_types::{GridResult, RangeResult};
use crate::grid_rect::GridRect;

/// A two-dimensional index mapping integer coordinates to opaque records.
pub trait GridIndex: Send + Sync {
    /// Stores `payload` under `(x, y)`. Duplicate coordinates are kept.
    fn insert(&self, x: i64, y: i64, payload: &[u8]) -> GridResult<()>;

    /// Returns a copy of the first payload stored at `(x, y)`.
    fn find(&self, x: i64, y: i64) -> GridResult<Vec<u8>>;

    /// Removes the first record stored at `(x, y)`.
    fn delete(&self, x: i64, y: i64) -> GridResult<()>;

    /// Finds every record inside `rect`, bounds inclusive.
    fn range_query(&self, rect: &GridRect) -> GridResult<RangeResult>;

    /// Gets the number of live records.
    fn size(&self) -> GridResult<u64>;
}
