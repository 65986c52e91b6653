//! Split engine: new partition lines and separation of aliased buckets.

use super::grid_impl::LoadedGrid;
use super::grid_types::{Axis, BucketAddr, Cell, DirectoryEntry, Direction, GridError, GridResult};

impl LoadedGrid {
    /// Boundary a grid split of `cell` along `axis` would insert for an
    /// incoming record at `(x, y)`.
    ///
    /// The mean of the entry's coordinates and the incoming one, floored and
    /// clamped so that both halves of the cell stay non-empty intervals.
    pub(crate) fn split_value(&self, axis: Axis, cell: Cell, x: i64, y: i64) -> GridResult<i64> {
        let entry = self.entry(cell)?;
        let total = entry.sum(axis) as i128 + axis.coordinate(x, y) as i128;
        let mean = total.div_euclid(entry.nrecords as i128 + 1);

        let (lower, upper) = self.scale.interval(axis, cell.index(axis));
        let lo = lower.map_or(i64::MIN as i128, |l| l as i128 + 1);
        let hi = upper.map_or(i64::MAX as i128 - 1, |u| u as i128 - 1);
        if lo > hi {
            // a one-coordinate-wide cell cannot be cut again
            return Err(GridError::DuplicateValue(upper.or(lower).unwrap_or(0)));
        }
        Ok(mean.clamp(lo, hi) as i64)
    }

    /// Add a partition line along `axis` through `cell`, returning the new
    /// boundary. The opened row/column starts aliased to its lower neighbor.
    pub(crate) fn split_grid(&mut self, axis: Axis, cell: Cell, x: i64, y: i64) -> GridResult<i64> {
        let count = self.scale.count(axis);
        if count >= self.scale.max_count() {
            return Err(GridError::CapacityExceeded(format!(
                "{} axis already has {} partitions",
                axis, count
            )));
        }
        let value = self.split_value(axis, cell, x, y)?;

        let position = self.scale.insert_partition(axis, value)?;
        if position != cell.index(axis) {
            return Err(GridError::Corrupted(format!(
                "{} boundary {} landed at {} instead of {}",
                axis,
                value,
                position,
                cell.index(axis)
            )));
        }

        // the scale now counts the new line: shift every entry beyond the
        // split point one step outward, highest index first
        let last = self.last_cell();
        let other = axis.other();
        for index in (position + 1..=last.index(axis)).rev() {
            for j in 0..=last.index(other) {
                let (from, to) = match axis {
                    Axis::X => (Cell::new(index - 1, j), Cell::new(index, j)),
                    Axis::Y => (Cell::new(j, index - 1), Cell::new(j, index)),
                };
                self.directory.copy_entry(from, to)?;
            }
        }

        self.grid_splits += 1;
        log::debug!(
            "Grid split on {} axis at {} through cell {} ({} partitions)",
            axis,
            value,
            cell,
            count + 1
        );
        Ok(value)
    }

    /// Separate the paired cells `src` (lower) and `dst` (higher) along
    /// `axis`. `dst` receives a fresh bucket holding every record beyond the
    /// boundary between them. Returns the new bucket address.
    pub(crate) fn split_bucket(&mut self, axis: Axis, src: Cell, dst: Cell) -> GridResult<BucketAddr> {
        if !self.directory.has_free_bucket() {
            return Err(GridError::CapacityExceeded(
                "no bucket pages left to split into".into(),
            ));
        }
        let mut source = self.entry(src)?;
        let original = source.bucket;
        if self.entry(dst)?.bucket != original {
            return Err(GridError::InvalidArgument(format!(
                "cells {} and {} are not paired",
                src, dst
            )));
        }
        let threshold = self.scale.threshold(axis, dst.index(axis))?;

        let bucket = self.directory.allocate_bucket_address()?;
        let mut dest = DirectoryEntry {
            bucket,
            ..DirectoryEntry::default()
        };

        {
            let mut from = self.buckets.map_bucket(original)?;
            let mut to = self.buckets.map_bucket(bucket)?;
            to.reset();

            let mut index = 0;
            while index < from.record_count() {
                let record = from.record_at(from.entry_at(index)?)?;
                let (x, y, len) = (record.x, record.y, record.payload.len() as u64);
                if axis.coordinate(x, y) > threshold {
                    to.append_record(x, y, record.payload);
                    dest.add_record(x, y, len);
                    source.remove_record(x, y, len);
                    // compaction moves the next record into `index`
                    from.delete_entry(index)?;
                } else {
                    index += 1;
                }
            }
        }

        self.set_entry(src, &source)?;
        self.set_entry(dst, &dest)?;
        self.update_paired_buckets(Direction::Forward, Some(axis), dst, original)?;
        self.update_paired_buckets(Direction::Backward, Some(axis), src, original)?;

        self.bucket_splits += 1;
        log::debug!(
            "Bucket split on {} axis between {} and {} at {}: {} records moved to bucket {}",
            axis,
            src,
            dst,
            threshold,
            dest.nrecords,
            bucket
        );
        Ok(bucket)
    }
}
