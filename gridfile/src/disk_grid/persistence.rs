//! Integrity checking for a loaded grid.
//!
//! Walks the scale, the live directory and every referenced bucket page and
//! reports where the persisted state disagrees with itself.

use std::collections::BTreeMap;

use super::grid_impl::LoadedGrid;
use super::grid_types::{Axis, BucketAddr, Cell, GridResult, DirectoryEntry};

/// Result of an integrity check
#[derive(Debug, Clone)]
pub struct IntegrityReport {
    /// Live directory cells checked
    pub cells_checked: u64,
    /// Distinct bucket pages checked
    pub buckets_checked: u64,
    /// Records walked across all buckets
    pub records_checked: u64,
    /// Buckets with at least one finding
    pub corrupted_buckets: Vec<BucketAddr>,
    /// Summary of findings
    pub is_valid: bool,
    /// Detailed error messages
    pub errors: Vec<String>,
}

impl IntegrityReport {
    pub fn new() -> Self {
        Self {
            cells_checked: 0,
            buckets_checked: 0,
            records_checked: 0,
            corrupted_buckets: Vec::new(),
            is_valid: true,
            errors: Vec::new(),
        }
    }

    fn fail(&mut self, message: String) {
        self.is_valid = false;
        self.errors.push(message);
    }

    fn fail_bucket(&mut self, bucket: BucketAddr, message: String) {
        if !self.corrupted_buckets.contains(&bucket) {
            self.corrupted_buckets.push(bucket);
        }
        self.fail(message);
    }
}

impl Default for IntegrityReport {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadedGrid {
    pub(crate) fn check_integrity(&self) -> GridResult<IntegrityReport> {
        let mut report = IntegrityReport::new();

        for axis in [Axis::X, Axis::Y] {
            let boundaries = self.scale.boundaries(axis);
            if boundaries.windows(2).any(|w| w[0] >= w[1]) {
                report.fail(format!("{} scale is not strictly ascending", axis));
            }
        }

        let groups = self.alias_groups(&mut report)?;
        let next = self.directory.next_bucket_address();

        for (bucket, cells) in &groups {
            report.buckets_checked += 1;
            if *bucket >= next {
                report.fail_bucket(
                    *bucket,
                    format!("bucket {} was never allocated (next is {})", bucket, next),
                );
                continue;
            }
            self.check_group(*bucket, cells, &mut report)?;
        }

        Ok(report)
    }

    /// Live cells bucketed by the address they reference
    fn alias_groups(&self, report: &mut IntegrityReport) -> GridResult<BTreeMap<BucketAddr, Vec<Cell>>> {
        let last = self.last_cell();
        let mut groups: BTreeMap<BucketAddr, Vec<Cell>> = BTreeMap::new();
        for lon in 0..=last.lon {
            for lat in 0..=last.lat {
                let cell = Cell::new(lon, lat);
                groups.entry(self.entry(cell)?.bucket).or_default().push(cell);
                report.cells_checked += 1;
            }
        }
        Ok(groups)
    }

    fn check_group(
        &self,
        bucket: BucketAddr,
        cells: &[Cell],
        report: &mut IntegrityReport,
    ) -> GridResult<()> {
        let Some(first) = cells.first() else {
            return Ok(());
        };
        let entry = self.entry(*first)?;

        for cell in &cells[1..] {
            if self.entry(*cell)? != entry {
                report.fail_bucket(
                    bucket,
                    format!("cells {} and {} share bucket {} but differ", first, cell, bucket),
                );
            }
        }

        let (min_lon, max_lon) = span(cells.iter().map(|c| c.lon));
        let (min_lat, max_lat) = span(cells.iter().map(|c| c.lat));
        let area = (max_lon - min_lon + 1) * (max_lat - min_lat + 1);
        if area != cells.len() as u64 {
            report.fail_bucket(
                bucket,
                format!("cells sharing bucket {} do not form a rectangle", bucket),
            );
        }

        let page = self.buckets.map_bucket(bucket)?;
        if page.used_bytes() != entry.nbytes || page.record_count() != entry.nrecords {
            report.fail_bucket(
                bucket,
                format!(
                    "bucket {} header ({} bytes, {} records) disagrees with its entry ({} bytes, {} records)",
                    bucket,
                    page.used_bytes(),
                    page.record_count(),
                    entry.nbytes,
                    entry.nrecords
                ),
            );
        }

        let records = match page.records() {
            Ok(records) => records,
            Err(e) => {
                report.fail_bucket(bucket, e.to_string());
                return Ok(());
            }
        };

        let mut recomputed = DirectoryEntry {
            bucket,
            ..DirectoryEntry::default()
        };
        for record in &records {
            report.records_checked += 1;
            recomputed.add_record(record.x, record.y, record.payload.len() as u64);

            let home = self.scale.locate(record.x, record.y);
            if self.entry(home)?.bucket != bucket {
                report.fail_bucket(
                    bucket,
                    format!(
                        "record ({}, {}) in bucket {} belongs to cell {}",
                        record.x, record.y, bucket, home
                    ),
                );
            }
        }

        if recomputed != entry {
            report.fail_bucket(
                bucket,
                format!(
                    "aggregates of bucket {} are stale: entry {:?}, recomputed {:?}",
                    bucket, entry, recomputed
                ),
            );
        }
        Ok(())
    }
}

fn span(values: impl Iterator<Item = u64>) -> (u64, u64) {
    values.fold((u64::MAX, 0), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integrity_report_creation() {
        let report = IntegrityReport::new();
        assert!(report.is_valid);
        assert_eq!(report.cells_checked, 0);
        assert!(report.corrupted_buckets.is_empty());
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_fail_bucket_records_once() {
        let mut report = IntegrityReport::default();
        report.fail_bucket(3, "first".into());
        report.fail_bucket(3, "second".into());
        assert!(!report.is_valid);
        assert_eq!(report.corrupted_buckets, vec![3]);
        assert_eq!(report.errors.len(), 2);
    }

    #[test]
    fn test_span() {
        assert_eq!(span([3, 1, 2].into_iter()), (1, 3));
        assert_eq!(span([5].into_iter()), (5, 5));
    }
}
