//! Pairing: cells whose directory entries share one bucket.
//!
//! Aliased cells carry identical copies of the bucket's aggregates. Every
//! change to a shared bucket is re-broadcast by walking grid adjacency
//! outward from the changed cell until cells no longer reference the
//! superseded bucket or already agree.

use super::grid_impl::LoadedGrid;
use super::grid_types::{Axis, BucketAddr, Cell, Direction, GridResult, PairProbe};

impl LoadedGrid {
    /// Whether two cells reference the same bucket
    pub(crate) fn check_paired(&self, a: Cell, b: Cell) -> GridResult<bool> {
        Ok(self.entry(a)?.bucket == self.entry(b)?.bucket)
    }

    /// Probe the neighbors of `cell` permitted by `direction` for one sharing
    /// its bucket. Backward neighbors are probed before forward ones,
    /// `lon` before `lat`; the first hit wins.
    pub(crate) fn has_paired(
        &self,
        direction: Direction,
        cell: Cell,
    ) -> GridResult<Option<PairProbe>> {
        let last = self.last_cell();
        let mut candidates = Vec::with_capacity(4);
        if direction.allows_backward() {
            for axis in [Axis::X, Axis::Y] {
                if let Some(neighbor) = cell.backward(axis) {
                    candidates.push(PairProbe {
                        axis,
                        forward: false,
                        neighbor,
                    });
                }
            }
        }
        if direction.allows_forward() {
            for axis in [Axis::X, Axis::Y] {
                if let Some(neighbor) = cell.forward(axis, last.index(axis)) {
                    candidates.push(PairProbe {
                        axis,
                        forward: true,
                        neighbor,
                    });
                }
            }
        }

        for probe in candidates {
            if self.check_paired(cell, probe.neighbor)? {
                return Ok(Some(probe));
            }
        }
        Ok(None)
    }

    /// Whether `cell` is the first cell of its alias group inside a window
    /// whose lowest cell is `window_low`. Alias groups are rectangles, so
    /// exactly one cell per group and window passes.
    pub(crate) fn is_canonical_in(&self, cell: Cell, window_low: Cell) -> GridResult<bool> {
        for axis in [Axis::X, Axis::Y] {
            if cell.index(axis) > window_low.index(axis) {
                if let Some(neighbor) = cell.backward(axis) {
                    if self.check_paired(cell, neighbor)? {
                        return Ok(false);
                    }
                }
            }
        }
        Ok(true)
    }

    /// Neighbors of `cell` a fill may visit. `direction` applies to the
    /// `along` axis; the other axis is walked both ways. Without `along`
    /// it applies to both axes.
    fn fill_neighbors(&self, cell: Cell, direction: Direction, along: Option<Axis>) -> Vec<Cell> {
        let last = self.last_cell();
        let allowed = |axis: Axis| match along {
            Some(split) if split != axis => Direction::Both,
            _ => direction,
        };

        let mut neighbors = Vec::with_capacity(4);
        for axis in [Axis::X, Axis::Y] {
            if allowed(axis).allows_backward() {
                neighbors.extend(cell.backward(axis));
            }
        }
        for axis in [Axis::X, Axis::Y] {
            if allowed(axis).allows_forward() {
                neighbors.extend(cell.forward(axis, last.index(axis)));
            }
        }
        neighbors
    }

    /// Copy the entry at `origin` onto every reachable cell that still
    /// references `superseded` and differs from it.
    pub(crate) fn update_paired_buckets(
        &mut self,
        direction: Direction,
        along: Option<Axis>,
        origin: Cell,
        superseded: BucketAddr,
    ) -> GridResult<()> {
        let mut pending = vec![origin];
        let mut updated = 0u64;

        while let Some(cell) = pending.pop() {
            let source = self.entry(cell)?;
            for neighbor in self.fill_neighbors(cell, direction, along) {
                let stale = self.entry(neighbor)?;
                if stale != source && stale.bucket == superseded {
                    self.set_entry(neighbor, &source)?;
                    pending.push(neighbor);
                    updated += 1;
                }
            }
        }

        if updated > 0 {
            log::trace!(
                "Propagated entry of {} to {} aliased cells (bucket {})",
                origin,
                updated,
                superseded
            );
        }
        Ok(())
    }
}
