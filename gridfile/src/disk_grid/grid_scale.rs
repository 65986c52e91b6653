//! Partition scales for the two axes.
//!
//! Layout (`2N + 1` words):
//! ```text
//! +-------+---------+---------------------+---------+---------------------+
//! | N     | x count | x boundaries (N-1)  | y count | y boundaries (N-1)  |
//! +-------+---------+---------------------+---------+---------------------+
//!   slot 0  slot 1    slots 2..=N           slot N+1  slots N+2..=2N
//! ```
//! Boundaries are strictly ascending; only the first `count` are live.

use memmap2::MmapMut;

use super::grid_constants::WORD_SIZE;
use super::grid_storage::{read_word, write_word};
use super::grid_types::{Axis, Cell, GridError, GridResult};

pub struct GridScale {
    map: MmapMut,
    capacity: u64,
}

impl GridScale {
    /// Bytes needed for a scale of capacity `n`
    pub fn size_for(n: u64) -> u64 {
        (2 * n + 1) * WORD_SIZE as u64
    }

    /// Format a freshly created scale file
    pub fn initialize(mut map: MmapMut, capacity: u64) -> GridResult<Self> {
        check_len(&map, capacity)?;
        write_word(&mut map, 0, capacity as i64);
        let mut scale = Self { map, capacity };
        scale.set_count(Axis::X, 0);
        scale.set_count(Axis::Y, 0);
        Ok(scale)
    }

    /// Attach to an existing scale, validating its shape
    pub fn open(map: MmapMut) -> GridResult<Self> {
        if map.len() < WORD_SIZE {
            return Err(GridError::Corrupted("scale file is empty".into()));
        }
        let capacity = read_word(&map, 0);
        if capacity < 1 {
            return Err(GridError::Corrupted(format!(
                "scale capacity {} is invalid",
                capacity
            )));
        }
        let capacity = capacity as u64;
        check_len(&map, capacity)?;

        let scale = Self { map, capacity };
        for axis in [Axis::X, Axis::Y] {
            if scale.count(axis) > scale.max_count() {
                return Err(GridError::Corrupted(format!(
                    "{} partition count {} exceeds {}",
                    axis,
                    scale.count(axis),
                    scale.max_count()
                )));
            }
        }
        Ok(scale)
    }

    /// N, the cap on cells per axis
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Most boundaries an axis can hold (N - 1)
    pub fn max_count(&self) -> u64 {
        self.capacity - 1
    }

    /// Number of live boundaries on `axis`; also the highest live cell index
    pub fn count(&self, axis: Axis) -> u64 {
        read_word(&self.map, self.count_slot(axis) * WORD_SIZE) as u64
    }

    /// Highest live cell on both axes
    pub fn last_cell(&self) -> Cell {
        Cell::new(self.count(Axis::X), self.count(Axis::Y))
    }

    pub fn boundaries(&self, axis: Axis) -> Vec<i64> {
        (0..self.count(axis)).map(|i| self.boundary(axis, i)).collect()
    }

    /// Number of boundaries strictly less than `value`
    pub fn cell_index(&self, axis: Axis, value: i64) -> u64 {
        let count = self.count(axis);
        let mut index = 0;
        while index < count && value > self.boundary(axis, index) {
            index += 1;
        }
        index
    }

    pub fn locate(&self, x: i64, y: i64) -> Cell {
        Cell::new(self.cell_index(Axis::X, x), self.cell_index(Axis::Y, y))
    }

    /// Insert `value` at its sorted position, returning that position
    pub fn insert_partition(&mut self, axis: Axis, value: i64) -> GridResult<u64> {
        let count = self.count(axis);
        if count >= self.max_count() {
            return Err(GridError::CapacityExceeded(format!(
                "{} scale already holds {} partitions",
                axis, count
            )));
        }

        let mut position = 0;
        while position < count && value > self.boundary(axis, position) {
            position += 1;
        }
        if position < count && self.boundary(axis, position) == value {
            return Err(GridError::DuplicateValue(value));
        }

        for i in (position + 1..=count).rev() {
            let shifted = self.boundary(axis, i - 1);
            self.set_boundary(axis, i, shifted);
        }
        self.set_boundary(axis, position, value);
        self.set_count(axis, count + 1);
        Ok(position)
    }

    /// Boundary separating cell `index` from its lower neighbor along `axis`.
    /// Index 0 has no lower neighbor and falls back to the first boundary.
    pub fn threshold(&self, axis: Axis, index: u64) -> GridResult<i64> {
        let count = self.count(axis);
        if index > count {
            return Err(GridError::InvalidArgument(format!(
                "{} index {} beyond live range 0..={}",
                axis, index, count
            )));
        }
        if count == 0 {
            return Err(GridError::InvalidArgument(format!(
                "{} scale has no partitions",
                axis
            )));
        }
        Ok(self.boundary(axis, index.saturating_sub(1)))
    }

    /// Coordinate interval `(lower, upper]` covered by cell `index`;
    /// `None` marks an unbounded side
    pub fn interval(&self, axis: Axis, index: u64) -> (Option<i64>, Option<i64>) {
        let count = self.count(axis);
        let lower = index
            .checked_sub(1)
            .filter(|i| *i < count)
            .map(|i| self.boundary(axis, i));
        let upper = (index < count).then(|| self.boundary(axis, index));
        (lower, upper)
    }

    pub fn flush(&self) -> GridResult<()> {
        self.map.flush()?;
        Ok(())
    }

    /// Copy of the whole scale region
    pub fn snapshot(&self) -> Vec<u8> {
        self.map.to_vec()
    }

    /// Overwrite the scale with bytes taken by [`GridScale::snapshot`]
    pub fn restore(&mut self, bytes: &[u8]) -> GridResult<()> {
        if bytes.len() != self.map.len() {
            return Err(GridError::Corrupted(format!(
                "scale snapshot is {} bytes, expected {}",
                bytes.len(),
                self.map.len()
            )));
        }
        self.map.copy_from_slice(bytes);
        Ok(())
    }

    fn count_slot(&self, axis: Axis) -> usize {
        match axis {
            Axis::X => 1,
            Axis::Y => 1 + self.capacity as usize,
        }
    }

    fn boundary_offset(&self, axis: Axis, index: u64) -> usize {
        (self.count_slot(axis) + 1 + index as usize) * WORD_SIZE
    }

    fn boundary(&self, axis: Axis, index: u64) -> i64 {
        read_word(&self.map, self.boundary_offset(axis, index))
    }

    fn set_boundary(&mut self, axis: Axis, index: u64, value: i64) {
        let offset = self.boundary_offset(axis, index);
        write_word(&mut self.map, offset, value);
    }

    fn set_count(&mut self, axis: Axis, count: u64) {
        let offset = self.count_slot(axis) * WORD_SIZE;
        write_word(&mut self.map, offset, count as i64);
    }
}

fn check_len(map: &MmapMut, capacity: u64) -> GridResult<()> {
    let expected = capacity
        .checked_mul(2)
        .and_then(|slots| slots.checked_add(1))
        .and_then(|slots| slots.checked_mul(WORD_SIZE as u64));
    match expected {
        Some(size) if size == map.len() as u64 => Ok(()),
        Some(size) => Err(GridError::Corrupted(format!(
            "scale is {} bytes, expected {} for N = {}",
            map.len(),
            size,
            capacity
        ))),
        None => Err(GridError::Corrupted(format!(
            "scale capacity {} overflows the scale size",
            capacity
        ))),
    }
}
