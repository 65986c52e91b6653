use std::fmt;

/// An inclusive integer rectangle used by range queries.
///
/// # Examples
///
/// ```rust,ignore
/// use gridfile::GridRect;
///
/// let rect = GridRect::new(0, 0, 100, 100);
/// assert!(rect.contains_point(100, 0));
/// assert!(!rect.contains_point(101, 0));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug, serde::Deserialize, serde::Serialize)]
pub struct GridRect {
    pub min_x: i64,
    pub min_y: i64,
    pub max_x: i64,
    pub max_y: i64,
}

impl fmt::Display for GridRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GridRect({}, {}, {}, {})",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

impl GridRect {
    pub fn new(min_x: i64, min_y: i64, max_x: i64, max_y: i64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// The rectangle covering every coordinate
    pub fn everything() -> Self {
        Self::new(i64::MIN, i64::MIN, i64::MAX, i64::MAX)
    }

    /// Whether `min <= max` on both axes
    pub fn is_valid(&self) -> bool {
        self.min_x <= self.max_x && self.min_y <= self.max_y
    }

    pub fn contains_point(&self, x: i64, y: i64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}
