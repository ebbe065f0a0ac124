use crate::types::event::Hit;
use crate::types::pixel_mask::{Geometry, PixelMask};
use ndarray::Array2;

/// Per-pixel hit counts of one acquisition session, indexed `[column, row]`.
#[derive(Debug, Clone, PartialEq)]
pub struct OccupancyHistogram {
    counts: Array2<u32>,
}

impl OccupancyHistogram {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            counts: Array2::zeros(geometry.shape()),
        }
    }

    pub fn geometry(&self) -> Geometry {
        let (columns, rows) = self.counts.dim();
        Geometry::new(columns, rows)
    }

    /// Counts a hit given in 1-based front-end coordinates. Returns false when
    /// the hit lies outside the matrix.
    pub fn fill(&mut self, hit: &Hit) -> bool {
        let (Some(column), Some(row)) = (
            (hit.column as usize).checked_sub(1),
            (hit.row as usize).checked_sub(1),
        ) else {
            return false;
        };
        match self.counts.get_mut([column, row]) {
            Some(count) => {
                *count += 1;
                true
            }
            None => false,
        }
    }

    pub fn merge(&mut self, other: &OccupancyHistogram) {
        self.counts += &other.counts;
    }

    pub fn get(&self, column: usize, row: usize) -> Option<u32> {
        self.counts.get([column, row]).copied()
    }

    pub fn counts(&self) -> &Array2<u32> {
        &self.counts
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().map(|&c| c as u64).sum()
    }

    /// Counts of the pixels selected by `mask`, in `[column, row]` order.
    pub fn selected_counts(&self, mask: &PixelMask) -> Vec<u32> {
        self.counts
            .iter()
            .zip(mask.as_array().iter())
            .filter(|(_, selected)| **selected)
            .map(|(&count, _)| count)
            .collect()
    }
}
