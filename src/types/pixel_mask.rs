use crate::error::ConfigurationError;
use bon::bon;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Pixel matrix dimensions as (columns, rows).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Geometry {
    pub columns: usize,
    pub rows: usize,
}

impl Geometry {
    /// FE-I4 pixel matrix: 80 columns x 336 rows.
    pub const FE_I4: Geometry = Geometry {
        columns: 80,
        rows: 336,
    };

    pub fn new(columns: usize, rows: usize) -> Self {
        Self { columns, rows }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.columns, self.rows)
    }

    pub fn pixel_count(&self) -> usize {
        self.columns * self.rows
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::FE_I4
    }
}

/// Selection of pixels that contribute to the occupancy statistic.
///
/// Indexed `[column, row]` with 0-based indices. A mask always selects at
/// least one pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelMask {
    selected: Array2<bool>,
    geometry: Geometry,
    selected_count: usize,
}

#[bon]
impl PixelMask {
    /// Unions the shift patterns of `enable_mask_steps` (all steps when empty)
    /// and deselects `disabled_columns`.
    #[builder]
    pub fn new(
        #[builder(default = Geometry::FE_I4)] geometry: Geometry,
        mask_steps: usize,
        #[builder(default)] enable_mask_steps: Vec<usize>,
        #[builder(default)] disabled_columns: Vec<usize>,
    ) -> Result<Self, ConfigurationError> {
        if mask_steps == 0 {
            return Err(ConfigurationError::InvalidMaskSteps);
        }
        let steps: Vec<usize> = if enable_mask_steps.is_empty() {
            (0..mask_steps).collect()
        } else {
            enable_mask_steps
        };

        let mut selected = Array2::from_elem(geometry.shape(), false);
        for &step in &steps {
            if step >= mask_steps {
                return Err(ConfigurationError::MaskStepOutOfRange {
                    step,
                    steps: mask_steps,
                });
            }
            let pattern = shift_pattern(geometry, mask_steps, step);
            selected.zip_mut_with(&pattern, |s, &p| *s |= p);
        }

        for &column in &disabled_columns {
            if column >= geometry.columns {
                return Err(ConfigurationError::ColumnOutOfRange {
                    column,
                    columns: geometry.columns,
                });
            }
            tracing::info!("Deselect double column {}", column);
            selected.row_mut(column).fill(false);
        }

        Self::from_selection(selected)
    }

    /// Wraps an explicit `[column, row]` selection grid.
    pub fn from_selection(selected: Array2<bool>) -> Result<Self, ConfigurationError> {
        let (columns, rows) = selected.dim();
        let selected_count = selected.iter().filter(|&&s| s).count();
        if selected_count == 0 {
            return Err(ConfigurationError::EmptyPixelMask);
        }
        Ok(Self {
            selected,
            geometry: Geometry::new(columns, rows),
            selected_count,
        })
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn selected_count(&self) -> usize {
        self.selected_count
    }

    pub fn as_array(&self) -> &Array2<bool> {
        &self.selected
    }

    /// 0-based lookup; out-of-range pixels are not selected.
    pub fn is_selected(&self, column: usize, row: usize) -> bool {
        self.selected.get([column, row]).copied().unwrap_or(false)
    }

    /// Selected pixels as 1-based (column, row) front-end coordinates.
    pub fn selected_pixels(&self) -> impl Iterator<Item = (u16, u16)> + '_ {
        self.selected
            .indexed_iter()
            .filter(|(_, s)| **s)
            .map(|((column, row), _)| (column as u16 + 1, row as u16 + 1))
    }
}

/// Injection pattern of one mask step. Odd front-end columns (index 0, 2, ...)
/// start at row `shift`, even ones are offset by half the step count.
fn shift_pattern(geometry: Geometry, steps: usize, shift: usize) -> Array2<bool> {
    let mut pattern = Array2::from_elem(geometry.shape(), false);
    let odd_offset = shift % steps;
    let even_offset = (steps / 2 + shift) % steps;
    for column in 0..geometry.columns {
        let offset = if column % 2 == 0 { odd_offset } else { even_offset };
        for row in (offset..geometry.rows).step_by(steps) {
            pattern[[column, row]] = true;
        }
    }
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_mask_step_selects_a_third_of_fe_i4() {
        let mask = PixelMask::builder()
            .mask_steps(3)
            .enable_mask_steps(vec![0])
            .build()
            .unwrap();
        assert_eq!(mask.selected_count(), 80 * 112);
        // odd column 1 starts at row 1, even column 2 is shifted by one row
        assert!(mask.is_selected(0, 0));
        assert!(!mask.is_selected(0, 1));
        assert!(mask.is_selected(1, 1));
        assert!(!mask.is_selected(1, 0));
    }

    #[test]
    fn empty_step_list_enables_all_steps() {
        let mask = PixelMask::builder().mask_steps(3).build().unwrap();
        assert_eq!(mask.selected_count(), Geometry::FE_I4.pixel_count());
    }

    #[test]
    fn disabled_columns_are_deselected() {
        let mask = PixelMask::builder()
            .mask_steps(3)
            .enable_mask_steps(vec![0])
            .disabled_columns(vec![0, 5])
            .build()
            .unwrap();
        assert_eq!(mask.selected_count(), 78 * 112);
        assert!((0..336).all(|row| !mask.is_selected(5, row)));
    }

    #[test]
    fn fully_disabled_mask_is_rejected() {
        let geometry = Geometry::new(2, 6);
        let err = PixelMask::builder()
            .geometry(geometry)
            .mask_steps(3)
            .disabled_columns(vec![0, 1])
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigurationError::EmptyPixelMask);
    }

    #[test]
    fn invalid_steps_are_rejected() {
        assert_eq!(
            PixelMask::builder().mask_steps(0).build().unwrap_err(),
            ConfigurationError::InvalidMaskSteps
        );
        assert_eq!(
            PixelMask::builder()
                .mask_steps(3)
                .enable_mask_steps(vec![3])
                .build()
                .unwrap_err(),
            ConfigurationError::MaskStepOutOfRange { step: 3, steps: 3 }
        );
    }

    #[test]
    fn selected_pixels_are_one_based() {
        let mut grid = Array2::from_elem((3, 4), false);
        grid[[2, 3]] = true;
        let mask = PixelMask::from_selection(grid).unwrap();
        assert_eq!(mask.selected_pixels().collect::<Vec<_>>(), vec![(3, 4)]);
    }
}
