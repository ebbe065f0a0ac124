//! Reduction of a session's records to a per-pixel occupancy histogram and
//! its median over the selected pixels.

use crate::error::ConfigurationError;
use crate::types::{EventRecord, Geometry, OccupancyHistogram, PixelMask};
use itertools::Itertools;
use rayon::prelude::*;
use tracing::debug;

/// Batches at least this large are histogrammed in parallel chunks of this
/// size.
const PARALLEL_CHUNK: usize = 1 << 14;

/// Histograms the hit records of a batch. Non-hit records and hits outside
/// the matrix are skipped.
pub fn fill_histogram(records: &[EventRecord], geometry: Geometry) -> OccupancyHistogram {
    if records.len() < PARALLEL_CHUNK {
        let mut histogram = OccupancyHistogram::new(geometry);
        fill_chunk(&mut histogram, records);
        return histogram;
    }

    records
        .par_chunks(PARALLEL_CHUNK)
        .fold(
            || OccupancyHistogram::new(geometry),
            |mut histogram, chunk| {
                fill_chunk(&mut histogram, chunk);
                histogram
            },
        )
        .reduce(
            || OccupancyHistogram::new(geometry),
            |mut a, b| {
                a.merge(&b);
                a
            },
        )
}

fn fill_chunk(histogram: &mut OccupancyHistogram, records: &[EventRecord]) {
    for hit in records.iter().filter_map(EventRecord::as_hit) {
        histogram.fill(hit);
    }
}

/// Median count of the pixels selected by `mask`. Even counts average the two
/// middle values.
pub fn masked_median(
    histogram: &OccupancyHistogram,
    mask: &PixelMask,
) -> Result<f64, ConfigurationError> {
    let expected = mask.geometry().shape();
    let found = histogram.geometry().shape();
    if expected != found {
        return Err(ConfigurationError::ShapeMismatch { expected, found });
    }
    Ok(median(histogram.selected_counts(mask)))
}

fn median(counts: Vec<u32>) -> f64 {
    let sorted = counts.into_iter().sorted_unstable().collect_vec();
    let n = sorted.len();
    match n {
        0 => 0.0,
        _ if n % 2 == 1 => sorted[n / 2] as f64,
        _ => (sorted[n / 2 - 1] as f64 + sorted[n / 2] as f64) / 2.0,
    }
}

/// Histogram of one session's records and its median over `mask`.
pub fn reduce(records: &[EventRecord], mask: &PixelMask) -> (OccupancyHistogram, f64) {
    let histogram = fill_histogram(records, mask.geometry());
    let hits = records.iter().filter(|r| r.is_hit()).count();
    let dropped = hits as u64 - histogram.total();
    if dropped > 0 {
        debug!(dropped, "Hits outside the pixel matrix ignored");
    }
    let median = median(histogram.selected_counts(mask));
    (histogram, median)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Payload;
    use ndarray::Array2;

    fn mask_from(columns: usize, rows: usize, selected: &[(usize, usize)]) -> PixelMask {
        let mut grid = Array2::from_elem((columns, rows), false);
        for &(column, row) in selected {
            grid[[column, row]] = true;
        }
        PixelMask::from_selection(grid).unwrap()
    }

    #[test]
    fn hits_land_in_zero_based_cells() {
        let mask = mask_from(3, 3, &[(0, 0), (2, 2)]);
        let records = vec![
            EventRecord::hit(4, 1, 1, 0),
            EventRecord::hit(4, 1, 1, 3),
            EventRecord::hit(4, 3, 3, 0),
            EventRecord::new(4, Payload::DataHeader { bcid: 1 }),
        ];
        let (histogram, median) = reduce(&records, &mask);
        assert_eq!(histogram.get(0, 0), Some(2));
        assert_eq!(histogram.get(2, 2), Some(1));
        assert_eq!(histogram.total(), 3);
        assert_eq!(median, 1.5);
    }

    #[test]
    fn out_of_range_hits_are_dropped() {
        let mask = mask_from(2, 2, &[(0, 0)]);
        let records = vec![
            EventRecord::hit(4, 3, 1, 0),
            EventRecord::hit(4, 1, 3, 0),
            EventRecord::hit(4, 0, 1, 0),
            EventRecord::hit(4, 1, 1, 0),
        ];
        let (histogram, median) = reduce(&records, &mask);
        assert_eq!(histogram.total(), 1);
        assert_eq!(median, 1.0);
    }

    #[test]
    fn median_only_counts_selected_pixels() {
        let mask = mask_from(2, 3, &[(0, 0), (0, 1), (1, 2)]);
        let mut records = Vec::new();
        records.extend(std::iter::repeat_n(EventRecord::hit(4, 1, 1, 0), 10));
        records.extend(std::iter::repeat_n(EventRecord::hit(4, 1, 2, 0), 4));
        // unselected pixel, ignored by the median
        records.extend(std::iter::repeat_n(EventRecord::hit(4, 2, 1, 0), 50));
        let (_, median) = reduce(&records, &mask);
        assert_eq!(median, 4.0);
    }

    #[test]
    fn parallel_fill_matches_sequential() {
        let geometry = Geometry::new(8, 12);
        let records: Vec<EventRecord> = (0..3 * PARALLEL_CHUNK + 17)
            .map(|i| EventRecord::hit(4, (i % 8) as u16 + 1, (i % 12) as u16 + 1, 0))
            .collect();
        let parallel = fill_histogram(&records, geometry);
        let mut sequential = OccupancyHistogram::new(geometry);
        fill_chunk(&mut sequential, &records);
        assert_eq!(parallel, sequential);
        assert_eq!(parallel.total(), records.len() as u64);
    }

    #[test]
    fn mismatched_mask_is_rejected() {
        let histogram = OccupancyHistogram::new(Geometry::new(4, 4));
        let mask = mask_from(2, 2, &[(1, 1)]);
        assert!(matches!(
            masked_median(&histogram, &mask),
            Err(ConfigurationError::ShapeMismatch { .. })
        ));
    }
}
