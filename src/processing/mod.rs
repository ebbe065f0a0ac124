pub mod occupancy;
pub mod table;

// Re-export for easier access
pub use occupancy::{fill_histogram, masked_median, reduce};
pub use table::records_to_dataframe;
