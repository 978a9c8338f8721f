pub mod concurrency;
pub mod constants;
pub mod error;
pub mod geo_bbox;
pub mod progress;
pub mod tile_math;
pub mod utils;

pub use concurrency::ConcurrencyLimits;
pub use error::ErrorKind;
pub use geo_bbox::GeoBBox;
pub use progress::{ProgressTrait, get_progress_bar};
