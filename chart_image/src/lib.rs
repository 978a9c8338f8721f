pub mod format;
pub mod tile_format;
pub mod traits;

pub use image::DynamicImage;
pub use tile_format::TileFormat;
pub use traits::{DynamicImageTraitConvert, DynamicImageTraitInfo, DynamicImageTraitOperation};
