pub mod archive;
pub mod bandmapping;
pub mod dataset_pipeline;
pub mod dataset_record;
pub mod gcp;
pub mod instance;
pub mod mask;
pub mod pipeline;
pub mod resample;
pub mod spatial_ref;

pub use bandmapping::BandMapping;
pub use dataset_pipeline::{DatasetPipelineParams, estimate_work, run_dataset_pipeline};
pub use dataset_record::DatasetRecord;
pub use gcp::{Gcp, GcpSet, solve_affine};
pub use instance::Instance;
pub use mask::{Mask, Ring, rasterize_alpha};
pub use pipeline::{RasterHandle, StageOutcome, apply_gcp, apply_mask, clip, expand_rgb, save, warp};
pub use resample::ResampleAlg;
pub use spatial_ref::get_spatial_ref;
