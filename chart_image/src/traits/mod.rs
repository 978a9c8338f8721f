pub mod convert;
pub mod info;
pub mod operation;

pub use convert::DynamicImageTraitConvert;
pub use info::DynamicImageTraitInfo;
pub use operation::DynamicImageTraitOperation;
