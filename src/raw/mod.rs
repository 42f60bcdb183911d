mod arena;
mod degree;
mod handle;
mod node;
mod ordered_map;
mod raw_map;

pub(crate) use degree::Degrees;
pub(crate) use raw_map::{LeafPos, RawMap, Version};
