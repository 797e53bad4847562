pub mod mapper;
pub mod packer;

pub use mapper::{DataMapper, Rgb, SizeRange, VisualToken};
pub use packer::{BoundingBox, CanvasSize, PackResult, PlacedToken, SpiralPacker};
