pub mod config;
pub mod define;
pub mod flags;
pub mod geometry;

pub use config::{BdConfig, MAX_BLOCK_COUNT, MAX_DEVICE_BYTES, TestConfig, device_fits};
pub use define::{DefineId, GEOMETRY_DEFINE_COUNT, IMPLICIT_DEFINE_COUNT, IMPLICIT_DEFINE_NAMES};
pub use flags::{BadBlockBehavior, PowerlossBehavior, TestFlags};
pub use geometry::{GEOMETRIES, Geometry};
