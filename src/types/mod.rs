//! Value types shared between the lifecycle core and backends.

mod buffer;
mod sampler;
mod texture;

pub use buffer::{BufferDescriptor, BufferUsage};
pub use sampler::{AddressMode, FilterMode, SamplerDescriptor};
pub use texture::{Extent2d, TextureDescriptor, TextureFormat, TextureUsage};
