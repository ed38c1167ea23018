//! Handle-based GPU compute layer over Vulkan.
//!
//! All state lives in a [`Cgpu`] context: the instance plus one generation-checked
//! store per resource kind. Every operation takes the owning device handle explicitly.

pub mod buffer;
pub mod command;
pub mod context;
pub mod descriptor;
pub mod device;
pub mod error;
pub mod image;
pub mod pipeline;
pub mod reflection;
pub mod rollback;
pub mod sampler;
pub mod shader;
pub mod sync;
pub mod tracking;
pub mod translate;

pub use cgpu_core::config::CgpuConfig;
pub use cgpu_core::flags::{
    BufferUsage, ImageFormat, ImageUsage, MemoryAccess, MemoryProperties, SampleCount,
    SamplerAddressMode,
};
pub use cgpu_core::{
    BufferHandle, CommandBufferHandle, DeviceHandle, FenceHandle, ImageHandle, PipelineHandle,
    SamplerHandle, ShaderHandle,
};

pub use command::{BufferBarrier, ImageBarrier, MemoryBarrier};
pub use context::{AppVersion, Cgpu};
pub use descriptor::{BufferBinding, ImageBinding, ResourceBindings, SamplerBinding};
pub use device::{DeviceFeatures, DeviceLimits};
pub use error::{CgpuError, Result};
pub use reflection::{ReflectedBinding, ShaderReflection};
pub use tracking::ImageState;

/// Size sentinel meaning "from the offset to the end of the resource".
pub const WHOLE_SIZE: u64 = u64::MAX;

/// Number of timestamp queries in each device's query pool.
pub const MAX_TIMESTAMP_QUERIES: u32 = 32;
