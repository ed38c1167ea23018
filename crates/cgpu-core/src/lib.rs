pub mod config;
pub mod error;
pub mod flags;
pub mod handle;
pub mod store;

pub use error::CoreError;
pub use handle::{
    BufferHandle, CommandBufferHandle, DeviceHandle, FenceHandle, Handle, ImageHandle,
    PipelineHandle, ResourceKind, SamplerHandle, ShaderHandle, StoreHandle,
};
pub use store::ResourceStore;
