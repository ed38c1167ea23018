use ash::vk;
use gpu_allocator::AllocationError;

use cgpu_core::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum CgpuError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("unable to load the Vulkan loader: {0}")]
    LoaderUnavailable(#[from] ash::LoadingError),

    #[error("Vulkan {required} required, {found} available")]
    ApiVersionUnsupported { required: String, found: String },

    #[error("{what} limit of {limit} exceeded (got {actual})")]
    LimitExceeded {
        what: &'static str,
        limit: usize,
        actual: usize,
    },

    #[error("no physical device at index {index} ({count} available)")]
    NoDeviceAtIndex { index: u32, count: usize },

    #[error("device feature requirements not met: {0}")]
    FeatureRequirementsNotMet(&'static str),

    #[error("device has no queue family supporting compute and transfer")]
    NoComputeQueueFamily,

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    // Native object creation, one variant per object type.
    #[error("unable to create instance: {0}")]
    InstanceCreation(vk::Result),

    #[error("unable to create logical device: {0}")]
    DeviceCreation(vk::Result),

    #[error("unable to create command pool: {0}")]
    CommandPoolCreation(vk::Result),

    #[error("unable to create sampler: {0}")]
    SamplerCreation(vk::Result),

    #[error("unable to create query pool: {0}")]
    QueryPoolCreation(vk::Result),

    #[error("unable to create memory allocator: {0}")]
    AllocatorCreation(AllocationError),

    #[error("unable to create buffer: {0}")]
    BufferCreation(vk::Result),

    #[error("unable to allocate buffer memory: {0}")]
    BufferAllocation(AllocationError),

    #[error("unable to create image: {0}")]
    ImageCreation(vk::Result),

    #[error("unable to allocate image memory: {0}")]
    ImageAllocation(AllocationError),

    #[error("unable to create image view: {0}")]
    ImageViewCreation(vk::Result),

    #[error("unable to bind memory: {0}")]
    MemoryBind(vk::Result),

    #[error("requested memory properties {requested:?} unavailable, got {actual:?}")]
    MemoryPropertiesUnavailable {
        requested: vk::MemoryPropertyFlags,
        actual: vk::MemoryPropertyFlags,
    },

    #[error("invalid SPIR-V: {0}")]
    InvalidShaderCode(String),

    #[error("unable to create shader module: {0}")]
    ShaderModuleCreation(vk::Result),

    #[error("unable to reflect shader: {0}")]
    ShaderReflection(String),

    #[error("invalid entry point name: {0:?}")]
    InvalidEntryPoint(String),

    #[error("unable to create descriptor set layout: {0}")]
    DescriptorSetLayoutCreation(vk::Result),

    #[error("unable to create pipeline layout: {0}")]
    PipelineLayoutCreation(vk::Result),

    #[error("unable to create compute pipeline: {0}")]
    ComputePipelineCreation(vk::Result),

    #[error("unable to create descriptor pool: {0}")]
    DescriptorPoolCreation(vk::Result),

    #[error("unable to allocate descriptor set: {0}")]
    DescriptorSetAllocation(vk::Result),

    #[error("unsupported descriptor type {descriptor_type:?} at binding {binding}")]
    UnsupportedDescriptorType {
        binding: u32,
        descriptor_type: vk::DescriptorType,
    },

    #[error("unable to create fence: {0}")]
    FenceCreation(vk::Result),

    #[error("unable to allocate command buffer: {0}")]
    CommandBufferAllocation(vk::Result),

    // Operational preconditions.
    #[error("buffer offset {offset} is not a multiple of {alignment}")]
    BufferOffsetNotAligned { offset: u64, alignment: u64 },

    #[error("no matching resource for descriptor binding {binding}")]
    DescriptorSetBindingMismatch { binding: u32 },

    #[error("range {offset}+{size} exceeds buffer size {buffer_size}")]
    BufferRangeOutOfBounds {
        offset: u64,
        size: u64,
        buffer_size: u64,
    },

    #[error("push constant size mismatch: pipeline expects {expected} bytes, got {actual}")]
    PushConstantSizeMismatch { expected: u32, actual: usize },

    #[error("no pipeline bound to command buffer")]
    NoPipelineBound,

    // Recording, memory access and synchronization.
    #[error("unable to begin command buffer: {0}")]
    CommandBufferBegin(vk::Result),

    #[error("unable to end command buffer: {0}")]
    CommandBufferEnd(vk::Result),

    #[error("unable to map memory: {0}")]
    MemoryMap(&'static str),

    #[error("unable to flush mapped memory: {0}")]
    MemoryFlush(vk::Result),

    #[error("unable to invalidate mapped memory: {0}")]
    MemoryInvalidate(vk::Result),

    #[error("unable to reset fence: {0}")]
    FenceReset(vk::Result),

    #[error("unable to wait for fence: {0}")]
    FenceWait(vk::Result),

    #[error("unable to submit command buffer: {0}")]
    Submission(vk::Result),

    #[error("unable to wait for device idle: {0}")]
    DeviceWaitIdle(vk::Result),
}

pub type Result<T, E = CgpuError> = std::result::Result<T, E>;
