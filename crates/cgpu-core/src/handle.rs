use std::fmt;

/// An opaque handle that identifies a slot in a [`ResourceStore`](crate::ResourceStore).
///
/// The low 32 bits hold the slot index plus one, the high 32 bits hold the slot
/// generation at allocation time. Zero is reserved for the null handle.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Handle(u64);

impl Handle {
    pub const NULL: Handle = Handle(0);

    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64 + 1))
    }

    /// Reconstruct a handle from a raw value previously returned by [`Handle::raw`].
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }

    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Slot index, or `None` for the null handle.
    pub fn index(self) -> Option<u32> {
        let low = self.0 as u32;
        low.checked_sub(1)
    }

    pub fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index() {
            Some(index) => write!(f, "Handle({}v{})", index, self.generation()),
            None => write!(f, "Handle(NULL)"),
        }
    }
}

/// Resource kinds backed by their own store. Used for error messages and debugging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Device,
    Buffer,
    Image,
    Shader,
    Pipeline,
    CommandBuffer,
    Fence,
    Sampler,
}

impl ResourceKind {
    pub fn name(self) -> &'static str {
        match self {
            ResourceKind::Device => "device",
            ResourceKind::Buffer => "buffer",
            ResourceKind::Image => "image",
            ResourceKind::Shader => "shader",
            ResourceKind::Pipeline => "pipeline",
            ResourceKind::CommandBuffer => "command buffer",
            ResourceKind::Fence => "fence",
            ResourceKind::Sampler => "sampler",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed wrapper around [`Handle`]. Each resource kind gets its own store and
/// its own handle type, so a buffer handle cannot be passed where an image is expected.
pub trait StoreHandle: Copy + Eq + fmt::Debug {
    const KIND: ResourceKind;

    fn from_handle(handle: Handle) -> Self;
    fn handle(self) -> Handle;
}

macro_rules! typed_handle {
    ($name:ident, $kind:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(Handle);

        impl $name {
            pub const NULL: $name = $name(Handle::NULL);

            pub fn raw(self) -> u64 {
                self.0.raw()
            }

            pub fn is_null(self) -> bool {
                self.0.is_null()
            }
        }

        impl StoreHandle for $name {
            const KIND: ResourceKind = ResourceKind::$kind;

            fn from_handle(handle: Handle) -> Self {
                $name(handle)
            }

            fn handle(self) -> Handle {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({:?})"), self.0)
            }
        }
    };
}

typed_handle!(DeviceHandle, Device);
typed_handle!(BufferHandle, Buffer);
typed_handle!(ImageHandle, Image);
typed_handle!(ShaderHandle, Shader);
typed_handle!(PipelineHandle, Pipeline);
typed_handle!(CommandBufferHandle, CommandBuffer);
typed_handle!(FenceHandle, Fence);
typed_handle!(SamplerHandle, Sampler);
