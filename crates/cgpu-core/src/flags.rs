//! Backend-independent flag sets and enums.
//!
//! These are the only values that cross the API boundary. The Vulkan backend
//! translates them to native bits through fixed lookup tables.

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemoryProperties: u32 {
        const DEVICE_LOCAL = 0x1;
        const HOST_VISIBLE = 0x2;
        const HOST_COHERENT = 0x4;
        const HOST_CACHED = 0x8;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemoryAccess: u32 {
        const UNIFORM_READ = 0x1;
        const SHADER_READ = 0x2;
        const SHADER_WRITE = 0x4;
        const TRANSFER_READ = 0x8;
        const TRANSFER_WRITE = 0x10;
        const HOST_READ = 0x20;
        const HOST_WRITE = 0x40;
        const MEMORY_READ = 0x80;
        const MEMORY_WRITE = 0x100;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const TRANSFER_SRC = 0x1;
        const TRANSFER_DST = 0x2;
        const UNIFORM_TEXEL = 0x4;
        const STORAGE_TEXEL = 0x8;
        const UNIFORM = 0x10;
        const STORAGE = 0x20;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageUsage: u32 {
        const TRANSFER_SRC = 0x1;
        const TRANSFER_DST = 0x2;
        const SAMPLED = 0x4;
        const STORAGE = 0x8;
    }
}

impl ImageUsage {
    /// Pure transfer images are the only ones given linear tiling.
    pub fn is_transfer_only(self) -> bool {
        self == ImageUsage::TRANSFER_SRC || self == ImageUsage::TRANSFER_DST
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SampleCount {
    #[default]
    X1,
    X2,
    X4,
    X8,
    X16,
    X32,
    X64,
}

impl SampleCount {
    pub fn samples(self) -> u32 {
        match self {
            SampleCount::X1 => 1,
            SampleCount::X2 => 2,
            SampleCount::X4 => 4,
            SampleCount::X8 => 8,
            SampleCount::X16 => 16,
            SampleCount::X32 => 32,
            SampleCount::X64 => 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SamplerAddressMode {
    ClampToEdge,
    #[default]
    Repeat,
    MirrorRepeat,
    /// Clamp to an opaque black border.
    ClampToBlack,
}

macro_rules! image_formats {
    ($($variant:ident),+ $(,)?) => {
        /// Image formats understood by the backend. Discriminants are stable and
        /// form the raw encoding accepted by [`ImageFormat::from_raw`].
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        #[repr(u32)]
        pub enum ImageFormat {
            #[default]
            Undefined,
            $($variant,)+
        }

        impl ImageFormat {
            pub const ALL: &'static [ImageFormat] = &[ImageFormat::Undefined, $(ImageFormat::$variant,)+];

            /// Unknown raw values map to `Undefined`.
            pub fn from_raw(raw: u32) -> Self {
                Self::ALL.get(raw as usize).copied().unwrap_or(ImageFormat::Undefined)
            }

            pub fn raw(self) -> u32 {
                self as u32
            }
        }
    };
}

image_formats!(
    R8Unorm,
    R8Snorm,
    R8Uint,
    R8Sint,
    R8G8Unorm,
    R8G8Snorm,
    R8G8Uint,
    R8G8Sint,
    R8G8B8A8Unorm,
    R8G8B8A8Snorm,
    R8G8B8A8Uint,
    R8G8B8A8Sint,
    R8G8B8A8Srgb,
    B8G8R8A8Unorm,
    B8G8R8A8Srgb,
    A2B10G10R10UnormPack32,
    R16Unorm,
    R16Sfloat,
    R16Uint,
    R16Sint,
    R16G16Unorm,
    R16G16Sfloat,
    R16G16Uint,
    R16G16Sint,
    R16G16B16A16Unorm,
    R16G16B16A16Sfloat,
    R16G16B16A16Uint,
    R16G16B16A16Sint,
    R32Uint,
    R32Sint,
    R32Sfloat,
    R32G32Uint,
    R32G32Sint,
    R32G32Sfloat,
    R32G32B32Uint,
    R32G32B32Sint,
    R32G32B32Sfloat,
    R32G32B32A32Uint,
    R32G32B32A32Sint,
    R32G32B32A32Sfloat,
    B10G11R11UfloatPack32,
    E5B9G9R9UfloatPack32,
    D32Sfloat,
    Bc1RgbaUnorm,
    Bc1RgbaSrgb,
    Bc3Unorm,
    Bc3Srgb,
    Bc5Unorm,
    Bc6hUfloat,
    Bc7Unorm,
    Bc7Srgb,
);
