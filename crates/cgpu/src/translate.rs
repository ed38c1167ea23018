//! Fixed lookup tables between the abstract flag sets and Vulkan.

use ash::vk;

use cgpu_core::flags::{
    BufferUsage, ImageFormat, ImageUsage, MemoryAccess, MemoryProperties, SampleCount,
    SamplerAddressMode,
};

const BUFFER_USAGE_TABLE: &[(BufferUsage, vk::BufferUsageFlags)] = &[
    (BufferUsage::TRANSFER_SRC, vk::BufferUsageFlags::TRANSFER_SRC),
    (BufferUsage::TRANSFER_DST, vk::BufferUsageFlags::TRANSFER_DST),
    (BufferUsage::UNIFORM_TEXEL, vk::BufferUsageFlags::UNIFORM_TEXEL_BUFFER),
    (BufferUsage::STORAGE_TEXEL, vk::BufferUsageFlags::STORAGE_TEXEL_BUFFER),
    (BufferUsage::UNIFORM, vk::BufferUsageFlags::UNIFORM_BUFFER),
    (BufferUsage::STORAGE, vk::BufferUsageFlags::STORAGE_BUFFER),
];

const IMAGE_USAGE_TABLE: &[(ImageUsage, vk::ImageUsageFlags)] = &[
    (ImageUsage::TRANSFER_SRC, vk::ImageUsageFlags::TRANSFER_SRC),
    (ImageUsage::TRANSFER_DST, vk::ImageUsageFlags::TRANSFER_DST),
    (ImageUsage::SAMPLED, vk::ImageUsageFlags::SAMPLED),
    (ImageUsage::STORAGE, vk::ImageUsageFlags::STORAGE),
];

const MEMORY_PROPERTY_TABLE: &[(MemoryProperties, vk::MemoryPropertyFlags)] = &[
    (MemoryProperties::DEVICE_LOCAL, vk::MemoryPropertyFlags::DEVICE_LOCAL),
    (MemoryProperties::HOST_VISIBLE, vk::MemoryPropertyFlags::HOST_VISIBLE),
    (MemoryProperties::HOST_COHERENT, vk::MemoryPropertyFlags::HOST_COHERENT),
    (MemoryProperties::HOST_CACHED, vk::MemoryPropertyFlags::HOST_CACHED),
];

const ACCESS_TABLE: &[(MemoryAccess, vk::AccessFlags)] = &[
    (MemoryAccess::UNIFORM_READ, vk::AccessFlags::UNIFORM_READ),
    (MemoryAccess::SHADER_READ, vk::AccessFlags::SHADER_READ),
    (MemoryAccess::SHADER_WRITE, vk::AccessFlags::SHADER_WRITE),
    (MemoryAccess::TRANSFER_READ, vk::AccessFlags::TRANSFER_READ),
    (MemoryAccess::TRANSFER_WRITE, vk::AccessFlags::TRANSFER_WRITE),
    (MemoryAccess::HOST_READ, vk::AccessFlags::HOST_READ),
    (MemoryAccess::HOST_WRITE, vk::AccessFlags::HOST_WRITE),
    (MemoryAccess::MEMORY_READ, vk::AccessFlags::MEMORY_READ),
    (MemoryAccess::MEMORY_WRITE, vk::AccessFlags::MEMORY_WRITE),
];

const FORMAT_TABLE: &[(ImageFormat, vk::Format)] = &[
    (ImageFormat::Undefined, vk::Format::UNDEFINED),
    (ImageFormat::R8Unorm, vk::Format::R8_UNORM),
    (ImageFormat::R8Snorm, vk::Format::R8_SNORM),
    (ImageFormat::R8Uint, vk::Format::R8_UINT),
    (ImageFormat::R8Sint, vk::Format::R8_SINT),
    (ImageFormat::R8G8Unorm, vk::Format::R8G8_UNORM),
    (ImageFormat::R8G8Snorm, vk::Format::R8G8_SNORM),
    (ImageFormat::R8G8Uint, vk::Format::R8G8_UINT),
    (ImageFormat::R8G8Sint, vk::Format::R8G8_SINT),
    (ImageFormat::R8G8B8A8Unorm, vk::Format::R8G8B8A8_UNORM),
    (ImageFormat::R8G8B8A8Snorm, vk::Format::R8G8B8A8_SNORM),
    (ImageFormat::R8G8B8A8Uint, vk::Format::R8G8B8A8_UINT),
    (ImageFormat::R8G8B8A8Sint, vk::Format::R8G8B8A8_SINT),
    (ImageFormat::R8G8B8A8Srgb, vk::Format::R8G8B8A8_SRGB),
    (ImageFormat::B8G8R8A8Unorm, vk::Format::B8G8R8A8_UNORM),
    (ImageFormat::B8G8R8A8Srgb, vk::Format::B8G8R8A8_SRGB),
    (ImageFormat::A2B10G10R10UnormPack32, vk::Format::A2B10G10R10_UNORM_PACK32),
    (ImageFormat::R16Unorm, vk::Format::R16_UNORM),
    (ImageFormat::R16Sfloat, vk::Format::R16_SFLOAT),
    (ImageFormat::R16Uint, vk::Format::R16_UINT),
    (ImageFormat::R16Sint, vk::Format::R16_SINT),
    (ImageFormat::R16G16Unorm, vk::Format::R16G16_UNORM),
    (ImageFormat::R16G16Sfloat, vk::Format::R16G16_SFLOAT),
    (ImageFormat::R16G16Uint, vk::Format::R16G16_UINT),
    (ImageFormat::R16G16Sint, vk::Format::R16G16_SINT),
    (ImageFormat::R16G16B16A16Unorm, vk::Format::R16G16B16A16_UNORM),
    (ImageFormat::R16G16B16A16Sfloat, vk::Format::R16G16B16A16_SFLOAT),
    (ImageFormat::R16G16B16A16Uint, vk::Format::R16G16B16A16_UINT),
    (ImageFormat::R16G16B16A16Sint, vk::Format::R16G16B16A16_SINT),
    (ImageFormat::R32Uint, vk::Format::R32_UINT),
    (ImageFormat::R32Sint, vk::Format::R32_SINT),
    (ImageFormat::R32Sfloat, vk::Format::R32_SFLOAT),
    (ImageFormat::R32G32Uint, vk::Format::R32G32_UINT),
    (ImageFormat::R32G32Sint, vk::Format::R32G32_SINT),
    (ImageFormat::R32G32Sfloat, vk::Format::R32G32_SFLOAT),
    (ImageFormat::R32G32B32Uint, vk::Format::R32G32B32_UINT),
    (ImageFormat::R32G32B32Sint, vk::Format::R32G32B32_SINT),
    (ImageFormat::R32G32B32Sfloat, vk::Format::R32G32B32_SFLOAT),
    (ImageFormat::R32G32B32A32Uint, vk::Format::R32G32B32A32_UINT),
    (ImageFormat::R32G32B32A32Sint, vk::Format::R32G32B32A32_SINT),
    (ImageFormat::R32G32B32A32Sfloat, vk::Format::R32G32B32A32_SFLOAT),
    (ImageFormat::B10G11R11UfloatPack32, vk::Format::B10G11R11_UFLOAT_PACK32),
    (ImageFormat::E5B9G9R9UfloatPack32, vk::Format::E5B9G9R9_UFLOAT_PACK32),
    (ImageFormat::D32Sfloat, vk::Format::D32_SFLOAT),
    (ImageFormat::Bc1RgbaUnorm, vk::Format::BC1_RGBA_UNORM_BLOCK),
    (ImageFormat::Bc1RgbaSrgb, vk::Format::BC1_RGBA_SRGB_BLOCK),
    (ImageFormat::Bc3Unorm, vk::Format::BC3_UNORM_BLOCK),
    (ImageFormat::Bc3Srgb, vk::Format::BC3_SRGB_BLOCK),
    (ImageFormat::Bc5Unorm, vk::Format::BC5_UNORM_BLOCK),
    (ImageFormat::Bc6hUfloat, vk::Format::BC6H_UFLOAT_BLOCK),
    (ImageFormat::Bc7Unorm, vk::Format::BC7_UNORM_BLOCK),
    (ImageFormat::Bc7Srgb, vk::Format::BC7_SRGB_BLOCK),
];

pub fn buffer_usage(usage: BufferUsage) -> vk::BufferUsageFlags {
    BUFFER_USAGE_TABLE
        .iter()
        .filter(|(flag, _)| usage.contains(*flag))
        .fold(vk::BufferUsageFlags::empty(), |acc, (_, native)| acc | *native)
}

pub fn image_usage(usage: ImageUsage) -> vk::ImageUsageFlags {
    IMAGE_USAGE_TABLE
        .iter()
        .filter(|(flag, _)| usage.contains(*flag))
        .fold(vk::ImageUsageFlags::empty(), |acc, (_, native)| acc | *native)
}

pub fn memory_properties(properties: MemoryProperties) -> vk::MemoryPropertyFlags {
    MEMORY_PROPERTY_TABLE
        .iter()
        .filter(|(flag, _)| properties.contains(*flag))
        .fold(vk::MemoryPropertyFlags::empty(), |acc, (_, native)| acc | *native)
}

/// Native bits without an abstract counterpart are dropped.
pub fn memory_properties_from_vk(native: vk::MemoryPropertyFlags) -> MemoryProperties {
    MEMORY_PROPERTY_TABLE
        .iter()
        .filter(|(_, bits)| native.contains(*bits))
        .fold(MemoryProperties::empty(), |acc, (flag, _)| acc | *flag)
}

pub fn access_flags(access: MemoryAccess) -> vk::AccessFlags {
    ACCESS_TABLE
        .iter()
        .filter(|(flag, _)| access.contains(*flag))
        .fold(vk::AccessFlags::empty(), |acc, (_, native)| acc | *native)
}

pub fn access_flags_from_vk(native: vk::AccessFlags) -> MemoryAccess {
    ACCESS_TABLE
        .iter()
        .filter(|(_, bits)| native.contains(*bits))
        .fold(MemoryAccess::empty(), |acc, (flag, _)| acc | *flag)
}

pub fn format(format: ImageFormat) -> vk::Format {
    FORMAT_TABLE
        .iter()
        .find(|(f, _)| *f == format)
        .map(|(_, native)| *native)
        .unwrap_or(vk::Format::UNDEFINED)
}

/// Formats outside the table map to `ImageFormat::Undefined`.
pub fn format_from_vk(native: vk::Format) -> ImageFormat {
    FORMAT_TABLE
        .iter()
        .find(|(_, n)| *n == native)
        .map(|(f, _)| *f)
        .unwrap_or(ImageFormat::Undefined)
}

/// Bytes per texel block and the block's edge length in texels, or `None` for `Undefined`.
pub fn texel_block(format: ImageFormat) -> Option<(u64, u32)> {
    use ImageFormat::*;
    let block = match format {
        Undefined => return None,
        R8Unorm | R8Snorm | R8Uint | R8Sint => (1, 1),
        R8G8Unorm | R8G8Snorm | R8G8Uint | R8G8Sint => (2, 1),
        R16Unorm | R16Sfloat | R16Uint | R16Sint => (2, 1),
        R8G8B8A8Unorm | R8G8B8A8Snorm | R8G8B8A8Uint | R8G8B8A8Sint | R8G8B8A8Srgb => (4, 1),
        B8G8R8A8Unorm | B8G8R8A8Srgb | A2B10G10R10UnormPack32 => (4, 1),
        R16G16Unorm | R16G16Sfloat | R16G16Uint | R16G16Sint => (4, 1),
        R32Uint | R32Sint | R32Sfloat | D32Sfloat => (4, 1),
        B10G11R11UfloatPack32 | E5B9G9R9UfloatPack32 => (4, 1),
        R16G16B16A16Unorm | R16G16B16A16Sfloat | R16G16B16A16Uint | R16G16B16A16Sint => (8, 1),
        R32G32Uint | R32G32Sint | R32G32Sfloat => (8, 1),
        R32G32B32Uint | R32G32B32Sint | R32G32B32Sfloat => (12, 1),
        R32G32B32A32Uint | R32G32B32A32Sint | R32G32B32A32Sfloat => (16, 1),
        Bc1RgbaUnorm | Bc1RgbaSrgb => (8, 4),
        Bc3Unorm | Bc3Srgb | Bc5Unorm | Bc6hUfloat | Bc7Unorm | Bc7Srgb => (16, 4),
    };
    Some(block)
}

/// Bytes a tightly packed copy of a `width` x `height` image occupies.
pub fn packed_image_size(format: ImageFormat, width: u32, height: u32) -> Option<u64> {
    let (bytes, edge) = texel_block(format)?;
    let blocks_x = u64::from(width.div_ceil(edge));
    let blocks_y = u64::from(height.div_ceil(edge));
    Some(blocks_x * blocks_y * bytes)
}

pub fn sample_count(count: SampleCount) -> vk::SampleCountFlags {
    match count {
        SampleCount::X1 => vk::SampleCountFlags::TYPE_1,
        SampleCount::X2 => vk::SampleCountFlags::TYPE_2,
        SampleCount::X4 => vk::SampleCountFlags::TYPE_4,
        SampleCount::X8 => vk::SampleCountFlags::TYPE_8,
        SampleCount::X16 => vk::SampleCountFlags::TYPE_16,
        SampleCount::X32 => vk::SampleCountFlags::TYPE_32,
        SampleCount::X64 => vk::SampleCountFlags::TYPE_64,
    }
}

/// The clamp-to-black mode is expressed as clamp-to-border; the caller picks the border color.
pub fn address_mode(mode: SamplerAddressMode) -> vk::SamplerAddressMode {
    match mode {
        SamplerAddressMode::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        SamplerAddressMode::Repeat => vk::SamplerAddressMode::REPEAT,
        SamplerAddressMode::MirrorRepeat => vk::SamplerAddressMode::MIRRORED_REPEAT,
        SamplerAddressMode::ClampToBlack => vk::SamplerAddressMode::CLAMP_TO_BORDER,
    }
}
