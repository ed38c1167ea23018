//! Descriptor layout synthesis from reflection and descriptor set updates.

use ash::vk;
use tracing::debug;

use cgpu_core::{BufferHandle, DeviceHandle, ImageHandle, PipelineHandle, SamplerHandle};

use crate::buffer::resolve_range;
use crate::context::{check_owner, Cgpu};
use crate::error::{CgpuError, Result};
use crate::reflection::{ReflectedBinding, ShaderReflection};
use crate::tracking::required_layout;

/// `count` is forced to 1 in layouts; bindings must stay below this.
pub const MAX_DESCRIPTOR_SET_LAYOUT_BINDINGS: usize = 128;

/// Descriptor types the pool can be sized for, in pool-size-table order.
const POOLED_TYPES: [vk::DescriptorType; 5] = [
    vk::DescriptorType::STORAGE_BUFFER,
    vk::DescriptorType::STORAGE_IMAGE,
    vk::DescriptorType::SAMPLED_IMAGE,
    vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
    vk::DescriptorType::SAMPLER,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferBinding {
    pub binding: u32,
    pub buffer: BufferHandle,
    pub offset: u64,
    /// Byte count, or [`WHOLE_SIZE`](crate::WHOLE_SIZE) for the rest of the buffer.
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageBinding {
    pub binding: u32,
    pub image: ImageHandle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerBinding {
    pub binding: u32,
    pub sampler: SamplerHandle,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceBindings<'a> {
    pub buffers: &'a [BufferBinding],
    pub images: &'a [ImageBinding],
    pub samplers: &'a [SamplerBinding],
}

/// Exact pool sizes for one set: one entry per descriptor type actually used.
pub fn descriptor_pool_sizes(reflection: &ShaderReflection) -> Result<Vec<vk::DescriptorPoolSize>> {
    let mut counts = [0u32; POOLED_TYPES.len()];
    for binding in &reflection.bindings {
        let slot = POOLED_TYPES
            .iter()
            .position(|ty| *ty == binding.descriptor_type)
            .ok_or(CgpuError::UnsupportedDescriptorType {
                binding: binding.binding,
                descriptor_type: binding.descriptor_type,
            })?;
        counts[slot] += 1;
    }

    Ok(POOLED_TYPES
        .iter()
        .zip(counts)
        .filter(|(_, count)| *count > 0)
        .map(|(ty, count)| vk::DescriptorPoolSize {
            ty: *ty,
            descriptor_count: count,
        })
        .collect())
}

pub fn layout_bindings(reflection: &ShaderReflection) -> Vec<vk::DescriptorSetLayoutBinding<'static>> {
    reflection
        .bindings
        .iter()
        .map(|b: &ReflectedBinding| {
            vk::DescriptorSetLayoutBinding::default()
                .binding(b.binding)
                .descriptor_type(b.descriptor_type)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::COMPUTE)
        })
        .collect()
}

/// A zero-size range is rejected by some drivers, so none is emitted then.
pub fn push_constant_ranges(size: u32) -> Vec<vk::PushConstantRange> {
    if size == 0 {
        return Vec::new();
    }
    vec![vk::PushConstantRange {
        stage_flags: vk::ShaderStageFlags::COMPUTE,
        offset: 0,
        size,
    }]
}

pub fn check_storage_buffer_offset(offset: u64, alignment: u64) -> Result<()> {
    if offset % alignment.max(1) != 0 {
        return Err(CgpuError::BufferOffsetNotAligned { offset, alignment });
    }
    Ok(())
}

fn expect_type(
    reflection: &ShaderReflection,
    binding: u32,
    accepted: &[vk::DescriptorType],
) -> Result<vk::DescriptorType> {
    reflection
        .binding(binding)
        .map(|b| b.descriptor_type)
        .filter(|ty| accepted.contains(ty))
        .ok_or(CgpuError::DescriptorSetBindingMismatch { binding })
}

impl Cgpu {
    /// Write buffers, images and samplers into the pipeline's descriptor set and
    /// remember which image sits at each binding for dispatch-time tracking.
    pub fn update_resources(
        &mut self,
        device: DeviceHandle,
        pipeline: PipelineHandle,
        bindings: &ResourceBindings<'_>,
    ) -> Result<()> {
        let dev = self.devices.resolve(device)?;
        let pipe = self.pipelines.resolve_mut(pipeline)?;
        check_owner(&*pipe, device)?;
        let reflection = &self.shaders.resolve(pipe.shader)?.reflection;

        let mut buffer_infos = Vec::with_capacity(bindings.buffers.len());
        for b in bindings.buffers {
            let ty = expect_type(reflection, b.binding, &[vk::DescriptorType::STORAGE_BUFFER])?;
            let buffer = self.buffers.resolve(b.buffer)?;
            check_owner(buffer, device)?;
            check_storage_buffer_offset(b.offset, dev.limits.min_storage_buffer_offset_alignment)?;
            let range = resolve_range(b.offset, b.size, buffer.size)?;
            if range == 0 {
                return Err(CgpuError::BufferRangeOutOfBounds {
                    offset: b.offset,
                    size: b.size,
                    buffer_size: buffer.size,
                });
            }
            buffer_infos.push((
                b.binding,
                ty,
                [vk::DescriptorBufferInfo {
                    buffer: buffer.buffer,
                    offset: b.offset,
                    range,
                }],
            ));
        }

        let mut image_infos = Vec::with_capacity(bindings.images.len() + bindings.samplers.len());
        for i in bindings.images {
            let ty = expect_type(
                reflection,
                i.binding,
                &[
                    vk::DescriptorType::STORAGE_IMAGE,
                    vk::DescriptorType::SAMPLED_IMAGE,
                    vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                ],
            )?;
            let image = self.images.resolve(i.image)?;
            check_owner(image, device)?;
            let image_layout =
                required_layout(ty).ok_or(CgpuError::DescriptorSetBindingMismatch { binding: i.binding })?;
            let sampler = if ty == vk::DescriptorType::COMBINED_IMAGE_SAMPLER {
                dev.default_sampler
            } else {
                vk::Sampler::null()
            };
            image_infos.push((
                i.binding,
                ty,
                [vk::DescriptorImageInfo {
                    sampler,
                    image_view: image.view,
                    image_layout,
                }],
            ));
        }
        for s in bindings.samplers {
            let ty = expect_type(reflection, s.binding, &[vk::DescriptorType::SAMPLER])?;
            let sampler = self.samplers.resolve(s.sampler)?;
            check_owner(sampler, device)?;
            image_infos.push((
                s.binding,
                ty,
                [vk::DescriptorImageInfo {
                    sampler: sampler.sampler,
                    image_view: vk::ImageView::null(),
                    image_layout: vk::ImageLayout::UNDEFINED,
                }],
            ));
        }

        let writes: Vec<vk::WriteDescriptorSet<'_>> = buffer_infos
            .iter()
            .map(|(binding, ty, info)| {
                vk::WriteDescriptorSet::default()
                    .dst_set(pipe.descriptor_set)
                    .dst_binding(*binding)
                    .descriptor_type(*ty)
                    .buffer_info(info)
            })
            .chain(image_infos.iter().map(|(binding, ty, info)| {
                vk::WriteDescriptorSet::default()
                    .dst_set(pipe.descriptor_set)
                    .dst_binding(*binding)
                    .descriptor_type(*ty)
                    .image_info(info)
            }))
            .collect();

        if !writes.is_empty() {
            unsafe { dev.device.update_descriptor_sets(&writes, &[]) };
        }

        pipe.bound_images = bindings.images.iter().map(|i| (i.binding, i.image)).collect();
        debug!(
            "updated pipeline {:?}: {} buffer(s), {} image(s), {} sampler(s)",
            pipeline,
            bindings.buffers.len(),
            bindings.images.len(),
            bindings.samplers.len()
        );
        Ok(())
    }
}
