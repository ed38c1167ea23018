use std::collections::BTreeMap;

use ash::vk;
use bytemuck::Pod;
use tracing::debug;

use cgpu_core::flags::MemoryAccess;
use cgpu_core::{BufferHandle, CommandBufferHandle, DeviceHandle, ImageHandle, PipelineHandle};

use crate::buffer::resolve_range;
use crate::context::{check_owner, destroy_child, Cgpu, DeviceChild};
use crate::device::DeviceResource;
use crate::error::{CgpuError, Result};
use crate::tracking::{image_barrier, plan_shader_transitions, ImageState};
use crate::{translate, MAX_TIMESTAMP_QUERIES, WHOLE_SIZE};

/// Largest payload accepted by `vkCmdUpdateBuffer`.
pub const MAX_UPDATE_BUFFER_SIZE: usize = 65536;

pub(crate) struct CommandBufferResource {
    pub(crate) command_buffer: vk::CommandBuffer,
    pub(crate) device: DeviceHandle,
    pub(crate) pipeline: Option<PipelineHandle>,
}

impl DeviceChild for CommandBufferResource {
    fn owner(&self) -> DeviceHandle {
        self.device
    }

    fn destroy(self, dev: &mut DeviceResource) {
        unsafe {
            dev.device
                .free_command_buffers(dev.command_pool, &[self.command_buffer])
        };
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryBarrier {
    pub src_access: MemoryAccess,
    pub dst_access: MemoryAccess,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferBarrier {
    pub buffer: BufferHandle,
    pub src_access: MemoryAccess,
    pub dst_access: MemoryAccess,
    pub offset: u64,
    /// Byte count, or [`WHOLE_SIZE`].
    pub size: u64,
}

/// Access-only image barrier. The source side is the image's tracked access
/// mask and the image keeps its tracked layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageBarrier {
    pub image: ImageHandle,
    pub dst_access: MemoryAccess,
}

const BARRIER_STAGES: vk::PipelineStageFlags = vk::PipelineStageFlags::from_raw(
    vk::PipelineStageFlags::COMPUTE_SHADER.as_raw() | vk::PipelineStageFlags::TRANSFER.as_raw(),
);

fn check_timestamp_range(offset: u32, count: u32) -> Result<()> {
    let end = offset as usize + count as usize;
    if end > MAX_TIMESTAMP_QUERIES as usize {
        return Err(CgpuError::LimitExceeded {
            what: "timestamp queries",
            limit: MAX_TIMESTAMP_QUERIES as usize,
            actual: end,
        });
    }
    Ok(())
}

impl Cgpu {
    pub fn create_command_buffer(&mut self, device: DeviceHandle) -> Result<CommandBufferHandle> {
        let dev = self.devices.resolve(device)?;
        let info = vk::CommandBufferAllocateInfo::default()
            .command_pool(dev.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let command_buffer = unsafe { dev.device.allocate_command_buffers(&info) }
            .map_err(CgpuError::CommandBufferAllocation)?
            .into_iter()
            .next()
            .ok_or(CgpuError::CommandBufferAllocation(vk::Result::ERROR_UNKNOWN))?;

        let handle = self.command_buffers.allocate(CommandBufferResource {
            command_buffer,
            device,
            pipeline: None,
        });
        debug!("created command buffer {:?}", handle);
        Ok(handle)
    }

    pub fn destroy_command_buffer(
        &mut self,
        device: DeviceHandle,
        command_buffer: CommandBufferHandle,
    ) -> Result<()> {
        destroy_child(&mut self.devices, &mut self.command_buffers, device, command_buffer)
    }

    /// Start recording. Any previous recording is discarded.
    pub fn begin_command_buffer(&mut self, command_buffer: CommandBufferHandle) -> Result<()> {
        let cmd = self.command_buffers.resolve_mut(command_buffer)?;
        let dev = self.devices.resolve(cmd.device)?;
        cmd.pipeline = None;
        let info = vk::CommandBufferBeginInfo::default();
        unsafe { dev.device.begin_command_buffer(cmd.command_buffer, &info) }
            .map_err(CgpuError::CommandBufferBegin)
    }

    pub fn end_command_buffer(&mut self, command_buffer: CommandBufferHandle) -> Result<()> {
        let cmd = self.command_buffers.resolve(command_buffer)?;
        let dev = self.devices.resolve(cmd.device)?;
        unsafe { dev.device.end_command_buffer(cmd.command_buffer) }
            .map_err(CgpuError::CommandBufferEnd)
    }

    pub fn cmd_bind_pipeline(
        &mut self,
        command_buffer: CommandBufferHandle,
        pipeline: PipelineHandle,
    ) -> Result<()> {
        let cmd = self.command_buffers.resolve_mut(command_buffer)?;
        let dev = self.devices.resolve(cmd.device)?;
        let pipe = self.pipelines.resolve(pipeline)?;
        check_owner(pipe, cmd.device)?;

        unsafe {
            dev.device.cmd_bind_pipeline(
                cmd.command_buffer,
                vk::PipelineBindPoint::COMPUTE,
                pipe.pipeline,
            );
            if pipe.descriptor_set != vk::DescriptorSet::null() {
                dev.device.cmd_bind_descriptor_sets(
                    cmd.command_buffer,
                    vk::PipelineBindPoint::COMPUTE,
                    pipe.layout,
                    0,
                    &[pipe.descriptor_set],
                    &[],
                );
            }
        }
        cmd.pipeline = Some(pipeline);
        Ok(())
    }

    /// Copy `size` bytes (or the rest of `src` for [`WHOLE_SIZE`]) between buffers.
    pub fn cmd_copy_buffer(
        &mut self,
        command_buffer: CommandBufferHandle,
        src: BufferHandle,
        src_offset: u64,
        dst: BufferHandle,
        dst_offset: u64,
        size: u64,
    ) -> Result<()> {
        let cmd = self.command_buffers.resolve(command_buffer)?;
        let dev = self.devices.resolve(cmd.device)?;
        let src_buffer = self.buffers.resolve(src)?;
        let dst_buffer = self.buffers.resolve(dst)?;
        check_owner(src_buffer, cmd.device)?;
        check_owner(dst_buffer, cmd.device)?;

        let size = resolve_range(src_offset, size, src_buffer.size)?;
        if size == 0 {
            return Err(CgpuError::BufferRangeOutOfBounds {
                offset: src_offset,
                size,
                buffer_size: src_buffer.size,
            });
        }
        resolve_range(dst_offset, size, dst_buffer.size)?;

        let region = vk::BufferCopy {
            src_offset,
            dst_offset,
            size,
        };
        unsafe {
            dev.device
                .cmd_copy_buffer(cmd.command_buffer, src_buffer.buffer, dst_buffer.buffer, &[region])
        };
        Ok(())
    }

    /// Copy tightly packed texels into the whole image. The image is moved to the
    /// general layout first if needed. The source must hold every texel from
    /// `buffer_offset` on, and the offset must be a multiple of the texel block size.
    pub fn cmd_copy_buffer_to_image(
        &mut self,
        command_buffer: CommandBufferHandle,
        buffer: BufferHandle,
        buffer_offset: u64,
        image: ImageHandle,
    ) -> Result<()> {
        let cmd = self.command_buffers.resolve(command_buffer)?;
        let dev = self.devices.resolve(cmd.device)?;
        let src = self.buffers.resolve(buffer)?;
        let dst = self.images.resolve_mut(image)?;
        check_owner(src, cmd.device)?;
        check_owner(&*dst, cmd.device)?;

        let (block_bytes, _) = translate::texel_block(dst.format)
            .ok_or(CgpuError::InvalidArgument("image format is undefined"))?;
        if buffer_offset % block_bytes != 0 {
            return Err(CgpuError::InvalidArgument(
                "buffer offset must be a multiple of the texel block size",
            ));
        }
        let texel_bytes = translate::packed_image_size(dst.format, dst.width, dst.height)
            .ok_or(CgpuError::InvalidArgument("image format is undefined"))?;
        resolve_range(buffer_offset, texel_bytes, src.size)?;

        let old = dst.state;
        let new = ImageState {
            layout: vk::ImageLayout::GENERAL,
            access: vk::AccessFlags::TRANSFER_WRITE,
        };
        if old.layout != vk::ImageLayout::GENERAL {
            let barrier = image_barrier(dst.image, old, new);
            unsafe {
                dev.device.cmd_pipeline_barrier(
                    cmd.command_buffer,
                    BARRIER_STAGES,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[barrier],
                )
            };
        }

        let region = vk::BufferImageCopy {
            buffer_offset,
            buffer_row_length: 0,
            buffer_image_height: 0,
            image_subresource: vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            },
            image_offset: vk::Offset3D::default(),
            image_extent: vk::Extent3D {
                width: dst.width,
                height: dst.height,
                depth: 1,
            },
        };
        unsafe {
            dev.device.cmd_copy_buffer_to_image(
                cmd.command_buffer,
                src.buffer,
                dst.image,
                vk::ImageLayout::GENERAL,
                &[region],
            )
        };
        dst.state = new;
        Ok(())
    }

    /// Upload push constants. `data` must cover exactly the reflected push constant block.
    pub fn cmd_push_constants<T: Pod>(
        &mut self,
        command_buffer: CommandBufferHandle,
        pipeline: PipelineHandle,
        data: &[T],
    ) -> Result<()> {
        let cmd = self.command_buffers.resolve(command_buffer)?;
        let dev = self.devices.resolve(cmd.device)?;
        let pipe = self.pipelines.resolve(pipeline)?;
        check_owner(pipe, cmd.device)?;

        let bytes: &[u8] = bytemuck::cast_slice(data);
        if bytes.len() != pipe.push_constants_size as usize {
            return Err(CgpuError::PushConstantSizeMismatch {
                expected: pipe.push_constants_size,
                actual: bytes.len(),
            });
        }
        if bytes.is_empty() {
            return Ok(());
        }
        unsafe {
            dev.device.cmd_push_constants(
                cmd.command_buffer,
                pipe.layout,
                vk::ShaderStageFlags::COMPUTE,
                0,
                bytes,
            )
        };
        Ok(())
    }

    /// Dispatch the bound pipeline, first transitioning every bound image whose
    /// tracked layout differs from what its binding requires.
    pub fn cmd_dispatch(
        &mut self,
        command_buffer: CommandBufferHandle,
        group_count_x: u32,
        group_count_y: u32,
        group_count_z: u32,
    ) -> Result<()> {
        let cmd = self.command_buffers.resolve(command_buffer)?;
        let pipeline = cmd.pipeline.ok_or(CgpuError::NoPipelineBound)?;
        let dev = self.devices.resolve(cmd.device)?;
        let pipe = self.pipelines.resolve(pipeline)?;
        let shader = self.shaders.resolve(pipe.shader)?;

        let transitions =
            plan_shader_transitions(&shader.reflection, &pipe.bound_images, &mut self.images)?;

        if !transitions.is_empty() {
            let mut barriers = Vec::with_capacity(transitions.len());
            for t in &transitions {
                let image = self.images.resolve(t.image)?;
                barriers.push(image_barrier(image.image, t.old, t.new));
            }
            unsafe {
                dev.device.cmd_pipeline_barrier(
                    cmd.command_buffer,
                    vk::PipelineStageFlags::COMPUTE_SHADER,
                    vk::PipelineStageFlags::COMPUTE_SHADER,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &barriers,
                )
            };
            debug!("dispatch on {:?}: {} layout transition(s)", command_buffer, barriers.len());
        }

        unsafe {
            dev.device
                .cmd_dispatch(cmd.command_buffer, group_count_x, group_count_y, group_count_z)
        };
        Ok(())
    }

    /// Record explicit memory, buffer and image barriers between compute and transfer work.
    /// Image barriers keep the tracked layout and replace the tracked access mask.
    /// Every handle is checked before anything is recorded or tracked.
    pub fn cmd_pipeline_barrier(
        &mut self,
        command_buffer: CommandBufferHandle,
        memory_barriers: &[MemoryBarrier],
        buffer_barriers: &[BufferBarrier],
        image_barriers: &[ImageBarrier],
    ) -> Result<()> {
        let cmd = self.command_buffers.resolve(command_buffer)?;
        let dev = self.devices.resolve(cmd.device)?;

        let memory: Vec<vk::MemoryBarrier<'_>> = memory_barriers
            .iter()
            .map(|b| {
                vk::MemoryBarrier::default()
                    .src_access_mask(translate::access_flags(b.src_access))
                    .dst_access_mask(translate::access_flags(b.dst_access))
            })
            .collect();

        let mut buffers = Vec::with_capacity(buffer_barriers.len());
        for b in buffer_barriers {
            let buffer = self.buffers.resolve(b.buffer)?;
            check_owner(buffer, cmd.device)?;
            let size = if b.size == WHOLE_SIZE {
                vk::WHOLE_SIZE
            } else {
                resolve_range(b.offset, b.size, buffer.size)?
            };
            buffers.push(
                vk::BufferMemoryBarrier::default()
                    .src_access_mask(translate::access_flags(b.src_access))
                    .dst_access_mask(translate::access_flags(b.dst_access))
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .buffer(buffer.buffer)
                    .offset(b.offset)
                    .size(size),
            );
        }

        let mut pending: BTreeMap<ImageHandle, ImageState> = BTreeMap::new();
        let mut images = Vec::with_capacity(image_barriers.len());
        for b in image_barriers {
            let image = self.images.resolve(b.image)?;
            check_owner(image, cmd.device)?;
            let old = pending.get(&b.image).copied().unwrap_or(image.state);
            let new = ImageState {
                layout: old.layout,
                access: translate::access_flags(b.dst_access),
            };
            images.push(image_barrier(image.image, old, new));
            pending.insert(b.image, new);
        }

        unsafe {
            dev.device.cmd_pipeline_barrier(
                cmd.command_buffer,
                BARRIER_STAGES,
                BARRIER_STAGES,
                vk::DependencyFlags::empty(),
                &memory,
                &buffers,
                &images,
            )
        };

        for (handle, state) in pending {
            self.images.resolve_mut(handle)?.state = state;
        }
        Ok(())
    }

    /// Inline update of a small buffer range. Offset and size must be multiples of 4.
    pub fn cmd_update_buffer<T: Pod>(
        &mut self,
        command_buffer: CommandBufferHandle,
        buffer: BufferHandle,
        offset: u64,
        data: &[T],
    ) -> Result<()> {
        let cmd = self.command_buffers.resolve(command_buffer)?;
        let dev = self.devices.resolve(cmd.device)?;
        let dst = self.buffers.resolve(buffer)?;
        check_owner(dst, cmd.device)?;

        let bytes: &[u8] = bytemuck::cast_slice(data);
        if bytes.is_empty() || bytes.len() > MAX_UPDATE_BUFFER_SIZE {
            return Err(CgpuError::InvalidArgument("update size must be 1..=65536 bytes"));
        }
        if bytes.len() % 4 != 0 || offset % 4 != 0 {
            return Err(CgpuError::InvalidArgument("update offset and size must be multiples of 4"));
        }
        resolve_range(offset, bytes.len() as u64, dst.size)?;

        unsafe {
            dev.device
                .cmd_update_buffer(cmd.command_buffer, dst.buffer, offset, bytes)
        };
        Ok(())
    }

    pub fn cmd_reset_timestamps(
        &mut self,
        command_buffer: CommandBufferHandle,
        offset: u32,
        count: u32,
    ) -> Result<()> {
        check_timestamp_range(offset, count)?;
        let cmd = self.command_buffers.resolve(command_buffer)?;
        let dev = self.devices.resolve(cmd.device)?;
        unsafe {
            dev.device
                .cmd_reset_query_pool(cmd.command_buffer, dev.timestamp_pool, offset, count)
        };
        Ok(())
    }

    pub fn cmd_write_timestamp(
        &mut self,
        command_buffer: CommandBufferHandle,
        index: u32,
    ) -> Result<()> {
        check_timestamp_range(index, 1)?;
        let cmd = self.command_buffers.resolve(command_buffer)?;
        let dev = self.devices.resolve(cmd.device)?;
        unsafe {
            dev.device.cmd_write_timestamp(
                cmd.command_buffer,
                vk::PipelineStageFlags::COMPUTE_SHADER,
                dev.timestamp_pool,
                index,
            )
        };
        Ok(())
    }

    /// Copy 64-bit timestamp results into the start of `buffer`. Without
    /// `wait_until_available` each result is followed by its availability word.
    pub fn cmd_copy_timestamps(
        &mut self,
        command_buffer: CommandBufferHandle,
        buffer: BufferHandle,
        offset: u32,
        count: u32,
        wait_until_available: bool,
    ) -> Result<()> {
        check_timestamp_range(offset, count)?;
        let cmd = self.command_buffers.resolve(command_buffer)?;
        let dev = self.devices.resolve(cmd.device)?;
        let dst = self.buffers.resolve(buffer)?;
        check_owner(dst, cmd.device)?;

        let (flags, stride) = if wait_until_available {
            (vk::QueryResultFlags::TYPE_64 | vk::QueryResultFlags::WAIT, 8)
        } else {
            (
                vk::QueryResultFlags::TYPE_64 | vk::QueryResultFlags::WITH_AVAILABILITY,
                16,
            )
        };
        resolve_range(0, count as u64 * stride, dst.size)?;

        unsafe {
            dev.device.cmd_copy_query_pool_results(
                cmd.command_buffer,
                dev.timestamp_pool,
                offset,
                count,
                dst.buffer,
                0,
                stride,
                flags,
            )
        };
        Ok(())
    }
}
