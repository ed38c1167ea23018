use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator};
use gpu_allocator::{AllocationError, MemoryLocation};
use tracing::{debug, error};

use cgpu_core::flags::{BufferUsage, MemoryProperties};
use cgpu_core::{BufferHandle, DeviceHandle};

use crate::context::{destroy_child, Cgpu, DeviceChild};
use crate::device::DeviceResource;
use crate::error::{CgpuError, Result};
use crate::rollback::Rollback;
use crate::{translate, WHOLE_SIZE};

pub(crate) struct BufferResource {
    pub(crate) device: DeviceHandle,
    pub(crate) buffer: vk::Buffer,
    pub(crate) allocation: Allocation,
    pub(crate) size: u64,
    pub(crate) memory_properties: vk::MemoryPropertyFlags,
    pub(crate) mapped: bool,
}

/// Pick the allocator location that best matches the requested property flags.
pub(crate) fn memory_location(properties: vk::MemoryPropertyFlags) -> MemoryLocation {
    if properties.contains(vk::MemoryPropertyFlags::HOST_VISIBLE) {
        if properties.contains(vk::MemoryPropertyFlags::HOST_CACHED) {
            MemoryLocation::GpuToCpu
        } else {
            MemoryLocation::CpuToGpu
        }
    } else {
        MemoryLocation::GpuOnly
    }
}

/// Allocate memory and check it carries every requested property bit.
pub(crate) fn allocate_memory(
    allocator: &mut Allocator,
    name: &str,
    requirements: vk::MemoryRequirements,
    required: vk::MemoryPropertyFlags,
    linear: bool,
    on_error: fn(AllocationError) -> CgpuError,
) -> Result<Allocation> {
    let allocation = allocator
        .allocate(&AllocationCreateDesc {
            name,
            requirements,
            location: memory_location(required),
            linear,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        })
        .map_err(on_error)?;

    let actual = allocation.memory_properties();
    if !actual.contains(required) {
        free_allocation(allocator, allocation);
        return Err(CgpuError::MemoryPropertiesUnavailable { requested: required, actual });
    }
    Ok(allocation)
}

pub(crate) fn free_allocation(allocator: &mut Allocator, allocation: Allocation) {
    if let Err(e) = allocator.free(allocation) {
        error!("failed to free allocation: {}", e);
    }
}

/// Byte range of `offset..offset+size` within a resource, with `WHOLE_SIZE` resolved.
pub(crate) fn resolve_range(offset: u64, size: u64, resource_size: u64) -> Result<u64> {
    let out_of_bounds = CgpuError::BufferRangeOutOfBounds {
        offset,
        size,
        buffer_size: resource_size,
    };
    let size = if size == WHOLE_SIZE {
        resource_size.checked_sub(offset).ok_or(out_of_bounds)?
    } else {
        match offset.checked_add(size) {
            Some(end) if end <= resource_size => size,
            _ => return Err(out_of_bounds),
        }
    };
    Ok(size)
}

/// Range to flush or invalidate, or `None` for coherent memory.
pub(crate) fn non_coherent_range(
    allocation: &Allocation,
    resource_size: u64,
    offset: u64,
    size: u64,
    atom_size: u64,
) -> Result<Option<vk::MappedMemoryRange<'static>>> {
    let size = resolve_range(offset, size, resource_size)?;
    let properties = allocation.memory_properties();
    if !properties.contains(vk::MemoryPropertyFlags::HOST_VISIBLE) {
        return Err(CgpuError::MemoryMap("memory is not host visible"));
    }
    if properties.contains(vk::MemoryPropertyFlags::HOST_COHERENT) {
        return Ok(None);
    }

    let start = allocation.offset() + offset;
    let allocation_end = allocation.offset() + allocation.size();
    let (aligned_start, aligned_size) =
        atom_aligned_range(start, size, atom_size, allocation_end);
    let memory = unsafe { allocation.memory() };
    Ok(Some(
        vk::MappedMemoryRange::default()
            .memory(memory)
            .offset(aligned_start)
            .size(aligned_size),
    ))
}

/// Widen `start..start+size` to atom boundaries. A range whose rounded end reaches `limit`
/// runs to `vk::WHOLE_SIZE` instead, since the memory object may end there.
pub fn atom_aligned_range(start: u64, size: u64, atom_size: u64, limit: u64) -> (u64, u64) {
    let atom = atom_size.max(1);
    let aligned_start = start - start % atom;
    let aligned_end = (start + size).div_ceil(atom) * atom;
    if aligned_end >= limit {
        (aligned_start, vk::WHOLE_SIZE)
    } else {
        (aligned_start, aligned_end - aligned_start)
    }
}

impl DeviceChild for BufferResource {
    fn owner(&self) -> DeviceHandle {
        self.device
    }

    fn destroy(self, dev: &mut DeviceResource) {
        unsafe { dev.device.destroy_buffer(self.buffer, None) };
        free_allocation(&mut dev.allocator, self.allocation);
    }
}

impl BufferResource {
    fn create(
        owner: DeviceHandle,
        dev: &mut DeviceResource,
        usage: BufferUsage,
        memory_properties: MemoryProperties,
        size: u64,
    ) -> Result<Self> {
        let device = &dev.device;
        let allocator = &mut dev.allocator;

        let info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(translate::buffer_usage(usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe { device.create_buffer(&info, None) }
            .map_err(CgpuError::BufferCreation)?;

        let mut rollback = Rollback::new();
        rollback.push(move || unsafe { device.destroy_buffer(buffer, None) });

        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let required = translate::memory_properties(memory_properties);
        let allocation = allocate_memory(
            allocator,
            "cgpu buffer",
            requirements,
            required,
            true,
            CgpuError::BufferAllocation,
        )?;

        if let Err(e) =
            unsafe { device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) }
        {
            free_allocation(allocator, allocation);
            return Err(CgpuError::MemoryBind(e));
        }

        rollback.commit();
        Ok(Self {
            device: owner,
            buffer,
            memory_properties: allocation.memory_properties(),
            allocation,
            size,
            mapped: false,
        })
    }
}

impl Cgpu {
    /// Create a buffer of `size` bytes. The memory must carry every requested property.
    pub fn create_buffer(
        &mut self,
        device: DeviceHandle,
        usage: BufferUsage,
        memory_properties: MemoryProperties,
        size: u64,
    ) -> Result<BufferHandle> {
        if size == 0 || size == WHOLE_SIZE {
            return Err(CgpuError::InvalidArgument("buffer size must be non-zero and finite"));
        }
        let dev = self.devices.resolve_mut(device)?;
        let buffer = BufferResource::create(device, dev, usage, memory_properties, size)?;
        let handle = self.buffers.allocate(buffer);
        debug!("created buffer {:?} ({} bytes, {:?}, {:?})", handle, size, usage, memory_properties);
        Ok(handle)
    }

    pub fn destroy_buffer(&mut self, device: DeviceHandle, buffer: BufferHandle) -> Result<()> {
        destroy_child(&mut self.devices, &mut self.buffers, device, buffer)
    }

    /// Size the buffer was created with.
    pub fn buffer_size(&self, buffer: BufferHandle) -> Result<u64> {
        Ok(self.buffers.resolve(buffer)?.size)
    }

    /// Memory properties of the allocation backing the buffer.
    pub fn buffer_memory_properties(&self, buffer: BufferHandle) -> Result<MemoryProperties> {
        let resource = self.buffers.resolve(buffer)?;
        Ok(translate::memory_properties_from_vk(resource.memory_properties))
    }

    /// Host view of a host-visible buffer. The allocation stays persistently
    /// mapped; this marks the buffer mapped until [`Cgpu::unmap_buffer`].
    pub fn map_buffer(&mut self, device: DeviceHandle, buffer: BufferHandle) -> Result<&mut [u8]> {
        self.devices.resolve(device)?;
        let resource = self.buffers.resolve_mut(buffer)?;
        if !resource
            .memory_properties
            .contains(vk::MemoryPropertyFlags::HOST_VISIBLE)
        {
            return Err(CgpuError::MemoryMap("buffer memory is not host visible"));
        }
        let size = resource.size as usize;
        let bytes = resource
            .allocation
            .mapped_slice_mut()
            .and_then(|bytes| bytes.get_mut(..size))
            .ok_or(CgpuError::MemoryMap("allocation has no host mapping"))?;
        resource.mapped = true;
        Ok(bytes)
    }

    pub fn unmap_buffer(&mut self, device: DeviceHandle, buffer: BufferHandle) -> Result<()> {
        self.devices.resolve(device)?;
        let resource = self.buffers.resolve_mut(buffer)?;
        if !resource.mapped {
            return Err(CgpuError::MemoryMap("buffer is not mapped"));
        }
        resource.mapped = false;
        Ok(())
    }

    /// Make host writes in `offset..offset+size` visible to the device. No-op on coherent memory.
    pub fn flush_mapped_memory(
        &mut self,
        device: DeviceHandle,
        buffer: BufferHandle,
        offset: u64,
        size: u64,
    ) -> Result<()> {
        let dev = self.devices.resolve(device)?;
        let resource = self.buffers.resolve(buffer)?;
        let range = non_coherent_range(
            &resource.allocation,
            resource.size,
            offset,
            size,
            dev.limits.non_coherent_atom_size,
        )?;
        if let Some(range) = range {
            unsafe { dev.device.flush_mapped_memory_ranges(&[range]) }
                .map_err(CgpuError::MemoryFlush)?;
        }
        Ok(())
    }

    /// Make device writes in `offset..offset+size` visible to the host. No-op on coherent memory.
    pub fn invalidate_mapped_memory(
        &mut self,
        device: DeviceHandle,
        buffer: BufferHandle,
        offset: u64,
        size: u64,
    ) -> Result<()> {
        let dev = self.devices.resolve(device)?;
        let resource = self.buffers.resolve(buffer)?;
        let range = non_coherent_range(
            &resource.allocation,
            resource.size,
            offset,
            size,
            dev.limits.non_coherent_atom_size,
        )?;
        if let Some(range) = range {
            unsafe { dev.device.invalidate_mapped_memory_ranges(&[range]) }
                .map_err(CgpuError::MemoryInvalidate)?;
        }
        Ok(())
    }
}
