use ash::vk;
use gpu_allocator::vulkan::Allocation;
use tracing::debug;

use cgpu_core::flags::{ImageFormat, ImageUsage, MemoryProperties, SampleCount};
use cgpu_core::{DeviceHandle, ImageHandle};

use crate::buffer::{allocate_memory, free_allocation, non_coherent_range};
use crate::context::{destroy_child, Cgpu, DeviceChild};
use crate::device::DeviceResource;
use crate::error::{CgpuError, Result};
use crate::rollback::Rollback;
use crate::tracking::{color_subresource_range, ImageState, TrackedImage};
use crate::translate;

pub(crate) struct ImageResource {
    pub(crate) device: DeviceHandle,
    pub(crate) image: vk::Image,
    pub(crate) view: vk::ImageView,
    pub(crate) allocation: Allocation,
    pub(crate) format: ImageFormat,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) size: u64,
    pub(crate) memory_properties: vk::MemoryPropertyFlags,
    pub(crate) state: ImageState,
    pub(crate) mapped: bool,
}

impl TrackedImage for ImageResource {
    fn state(&self) -> ImageState {
        self.state
    }

    fn set_state(&mut self, state: ImageState) {
        self.state = state;
    }
}

/// Images used purely as transfer staging get linear tiling.
pub fn image_tiling(usage: ImageUsage) -> vk::ImageTiling {
    if usage.is_transfer_only() {
        vk::ImageTiling::LINEAR
    } else {
        vk::ImageTiling::OPTIMAL
    }
}

impl DeviceChild for ImageResource {
    fn owner(&self) -> DeviceHandle {
        self.device
    }

    fn destroy(self, dev: &mut DeviceResource) {
        unsafe {
            dev.device.destroy_image_view(self.view, None);
            dev.device.destroy_image(self.image, None);
        }
        free_allocation(&mut dev.allocator, self.allocation);
    }
}

impl ImageResource {
    fn create(
        owner: DeviceHandle,
        dev: &mut DeviceResource,
        width: u32,
        height: u32,
        format: ImageFormat,
        usage: ImageUsage,
        memory_properties: MemoryProperties,
    ) -> Result<Self> {
        let native_format = translate::format(format);
        let device = &dev.device;
        let allocator = &mut dev.allocator;
        let tiling = image_tiling(usage);

        let info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(native_format)
            .extent(vk::Extent3D {
                width,
                height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(translate::sample_count(SampleCount::X1))
            .tiling(tiling)
            .usage(translate::image_usage(usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        let image = unsafe { device.create_image(&info, None) }.map_err(CgpuError::ImageCreation)?;

        let mut rollback = Rollback::new();
        rollback.push(move || unsafe { device.destroy_image(image, None) });

        let requirements = unsafe { device.get_image_memory_requirements(image) };
        let required = translate::memory_properties(memory_properties);
        let allocation = allocate_memory(
            allocator,
            "cgpu image",
            requirements,
            required,
            tiling == vk::ImageTiling::LINEAR,
            CgpuError::ImageAllocation,
        )?;

        if let Err(e) =
            unsafe { device.bind_image_memory(image, allocation.memory(), allocation.offset()) }
        {
            free_allocation(allocator, allocation);
            return Err(CgpuError::MemoryBind(e));
        }

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(native_format)
            .subresource_range(color_subresource_range());
        let view = match unsafe { device.create_image_view(&view_info, None) } {
            Ok(view) => view,
            Err(e) => {
                free_allocation(allocator, allocation);
                return Err(CgpuError::ImageViewCreation(e));
            }
        };

        rollback.commit();
        Ok(Self {
            device: owner,
            image,
            view,
            memory_properties: allocation.memory_properties(),
            size: allocation.size(),
            allocation,
            format,
            width,
            height,
            state: ImageState::default(),
            mapped: false,
        })
    }
}

impl Cgpu {
    /// Create a single-mip, single-layer 2D image with a color view.
    /// The image starts in the undefined layout with no access.
    pub fn create_image(
        &mut self,
        device: DeviceHandle,
        width: u32,
        height: u32,
        format: ImageFormat,
        usage: ImageUsage,
        memory_properties: MemoryProperties,
    ) -> Result<ImageHandle> {
        if width == 0 || height == 0 {
            return Err(CgpuError::InvalidArgument("image extent must be non-zero"));
        }
        if translate::format(format) == vk::Format::UNDEFINED {
            return Err(CgpuError::InvalidArgument("image format is undefined"));
        }

        let dev = self.devices.resolve_mut(device)?;
        let image = ImageResource::create(
            device,
            dev,
            width,
            height,
            format,
            usage,
            memory_properties,
        )?;
        let handle = self.images.allocate(image);
        debug!("created image {:?} ({}x{}, {:?})", handle, width, height, format);
        Ok(handle)
    }

    pub fn destroy_image(&mut self, device: DeviceHandle, image: ImageHandle) -> Result<()> {
        destroy_child(&mut self.devices, &mut self.images, device, image)
    }

    /// Current tracked layout and access mask.
    pub fn image_state(&self, image: ImageHandle) -> Result<ImageState> {
        Ok(self.images.resolve(image)?.state)
    }

    /// Width and height the image was created with.
    pub fn image_extent(&self, image: ImageHandle) -> Result<(u32, u32)> {
        let resource = self.images.resolve(image)?;
        Ok((resource.width, resource.height))
    }

    /// Size in bytes of the memory backing the image.
    pub fn image_size(&self, image: ImageHandle) -> Result<u64> {
        Ok(self.images.resolve(image)?.size)
    }

    /// Host view of a host-visible (linear) image.
    pub fn map_image(&mut self, device: DeviceHandle, image: ImageHandle) -> Result<&mut [u8]> {
        self.devices.resolve(device)?;
        let resource = self.images.resolve_mut(image)?;
        if !resource
            .memory_properties
            .contains(vk::MemoryPropertyFlags::HOST_VISIBLE)
        {
            return Err(CgpuError::MemoryMap("image memory is not host visible"));
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

    pub fn unmap_image(&mut self, device: DeviceHandle, image: ImageHandle) -> Result<()> {
        self.devices.resolve(device)?;
        let resource = self.images.resolve_mut(image)?;
        if !resource.mapped {
            return Err(CgpuError::MemoryMap("image is not mapped"));
        }
        resource.mapped = false;
        Ok(())
    }

    pub fn flush_mapped_image(&mut self, device: DeviceHandle, image: ImageHandle) -> Result<()> {
        let dev = self.devices.resolve(device)?;
        let resource = self.images.resolve(image)?;
        let range = non_coherent_range(
            &resource.allocation,
            resource.size,
            0,
            crate::WHOLE_SIZE,
            dev.limits.non_coherent_atom_size,
        )?;
        if let Some(range) = range {
            unsafe { dev.device.flush_mapped_memory_ranges(&[range]) }
                .map_err(CgpuError::MemoryFlush)?;
        }
        Ok(())
    }
}
