use ash::vk;
use tracing::debug;

use cgpu_core::flags::SamplerAddressMode;
use cgpu_core::{DeviceHandle, SamplerHandle};

use crate::context::{destroy_child, Cgpu, DeviceChild};
use crate::device::DeviceResource;
use crate::error::{CgpuError, Result};
use crate::translate;

pub(crate) struct SamplerResource {
    pub(crate) device: DeviceHandle,
    pub(crate) sampler: vk::Sampler,
}

impl DeviceChild for SamplerResource {
    fn owner(&self) -> DeviceHandle {
        self.device
    }

    fn destroy(self, dev: &mut DeviceResource) {
        unsafe { dev.device.destroy_sampler(self.sampler, None) };
    }
}

/// Border color for a sampler; opaque black as soon as one axis clamps to black.
pub fn border_color(modes: [SamplerAddressMode; 3]) -> vk::BorderColor {
    if modes.contains(&SamplerAddressMode::ClampToBlack) {
        vk::BorderColor::FLOAT_OPAQUE_BLACK
    } else {
        vk::BorderColor::FLOAT_TRANSPARENT_BLACK
    }
}

impl Cgpu {
    /// Create a linear-filtering sampler with the given per-axis address modes.
    pub fn create_sampler(
        &mut self,
        device: DeviceHandle,
        address_mode_u: SamplerAddressMode,
        address_mode_v: SamplerAddressMode,
        address_mode_w: SamplerAddressMode,
    ) -> Result<SamplerHandle> {
        let dev = self.devices.resolve(device)?;

        let info = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .address_mode_u(translate::address_mode(address_mode_u))
            .address_mode_v(translate::address_mode(address_mode_v))
            .address_mode_w(translate::address_mode(address_mode_w))
            .mip_lod_bias(0.0)
            .anisotropy_enable(false)
            .max_anisotropy(1.0)
            .compare_enable(false)
            .compare_op(vk::CompareOp::NEVER)
            .min_lod(0.0)
            .max_lod(vk::LOD_CLAMP_NONE)
            .border_color(border_color([address_mode_u, address_mode_v, address_mode_w]))
            .unnormalized_coordinates(false);

        let sampler = unsafe { dev.device.create_sampler(&info, None) }
            .map_err(CgpuError::SamplerCreation)?;
        let handle = self.samplers.allocate(SamplerResource { device, sampler });
        debug!("created sampler {:?}", handle);
        Ok(handle)
    }

    pub fn destroy_sampler(&mut self, device: DeviceHandle, sampler: SamplerHandle) -> Result<()> {
        destroy_child(&mut self.devices, &mut self.samplers, device, sampler)
    }
}
