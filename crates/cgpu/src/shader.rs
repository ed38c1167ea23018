use std::io::Cursor;

use ash::vk;
use tracing::debug;

use cgpu_core::{DeviceHandle, ShaderHandle};

use crate::context::{destroy_child, Cgpu, DeviceChild};
use crate::device::DeviceResource;
use crate::error::{CgpuError, Result};
use crate::reflection::{reflect_spirv, ShaderReflection};
use crate::rollback::Rollback;

pub(crate) struct ShaderResource {
    pub(crate) device: DeviceHandle,
    pub(crate) module: vk::ShaderModule,
    pub(crate) reflection: ShaderReflection,
}

impl DeviceChild for ShaderResource {
    fn owner(&self) -> DeviceHandle {
        self.device
    }

    fn destroy(self, dev: &mut DeviceResource) {
        unsafe { dev.device.destroy_shader_module(self.module, None) };
    }
}

/// Decode SPIR-V bytes into aligned words, checking size and magic number.
pub fn spirv_words(code: &[u8]) -> Result<Vec<u32>> {
    ash::util::read_spv(&mut Cursor::new(code))
        .map_err(|e| CgpuError::InvalidShaderCode(e.to_string()))
}

impl Cgpu {
    /// Create a shader module from SPIR-V bytes and reflect its bindings.
    /// Fails without creating anything if the module cannot be reflected.
    pub fn create_shader(&mut self, device: DeviceHandle, code: &[u8]) -> Result<ShaderHandle> {
        let words = spirv_words(code)?;
        let dev = self.devices.resolve(device)?;
        let device_fns = &dev.device;

        let info = vk::ShaderModuleCreateInfo::default().code(&words);
        let module = unsafe { device_fns.create_shader_module(&info, None) }
            .map_err(CgpuError::ShaderModuleCreation)?;

        let mut rollback = Rollback::new();
        rollback.push(move || unsafe { device_fns.destroy_shader_module(module, None) });

        let reflection =
            reflect_spirv(&words).map_err(|e| CgpuError::ShaderReflection(e.to_string()))?;
        rollback.commit();

        let bindings = reflection.bindings.len();
        let push_constants = reflection.push_constants_size;
        let handle = self.shaders.allocate(ShaderResource {
            device,
            module,
            reflection,
        });
        debug!(
            "created shader {:?} ({} bindings, {} push constant bytes)",
            handle, bindings, push_constants
        );
        Ok(handle)
    }

    pub fn destroy_shader(&mut self, device: DeviceHandle, shader: ShaderHandle) -> Result<()> {
        destroy_child(&mut self.devices, &mut self.shaders, device, shader)
    }

    /// Reflection record of a shader.
    pub fn shader_reflection(&self, shader: ShaderHandle) -> Result<&ShaderReflection> {
        Ok(&self.shaders.resolve(shader)?.reflection)
    }
}
