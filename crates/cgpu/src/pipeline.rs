use std::collections::BTreeMap;
use std::ffi::CString;

use ash::vk;
use tracing::debug;

use cgpu_core::{DeviceHandle, ImageHandle, PipelineHandle, ShaderHandle};

use crate::context::{destroy_child, Cgpu, DeviceChild};
use crate::descriptor::{
    descriptor_pool_sizes, layout_bindings, push_constant_ranges,
    MAX_DESCRIPTOR_SET_LAYOUT_BINDINGS,
};
use crate::device::DeviceResource;
use crate::error::{CgpuError, Result};
use crate::rollback::Rollback;

pub(crate) struct PipelineResource {
    pub(crate) device: DeviceHandle,
    pub(crate) pipeline: vk::Pipeline,
    pub(crate) layout: vk::PipelineLayout,
    pub(crate) set_layout: vk::DescriptorSetLayout,
    /// Null when the shader declares no bindings.
    pub(crate) descriptor_pool: vk::DescriptorPool,
    pub(crate) descriptor_set: vk::DescriptorSet,
    pub(crate) shader: ShaderHandle,
    pub(crate) bound_images: BTreeMap<u32, ImageHandle>,
    pub(crate) push_constants_size: u32,
}

impl DeviceChild for PipelineResource {
    fn owner(&self) -> DeviceHandle {
        self.device
    }

    fn destroy(self, dev: &mut DeviceResource) {
        unsafe {
            if self.descriptor_pool != vk::DescriptorPool::null() {
                dev.device.destroy_descriptor_pool(self.descriptor_pool, None);
            }
            dev.device.destroy_pipeline(self.pipeline, None);
            dev.device.destroy_pipeline_layout(self.layout, None);
            dev.device.destroy_descriptor_set_layout(self.set_layout, None);
        }
    }
}

impl Cgpu {
    /// Create a compute pipeline whose single descriptor set layout and push
    /// constant range come entirely from the shader's reflection.
    pub fn create_compute_pipeline(
        &mut self,
        device: DeviceHandle,
        shader: ShaderHandle,
        entry_point: &str,
    ) -> Result<PipelineHandle> {
        let dev = self.devices.resolve(device)?;
        let shader_resource = self.shaders.resolve(shader)?;
        let reflection = &shader_resource.reflection;

        if reflection.bindings.len() >= MAX_DESCRIPTOR_SET_LAYOUT_BINDINGS {
            return Err(CgpuError::LimitExceeded {
                what: "descriptor set layout bindings",
                limit: MAX_DESCRIPTOR_SET_LAYOUT_BINDINGS - 1,
                actual: reflection.bindings.len(),
            });
        }
        let pool_sizes = descriptor_pool_sizes(reflection)?;
        let bindings = layout_bindings(reflection);
        let push_ranges = push_constant_ranges(reflection.push_constants_size);
        let entry_name = CString::new(entry_point)
            .map_err(|_| CgpuError::InvalidEntryPoint(entry_point.to_string()))?;

        let device_fns = &dev.device;
        let mut rollback = Rollback::new();

        let set_layout_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
        let set_layout = unsafe { device_fns.create_descriptor_set_layout(&set_layout_info, None) }
            .map_err(CgpuError::DescriptorSetLayoutCreation)?;
        rollback.push(move || unsafe { device_fns.destroy_descriptor_set_layout(set_layout, None) });

        let set_layouts = [set_layout];
        let layout_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&set_layouts)
            .push_constant_ranges(&push_ranges);
        let layout = unsafe { device_fns.create_pipeline_layout(&layout_info, None) }
            .map_err(CgpuError::PipelineLayoutCreation)?;
        rollback.push(move || unsafe { device_fns.destroy_pipeline_layout(layout, None) });

        let stage = vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::COMPUTE)
            .module(shader_resource.module)
            .name(&entry_name);
        let pipeline_info = vk::ComputePipelineCreateInfo::default()
            .stage(stage)
            .layout(layout);
        let pipeline = match unsafe {
            device_fns.create_compute_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
        } {
            Ok(pipelines) => pipelines
                .into_iter()
                .next()
                .ok_or(CgpuError::ComputePipelineCreation(vk::Result::ERROR_UNKNOWN))?,
            Err((_, e)) => return Err(CgpuError::ComputePipelineCreation(e)),
        };
        rollback.push(move || unsafe { device_fns.destroy_pipeline(pipeline, None) });

        let (descriptor_pool, descriptor_set) = if pool_sizes.is_empty() {
            (vk::DescriptorPool::null(), vk::DescriptorSet::null())
        } else {
            let pool_info = vk::DescriptorPoolCreateInfo::default()
                .max_sets(1)
                .pool_sizes(&pool_sizes);
            let pool = unsafe { device_fns.create_descriptor_pool(&pool_info, None) }
                .map_err(CgpuError::DescriptorPoolCreation)?;
            rollback.push(move || unsafe { device_fns.destroy_descriptor_pool(pool, None) });

            let alloc_info = vk::DescriptorSetAllocateInfo::default()
                .descriptor_pool(pool)
                .set_layouts(&set_layouts);
            let set = unsafe { device_fns.allocate_descriptor_sets(&alloc_info) }
                .map_err(CgpuError::DescriptorSetAllocation)?
                .into_iter()
                .next()
                .ok_or(CgpuError::DescriptorSetAllocation(vk::Result::ERROR_UNKNOWN))?;
            (pool, set)
        };

        rollback.commit();

        let push_constants_size = reflection.push_constants_size;
        let binding_count = bindings.len();
        let handle = self.pipelines.allocate(PipelineResource {
            device,
            pipeline,
            layout,
            set_layout,
            descriptor_pool,
            descriptor_set,
            shader,
            bound_images: BTreeMap::new(),
            push_constants_size,
        });
        debug!(
            "created compute pipeline {:?} from {:?} ({} bindings, {} pool entries)",
            handle,
            shader,
            binding_count,
            pool_sizes.len()
        );
        Ok(handle)
    }

    pub fn destroy_pipeline(&mut self, device: DeviceHandle, pipeline: PipelineHandle) -> Result<()> {
        destroy_child(&mut self.devices, &mut self.pipelines, device, pipeline)
    }
}
