use std::ffi::{c_char, CStr};

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use tracing::{debug, info, warn};

use cgpu_common::platform;
use cgpu_core::DeviceHandle;

use crate::context::{version_at_least, version_string, Cgpu, MIN_API_VERSION};
use crate::error::{CgpuError, Result};
use crate::rollback::Rollback;
use crate::MAX_TIMESTAMP_QUERIES;

pub const MAX_PHYSICAL_DEVICES: usize = 32;
pub const MAX_DEVICE_EXTENSIONS: usize = 1024;
pub const MAX_QUEUE_FAMILIES: usize = 64;

/// Compute-relevant slice of the physical device limits.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceLimits {
    pub device_name: String,
    pub api_version: u32,
    pub vendor_id: u32,
    pub device_id: u32,
    pub subgroup_size: u32,
    pub timestamp_period: f32,
    pub timestamp_compute_and_graphics: bool,
    pub min_storage_buffer_offset_alignment: u64,
    pub min_uniform_buffer_offset_alignment: u64,
    pub non_coherent_atom_size: u64,
    pub optimal_buffer_copy_offset_alignment: u64,
    pub optimal_buffer_copy_row_pitch_alignment: u64,
    pub max_storage_buffer_range: u32,
    pub max_uniform_buffer_range: u32,
    pub max_push_constants_size: u32,
    pub max_bound_descriptor_sets: u32,
    pub max_per_stage_descriptor_storage_buffers: u32,
    pub max_per_stage_descriptor_storage_images: u32,
    pub max_per_stage_descriptor_sampled_images: u32,
    pub max_per_stage_descriptor_samplers: u32,
    pub max_image_dimension_2d: u32,
    pub max_sampler_anisotropy: f32,
    pub max_compute_shared_memory_size: u32,
    pub max_compute_work_group_count: [u32; 3],
    pub max_compute_work_group_invocations: u32,
    pub max_compute_work_group_size: [u32; 3],
}

impl DeviceLimits {
    fn from_properties(properties: &vk::PhysicalDeviceProperties, subgroup_size: u32) -> Self {
        let limits = &properties.limits;
        let device_name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned();
        Self {
            device_name,
            api_version: properties.api_version,
            vendor_id: properties.vendor_id,
            device_id: properties.device_id,
            subgroup_size,
            timestamp_period: limits.timestamp_period,
            timestamp_compute_and_graphics: limits.timestamp_compute_and_graphics == vk::TRUE,
            min_storage_buffer_offset_alignment: limits.min_storage_buffer_offset_alignment,
            min_uniform_buffer_offset_alignment: limits.min_uniform_buffer_offset_alignment,
            non_coherent_atom_size: limits.non_coherent_atom_size,
            optimal_buffer_copy_offset_alignment: limits.optimal_buffer_copy_offset_alignment,
            optimal_buffer_copy_row_pitch_alignment: limits.optimal_buffer_copy_row_pitch_alignment,
            max_storage_buffer_range: limits.max_storage_buffer_range,
            max_uniform_buffer_range: limits.max_uniform_buffer_range,
            max_push_constants_size: limits.max_push_constants_size,
            max_bound_descriptor_sets: limits.max_bound_descriptor_sets,
            max_per_stage_descriptor_storage_buffers: limits.max_per_stage_descriptor_storage_buffers,
            max_per_stage_descriptor_storage_images: limits.max_per_stage_descriptor_storage_images,
            max_per_stage_descriptor_sampled_images: limits.max_per_stage_descriptor_sampled_images,
            max_per_stage_descriptor_samplers: limits.max_per_stage_descriptor_samplers,
            max_image_dimension_2d: limits.max_image_dimension2_d,
            max_sampler_anisotropy: limits.max_sampler_anisotropy,
            max_compute_shared_memory_size: limits.max_compute_shared_memory_size,
            max_compute_work_group_count: limits.max_compute_work_group_count,
            max_compute_work_group_invocations: limits.max_compute_work_group_invocations,
            max_compute_work_group_size: limits.max_compute_work_group_size,
        }
    }
}

/// Features negotiated at device creation. Creation fails unless all are supported,
/// so every field is true on a live device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceFeatures {
    pub shader_sampled_image_array_non_uniform_indexing: bool,
    pub shader_storage_image_array_non_uniform_indexing: bool,
    pub descriptor_binding_variable_descriptor_count: bool,
    pub sampler_anisotropy: bool,
}

pub(crate) struct DeviceResource {
    pub(crate) device: ash::Device,
    pub(crate) queue: vk::Queue,
    pub(crate) queue_family_index: u32,
    pub(crate) command_pool: vk::CommandPool,
    pub(crate) default_sampler: vk::Sampler,
    pub(crate) timestamp_pool: vk::QueryPool,
    pub(crate) allocator: Allocator,
    pub(crate) limits: DeviceLimits,
    pub(crate) features: DeviceFeatures,
}

impl DeviceResource {
    /// Destroy everything the device owns, allocator first.
    pub(crate) fn destroy(self) {
        let DeviceResource {
            device,
            allocator,
            command_pool,
            default_sampler,
            timestamp_pool,
            ..
        } = self;

        if let Err(e) = unsafe { device.device_wait_idle() } {
            warn!("device_wait_idle failed before destroy: {}", e);
        }
        drop(allocator);
        unsafe {
            device.destroy_query_pool(timestamp_pool, None);
            device.destroy_sampler(default_sampler, None);
            device.destroy_command_pool(command_pool, None);
            device.destroy_device(None);
        }
    }
}

fn has_extension(extensions: &[vk::ExtensionProperties], name: &CStr) -> bool {
    extensions
        .iter()
        .any(|p| p.extension_name_as_c_str().is_ok_and(|n| n == name))
}

impl Cgpu {
    /// Create a logical device on the physical device at `index`.
    ///
    /// The device must support Vulkan 1.1, basic and ballot subgroup operations
    /// in compute shaders, descriptor indexing, and a queue family with both
    /// compute and transfer. Anything created before a failing step is destroyed
    /// again and no handle is published.
    pub fn create_device(&mut self, index: u32) -> Result<DeviceHandle> {
        let instance = &self.instance;

        let physical_devices = unsafe { instance.enumerate_physical_devices() }
            .map_err(CgpuError::DeviceCreation)?;
        if physical_devices.len() > MAX_PHYSICAL_DEVICES {
            return Err(CgpuError::LimitExceeded {
                what: "physical devices",
                limit: MAX_PHYSICAL_DEVICES,
                actual: physical_devices.len(),
            });
        }
        let physical_device = *physical_devices
            .get(index as usize)
            .ok_or(CgpuError::NoDeviceAtIndex {
                index,
                count: physical_devices.len(),
            })?;

        let mut subgroup = vk::PhysicalDeviceSubgroupProperties::default();
        let mut properties2 = vk::PhysicalDeviceProperties2::default().push_next(&mut subgroup);
        unsafe { instance.get_physical_device_properties2(physical_device, &mut properties2) };
        let properties = properties2.properties;

        if !version_at_least(properties.api_version, MIN_API_VERSION) {
            return Err(CgpuError::ApiVersionUnsupported {
                required: version_string(MIN_API_VERSION),
                found: version_string(properties.api_version),
            });
        }
        if !subgroup.supported_stages.contains(vk::ShaderStageFlags::COMPUTE) {
            return Err(CgpuError::FeatureRequirementsNotMet(
                "subgroup operations in compute shaders",
            ));
        }
        let required_ops = vk::SubgroupFeatureFlags::BASIC | vk::SubgroupFeatureFlags::BALLOT;
        if !subgroup.supported_operations.contains(required_ops) {
            return Err(CgpuError::FeatureRequirementsNotMet(
                "basic and ballot subgroup operations",
            ));
        }
        let limits = DeviceLimits::from_properties(&properties, subgroup.subgroup_size);

        let extensions = unsafe { instance.enumerate_device_extension_properties(physical_device) }
            .map_err(CgpuError::DeviceCreation)?;
        if extensions.len() > MAX_DEVICE_EXTENSIONS {
            return Err(CgpuError::LimitExceeded {
                what: "device extensions",
                limit: MAX_DEVICE_EXTENSIONS,
                actual: extensions.len(),
            });
        }

        let mut enabled_extensions: Vec<*const c_char> = Vec::new();
        if !has_extension(&extensions, ash::ext::descriptor_indexing::NAME) {
            return Err(CgpuError::FeatureRequirementsNotMet("VK_EXT_descriptor_indexing"));
        }
        enabled_extensions.push(ash::ext::descriptor_indexing::NAME.as_ptr());
        if has_extension(&extensions, ash::khr::portability_subset::NAME) {
            enabled_extensions.push(ash::khr::portability_subset::NAME.as_ptr());
        }
        if platform::allows_non_semantic_info()
            && has_extension(&extensions, ash::khr::shader_non_semantic_info::NAME)
        {
            enabled_extensions.push(ash::khr::shader_non_semantic_info::NAME.as_ptr());
        }

        let mut supported_indexing = vk::PhysicalDeviceDescriptorIndexingFeatures::default();
        let mut supported =
            vk::PhysicalDeviceFeatures2::default().push_next(&mut supported_indexing);
        unsafe { instance.get_physical_device_features2(physical_device, &mut supported) };
        let supported_core = supported.features;

        if supported_core.sampler_anisotropy != vk::TRUE {
            return Err(CgpuError::FeatureRequirementsNotMet("samplerAnisotropy"));
        }
        if supported_indexing.shader_sampled_image_array_non_uniform_indexing != vk::TRUE {
            return Err(CgpuError::FeatureRequirementsNotMet(
                "shaderSampledImageArrayNonUniformIndexing",
            ));
        }
        if supported_indexing.shader_storage_image_array_non_uniform_indexing != vk::TRUE {
            return Err(CgpuError::FeatureRequirementsNotMet(
                "shaderStorageImageArrayNonUniformIndexing",
            ));
        }
        if supported_indexing.descriptor_binding_variable_descriptor_count != vk::TRUE {
            return Err(CgpuError::FeatureRequirementsNotMet(
                "descriptorBindingVariableDescriptorCount",
            ));
        }

        let queue_families =
            unsafe { instance.get_physical_device_queue_family_properties(physical_device) };
        if queue_families.len() > MAX_QUEUE_FAMILIES {
            return Err(CgpuError::LimitExceeded {
                what: "queue families",
                limit: MAX_QUEUE_FAMILIES,
                actual: queue_families.len(),
            });
        }
        let queue_family_index = queue_families
            .iter()
            .position(|family| {
                family
                    .queue_flags
                    .contains(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER)
            })
            .ok_or(CgpuError::NoComputeQueueFamily)? as u32;

        let priorities = [1.0f32];
        let queue_infos = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(queue_family_index)
            .queue_priorities(&priorities)];

        let mut indexing_features = vk::PhysicalDeviceDescriptorIndexingFeatures::default()
            .shader_sampled_image_array_non_uniform_indexing(true)
            .shader_storage_image_array_non_uniform_indexing(true)
            .descriptor_binding_variable_descriptor_count(true);
        let core_features = vk::PhysicalDeviceFeatures::default().sampler_anisotropy(true);
        let mut features2 = vk::PhysicalDeviceFeatures2::default()
            .features(core_features)
            .push_next(&mut indexing_features);

        let device_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&enabled_extensions)
            .push_next(&mut features2);

        let device = unsafe { instance.create_device(physical_device, &device_info, None) }
            .map_err(CgpuError::DeviceCreation)?;

        let mut rollback = Rollback::new();
        {
            let device = device.clone();
            rollback.push(move || unsafe { device.destroy_device(None) });
        }

        let queue = unsafe { device.get_device_queue(queue_family_index, 0) };

        let pool_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family_index);
        let command_pool = unsafe { device.create_command_pool(&pool_info, None) }
            .map_err(CgpuError::CommandPoolCreation)?;
        {
            let device = device.clone();
            rollback.push(move || unsafe { device.destroy_command_pool(command_pool, None) });
        }

        let sampler_info = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .mip_lod_bias(0.0)
            .anisotropy_enable(true)
            .max_anisotropy(16.0f32.min(limits.max_sampler_anisotropy))
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .min_lod(0.0)
            .max_lod(0.0)
            .border_color(vk::BorderColor::INT_TRANSPARENT_BLACK)
            .unnormalized_coordinates(false);
        let default_sampler = unsafe { device.create_sampler(&sampler_info, None) }
            .map_err(CgpuError::SamplerCreation)?;
        {
            let device = device.clone();
            rollback.push(move || unsafe { device.destroy_sampler(default_sampler, None) });
        }

        let query_info = vk::QueryPoolCreateInfo::default()
            .query_type(vk::QueryType::TIMESTAMP)
            .query_count(MAX_TIMESTAMP_QUERIES);
        let timestamp_pool = unsafe { device.create_query_pool(&query_info, None) }
            .map_err(CgpuError::QueryPoolCreation)?;
        {
            let device = device.clone();
            rollback.push(move || unsafe { device.destroy_query_pool(timestamp_pool, None) });
        }

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: device.clone(),
            physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })
        .map_err(CgpuError::AllocatorCreation)?;

        rollback.commit();

        info!(
            "created device on {} ({}), queue family {}",
            limits.device_name,
            version_string(limits.api_version),
            queue_family_index
        );

        let handle = self.devices.allocate(DeviceResource {
            device,
            queue,
            queue_family_index,
            command_pool,
            default_sampler,
            timestamp_pool,
            allocator,
            limits,
            features: DeviceFeatures {
                shader_sampled_image_array_non_uniform_indexing: true,
                shader_storage_image_array_non_uniform_indexing: true,
                descriptor_binding_variable_descriptor_count: true,
                sampler_anisotropy: true,
            },
        });
        debug!("device handle {:?}", handle);
        Ok(handle)
    }

    /// Destroy a device and everything it owns. Resources created against it
    /// must be destroyed first.
    pub fn destroy_device(&mut self, device: DeviceHandle) -> Result<()> {
        let resource = self.devices.free(device)?;
        resource.destroy();
        debug!("destroyed device {:?}", device);
        Ok(())
    }

    pub fn device_limits(&self, device: DeviceHandle) -> Result<DeviceLimits> {
        Ok(self.devices.resolve(device)?.limits.clone())
    }

    pub fn device_features(&self, device: DeviceHandle) -> Result<DeviceFeatures> {
        Ok(self.devices.resolve(device)?.features)
    }

    /// Index of the queue family all work is submitted to.
    pub fn queue_family_index(&self, device: DeviceHandle) -> Result<u32> {
        Ok(self.devices.resolve(device)?.queue_family_index)
    }
}
