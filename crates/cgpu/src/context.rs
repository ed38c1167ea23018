use std::borrow::Cow;
use std::ffi::{c_char, c_void, CStr, CString};

use ash::vk;
use tracing::{debug, error, info, warn};

use cgpu_common::platform;
use cgpu_core::config::CgpuConfig;
use cgpu_core::{
    BufferHandle, CommandBufferHandle, DeviceHandle, FenceHandle, ImageHandle, PipelineHandle,
    ResourceStore, SamplerHandle, ShaderHandle, StoreHandle,
};

use crate::buffer::BufferResource;
use crate::command::CommandBufferResource;
use crate::device::DeviceResource;
use crate::error::{CgpuError, Result};
use crate::image::ImageResource;
use crate::pipeline::PipelineResource;
use crate::sampler::SamplerResource;
use crate::shader::ShaderResource;
use crate::sync::FenceResource;

pub(crate) const MIN_API_VERSION: u32 = vk::API_VERSION_1_1;

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// A resource created on one device and destroyed through it.
pub(crate) trait DeviceChild {
    fn owner(&self) -> DeviceHandle;

    /// Destroy the native objects and return memory to the device's allocator.
    fn destroy(self, dev: &mut DeviceResource);
}

/// Fails unless `resource` was created on `device`.
pub(crate) fn check_owner<T: DeviceChild>(resource: &T, device: DeviceHandle) -> Result<()> {
    if resource.owner() != device {
        return Err(CgpuError::InvalidArgument("resource belongs to another device"));
    }
    Ok(())
}

/// Take `handle` out of `store` and destroy it on `device`.
pub(crate) fn destroy_child<H: StoreHandle, T: DeviceChild>(
    devices: &mut ResourceStore<DeviceHandle, DeviceResource>,
    store: &mut ResourceStore<H, T>,
    device: DeviceHandle,
    handle: H,
) -> Result<()> {
    let dev = devices.resolve_mut(device)?;
    check_owner(store.resolve(handle)?, device)?;
    store.free(handle)?.destroy(dev);
    debug!("destroyed {:?}", handle);
    Ok(())
}

/// Destroy everything left in `store` through its owning device.
fn release_leaked<H: StoreHandle, T: DeviceChild>(
    devices: &mut ResourceStore<DeviceHandle, DeviceResource>,
    store: &mut ResourceStore<H, T>,
) {
    for handle in store.handles() {
        let Ok(resource) = store.free(handle) else {
            continue;
        };
        match devices.get_mut(resource.owner()) {
            Some(dev) => resource.destroy(dev),
            None => warn!("{:?} outlived its device", handle),
        }
    }
}

/// Application version reported to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AppVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl AppVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    pub fn to_vk(self) -> u32 {
        vk::make_api_version(0, self.major, self.minor, self.patch)
    }
}

pub(crate) fn version_at_least(version: u32, minimum: u32) -> bool {
    let v = (vk::api_version_major(version), vk::api_version_minor(version));
    let m = (vk::api_version_major(minimum), vk::api_version_minor(minimum));
    v >= m
}

pub(crate) fn version_string(version: u32) -> String {
    format!(
        "{}.{}.{}",
        vk::api_version_major(version),
        vk::api_version_minor(version),
        vk::api_version_patch(version)
    )
}

struct DebugMessenger {
    loader: ash::ext::debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut c_void,
) -> vk::Bool32 {
    let message = if callback_data.is_null() {
        Cow::Borrowed("")
    } else {
        let p_message = unsafe { (*callback_data).p_message };
        if p_message.is_null() {
            Cow::Borrowed("")
        } else {
            unsafe { CStr::from_ptr(p_message) }.to_string_lossy()
        }
    };

    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        error!(target: "cgpu::validation", "{:?}: {}", message_type, message);
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        warn!(target: "cgpu::validation", "{:?}: {}", message_type, message);
    } else {
        debug!(target: "cgpu::validation", "{:?}: {}", message_type, message);
    }
    vk::FALSE
}

/// The cgpu context: one Vulkan instance plus a store per resource kind.
///
/// Methods take `&mut self`, so all recording and state tracking is driven
/// from a single thread at a time.
pub struct Cgpu {
    _entry: ash::Entry,
    pub(crate) instance: ash::Instance,
    debug_messenger: Option<DebugMessenger>,
    pub(crate) config: CgpuConfig,
    pub(crate) devices: ResourceStore<DeviceHandle, DeviceResource>,
    pub(crate) buffers: ResourceStore<BufferHandle, BufferResource>,
    pub(crate) images: ResourceStore<ImageHandle, ImageResource>,
    pub(crate) shaders: ResourceStore<ShaderHandle, ShaderResource>,
    pub(crate) pipelines: ResourceStore<PipelineHandle, PipelineResource>,
    pub(crate) command_buffers: ResourceStore<CommandBufferHandle, CommandBufferResource>,
    pub(crate) fences: ResourceStore<FenceHandle, FenceResource>,
    pub(crate) samplers: ResourceStore<SamplerHandle, SamplerResource>,
}

impl Cgpu {
    /// Create the instance with default configuration and the given application identity.
    pub fn initialize(app_name: &str, version: AppVersion) -> Result<Self> {
        let mut config = CgpuConfig::default();
        config.instance.app_name = app_name.to_string();
        config.instance.app_version = [version.major, version.minor, version.patch];
        Self::with_config(config)
    }

    pub fn with_config(config: CgpuConfig) -> Result<Self> {
        let entry = unsafe { ash::Entry::load()? };

        let instance_version = match unsafe { entry.try_enumerate_instance_version() } {
            Ok(Some(version)) => version,
            Ok(None) => vk::API_VERSION_1_0,
            Err(e) => return Err(CgpuError::InstanceCreation(e)),
        };
        if !version_at_least(instance_version, MIN_API_VERSION) {
            return Err(CgpuError::ApiVersionUnsupported {
                required: version_string(MIN_API_VERSION),
                found: version_string(instance_version),
            });
        }

        let available_extensions = unsafe { entry.enumerate_instance_extension_properties(None) }
            .map_err(CgpuError::InstanceCreation)?;
        let has_extension = |name: &CStr| {
            available_extensions
                .iter()
                .any(|p| p.extension_name_as_c_str().is_ok_and(|n| n == name))
        };

        let mut layers: Vec<*const c_char> = Vec::new();
        let mut extensions: Vec<*const c_char> = Vec::new();
        let mut flags = vk::InstanceCreateFlags::empty();

        let mut debug_utils = false;
        if config.instance.validation_enabled() {
            let available_layers = unsafe { entry.enumerate_instance_layer_properties() }
                .map_err(CgpuError::InstanceCreation)?;
            let has_layer = available_layers
                .iter()
                .any(|p| p.layer_name_as_c_str().is_ok_and(|n| n == VALIDATION_LAYER));
            if has_layer {
                layers.push(VALIDATION_LAYER.as_ptr());
            } else {
                warn!("validation requested but {:?} is not installed", VALIDATION_LAYER);
            }
            if has_extension(ash::ext::debug_utils::NAME) {
                extensions.push(ash::ext::debug_utils::NAME.as_ptr());
                debug_utils = true;
            }
        }

        if has_extension(ash::khr::portability_enumeration::NAME) {
            extensions.push(ash::khr::portability_enumeration::NAME.as_ptr());
            flags |= vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
        } else if platform::uses_portability_layer() {
            warn!("portability enumeration unavailable, devices may be hidden");
        }

        let app_name = CString::new(config.instance.app_name.as_str())
            .map_err(|_| CgpuError::InvalidArgument("application name contains a NUL byte"))?;
        let [major, minor, patch] = config.instance.app_version;
        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(AppVersion::new(major, minor, patch).to_vk())
            .engine_name(c"cgpu")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(MIN_API_VERSION);

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_layer_names(&layers)
            .enabled_extension_names(&extensions)
            .flags(flags);

        let instance = unsafe { entry.create_instance(&create_info, None) }
            .map_err(CgpuError::InstanceCreation)?;

        let debug_messenger = if debug_utils {
            create_debug_messenger(&entry, &instance)
        } else {
            None
        };

        info!(
            "cgpu instance created for {:?} (Vulkan {}, {}, validation: {})",
            config.instance.app_name,
            version_string(instance_version),
            platform::platform_name(),
            !layers.is_empty(),
        );

        let capacities = config.stores.clone();
        Ok(Self {
            _entry: entry,
            instance,
            debug_messenger,
            config,
            devices: ResourceStore::with_capacity(capacities.devices),
            buffers: ResourceStore::with_capacity(capacities.buffers),
            images: ResourceStore::with_capacity(capacities.images),
            shaders: ResourceStore::with_capacity(capacities.shaders),
            pipelines: ResourceStore::with_capacity(capacities.pipelines),
            command_buffers: ResourceStore::with_capacity(capacities.command_buffers),
            fences: ResourceStore::with_capacity(capacities.fences),
            samplers: ResourceStore::with_capacity(capacities.samplers),
        })
    }

    pub fn config(&self) -> &CgpuConfig {
        &self.config
    }

    /// Number of physical devices visible to the instance.
    pub fn device_count(&self) -> Result<u32> {
        let physical_devices = unsafe { self.instance.enumerate_physical_devices() }
            .map_err(CgpuError::DeviceCreation)?;
        Ok(physical_devices.len() as u32)
    }

    /// Create a device on the physical device index named in the configuration.
    pub fn create_default_device(&mut self) -> Result<DeviceHandle> {
        self.create_device(self.config.device.index)
    }

    /// Total number of live handles across every store.
    pub fn live_handle_count(&self) -> usize {
        self.live_counts().iter().map(|(_, n)| n).sum()
    }

    fn live_counts(&self) -> [(&'static str, usize); 8] {
        [
            ("device", self.devices.len()),
            ("buffer", self.buffers.len()),
            ("image", self.images.len()),
            ("shader", self.shaders.len()),
            ("pipeline", self.pipelines.len()),
            ("command buffer", self.command_buffers.len()),
            ("fence", self.fences.len()),
            ("sampler", self.samplers.len()),
        ]
    }

    /// Tear down the instance. Leaked resources are reported, then destroyed
    /// through their owning device before the devices themselves.
    pub fn terminate(self) {
        info!("terminating cgpu instance");
        drop(self);
    }
}

fn create_debug_messenger(entry: &ash::Entry, instance: &ash::Instance) -> Option<DebugMessenger> {
    let loader = ash::ext::debug_utils::Instance::new(entry, instance);
    let info = vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback));

    match unsafe { loader.create_debug_utils_messenger(&info, None) } {
        Ok(messenger) => Some(DebugMessenger { loader, messenger }),
        Err(e) => {
            warn!("unable to create debug messenger: {}", e);
            None
        }
    }
}

impl Drop for Cgpu {
    fn drop(&mut self) {
        for (kind, count) in self.live_counts() {
            if count > 0 {
                warn!("{} live {} handle(s) at terminate", count, kind);
            }
        }

        // Children before their devices.
        release_leaked(&mut self.devices, &mut self.command_buffers);
        release_leaked(&mut self.devices, &mut self.fences);
        release_leaked(&mut self.devices, &mut self.pipelines);
        release_leaked(&mut self.devices, &mut self.shaders);
        release_leaked(&mut self.devices, &mut self.samplers);
        release_leaked(&mut self.devices, &mut self.images);
        release_leaked(&mut self.devices, &mut self.buffers);

        for handle in self.devices.handles() {
            if let Ok(device) = self.devices.free(handle) {
                device.destroy();
            }
        }

        if let Some(debug) = self.debug_messenger.take() {
            unsafe { debug.loader.destroy_debug_utils_messenger(debug.messenger, None) };
        }
        unsafe { self.instance.destroy_instance(None) };
        debug!("instance destroyed");
    }
}
