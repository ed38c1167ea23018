use std::time::Duration;

use ash::vk;
use tracing::debug;

use cgpu_core::{CommandBufferHandle, DeviceHandle, FenceHandle};

use crate::context::{check_owner, destroy_child, Cgpu, DeviceChild};
use crate::device::DeviceResource;
use crate::error::{CgpuError, Result};

pub(crate) struct FenceResource {
    pub(crate) device: DeviceHandle,
    pub(crate) fence: vk::Fence,
}

impl DeviceChild for FenceResource {
    fn owner(&self) -> DeviceHandle {
        self.device
    }

    fn destroy(self, dev: &mut DeviceResource) {
        unsafe { dev.device.destroy_fence(self.fence, None) };
    }
}

impl Cgpu {
    /// Create a fence. It starts signaled so the first wait returns immediately.
    pub fn create_fence(&mut self, device: DeviceHandle) -> Result<FenceHandle> {
        let dev = self.devices.resolve(device)?;
        let info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);
        let fence = unsafe { dev.device.create_fence(&info, None) }.map_err(CgpuError::FenceCreation)?;
        let handle = self.fences.allocate(FenceResource { device, fence });
        debug!("created fence {:?}", handle);
        Ok(handle)
    }

    pub fn destroy_fence(&mut self, device: DeviceHandle, fence: FenceHandle) -> Result<()> {
        destroy_child(&mut self.devices, &mut self.fences, device, fence)
    }

    pub fn reset_fence(&mut self, device: DeviceHandle, fence: FenceHandle) -> Result<()> {
        let dev = self.devices.resolve(device)?;
        let resource = self.fences.resolve(fence)?;
        check_owner(resource, device)?;
        unsafe { dev.device.reset_fences(&[resource.fence]) }.map_err(CgpuError::FenceReset)
    }

    /// Block until the fence is signaled.
    pub fn wait_for_fence(&mut self, device: DeviceHandle, fence: FenceHandle) -> Result<()> {
        let dev = self.devices.resolve(device)?;
        let resource = self.fences.resolve(fence)?;
        check_owner(resource, device)?;
        unsafe { dev.device.wait_for_fences(&[resource.fence], true, u64::MAX) }
            .map_err(CgpuError::FenceWait)
    }

    /// Wait at most `timeout`. Returns `false` if the fence did not signal in time.
    pub fn wait_for_fence_timeout(
        &mut self,
        device: DeviceHandle,
        fence: FenceHandle,
        timeout: Duration,
    ) -> Result<bool> {
        let dev = self.devices.resolve(device)?;
        let resource = self.fences.resolve(fence)?;
        check_owner(resource, device)?;
        let nanos = u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX);
        match unsafe { dev.device.wait_for_fences(&[resource.fence], true, nanos) } {
            Ok(()) => Ok(true),
            Err(vk::Result::TIMEOUT) => Ok(false),
            Err(e) => Err(CgpuError::FenceWait(e)),
        }
    }

    /// Non-blocking signal check.
    pub fn fence_signaled(&self, device: DeviceHandle, fence: FenceHandle) -> Result<bool> {
        let dev = self.devices.resolve(device)?;
        let resource = self.fences.resolve(fence)?;
        check_owner(resource, device)?;
        unsafe { dev.device.get_fence_status(resource.fence) }.map_err(CgpuError::FenceWait)
    }

    /// Submit a recorded command buffer to the device's compute queue. The fence
    /// must be unsignaled and is signaled when the work completes.
    pub fn submit_command_buffer(
        &mut self,
        device: DeviceHandle,
        command_buffer: CommandBufferHandle,
        fence: FenceHandle,
    ) -> Result<()> {
        let dev = self.devices.resolve(device)?;
        let cmd = self.command_buffers.resolve(command_buffer)?;
        check_owner(cmd, device)?;
        let resource = self.fences.resolve(fence)?;
        check_owner(resource, device)?;

        let command_buffers = [cmd.command_buffer];
        let submit = vk::SubmitInfo::default().command_buffers(&command_buffers);
        unsafe { dev.device.queue_submit(dev.queue, &[submit], resource.fence) }
            .map_err(CgpuError::Submission)?;
        debug!("submitted {:?} signaling {:?}", command_buffer, fence);
        Ok(())
    }

    /// Block until the device has finished all submitted work.
    pub fn wait_idle(&mut self, device: DeviceHandle) -> Result<()> {
        let dev = self.devices.resolve(device)?;
        unsafe { dev.device.device_wait_idle() }.map_err(CgpuError::DeviceWaitIdle)
    }
}
