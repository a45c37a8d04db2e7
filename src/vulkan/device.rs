use crate::error::{PatternMatchingError, Result};
use ash::{Device, Instance, vk};
use log::{debug, info};
use std::ffi::CStr;

pub struct VulkanDevice {
    pub physical_device: vk::PhysicalDevice,
    pub device: Device,
    pub compute_queue: vk::Queue,
    pub compute_queue_family_index: u32,
}

impl std::fmt::Debug for VulkanDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanDevice")
            .field("physical_device", &self.physical_device)
            .field("device", &"Device")
            .field("compute_queue", &self.compute_queue)
            .field("compute_queue_family_index", &self.compute_queue_family_index)
            .finish()
    }
}

impl VulkanDevice {
    /// Pick the first physical device exposing a compute queue.
    pub fn new(instance: &Instance) -> Result<Self> {
        let physical_devices =
            unsafe { instance.enumerate_physical_devices() }.map_err(PatternMatchingError::VulkanError)?;

        let (physical_device, compute_queue_family_index) = physical_devices
            .iter()
            .find_map(|&device| Self::find_compute_queue_family(instance, device).map(|index| (device, index)))
            .ok_or(PatternMatchingError::NoGpuFound)?;

        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let device_name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }.to_string_lossy();
        info!("Selected GPU: {}", device_name);

        let limits = &properties.limits;
        debug!(
            "Max compute workgroup count: {}x{}x{}, invocations per group: {}",
            limits.max_compute_work_group_count[0],
            limits.max_compute_work_group_count[1],
            limits.max_compute_work_group_count[2],
            limits.max_compute_work_group_invocations
        );

        let queue_priorities = [1.0];
        let queue_create_info = vk::DeviceQueueCreateInfo::default()
            .queue_family_index(compute_queue_family_index)
            .queue_priorities(&queue_priorities);

        let device_create_info =
            vk::DeviceCreateInfo::default().queue_create_infos(std::slice::from_ref(&queue_create_info));

        let device = unsafe { instance.create_device(physical_device, &device_create_info, None) }
            .map_err(PatternMatchingError::VulkanError)?;
        let compute_queue = unsafe { device.get_device_queue(compute_queue_family_index, 0) };

        Ok(Self {
            physical_device,
            device,
            compute_queue,
            compute_queue_family_index,
        })
    }

    fn find_compute_queue_family(instance: &Instance, device: vk::PhysicalDevice) -> Option<u32> {
        let queue_family_properties = unsafe { instance.get_physical_device_queue_family_properties(device) };

        queue_family_properties
            .iter()
            .position(|properties| properties.queue_flags.contains(vk::QueueFlags::COMPUTE))
            .map(|index| index as u32)
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
    }
}
