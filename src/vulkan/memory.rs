use crate::error::{PatternMatchingError, Result};
use ash::{Device, vk};
use bytemuck::Pod;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc};
use gpu_allocator::{AllocationSizes, MemoryLocation};
use std::sync::Mutex;

pub struct VulkanBuffer {
    pub buffer: vk::Buffer,
    pub allocation: Option<Allocation>,
    pub size: u64,
}

/// Host-visible storage buffers for grids and score maps.
pub struct VulkanMemoryManager {
    device: Device,
    allocator: Mutex<Allocator>,
}

impl std::fmt::Debug for VulkanMemoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanMemoryManager")
            .field("device", &"Device")
            .field("allocator", &self.allocator)
            .finish()
    }
}

impl VulkanMemoryManager {
    pub fn new(instance: &ash::Instance, device: Device, physical_device: vk::PhysicalDevice) -> Result<Self> {
        let mut debug_settings = gpu_allocator::AllocatorDebugSettings::default();
        debug_settings.log_leaks_on_shutdown = true;

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: device.clone(),
            physical_device,
            debug_settings,
            buffer_device_address: false,
            allocation_sizes: AllocationSizes::default(),
        })
        .map_err(PatternMatchingError::GpuAllocatorError)?;

        Ok(Self {
            device,
            allocator: Mutex::new(allocator),
        })
    }

    fn allocator(&self) -> Result<std::sync::MutexGuard<'_, Allocator>> {
        self.allocator
            .lock()
            .map_err(|_| PatternMatchingError::AcceleratorUnavailable("allocator mutex poisoned".to_string()))
    }

    /// Create a mapped storage buffer of `size` bytes.
    pub fn create_storage_buffer(&self, size: u64, location: MemoryLocation, name: &str) -> Result<VulkanBuffer> {
        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(vk::BufferUsageFlags::STORAGE_BUFFER)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { self.device.create_buffer(&buffer_info, None) }?;
        let requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };

        let allocation = match self.allocator()?.allocate(&AllocationCreateDesc {
            name,
            requirements,
            location,
            linear: true,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        }) {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { self.device.destroy_buffer(buffer, None) };
                return Err(e.into());
            }
        };

        let bound = unsafe { self.device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) };
        let vulkan_buffer = VulkanBuffer {
            buffer,
            allocation: Some(allocation),
            size,
        };
        if let Err(e) = bound {
            self.destroy_buffer(vulkan_buffer)?;
            return Err(e.into());
        }
        Ok(vulkan_buffer)
    }

    /// Buffer sized for `len` values of `T`, writable from the host.
    pub fn create_input_buffer<T: Pod>(&self, len: usize, name: &str) -> Result<VulkanBuffer> {
        self.create_storage_buffer((len * std::mem::size_of::<T>()) as u64, MemoryLocation::CpuToGpu, name)
    }

    /// Buffer sized for `len` values of `T`, readable from the host.
    pub fn create_output_buffer<T: Pod>(&self, len: usize, name: &str) -> Result<VulkanBuffer> {
        self.create_storage_buffer((len * std::mem::size_of::<T>()) as u64, MemoryLocation::GpuToCpu, name)
    }

    pub fn upload<T: Pod>(&self, buffer: &mut VulkanBuffer, data: &[T]) -> Result<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let mapped = buffer
            .allocation
            .as_mut()
            .and_then(|allocation| allocation.mapped_slice_mut())
            .ok_or(PatternMatchingError::VulkanError(vk::Result::ERROR_MEMORY_MAP_FAILED))?;
        if mapped.len() < bytes.len() {
            return Err(PatternMatchingError::VulkanError(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
        }
        mapped[..bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    pub fn download<T: Pod>(&self, buffer: &VulkanBuffer, data: &mut [T]) -> Result<()> {
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(data);
        let mapped = buffer
            .allocation
            .as_ref()
            .and_then(|allocation| allocation.mapped_slice())
            .ok_or(PatternMatchingError::VulkanError(vk::Result::ERROR_MEMORY_MAP_FAILED))?;
        if mapped.len() < bytes.len() {
            return Err(PatternMatchingError::VulkanError(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
        }
        let len = bytes.len();
        bytes.copy_from_slice(&mapped[..len]);
        Ok(())
    }

    pub fn destroy_buffer(&self, buffer: VulkanBuffer) -> Result<()> {
        unsafe {
            self.device.destroy_buffer(buffer.buffer, None);
        }
        if let Some(allocation) = buffer.allocation {
            self.allocator()?.free(allocation)?;
        }
        Ok(())
    }
}
