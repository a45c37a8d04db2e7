pub mod backend;
pub mod device;
pub mod instance;
pub mod matcher;
pub mod memory;

pub use backend::VulkanBackend;
pub use device::VulkanDevice;
pub use instance::VulkanInstance;
pub use matcher::VulkanScoreMatcher;
pub use memory::{VulkanBuffer, VulkanMemoryManager};
