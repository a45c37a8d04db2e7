use ash::vk;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PatternMatchingError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error at token {token_index}: {reason}")]
    Parse { token_index: usize, reason: String },

    #[error("Invalid grid for {kind} {id}: {reason}")]
    InvalidGrid {
        kind: &'static str,
        id: i32,
        reason: String,
    },

    #[error("Picture {picture_id} has a zero cell at ({row},{col}); zero cells cannot be scored")]
    ZeroPictureCell { picture_id: i32, row: usize, col: usize },

    #[error("Invalid threshold {0}: must be finite and non-negative")]
    InvalidThreshold(f64),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Process group aborted by coordinator with code {code}")]
    GroupAborted { code: i32 },

    #[error("Vulkan error: {0}")]
    VulkanError(#[from] vk::Result),

    #[error("Vulkan entry load error: {0}")]
    VulkanEntryLoadError(String),

    #[error("GPU allocator error: {0}")]
    GpuAllocatorError(#[from] gpu_allocator::AllocationError),

    #[error("No suitable GPU found")]
    NoGpuFound,

    #[error("Pipeline creation error: {0:?}")]
    PipelineCreationError((Vec<vk::Pipeline>, vk::Result)),

    #[error("Accelerator unavailable: {0}")]
    AcceleratorUnavailable(String),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, PatternMatchingError>;

impl PatternMatchingError {
    /// Process exit status for this error. Input problems map to the same code
    /// the coordinator aborts the group with.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::GroupAborted { code } => *code,
            Self::IoError(_)
            | Self::Parse { .. }
            | Self::InvalidGrid { .. }
            | Self::ZeroPictureCell { .. }
            | Self::InvalidThreshold(_) => crate::cluster::INPUT_FAILURE_CODE,
            _ => 1,
        }
    }
}
