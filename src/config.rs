/// How a winner is chosen when several positions of one object qualify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TieBreak {
    /// Topmost, then leftmost, qualifying position. Reproducible across runs
    /// and worker counts.
    #[default]
    RowMajor,
    /// Whichever task claims the found flag first.
    Racing,
}

/// Per-process search engine settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Try the Vulkan backend before the CPU search.
    pub use_accelerator: bool,
    pub tie_break: TieBreak,
    /// Rayon worker threads for position scans; `None` uses the global pool.
    pub threads: Option<usize>,
    /// Enable Khronos validation layers when they are installed.
    pub vulkan_validation: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            use_accelerator: true,
            tie_break: TieBreak::RowMajor,
            threads: None,
            vulkan_validation: false,
        }
    }
}

impl EngineConfig {
    /// CPU-only configuration.
    pub fn cpu_only() -> Self {
        Self {
            use_accelerator: false,
            ..Self::default()
        }
    }
}
