//! Hybrid Distributed-Parallel Pattern Matching
//!
//! Finds, for every picture of a problem, the first pattern object (in list
//! order) that matches somewhere in the picture, where "matches" means the summed
//! relative error between the object and the picture window at that position
//! is below a shared threshold.
//!
//! ## Layers
//!
//! 1. **Matching kernel** (`search::kernel::match_score`)
//!    - Sum of `|p - o| / p` over the object's footprint, computed in a fixed
//!      row-major order so a recomputed score is bit-identical.
//!
//! 2. **Per-picture search** (`search::SearchEngine`)
//!    - Objects are tried in order; positions of one object are scanned by
//!      rayon tasks that stop cooperatively once a winner is known
//!      (`search::scan`).
//!    - An optional Vulkan compute backend (`vulkan::VulkanBackend`) scores
//!      every position on the GPU first; anything short of a verified match
//!      falls back to the CPU search, which is authoritative.
//!
//! 3. **Process group** (`cluster`)
//!    - Rank 0 loads the problem and broadcasts it (`cluster::distribute`).
//!    - Pictures are dealt round-robin (`cluster::partition`), each rank
//!      searches its own, and the coordinator gathers fixed-size result records
//!      back into input order (`cluster::aggregate`).
//!    - Ranks talk through the `cluster::Communicator` trait, implemented by
//!      in-process threads (`cluster::LocalCluster`) and by TCP
//!      (`cluster::TcpCommunicator`).
//!
//! `runner::run_rank` ties the stages together for one rank.

pub mod cluster;
pub mod config;
pub mod error;
pub mod problem;
pub mod runner;
pub mod search;
pub mod vulkan;

pub use config::{EngineConfig, TieBreak};
pub use error::{PatternMatchingError, Result};
pub use problem::{Found, MatchResult, PatternObject, Picture, Position, Problem};
pub use search::{CpuBackend, MatchBackend, SearchEngine, match_score};
