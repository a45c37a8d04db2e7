//! Multi-process side of the engine: how ranks talk, which pictures each rank
//! owns, and the two collective protocols built on top.

pub mod aggregate;
pub mod comm;
pub mod distribute;
pub mod local;
pub mod partition;
pub mod tcp;
pub mod wire;

pub use aggregate::aggregate;
pub use comm::{COORDINATOR, Communicator, INPUT_FAILURE_CODE};
pub use distribute::distribute;
pub use local::{LocalCluster, LocalEndpoint};
pub use partition::{assigned_indices, owner_of};
pub use tcp::TcpCommunicator;
pub use wire::WireResult;
