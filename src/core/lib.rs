//! Role-aware replication state machine: the shared `PairedServer` core plus
//! its `PrimaryServer`/`BackupServer` specializations, the sync and heartbeat
//! drivers, and fault injection hooks for crash testing.

pub mod backup;
pub mod fault;
pub mod heartbeat;
pub mod paired;
pub mod primary;
pub mod recovery;
pub mod shared;
pub mod state;

pub use backup::BackupServer;
pub use fault::{FaultInjector, FaultPoint, NoopFaultInjector, OnceAt};
pub use heartbeat::Heartbeat;
pub use paired::PairedServer;
pub use primary::PrimaryServer;
pub use recovery::RecoveryState;
pub use shared::Paired;
pub use state::ReplState;
