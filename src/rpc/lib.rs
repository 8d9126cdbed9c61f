pub mod client;
pub mod dispatch;
pub mod loopback;
pub mod message;
pub mod netapp_transport;
pub mod transport;

pub use client::ReplicationClient;
pub use loopback::LoopbackTransport;
pub use message::{ReplRpc, WireError};
pub use netapp_transport::NetappTransport;
pub use transport::{ReplRpcHandler, ReplTransport};

// Re-exported so downstream crates that build a concrete NetappTransport
// don't need a direct `netapp` dependency of their own, in the manner of
// `garage_rpc`'s `pub use netapp::{...}` blanket re-export.
pub use netapp::{NetApp, NodeID};
