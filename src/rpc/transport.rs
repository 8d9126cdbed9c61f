//! `ReplTransport`: the contract `ReplicationClient`/`PairedServer` need from
//! the peer link, per spec §1 (wire transport is an external collaborator;
//! this is the seam). Role handlers and the sync driver are written against
//! this trait, not against `netapp` directly, so unit tests can run over
//! `LoopbackTransport` without a live socket — the equivalent seam in
//! `garage` is `garage_rpc::rpc_helper::RpcHelper` sitting between callers
//! and raw `netapp::Endpoint`s.

use std::sync::Arc;

use async_trait::async_trait;

use repl_util::{Address, Block, Error};

#[async_trait]
pub trait ReplTransport: Send + Sync {
	async fn ping(&self) -> Result<(), Error>;
	async fn heartbeat(&self) -> Result<(), Error>;
	async fn read(&self, addr: Address) -> Result<Block, Error>;
	async fn write(&self, addr: Address, data: Block) -> Result<(), Error>;
	async fn backup_write(&self, addr: Address, data: Block) -> Result<(), Error>;
	async fn trigger_sync(&self, sync_id: i32) -> Result<(), Error>;
	async fn sync_block(&self, sync_id: i32, addr: Address, data: Block) -> Result<(), Error>;
	async fn finish_sync(&self, sync_id: i32, total_blocks: u64) -> Result<(), Error>;
}

/// Implemented by whatever serves inbound RPCs (the role-specific
/// `PairedServer`, in `repl_core`). Kept separate from `ReplTransport` since
/// one node is simultaneously an RPC client (calling its peer) and an RPC
/// server (being called by its peer); this is the server-side half.
///
/// Methods take `self: &Arc<Self>`, the same receiver `netapp::EndpointHandler::handle`
/// uses, so a handler can clone itself into a detached `tokio::spawn` task
/// (the sync driver kicked off by `trigger_sync`, the heartbeat supervisor
/// restarted by `finish_sync`) without a separate weak-self bookkeeping field.
#[async_trait]
pub trait ReplRpcHandler: Send + Sync + 'static {
	async fn ping(self: &Arc<Self>) -> Result<(), Error>;
	async fn heartbeat(self: &Arc<Self>) -> Result<(), Error>;
	async fn read(self: &Arc<Self>, addr: Address) -> Result<Block, Error>;
	async fn write(self: &Arc<Self>, addr: Address, data: Block) -> Result<(), Error>;
	async fn backup_write(self: &Arc<Self>, addr: Address, data: Block) -> Result<(), Error>;
	async fn trigger_sync(self: &Arc<Self>, sync_id: i32) -> Result<(), Error>;
	async fn sync_block(self: &Arc<Self>, sync_id: i32, addr: Address, data: Block) -> Result<(), Error>;
	async fn finish_sync(self: &Arc<Self>, sync_id: i32, total_blocks: u64) -> Result<(), Error>;
}
