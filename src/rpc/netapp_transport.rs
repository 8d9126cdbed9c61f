//! `NetappTransport`: the concrete `ReplTransport`, built the way
//! `garage_block::manager::BlockManager`/`garage_model::k2v::rpc::K2VRpcHandler`
//! build their endpoints (`system.netapp.endpoint(name)`, `set_handler`,
//! a single fixed peer `NodeID` rather than a membership table since this
//! system only ever has one peer).

use std::sync::Arc;
use std::time::Duration;

use netapp::endpoint::{Endpoint, RequestPriority};
use netapp::{NetApp, NodeID};

use repl_util::{Address, Block, Error};

use crate::dispatch::RpcDispatcher;
use crate::message::ReplRpc;
use crate::transport::{ReplRpcHandler, ReplTransport};

/// Priority used for every call this service issues; there is no notion of
/// background vs. interactive traffic here, unlike garage's table/block sync.
const PRIO_NORMAL: RequestPriority = 10;

/// Per-call timeout. Exceeding it surfaces as a transport error, which is
/// treated identically to a peer failure (spec §5 "Cancellation/timeouts").
const CALL_TIMEOUT: Duration = Duration::from_secs(10);

pub struct NetappTransport<H: ReplRpcHandler> {
	#[allow(dead_code)]
	netapp: Arc<NetApp>,
	endpoint: Arc<Endpoint<ReplRpc, RpcDispatcher<H>>>,
	peer: NodeID,
}

impl<H: ReplRpcHandler> NetappTransport<H> {
	/// `name` should be a stable, process-unique endpoint path, in the
	/// manner of `"garage_block/manager.rs/Rpc"`. The handler is wired in
	/// separately via `set_handler`, once it exists: the role server needs
	/// an `Arc<ReplicationClient>` built from this very transport, so
	/// handler and transport can't be constructed in one step (the same
	/// two-phase dance as `BlockManager::new` building its endpoint, then
	/// `block_manager.endpoint.set_handler(block_manager.clone())`
	/// afterwards).
	pub fn new(netapp: Arc<NetApp>, name: &str, peer: NodeID) -> Arc<Self> {
		let endpoint = netapp.endpoint(name.to_string());

		Arc::new(NetappTransport {
			netapp,
			endpoint,
			peer,
		})
	}

	pub fn set_handler(&self, handler: Arc<H>) {
		self.endpoint.set_handler(Arc::new(RpcDispatcher::new(handler)));
	}

	async fn call(&self, msg: ReplRpc) -> Result<ReplRpc, Error> {
		tokio::time::timeout(CALL_TIMEOUT, self.endpoint.call(&self.peer, msg, PRIO_NORMAL))
			.await
			.map_err(|_| Error::Transport(format!("no reply within {:?}", CALL_TIMEOUT)))?
			.map_err(|e| Error::Transport(e.to_string()))?
			.map_err(Error::from)
	}
}

#[async_trait::async_trait]
impl<H: ReplRpcHandler> ReplTransport for NetappTransport<H> {
	async fn ping(&self) -> Result<(), Error> {
		match self.call(ReplRpc::Ping).await? {
			ReplRpc::Ack => Ok(()),
			_ => Err(Error::Transport("unexpected reply to Ping".into())),
		}
	}

	async fn heartbeat(&self) -> Result<(), Error> {
		match self.call(ReplRpc::Heartbeat).await? {
			ReplRpc::Ack => Ok(()),
			_ => Err(Error::Transport("unexpected reply to Heartbeat".into())),
		}
	}

	async fn read(&self, addr: Address) -> Result<Block, Error> {
		match self.call(ReplRpc::Read { addr }).await? {
			ReplRpc::ReadResponse { data } => Block::from_slice(&data),
			_ => Err(Error::Transport("unexpected reply to Read".into())),
		}
	}

	async fn write(&self, addr: Address, data: Block) -> Result<(), Error> {
		match self
			.call(ReplRpc::Write {
				addr,
				data: data.into_vec(),
			})
			.await?
		{
			ReplRpc::Ack => Ok(()),
			_ => Err(Error::Transport("unexpected reply to Write".into())),
		}
	}

	async fn backup_write(&self, addr: Address, data: Block) -> Result<(), Error> {
		match self
			.call(ReplRpc::BackupWrite {
				addr,
				data: data.into_vec(),
			})
			.await?
		{
			ReplRpc::Ack => Ok(()),
			_ => Err(Error::Transport("unexpected reply to BackupWrite".into())),
		}
	}

	async fn trigger_sync(&self, sync_id: i32) -> Result<(), Error> {
		match self.call(ReplRpc::TriggerSync { sync_id }).await? {
			ReplRpc::Ack => Ok(()),
			_ => Err(Error::Transport("unexpected reply to TriggerSync".into())),
		}
	}

	async fn sync_block(&self, sync_id: i32, addr: Address, data: Block) -> Result<(), Error> {
		match self
			.call(ReplRpc::SyncBlock {
				sync_id,
				addr,
				data: data.into_vec(),
			})
			.await?
		{
			ReplRpc::Ack => Ok(()),
			_ => Err(Error::Transport("unexpected reply to SyncBlock".into())),
		}
	}

	async fn finish_sync(&self, sync_id: i32, total_blocks: u64) -> Result<(), Error> {
		match self
			.call(ReplRpc::FinishSync {
				sync_id,
				total_blocks,
			})
			.await?
		{
			ReplRpc::Ack => Ok(()),
			_ => Err(Error::Transport("unexpected reply to FinishSync".into())),
		}
	}
}
