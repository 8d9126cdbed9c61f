//! `ReplicationClient`: typed outbound calls to the peer (spec §4.3), a thin
//! wrapper over whatever `ReplTransport` is configured (netapp for
//! production, loopback for tests). The sync driver's lock-release/reacquire
//! choreography lives in `repl_core`, which owns the state lock it must
//! coordinate with; this type only exposes the calls it drives.

use std::sync::Arc;
use std::time::Duration;

use repl_util::{Address, Block, Error};

use crate::transport::ReplTransport;

pub struct ReplicationClient {
	transport: Arc<dyn ReplTransport>,
}

impl ReplicationClient {
	pub fn new(transport: Arc<dyn ReplTransport>) -> Self {
		ReplicationClient { transport }
	}

	/// Retry-with-backoff liveness probe, used at startup to wait for the
	/// peer before proceeding (grounded in `ReplicationModule::PingOnce`,
	/// which loops `sleep(1)` between attempts until the peer answers).
	pub async fn ping_until_reachable(&self, retry_delay: Duration) {
		loop {
			tracing::info!("attempting to ping the other server...");
			match self.transport.ping().await {
				Ok(()) => {
					tracing::info!("ping response received");
					return;
				}
				Err(e) => {
					tracing::warn!(error = %e, "ping failed, retrying");
					tokio::time::sleep(retry_delay).await;
				}
			}
		}
	}

	pub async fn heartbeat(&self) -> Result<(), Error> {
		self.transport.heartbeat().await
	}

	pub async fn backup_write(&self, addr: Address, data: Block) -> Result<(), Error> {
		self.transport.backup_write(addr, data).await
	}

	pub async fn trigger_sync(&self, sync_id: i32) -> Result<(), Error> {
		self.transport.trigger_sync(sync_id).await
	}

	pub async fn sync_block(&self, sync_id: i32, addr: Address, data: Block) -> Result<(), Error> {
		self.transport.sync_block(sync_id, addr, data).await
	}

	pub async fn finish_sync(&self, sync_id: i32, total_blocks: u64) -> Result<(), Error> {
		self.transport.finish_sync(sync_id, total_blocks).await
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::loopback::LoopbackTransport;
	use crate::transport::ReplRpcHandler;
	use async_trait::async_trait;
	use std::sync::atomic::{AtomicU32, Ordering};

	struct CountingHandler {
		pings: AtomicU32,
	}

	#[async_trait]
	impl ReplRpcHandler for CountingHandler {
		async fn ping(self: &Arc<Self>) -> Result<(), Error> {
			self.pings.fetch_add(1, Ordering::SeqCst);
			Ok(())
		}
		async fn heartbeat(self: &Arc<Self>) -> Result<(), Error> {
			Ok(())
		}
		async fn read(self: &Arc<Self>, _addr: Address) -> Result<Block, Error> {
			Ok(Block::zeroed())
		}
		async fn write(self: &Arc<Self>, _addr: Address, _data: Block) -> Result<(), Error> {
			Ok(())
		}
		async fn backup_write(self: &Arc<Self>, _addr: Address, _data: Block) -> Result<(), Error> {
			Ok(())
		}
		async fn trigger_sync(self: &Arc<Self>, _sync_id: i32) -> Result<(), Error> {
			Ok(())
		}
		async fn sync_block(self: &Arc<Self>, _sync_id: i32, _addr: Address, _data: Block) -> Result<(), Error> {
			Ok(())
		}
		async fn finish_sync(self: &Arc<Self>, _sync_id: i32, _total_blocks: u64) -> Result<(), Error> {
			Ok(())
		}
	}

	#[tokio::test]
	async fn ping_until_reachable_returns_once_peer_answers() {
		let handler = Arc::new(CountingHandler {
			pings: AtomicU32::new(0),
		});
		let transport = Arc::new(LoopbackTransport::new(handler.clone()));
		let client = ReplicationClient::new(transport);

		client.ping_until_reachable(Duration::from_millis(1)).await;
		assert!(handler.pings.load(Ordering::SeqCst) >= 1);
	}
}
