//! `BackupServer`, grounded on `BackupServer.cc/.hh`: backup-specific request
//! handling, the sync-finish-restarts-heartbeat hook, and ownership of the
//! `Heartbeat` run. Shared receive-side RPCs delegate to `shared.rs`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use repl_rpc::{ReplRpcHandler, ReplicationClient};
use repl_store::BlockStore;
use repl_util::{Address, Block, Error};

use crate::fault::{FaultInjector, FaultPoint};
use crate::heartbeat::Heartbeat;
use crate::paired::{invariant_violation, PairedServer};
use crate::shared::{self, Paired};
use crate::state::ReplState;

pub struct BackupServer {
	paired: PairedServer,
	heartbeat: Heartbeat,
	heartbeat_interval: Duration,
}

impl BackupServer {
	pub fn new(
		store: Arc<BlockStore>,
		client: Arc<ReplicationClient>,
		fault: Arc<dyn FaultInjector>,
		heartbeat_interval: Duration,
		recovery_check_interval: Duration,
		recovery_timeout: Duration,
	) -> Arc<Self> {
		// Every backup start is Recovering unconditionally (spec §4.4): a
		// fresh backup always pulls from the primary to cover writes served
		// before it came online.
		Arc::new(BackupServer {
			paired: PairedServer::new(
				ReplState::Recovering,
				store,
				client,
				fault,
				recovery_check_interval,
				recovery_timeout,
			),
			heartbeat: Heartbeat::new(),
			heartbeat_interval,
		})
	}

	pub fn core(&self) -> &PairedServer {
		&self.paired
	}

	pub async fn run_recovery(&self) {
		self.paired.run_recovery_driver().await;
	}
}

impl Paired for BackupServer {
	fn core(&self) -> &PairedServer {
		&self.paired
	}

	/// Both the sender-side ("the other node just finished recovering
	/// through us") and receiver-side ("we just finished recovering")
	/// transitions to `Normal` need the backup's heartbeat loop running
	/// against the primary; `BackupServer.cc` restarts it from two separate
	/// override points (`HandlePartnerRecovered` and `FinishSync`) that do
	/// exactly this, which is why they're unified into one hook here.
	fn on_became_normal(self: &Arc<Self>) {
		self.heartbeat.start(self.clone(), self.heartbeat_interval);
	}
}

#[async_trait]
impl ReplRpcHandler for BackupServer {
	async fn ping(self: &Arc<Self>) -> Result<(), Error> {
		shared::shared_ping(self).await
	}

	/// The backup must never receive a heartbeat (it only sends them).
	async fn heartbeat(self: &Arc<Self>) -> Result<(), Error> {
		Err(Error::InvalidTarget)
	}

	async fn read(self: &Arc<Self>, addr: Address) -> Result<Block, Error> {
		if self.paired.get_state().await != ReplState::Standalone {
			return Err(Error::SwitchNodes);
		}
		self.paired.read_local(addr).await
	}

	/// Held for the duration of this method (spec §4.6/§5): a shared
	/// check-then-mark under one lock acquisition prevents a concurrent
	/// `Standalone -> Normal` transition from eliding this write.
	async fn write(self: &Arc<Self>, addr: Address, data: Block) -> Result<(), Error> {
		if self.paired.get_state().await != ReplState::Standalone {
			return Err(Error::SwitchNodes);
		}
		self.paired.write_local(addr, &data).await?;
		if !self.paired.mark_dirty_if_standalone(addr).await {
			return Err(Error::SwitchNodes);
		}
		Ok(())
	}

	/// §4.6: `Normal` -> commit; `Standalone` -> split-brain, fatal exit (the
	/// primary is still alive and replicating while we think we're alone);
	/// `Recovering` -> tell the primary to fall back to `Standalone`.
	async fn backup_write(self: &Arc<Self>, addr: Address, data: Block) -> Result<(), Error> {
		match self.paired.get_state().await {
			ReplState::Normal => {
				self.paired.write_local(addr, &data).await?;
				if self.paired.fault().should_crash(FaultPoint::AfterLocalWriteCommit) {
					tracing::warn!(addr, "fault injected after backup_write local commit");
					return Err(Error::Transport("fault injected after backup_write local commit".into()));
				}
				Ok(())
			}
			ReplState::Standalone => invariant_violation(
				"backup received a replication message while standalone: both nodes are serving clients, suggesting a network partition",
			),
			ReplState::Recovering => Err(Error::Recovering),
		}
	}

	async fn trigger_sync(self: &Arc<Self>, sync_id: i32) -> Result<(), Error> {
		shared::shared_trigger_sync(self, sync_id).await
	}

	async fn sync_block(self: &Arc<Self>, sync_id: i32, addr: Address, data: Block) -> Result<(), Error> {
		shared::shared_sync_block(self, sync_id, addr, data).await
	}

	async fn finish_sync(self: &Arc<Self>, sync_id: i32, total_blocks: u64) -> Result<(), Error> {
		shared::shared_finish_sync(self, sync_id, total_blocks).await
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::fault::NoopFaultInjector;
	use repl_rpc::LoopbackTransport;
	use tempfile::tempdir;

	struct AlwaysOkPrimary;

	#[async_trait]
	impl ReplRpcHandler for AlwaysOkPrimary {
		async fn ping(self: &Arc<Self>) -> Result<(), Error> {
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

	async fn backup() -> (tempfile::TempDir, Arc<BackupServer>) {
		let dir = tempdir().unwrap();
		let store = Arc::new(BlockStore::init(dir.path().join("blocks.img"), 1).await.unwrap());
		let transport = Arc::new(LoopbackTransport::new(Arc::new(AlwaysOkPrimary)));
		let client = Arc::new(ReplicationClient::new(transport));
		let b = BackupServer::new(
			store,
			client,
			Arc::new(NoopFaultInjector),
			Duration::from_millis(10),
			Duration::from_millis(10),
			Duration::from_millis(50),
		);
		(dir, b)
	}

	#[tokio::test]
	async fn backup_starts_recovering() {
		let (_dir, b) = backup().await;
		assert_eq!(b.core().get_state().await, ReplState::Recovering);
	}

	#[tokio::test]
	async fn read_redirects_unless_standalone() {
		let (_dir, b) = backup().await;
		let err = b.read(0).await.unwrap_err();
		assert!(matches!(err, Error::SwitchNodes));
	}

	#[tokio::test]
	async fn write_served_and_marked_dirty_while_standalone() {
		let (_dir, b) = backup().await;
		b.core().set_standalone().await;
		b.write(0, Block::from_slice(&[9u8; repl_util::BLOCK_SIZE]).unwrap())
			.await
			.unwrap();
		assert_eq!(b.read(0).await.unwrap(), Block::from_slice(&[9u8; repl_util::BLOCK_SIZE]).unwrap());
	}

	#[tokio::test]
	async fn backup_write_recovering_tells_primary_to_retry_later() {
		let (_dir, b) = backup().await; // starts Recovering
		let err = b.backup_write(0, Block::zeroed()).await.unwrap_err();
		assert!(matches!(err, Error::Recovering));
	}

	#[tokio::test]
	async fn heartbeat_is_always_rejected() {
		let (_dir, b) = backup().await;
		let err = b.heartbeat().await.unwrap_err();
		assert!(matches!(err, Error::InvalidTarget));
	}
}
