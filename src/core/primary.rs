//! `PrimaryServer`, grounded on `PrimaryServer.cc/.hh`: primary-specific
//! request handling and backup-failure detection. Shared receive-side RPCs
//! (`Ping`/`TriggerSync`/`SyncBlock`/`FinishSync`) delegate to `shared.rs`.

use std::sync::Arc;

use async_trait::async_trait;

use repl_rpc::{ReplRpcHandler, ReplicationClient};
use repl_store::BlockStore;
use repl_util::{Address, Block, Error};

use crate::fault::FaultInjector;
use crate::paired::{invariant_violation, PairedServer};
use crate::shared::{self, Paired};
use crate::state::ReplState;

pub struct PrimaryServer {
	paired: PairedServer,
}

impl PrimaryServer {
	pub fn new(
		initial: ReplState,
		store: Arc<BlockStore>,
		client: Arc<ReplicationClient>,
		fault: Arc<dyn FaultInjector>,
		recovery_check_interval: std::time::Duration,
		recovery_timeout: std::time::Duration,
	) -> Arc<Self> {
		Arc::new(PrimaryServer {
			paired: PairedServer::new(initial, store, client, fault, recovery_check_interval, recovery_timeout),
		})
	}

	pub fn core(&self) -> &PairedServer {
		&self.paired
	}

	/// Runs the recovery driver to completion; callers spawn this themselves
	/// at bootstrap when starting in `Recovering` (§4.8).
	pub async fn run_recovery(&self) {
		self.paired.run_recovery_driver().await;
	}
}

impl Paired for PrimaryServer {
	fn core(&self) -> &PairedServer {
		&self.paired
	}
	// PrimaryServer.cc never overrides HandlePartnerRecovered/FinishSync's
	// hook — the default no-op applies.
}

#[async_trait]
impl ReplRpcHandler for PrimaryServer {
	async fn ping(self: &Arc<Self>) -> Result<(), Error> {
		shared::shared_ping(self).await
	}

	/// §4.5: `Normal` -> ok; `Standalone` -> split-brain, fatal exit (the
	/// backup believes the primary is down while the primary is still
	/// serving); `Recovering` -> cue the backup into `Standalone`.
	async fn heartbeat(self: &Arc<Self>) -> Result<(), Error> {
		match self.paired.get_state().await {
			ReplState::Normal => Ok(()),
			ReplState::Standalone => invariant_violation(
				"primary received a heartbeat while standalone: the backup inferred a failure without a restart, suggesting a network partition",
			),
			ReplState::Recovering => Err(Error::RecoveryInProgress),
		}
	}

	async fn read(self: &Arc<Self>, addr: Address) -> Result<Block, Error> {
		if self.paired.get_state().await == ReplState::Recovering {
			return Err(Error::SwitchNodes);
		}
		self.paired.read_local(addr).await
	}

	async fn write(self: &Arc<Self>, addr: Address, data: Block) -> Result<(), Error> {
		if self.paired.get_state().await == ReplState::Recovering {
			return Err(Error::SwitchNodes);
		}
		self.paired.write_local(addr, &data).await?;
		self.paired.backup_if_possible(addr, &data).await;
		Ok(())
	}

	/// The primary must never receive its own replication message.
	async fn backup_write(self: &Arc<Self>, _addr: Address, _data: Block) -> Result<(), Error> {
		Err(Error::InvalidTarget)
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
