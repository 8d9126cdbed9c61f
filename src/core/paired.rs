//! `PairedServer`: the shared state core, grounded on `PairedServer.cc/.hh`.
//! Holds exactly what the original's `stateMutex`/`recoveryMutex` protect,
//! plus the store and peer client every handler needs. Role-specific request
//! handling (`PrimaryServer`/`BackupServer`) is layered on top in `primary.rs`
//! /`backup.rs`; this type has no notion of which role owns it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock, RwLockWriteGuard};

use repl_rpc::ReplicationClient;
use repl_store::BlockStore;
use repl_util::{Address, Block, Error};

use crate::fault::{FaultInjector, FaultPoint};
use crate::recovery::RecoveryState;
use crate::state::{PairedState, ReplState};

/// Logs the violated invariant and aborts the process, matching the
/// original's `cout << "Assumption violated..." << endl; exit(1);` pattern
/// (spec §7 `InvariantViolation`: these situations would otherwise silently
/// corrupt data, so continuing is worse than stopping).
pub(crate) fn invariant_violation(msg: &str) -> ! {
	tracing::error!("{}", msg);
	std::process::exit(1);
}

pub struct PairedServer {
	pub store: Arc<BlockStore>,
	pub client: Arc<ReplicationClient>,
	state: RwLock<PairedState>,
	recovery: Mutex<RecoveryState>,
	fault: Arc<dyn FaultInjector>,
	recovery_check_interval: Duration,
	recovery_timeout: Duration,
}

impl PairedServer {
	pub fn new(
		initial: ReplState,
		store: Arc<BlockStore>,
		client: Arc<ReplicationClient>,
		fault: Arc<dyn FaultInjector>,
		recovery_check_interval: Duration,
		recovery_timeout: Duration,
	) -> Self {
		PairedServer {
			store,
			client,
			state: RwLock::new(PairedState::new(initial)),
			recovery: Mutex::new(RecoveryState::new(0)),
			fault,
			recovery_check_interval,
			recovery_timeout,
		}
	}

	pub fn fault(&self) -> &Arc<dyn FaultInjector> {
		&self.fault
	}

	pub async fn get_state(&self) -> ReplState {
		self.state.read().await.mode
	}

	/// Whether a sync driver currently owns this node's dirty set (the
	/// `SendingSync` sub-phase of `Standalone` — see `state.rs`). Exposed for
	/// observability only; no handler branches on it.
	pub async fn is_sending_sync(&self) -> bool {
		self.state.read().await.sending_sync
	}

	/// Unconditional transition to `Standalone`, used by the heartbeat loop
	/// on failure (§4.7) and the primary's split-brain `Heartbeat` handler.
	pub async fn set_standalone(&self) {
		let mut g = self.state.write().await;
		g.mode = ReplState::Standalone;
	}

	pub async fn read_local(&self, addr: Address) -> Result<Block, Error> {
		self.store.read(addr).await
	}

	pub async fn write_local(&self, addr: Address, block: &Block) -> Result<(), Error> {
		self.store.write(addr, block).await
	}

	/// Primary's `Write` replication policy (§4.5): in `Normal`, drop the read
	/// lock and attempt `backup_write`; on failure, go `Standalone` and mark
	/// dirty. In `Standalone`, mark dirty while holding the lock the whole
	/// time so a concurrent sync can't elide this write.
	pub async fn backup_if_possible(&self, addr: Address, block: &Block) {
		let mode = self.get_state().await;
		match mode {
			ReplState::Normal => {
				if self.fault.should_crash(FaultPoint::BeforeBackupWriteCommit) {
					tracing::warn!(addr, "fault injected before backup_write; write not replicated");
					return;
				}
				match self.client.backup_write(addr, block.clone()).await {
					Ok(()) => {
						if self.fault.should_crash(FaultPoint::AfterBackupWriteCommit) {
							tracing::warn!(addr, "fault injected after backup_write");
							return;
						}
					}
					Err(e) => {
						tracing::warn!(error = %e, addr, "backup appears to be down; switching to standalone");
						let mut g = self.state.write().await;
						g.mode = ReplState::Standalone;
						g.dirty.mark(addr);
					}
				}
			}
			ReplState::Standalone => {
				let mut g = self.state.write().await;
				if g.mode == ReplState::Standalone {
					g.dirty.mark(addr);
				}
			}
			ReplState::Recovering => {
				invariant_violation("attempted to replicate a write while recovering (should never happen)");
			}
		}
	}

	/// Backup's `Write` policy (§4.6): serve only while `Standalone`, marking
	/// dirty under the same lock acquisition that checked the mode. Returns
	/// `true` if the write was accepted.
	pub async fn mark_dirty_if_standalone(&self, addr: Address) -> bool {
		let mut g = self.state.write().await;
		if g.mode == ReplState::Standalone {
			g.dirty.mark(addr);
			true
		} else {
			false
		}
	}

	/// Shared `TriggerSync` receive-side handling (§4.4): enter or remain in
	/// `Standalone`. A `TriggerSync` received while `Recovering` means both
	/// nodes are in recovery simultaneously, an unrecoverable double-failure.
	pub async fn begin_trigger_sync(&self) {
		let mut g = self.state.write().await;
		match g.mode {
			ReplState::Normal | ReplState::Standalone => {
				g.mode = ReplState::Standalone;
			}
			ReplState::Recovering => {
				drop(g);
				invariant_violation(
					"received TriggerSync while already recovering: both nodes are in recovery simultaneously",
				);
			}
		}
	}

	/// The sync driver (§4.3, sender side), run after `TriggerSync` is
	/// accepted. Releases the state lock across every outbound `sync_block`
	/// call and reacquires it to read the next index, so the dirty set may
	/// keep growing from concurrent client writes during the sync; the
	/// terminating condition is "the lock was held and no more entries were
	/// found," never a snapshot taken at the start. Returns whether the sync
	/// completed (`Standalone -> Normal`) or must be retried later.
	pub async fn try_perform_sync(&self, sync_id: i32) -> bool {
		let mut i: usize = 0;
		loop {
			let mut guard = self.state.write().await;
			guard.sending_sync = true;
			if i >= guard.dirty.snapshot_len() {
				return self.finish_as_sender(sync_id, i, guard).await;
			}
			let addr = guard.dirty.addr_at(i);
			drop(guard);
			i += 1;

			let block = match self.store.read(addr).await {
				Ok(b) => b,
				Err(e) => {
					tracing::warn!(error = %e, addr, "failed reading dirty block during sync");
					self.state.write().await.sending_sync = false;
					return false;
				}
			};
			if let Err(e) = self.client.sync_block(sync_id, addr, block).await {
				tracing::warn!(error = %e, addr, "failed to sync block to recovering partner");
				self.state.write().await.sending_sync = false;
				return false;
			}
		}
	}

	/// Finalizes the sync while still holding the state lock from the loop
	/// above, exactly as specified: `finish_sync` is called *with the lock
	/// held*, and the `Standalone -> Normal` transition plus `clear()` happen
	/// atomically with that call's success.
	async fn finish_as_sender(
		&self,
		sync_id: i32,
		total: usize,
		mut guard: RwLockWriteGuard<'_, PairedState>,
	) -> bool {
		match self.client.finish_sync(sync_id, total as u64).await {
			Ok(()) => {
				guard.mode = ReplState::Normal;
				guard.dirty.clear();
				guard.sending_sync = false;
				tracing::info!(blocks = total, "finished recovery of other server");
				true
			}
			Err(e) => {
				guard.sending_sync = false;
				tracing::warn!(error = %e, "finish_sync unsuccessful, recovery of other server incomplete");
				false
			}
		}
	}

	/// Shared `SyncBlock` receive-side handling (§4.4): valid only while
	/// `Recovering`, and only for the current `sync_id`; anything else is a
	/// stale message from an earlier attempt.
	pub async fn handle_sync_block(&self, sync_id: i32, addr: Address, block: Block) -> Result<(), Error> {
		if self.get_state().await != ReplState::Recovering {
			return Err(Error::StaleSync);
		}
		let mut rec = self.recovery.lock().await;
		if sync_id != rec.sync_id {
			return Err(Error::StaleSync);
		}
		self.store.write(addr, &block).await?;
		rec.record_block();
		Ok(())
	}

	/// Shared `FinishSync` receive-side handling (§4.4): total must match
	/// what was actually received; on match, transition `Recovering -> Normal`.
	pub async fn handle_finish_sync(&self, sync_id: i32, total_blocks: u64) -> Result<(), Error> {
		if self.get_state().await != ReplState::Recovering {
			return Err(Error::InvalidTarget);
		}
		let mut rec = self.recovery.lock().await;
		if sync_id != rec.sync_id {
			return Err(Error::StaleSync);
		}
		if total_blocks != rec.blocks_received {
			tracing::warn!(
				expected = total_blocks,
				got = rec.blocks_received,
				"recovery failed: block count mismatch"
			);
			return Err(Error::IncompleteSync);
		}
		rec.done = true;
		drop(rec);

		let mut g = self.state.write().await;
		g.mode = ReplState::Normal;
		tracing::info!(blocks = total_blocks, "finished recovery ({} blocks received)", total_blocks);
		Ok(())
	}

	/// The recovery driver (§4.8, receiving side): seed a fresh `sync_id`,
	/// ask the peer to start sending, then poll until either progress stalls
	/// past the timeout (retry with a new `sync_id`) or `RecoveryState.done`.
	pub async fn run_recovery_driver(&self) {
		loop {
			let sync_id: i32 = {
				let mut rec = self.recovery.lock().await;
				let id = rand::random::<i32>();
				*rec = RecoveryState::new(id);
				id
			};
			tracing::info!(sync_id, "starting recovery attempt");

			if let Err(e) = self.client.trigger_sync(sync_id).await {
				tracing::error!(error = %e, "unable to start recovery process; peer unavailable while this node is restarting");
				std::process::exit(1);
			}

			loop {
				tokio::time::sleep(self.recovery_check_interval).await;
				let rec = self.recovery.lock().await;
				if rec.done {
					tracing::info!("recovery confirmed");
					return;
				}
				if rec.last_progress.elapsed() > self.recovery_timeout {
					tracing::warn!("recovery attempt timed out, retrying with a new sync_id");
					break;
				}
			}
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::fault::NoopFaultInjector;
	use repl_rpc::LoopbackTransport;
	use std::sync::Arc as StdArc;
	use tempfile::tempdir;

	async fn store() -> (tempfile::TempDir, Arc<BlockStore>) {
		let dir = tempdir().unwrap();
		let path = dir.path().join("blocks.img");
		let s = BlockStore::init(&path, 1).await.unwrap();
		(dir, Arc::new(s))
	}

	struct DeadHandler;

	#[async_trait::async_trait]
	impl repl_rpc::ReplRpcHandler for DeadHandler {
		async fn ping(self: &StdArc<Self>) -> Result<(), Error> {
			Err(Error::Transport("no peer in this test".into()))
		}
		async fn heartbeat(self: &StdArc<Self>) -> Result<(), Error> {
			Err(Error::Transport("no peer".into()))
		}
		async fn read(self: &StdArc<Self>, _addr: Address) -> Result<Block, Error> {
			Err(Error::Transport("no peer".into()))
		}
		async fn write(self: &StdArc<Self>, _addr: Address, _data: Block) -> Result<(), Error> {
			Err(Error::Transport("no peer".into()))
		}
		async fn backup_write(self: &StdArc<Self>, _addr: Address, _data: Block) -> Result<(), Error> {
			Err(Error::Transport("no peer".into()))
		}
		async fn trigger_sync(self: &StdArc<Self>, _sync_id: i32) -> Result<(), Error> {
			Err(Error::Transport("no peer".into()))
		}
		async fn sync_block(self: &StdArc<Self>, _sync_id: i32, _addr: Address, _data: Block) -> Result<(), Error> {
			Err(Error::Transport("no peer".into()))
		}
		async fn finish_sync(self: &StdArc<Self>, _sync_id: i32, _total_blocks: u64) -> Result<(), Error> {
			Err(Error::Transport("no peer".into()))
		}
	}

	fn dead_client() -> Arc<ReplicationClient> {
		let transport = StdArc::new(LoopbackTransport::new(StdArc::new(DeadHandler)));
		Arc::new(ReplicationClient::new(transport))
	}

	#[tokio::test]
	async fn normal_backup_write_failure_marks_dirty_and_goes_standalone() {
		let (_dir, blockstore) = store().await;
		let p = PairedServer::new(
			ReplState::Normal,
			blockstore,
			dead_client(),
			StdArc::new(NoopFaultInjector),
			Duration::from_millis(10),
			Duration::from_millis(50),
		);
		let block = Block::zeroed();
		p.backup_if_possible(4096, &block).await;
		assert_eq!(p.get_state().await, ReplState::Standalone);
	}

	#[tokio::test]
	async fn standalone_write_marks_dirty_without_changing_state() {
		let (_dir, blockstore) = store().await;
		let p = PairedServer::new(
			ReplState::Standalone,
			blockstore,
			dead_client(),
			StdArc::new(NoopFaultInjector),
			Duration::from_millis(10),
			Duration::from_millis(50),
		);
		assert!(p.mark_dirty_if_standalone(100).await);
		assert_eq!(p.get_state().await, ReplState::Standalone);
	}

	#[tokio::test]
	async fn sync_block_outside_recovering_is_stale() {
		let (_dir, blockstore) = store().await;
		let p = PairedServer::new(
			ReplState::Normal,
			blockstore,
			dead_client(),
			StdArc::new(NoopFaultInjector),
			Duration::from_millis(10),
			Duration::from_millis(50),
		);
		let err = p.handle_sync_block(1, 0, Block::zeroed()).await.unwrap_err();
		assert!(matches!(err, Error::StaleSync));
	}

	#[tokio::test]
	async fn finish_sync_rejects_mismatched_count() {
		let (_dir, blockstore) = store().await;
		let p = PairedServer::new(
			ReplState::Recovering,
			blockstore,
			dead_client(),
			StdArc::new(NoopFaultInjector),
			Duration::from_millis(10),
			Duration::from_millis(50),
		);
		// Prime recovery state with a known sync_id via a sync_block write.
		{
			let mut rec = p.recovery.lock().await;
			*rec = RecoveryState::new(42);
		}
		p.handle_sync_block(42, 0, Block::zeroed()).await.unwrap();
		let err = p.handle_finish_sync(42, 5).await.unwrap_err();
		assert!(matches!(err, Error::IncompleteSync));
		assert_eq!(p.get_state().await, ReplState::Recovering);
	}

	#[tokio::test]
	async fn finish_sync_accepts_matching_count_and_goes_normal() {
		let (_dir, blockstore) = store().await;
		let p = PairedServer::new(
			ReplState::Recovering,
			blockstore,
			dead_client(),
			StdArc::new(NoopFaultInjector),
			Duration::from_millis(10),
			Duration::from_millis(50),
		);
		{
			let mut rec = p.recovery.lock().await;
			*rec = RecoveryState::new(7);
		}
		p.handle_sync_block(7, 0, Block::zeroed()).await.unwrap();
		p.handle_finish_sync(7, 1).await.unwrap();
		assert_eq!(p.get_state().await, ReplState::Normal);
	}

	#[tokio::test]
	async fn try_perform_sync_sends_all_dirty_blocks_then_finishes() {
		let (_dir, st) = store().await;
		st.write(0, &Block::zeroed()).await.unwrap();

		struct CollectingHandler {
			received: StdArc<std::sync::Mutex<Vec<Address>>>,
		}

		#[async_trait::async_trait]
		impl repl_rpc::ReplRpcHandler for CollectingHandler {
			async fn ping(self: &StdArc<Self>) -> Result<(), Error> {
				Ok(())
			}
			async fn heartbeat(self: &StdArc<Self>) -> Result<(), Error> {
				Ok(())
			}
			async fn read(self: &StdArc<Self>, _addr: Address) -> Result<Block, Error> {
				Ok(Block::zeroed())
			}
			async fn write(self: &StdArc<Self>, _addr: Address, _data: Block) -> Result<(), Error> {
				Ok(())
			}
			async fn backup_write(self: &StdArc<Self>, _addr: Address, _data: Block) -> Result<(), Error> {
				Ok(())
			}
			async fn trigger_sync(self: &StdArc<Self>, _sync_id: i32) -> Result<(), Error> {
				Ok(())
			}
			async fn sync_block(self: &StdArc<Self>, _sync_id: i32, addr: Address, _data: Block) -> Result<(), Error> {
				self.received.lock().unwrap().push(addr);
				Ok(())
			}
			async fn finish_sync(self: &StdArc<Self>, _sync_id: i32, _total_blocks: u64) -> Result<(), Error> {
				Ok(())
			}
		}

		let received = StdArc::new(std::sync::Mutex::new(Vec::new()));
		let handler = StdArc::new(CollectingHandler {
			received: received.clone(),
		});
		let transport = StdArc::new(LoopbackTransport::new(handler));
		let client = Arc::new(ReplicationClient::new(transport));

		let p = PairedServer::new(
			ReplState::Standalone,
			st,
			client,
			StdArc::new(NoopFaultInjector),
			Duration::from_millis(10),
			Duration::from_millis(50),
		);
		p.mark_dirty_if_standalone(0).await;

		assert!(p.try_perform_sync(99).await);
		assert_eq!(p.get_state().await, ReplState::Normal);
		assert_eq!(*received.lock().unwrap(), vec![0]);
		assert!(!p.is_sending_sync().await);
	}
}
