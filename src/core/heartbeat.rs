//! `Heartbeat`: the backup-only, replaceable periodic liveness probe,
//! grounded on `HeartbeatHelper.cc/.hh`. A newly started run bumps a shared
//! iteration counter; the loop it replaces notices the counter moved on and
//! exits on its next check, rather than being cancelled externally (spec
//! §4.7, §9 "Heartbeat replacement").

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::shared::Paired;

#[derive(Clone)]
pub struct Heartbeat {
	iter: Arc<AtomicU64>,
}

impl Heartbeat {
	pub fn new() -> Self {
		Heartbeat {
			iter: Arc::new(AtomicU64::new(0)),
		}
	}

	/// Start a new heartbeat run against `target`, superseding whichever run
	/// (if any) is currently active.
	pub fn start<T: Paired>(&self, target: Arc<T>, interval: Duration) {
		let my_iter = self.iter.fetch_add(1, Ordering::SeqCst) + 1;
		let iter_counter = self.iter.clone();
		tokio::spawn(async move {
			run(target, iter_counter, my_iter, interval).await;
		});
	}
}

impl Default for Heartbeat {
	fn default() -> Self {
		Self::new()
	}
}

async fn run<T: Paired>(target: Arc<T>, iter_counter: Arc<AtomicU64>, my_iter: u64, interval: Duration) {
	tracing::info!("sending heartbeat to primary");
	let mut ok = target.core().client.heartbeat().await.is_ok();

	while iter_counter.load(Ordering::SeqCst) == my_iter && ok {
		tokio::time::sleep(interval).await;
		tracing::debug!("sending heartbeat to primary");
		ok = target.core().client.heartbeat().await.is_ok();
	}

	if ok {
		tracing::info!("heartbeat loop replaced");
	} else {
		tracing::warn!("primary appears to be down; switching to standalone");
		target.core().set_standalone().await;
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::fault::NoopFaultInjector;
	use crate::paired::PairedServer;
	use crate::state::ReplState;
	use repl_rpc::{LoopbackTransport, ReplRpcHandler, ReplicationClient};
	use repl_store::BlockStore;
	use repl_util::{Address, Block, Error};
	use std::sync::atomic::AtomicBool;
	use tempfile::tempdir;

	struct FlakyHandler {
		up: AtomicBool,
	}

	#[async_trait::async_trait]
	impl ReplRpcHandler for FlakyHandler {
		async fn ping(self: &Arc<Self>) -> Result<(), Error> {
			Ok(())
		}
		async fn heartbeat(self: &Arc<Self>) -> Result<(), Error> {
			if self.up.load(Ordering::SeqCst) {
				Ok(())
			} else {
				Err(Error::Transport("down".into()))
			}
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

	struct FakeBackup {
		paired: PairedServer,
	}

	impl Paired for FakeBackup {
		fn core(&self) -> &PairedServer {
			&self.paired
		}
	}

	async fn fake_backup(up: bool) -> (tempfile::TempDir, Arc<FakeBackup>) {
		let dir = tempdir().unwrap();
		let store = Arc::new(BlockStore::init(dir.path().join("blocks.img"), 1).await.unwrap());
		let handler = Arc::new(FlakyHandler {
			up: AtomicBool::new(up),
		});
		let transport = Arc::new(LoopbackTransport::new(handler));
		let client = Arc::new(ReplicationClient::new(transport));
		let paired = PairedServer::new(
			ReplState::Normal,
			store,
			client,
			Arc::new(NoopFaultInjector),
			Duration::from_millis(10),
			Duration::from_millis(50),
		);
		(dir, Arc::new(FakeBackup { paired }))
	}

	#[tokio::test]
	async fn failing_heartbeat_moves_backup_to_standalone() {
		let (_dir, backup) = fake_backup(false).await;
		let hb = Heartbeat::new();
		hb.start(backup.clone(), Duration::from_millis(5));

		tokio::time::sleep(Duration::from_millis(50)).await;
		assert_eq!(backup.core().get_state().await, ReplState::Standalone);
	}

	#[tokio::test]
	async fn starting_a_new_run_retires_the_old_one() {
		let (_dir, backup) = fake_backup(true).await;
		let hb = Heartbeat::new();
		hb.start(backup.clone(), Duration::from_millis(5));
		tokio::time::sleep(Duration::from_millis(20)).await;
		// Starting a second run supersedes the first; neither should crash,
		// and state should remain Normal since the peer is healthy throughout.
		hb.start(backup.clone(), Duration::from_millis(5));
		tokio::time::sleep(Duration::from_millis(30)).await;
		assert_eq!(backup.core().get_state().await, ReplState::Normal);
	}
}
