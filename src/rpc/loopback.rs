//! `LoopbackTransport`: an in-process `ReplTransport` that calls straight
//! into a peer's `ReplRpcHandler`, no socket involved. Plays the role
//! `garage`'s in-memory `garage_db` backend plays for its own table tests:
//! lets `repl_core`'s state-machine and scenario tests (S1-S6) run
//! deterministically without standing up real netapp sockets.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use repl_util::{Address, Block, Error};

use crate::transport::{ReplRpcHandler, ReplTransport};

pub struct LoopbackTransport<H: ReplRpcHandler> {
	peer: Arc<H>,
	/// Flipped by tests to simulate the peer going unreachable (spec S2/S4/S5).
	severed: Arc<AtomicBool>,
}

impl<H: ReplRpcHandler> LoopbackTransport<H> {
	pub fn new(peer: Arc<H>) -> Self {
		LoopbackTransport {
			peer,
			severed: Arc::new(AtomicBool::new(false)),
		}
	}

	/// A handle that can be used to sever (and later restore) the link from
	/// outside, simulating a network partition or a crashed peer.
	pub fn severed_handle(&self) -> Arc<AtomicBool> {
		self.severed.clone()
	}

	fn check_severed(&self) -> Result<(), Error> {
		if self.severed.load(Ordering::SeqCst) {
			Err(Error::Transport("loopback link severed".into()))
		} else {
			Ok(())
		}
	}
}

#[async_trait]
impl<H: ReplRpcHandler> ReplTransport for LoopbackTransport<H> {
	async fn ping(&self) -> Result<(), Error> {
		self.check_severed()?;
		self.peer.ping().await
	}

	async fn heartbeat(&self) -> Result<(), Error> {
		self.check_severed()?;
		self.peer.heartbeat().await
	}

	async fn read(&self, addr: Address) -> Result<Block, Error> {
		self.check_severed()?;
		self.peer.read(addr).await
	}

	async fn write(&self, addr: Address, data: Block) -> Result<(), Error> {
		self.check_severed()?;
		self.peer.write(addr, data).await
	}

	async fn backup_write(&self, addr: Address, data: Block) -> Result<(), Error> {
		self.check_severed()?;
		self.peer.backup_write(addr, data).await
	}

	async fn trigger_sync(&self, sync_id: i32) -> Result<(), Error> {
		self.check_severed()?;
		self.peer.trigger_sync(sync_id).await
	}

	async fn sync_block(&self, sync_id: i32, addr: Address, data: Block) -> Result<(), Error> {
		self.check_severed()?;
		self.peer.sync_block(sync_id, addr, data).await
	}

	async fn finish_sync(&self, sync_id: i32, total_blocks: u64) -> Result<(), Error> {
		self.check_severed()?;
		self.peer.finish_sync(sync_id, total_blocks).await
	}
}
