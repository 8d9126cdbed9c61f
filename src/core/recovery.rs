//! `RecoveryState`, grounded on `PairedServer.hh`'s `class RecoveryState`:
//! tracks one in-flight sync attempt as seen from the *receiving* side
//! (`sync_id` fences stale `SyncBlock`/`FinishSync` messages from an earlier
//! attempt; `last_progress` drives the recovery driver's timeout).

use std::time::Instant;

pub struct RecoveryState {
	pub sync_id: i32,
	pub blocks_received: u64,
	pub last_progress: Instant,
	pub done: bool,
}

impl RecoveryState {
	pub fn new(sync_id: i32) -> Self {
		RecoveryState {
			sync_id,
			blocks_received: 0,
			last_progress: Instant::now(),
			done: false,
		}
	}

	pub fn record_block(&mut self) {
		self.blocks_received += 1;
		self.last_progress = Instant::now();
	}
}
