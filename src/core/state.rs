//! `ReplState` and the value it guards, grounded on `PairedServer.hh`'s
//! `enum ReplState` and `stateMutex`-protected `repl_state` field.

use repl_dirty::DirtyTracker;

/// The three externally-meaningful modes a node can be in. `SendingSync` from
/// the original enum is not a fourth node here: it is a transient sub-phase
/// of `Standalone` where a sync driver happens to be running (see
/// `PairedState::sending_sync`), not a state client-facing code branches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplState {
	Normal,
	Standalone,
	Recovering,
}

/// Everything protected by the single state lock: the mode, whether a sync
/// driver currently owns it (so a second `TriggerSync` for the same peer
/// doesn't race it), and the dirty-block set accumulated while standalone.
/// Combining these matches `PairedServer.hh`'s comment in `BackupIfPossible`
/// ("hold the read lock, in case a sync is in progress") — dirty marking and
/// the sync driver's read of the dirty set must never interleave incorrectly.
pub struct PairedState {
	pub mode: ReplState,
	pub sending_sync: bool,
	pub dirty: DirtyTracker,
}

impl PairedState {
	pub fn new(mode: ReplState) -> Self {
		PairedState {
			mode,
			sending_sync: false,
			dirty: DirtyTracker::new(),
		}
	}
}
