//! Error taxonomy shared across the replication control plane.
//!
//! Variants map directly onto the status codes used on the wire (spec §6/§7):
//! `InvalidArgument` -> INVALID_ARGUMENT, `SwitchNodes` -> ABORTED("switch
//! nodes"), `RecoveryInProgress` -> ABORTED("recovery in progress"),
//! `IncompleteSync` -> ABORTED("incomplete sync"), `StaleSync` ->
//! CANCELLED("stale sync"), `Recovering` -> UNAVAILABLE("recovering"),
//! `InvalidTarget` -> FAILED_PRECONDITION("invalid target").

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("invalid argument: {0}")]
	InvalidArgument(String),

	#[error("switch nodes")]
	SwitchNodes,

	#[error("recovery in progress")]
	RecoveryInProgress,

	#[error("incomplete sync")]
	IncompleteSync,

	#[error("stale sync")]
	StaleSync,

	#[error("recovering")]
	Recovering,

	#[error("invalid target")]
	InvalidTarget,

	#[error("transport error: {0}")]
	Transport(String),

	#[error("configuration error: {0}")]
	Config(String),
}

impl Error {
	/// True for the kinds that a peer-facing caller should treat as evidence
	/// the other node is unreachable (spec §7's TransientError policy).
	pub fn is_peer_failure(&self) -> bool {
		matches!(
			self,
			Error::Transport(_) | Error::Recovering | Error::StaleSync
		)
	}
}
