//! The wire message enum carried over a single `netapp::Endpoint`, in the
//! manner of `garage_model::k2v::rpc::K2VRpc` / `garage_block::manager::BlockRpc`:
//! one enum for every request this service surface understands, one `Rpc`
//! impl pinning its response type.

use std::convert::TryFrom;

use serde::{Deserialize, Serialize};

use repl_util::Address;

#[derive(Debug, Serialize, Deserialize)]
pub enum ReplRpc {
	Ping,
	Heartbeat,
	Read {
		addr: Address,
	},
	Write {
		addr: Address,
		#[serde(with = "serde_bytes")]
		data: Vec<u8>,
	},
	BackupWrite {
		addr: Address,
		#[serde(with = "serde_bytes")]
		data: Vec<u8>,
	},
	TriggerSync {
		sync_id: i32,
	},
	SyncBlock {
		sync_id: i32,
		addr: Address,
		#[serde(with = "serde_bytes")]
		data: Vec<u8>,
	},
	FinishSync {
		sync_id: i32,
		total_blocks: u64,
	},

	// ---- replies ----
	Ack,
	ReadResponse {
		#[serde(with = "serde_bytes")]
		data: Vec<u8>,
	},
}

impl netapp::endpoint::Message for ReplRpc {
	type Response = Result<ReplRpc, WireError>;
}

/// Status codes from spec §6/§7, carried on the wire. Kept distinct from
/// `repl_util::Error` so that the internal error type (which wraps
/// non-serializable things like `std::io::Error`) never has to cross the
/// network; handlers translate at the RPC boundary (see `dispatch.rs`).
#[derive(Debug, Serialize, Deserialize)]
pub enum WireError {
	InvalidArgument(String),
	SwitchNodes,
	RecoveryInProgress,
	IncompleteSync,
	StaleSync,
	Recovering,
	InvalidTarget,
}

impl From<WireError> for repl_util::Error {
	fn from(e: WireError) -> Self {
		use repl_util::Error as E;
		match e {
			WireError::InvalidArgument(s) => E::InvalidArgument(s),
			WireError::SwitchNodes => E::SwitchNodes,
			WireError::RecoveryInProgress => E::RecoveryInProgress,
			WireError::IncompleteSync => E::IncompleteSync,
			WireError::StaleSync => E::StaleSync,
			WireError::Recovering => E::Recovering,
			WireError::InvalidTarget => E::InvalidTarget,
		}
	}
}

impl TryFrom<&repl_util::Error> for WireError {
	type Error = ();

	fn try_from(e: &repl_util::Error) -> Result<Self, ()> {
		use repl_util::Error as E;
		Ok(match e {
			E::InvalidArgument(s) => WireError::InvalidArgument(s.clone()),
			E::SwitchNodes => WireError::SwitchNodes,
			E::RecoveryInProgress => WireError::RecoveryInProgress,
			E::IncompleteSync => WireError::IncompleteSync,
			E::StaleSync => WireError::StaleSync,
			E::Recovering => WireError::Recovering,
			E::InvalidTarget => WireError::InvalidTarget,
			// Io/Transport/Config have no wire representation: they never
			// originate from a handler's returned Result, only from the
			// transport layer itself.
			E::Io(_) | E::Transport(_) | E::Config(_) => return Err(()),
		})
	}
}
