//! Glue between the wire enum (`ReplRpc`) and a `ReplRpcHandler`, in the
//! manner of `K2VRpcHandler`'s `impl EndpointHandler<K2VRpc>` — except here
//! the handler is generic so any `ReplRpcHandler` (in practice, the
//! role-specific `PairedServer`) can be wired to the network without
//! `repl_rpc` knowing its concrete type.

use std::convert::TryFrom;
use std::sync::Arc;

use async_trait::async_trait;
use netapp::endpoint::EndpointHandler;
use netapp::NodeID;

use repl_util::{Block, Error};

use crate::message::{ReplRpc, WireError};
use crate::transport::ReplRpcHandler;

pub struct RpcDispatcher<H: ReplRpcHandler> {
	pub handler: Arc<H>,
}

impl<H: ReplRpcHandler> RpcDispatcher<H> {
	pub fn new(handler: Arc<H>) -> Self {
		RpcDispatcher { handler }
	}
}

fn to_wire<T>(result: Result<T, Error>, ok: impl FnOnce(T) -> ReplRpc) -> Result<ReplRpc, WireError> {
	match result {
		Ok(v) => Ok(ok(v)),
		Err(e) => Err(WireError::try_from(&e).unwrap_or_else(|_| {
			// Io/Transport/Config errors have no wire representation; they
			// indicate a local problem, not one of the documented statuses.
			// Surfacing them as InvalidArgument would misreport the cause,
			// so we fall back to the closest documented code.
			tracing::error!(error = %e, "internal error with no wire status, reporting invalid target");
			WireError::InvalidTarget
		})),
	}
}

#[async_trait]
impl<H: ReplRpcHandler> EndpointHandler<ReplRpc> for RpcDispatcher<H> {
	async fn handle(self: &Arc<Self>, message: &ReplRpc, _from: NodeID) -> Result<ReplRpc, WireError> {
		match message {
			ReplRpc::Ping => to_wire(self.handler.ping().await, |_| ReplRpc::Ack),
			ReplRpc::Heartbeat => to_wire(self.handler.heartbeat().await, |_| ReplRpc::Ack),
			ReplRpc::Read { addr } => to_wire(self.handler.read(*addr).await, |b: Block| {
				ReplRpc::ReadResponse {
					data: b.into_vec(),
				}
			}),
			ReplRpc::Write { addr, data } => {
				let block = match Block::from_slice(data) {
					Ok(b) => b,
					Err(e) => return to_wire(Err(e), |_| ReplRpc::Ack),
				};
				to_wire(self.handler.write(*addr, block).await, |_| ReplRpc::Ack)
			}
			ReplRpc::BackupWrite { addr, data } => {
				let block = match Block::from_slice(data) {
					Ok(b) => b,
					Err(e) => return to_wire(Err(e), |_| ReplRpc::Ack),
				};
				to_wire(
					self.handler.backup_write(*addr, block).await,
					|_| ReplRpc::Ack,
				)
			}
			ReplRpc::TriggerSync { sync_id } => to_wire(
				self.handler.trigger_sync(*sync_id).await,
				|_| ReplRpc::Ack,
			),
			ReplRpc::SyncBlock {
				sync_id,
				addr,
				data,
			} => {
				let block = match Block::from_slice(data) {
					Ok(b) => b,
					Err(e) => return to_wire(Err(e), |_| ReplRpc::Ack),
				};
				to_wire(
					self.handler.sync_block(*sync_id, *addr, block).await,
					|_| ReplRpc::Ack,
				)
			}
			ReplRpc::FinishSync {
				sync_id,
				total_blocks,
			} => to_wire(
				self.handler.finish_sync(*sync_id, *total_blocks).await,
				|_| ReplRpc::Ack,
			),
			ReplRpc::Ack | ReplRpc::ReadResponse { .. } => {
				Err(WireError::InvalidArgument("unexpected reply message as request".into()))
			}
		}
	}
}
