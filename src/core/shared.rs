//! Shared RPC handling that is identical for `PrimaryServer` and
//! `BackupServer` — `Ping`, `TriggerSync`, `SyncBlock`, `FinishSync` are not
//! overridden in `PrimaryServer.cc`/`BackupServer.cc`, only in the base
//! `PairedServer.cc`. Expressed as free functions generic over `Paired`
//! instead of default trait methods, since `async fn` in a trait used polymorphically
//! would need boxing either way and these already need the concrete `Arc<T>`
//! to detach background tasks (the sync driver, in `trigger_sync`).

use std::sync::Arc;

use repl_util::{Address, Block, Error};

use crate::paired::PairedServer;

/// Implemented by `PrimaryServer`/`BackupServer`: gives the shared handlers
/// access to the composed state core, and a role-specific hook for whatever
/// must happen when this node reaches `Normal` (see `on_became_normal`).
pub trait Paired: Send + Sync + Sized + 'static {
	fn core(&self) -> &PairedServer;

	/// Called after this node transitions to `Normal`, both as the sender of
	/// a successful sync (`BeginSynchronization`'s `HandlePartnerRecovered`)
	/// and as the receiver of one (`FinishSync`'s override in
	/// `BackupServer.cc`). `PrimaryServer` never overrides either in the
	/// original, so its implementation is a no-op; `BackupServer`'s restarts
	/// the heartbeat loop in both cases, which is why the two original hook
	/// points are unified into one here (see DESIGN.md).
	fn on_became_normal(self: &Arc<Self>) {}
}

pub async fn shared_ping<T: Paired>(_this: &Arc<T>) -> Result<(), Error> {
	Ok(())
}

/// `TriggerSync` receive-side handling, identical for both roles: accept
/// into `Standalone` and detach a sync driver for the incoming `sync_id`,
/// replying immediately so the caller doesn't time out waiting for the
/// whole sync to finish.
pub async fn shared_trigger_sync<T: Paired>(this: &Arc<T>, sync_id: i32) -> Result<(), Error> {
	this.core().begin_trigger_sync().await;

	let this = this.clone();
	tokio::spawn(async move {
		tracing::info!(sync_id, "sending recovery information to other node");
		if this.core().try_perform_sync(sync_id).await {
			this.on_became_normal();
		}
	});

	Ok(())
}

pub async fn shared_sync_block<T: Paired>(
	this: &Arc<T>,
	sync_id: i32,
	addr: Address,
	data: Block,
) -> Result<(), Error> {
	this.core().handle_sync_block(sync_id, addr, data).await
}

pub async fn shared_finish_sync<T: Paired>(this: &Arc<T>, sync_id: i32, total_blocks: u64) -> Result<(), Error> {
	this.core().handle_finish_sync(sync_id, total_blocks).await?;
	this.on_became_normal();
	Ok(())
}
