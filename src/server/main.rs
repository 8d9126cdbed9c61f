//! `repl-server`: bootstraps one node of the primary/backup pair (spec
//! SPEC_FULL.md §4.8) and runs it until killed, in the manner of
//! `garage`'s `src/garage/main.rs`.

mod bootstrap;
mod cli;

use std::sync::Arc;
use std::time::Duration;

use structopt::StructOpt;

use repl_core::{BackupServer, FaultInjector, NoopFaultInjector, PrimaryServer, ReplState};
use repl_rpc::{NetappTransport, ReplicationClient};
use repl_store::BlockStore;
use repl_util::config::{read_config, Config, Role, ServerConfig};
use repl_util::logging::init_tracing;
use repl_util::Error;

use cli::{Opt, RoleOpt};

/// Merge CLI flags over an optional config file. CLI wins; the config file
/// supplies everything the CLI surface doesn't carry (peer identity, RPC
/// secret, timing knobs) since spec.md §6 only specifies the handful of
/// flags actually exercised at the protocol level.
fn resolve_config(opt: &Opt) -> Result<Config, Error> {
	let mut config = match &opt.config {
		Some(path) => read_config(path)?,
		None => {
			return Err(Error::InvalidArgument(
				"no --config file given and CLI alone does not carry peer_node_id/rpc_secret".into(),
			))
		}
	};

	if let Some(port) = opt.port {
		config.server.bind_addr.set_port(port);
	}
	if let Some(storage_file) = &opt.storage_file {
		config.server.storage_file = storage_file.clone();
	}

	match &opt.role {
		RoleOpt::Primary {
			backup_address,
			recover,
		} => {
			config.server.role = Role::Primary;
			config.server.peer_addr = *backup_address;
			config.server.recover = *recover;
		}
		RoleOpt::Backup { primary_address } => {
			config.server.role = Role::Backup;
			config.server.peer_addr = *primary_address;
			config.server.recover = false;
		}
	}

	Ok(config)
}

async fn run(config: ServerConfig) -> Result<(), Error> {
	let store = Arc::new(BlockStore::init(config.storage_file.clone(), config.storage_size_mb).await?);
	let fault: Arc<dyn FaultInjector> = Arc::new(NoopFaultInjector);

	let net = bootstrap::start(config.bind_addr, &config.rpc_secret).await?;
	let peer_id = bootstrap::connect_peer(&net.netapp, config.peer_addr, &config.peer_node_id).await?;

	let recovery_check_interval = Duration::from_millis(config.recovery_check_interval_ms);
	let recovery_timeout = Duration::from_millis(config.recovery_timeout_ms);
	let heartbeat_interval = Duration::from_millis(config.heartbeat_interval_ms);

	match config.role {
		Role::Primary => {
			let transport = NetappTransport::<PrimaryServer>::new(net.netapp.clone(), "repl/v1", peer_id);
			let client = Arc::new(ReplicationClient::new(transport.clone()));

			// §4.4: Primary without --recover starts Standalone (no backup
			// known to be caught up yet); with --recover it starts Recovering,
			// resuming a sync a prior run was interrupted partway through.
			let initial = if config.recover {
				ReplState::Recovering
			} else {
				ReplState::Standalone
			};

			let server = PrimaryServer::new(initial, store, client, fault, recovery_check_interval, recovery_timeout);
			transport.set_handler(server.clone());

			if initial == ReplState::Recovering {
				let server = server.clone();
				tokio::spawn(async move { server.run_recovery().await });
			}

			tracing::info!(role = "primary", node_id = %hex::encode(net.node_id), "server started");
		}
		Role::Backup => {
			let transport = NetappTransport::<BackupServer>::new(net.netapp.clone(), "repl/v1", peer_id);
			let client = Arc::new(ReplicationClient::new(transport.clone()));

			// §4.8 (original `MakeServer`): a backup always pings the
			// primary before proceeding, and always starts Recovering,
			// unconditionally.
			client.ping_until_reachable(Duration::from_secs(1)).await;

			let server = BackupServer::new(store, client, fault, heartbeat_interval, recovery_check_interval, recovery_timeout);
			transport.set_handler(server.clone());

			let driver = server.clone();
			tokio::spawn(async move { driver.run_recovery().await });

			tracing::info!(role = "backup", node_id = %hex::encode(net.node_id), "server started");
		}
	}

	tokio::signal::ctrl_c().await.ok();
	tracing::info!("shutting down");
	Ok(())
}

#[tokio::main]
async fn main() {
	let opt = Opt::from_args();

	let config = match resolve_config(&opt) {
		Ok(c) => c,
		Err(e) => {
			eprintln!("configuration error: {}", e);
			std::process::exit(1);
		}
	};

	init_tracing(&config.log.level);

	if let Err(e) = run(config.server).await {
		tracing::error!(error = %e, "fatal startup error");
		std::process::exit(1);
	}
}
