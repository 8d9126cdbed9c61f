//! CLI surface for the test client (SPEC_FULL.md §6 "repl-client").

use std::net::SocketAddr;

use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(name = "repl-client")]
pub struct Opt {
	/// Address of the primary node.
	#[structopt(long = "primary-address")]
	pub primary_address: SocketAddr,
	/// Hex-encoded NodeID of the primary node.
	#[structopt(long = "primary-node-id")]
	pub primary_node_id: String,

	/// Address of the backup node.
	#[structopt(long = "backup-address")]
	pub backup_address: SocketAddr,
	/// Hex-encoded NodeID of the backup node.
	#[structopt(long = "backup-node-id")]
	pub backup_node_id: String,

	/// Hex-encoded 32-byte shared network key, matching both servers.
	#[structopt(long = "rpc-secret")]
	pub rpc_secret: String,
}
