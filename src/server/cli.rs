//! CLI surface (spec SPEC_FULL.md §6), as `structopt` subcommands in the
//! manner of `garage`'s binary.

use std::net::SocketAddr;
use std::path::PathBuf;

use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(name = "repl-server")]
pub struct Opt {
	/// Address to listen for peer RPCs on.
	#[structopt(long)]
	pub port: Option<u16>,

	/// Path to the backing block file.
	#[structopt(long = "storage-file")]
	pub storage_file: Option<PathBuf>,

	/// Optional TOML configuration file; CLI flags override its contents.
	#[structopt(long)]
	pub config: Option<PathBuf>,

	#[structopt(subcommand)]
	pub role: RoleOpt,
}

#[derive(StructOpt, Debug)]
pub enum RoleOpt {
	/// Start as the primary, serving reads/writes and replicating to a backup.
	Primary {
		/// Address of the backup node.
		#[structopt(long = "backup-address")]
		backup_address: SocketAddr,

		/// Start in Recovering instead of Standalone, to resume a sync that
		/// was interrupted. Never valid for `backup` (§4.4: a backup always
		/// starts Recovering, unconditionally).
		#[structopt(long)]
		recover: bool,
	},
	/// Start as the backup. Always starts Recovering (spec §4.4): `--recover`
	/// is not an accepted flag here, since it would be redundant.
	Backup {
		/// Address of the primary node.
		#[structopt(long = "primary-address")]
		primary_address: SocketAddr,
	},
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn backup_rejects_recover_flag() {
		let res = Opt::from_iter_safe([
			"repl-server",
			"--port",
			"50051",
			"--storage-file",
			"/tmp/blocks.img",
			"backup",
			"--primary-address",
			"10.0.0.1:50051",
			"--recover",
		]);
		assert!(res.is_err());
	}

	#[test]
	fn primary_accepts_recover_flag() {
		let opt = Opt::from_iter_safe([
			"repl-server",
			"--port",
			"50051",
			"--storage-file",
			"/tmp/blocks.img",
			"primary",
			"--backup-address",
			"10.0.0.2:50051",
			"--recover",
		])
		.unwrap();

		match opt.role {
			RoleOpt::Primary { recover, .. } => assert!(recover),
			RoleOpt::Backup { .. } => panic!("expected primary"),
		}
	}
}
