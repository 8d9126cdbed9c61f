//! Contains types and functions related to the server's configuration file
//! (spec SPEC_FULL.md §3 "Configuration schema"). CLI flags, handled in
//! `repl-server`, take priority over whatever is set here.
use std::io::Read;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Error;

/// Role this node plays in the pair.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	Primary,
	Backup,
}

/// The whole configuration file, as loaded from TOML.
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
	pub server: ServerConfig,
	#[serde(default)]
	pub log: LogConfig,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ServerConfig {
	/// Address this node listens for RPCs on.
	pub bind_addr: SocketAddr,
	/// Address of the other node in the pair.
	pub peer_addr: SocketAddr,
	/// Hex-encoded NodeID (netapp public key) of the other node. An operator
	/// reads this off the peer's startup log, the same way garage's cluster
	/// bootstrap works today via `garage node id`; there is no discovery
	/// since this pair's membership is fixed at two nodes.
	pub peer_node_id: String,
	/// Hex-encoded 32-byte shared network key both nodes must agree on
	/// (netapp's `NetworkKey`, analogous to garage's `rpc_secret`).
	pub rpc_secret: String,
	/// Role this node plays: primary or backup.
	pub role: Role,
	/// Whether this node starts in Recovering (equivalent to `--recover`).
	/// Ignored (must be left unset / false) for backup, which always starts
	/// Recovering regardless (spec §4.4).
	#[serde(default)]
	pub recover: bool,
	/// Path to the backing block file.
	pub storage_file: PathBuf,
	/// Size of the backing block file, in megabytes.
	#[serde(default = "default_storage_size_mb")]
	pub storage_size_mb: u64,
	/// Backup -> primary heartbeat period.
	#[serde(default = "default_heartbeat_interval_ms")]
	pub heartbeat_interval_ms: u64,
	/// Poll interval while waiting for a sync to make progress.
	#[serde(default = "default_recovery_check_interval_ms")]
	pub recovery_check_interval_ms: u64,
	/// Inactivity timeout before a recovery attempt is abandoned and retried
	/// with a fresh sync_id.
	#[serde(default = "default_recovery_timeout_ms")]
	pub recovery_timeout_ms: u64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct LogConfig {
	#[serde(default = "default_log_level")]
	pub level: String,
}

impl Default for LogConfig {
	fn default() -> Self {
		LogConfig {
			level: default_log_level(),
		}
	}
}

fn default_storage_size_mb() -> u64 {
	64
}
fn default_heartbeat_interval_ms() -> u64 {
	1000
}
fn default_recovery_check_interval_ms() -> u64 {
	100
}
fn default_recovery_timeout_ms() -> u64 {
	10_000
}
fn default_log_level() -> String {
	"info".into()
}

/// Read and parse a configuration file. Absent file is not an error here;
/// callers (the CLI) decide whether a config file is required.
pub fn read_config(config_file: &Path) -> Result<Config, Error> {
	let mut file = std::fs::OpenOptions::new()
		.read(true)
		.open(config_file)?;

	let mut config = String::new();
	file.read_to_string(&mut config)?;

	toml::from_str(&config).map_err(|e| Error::Config(e.to_string()))
}

#[cfg(test)]
mod test {
	use super::*;
	use std::io::Write;

	#[test]
	fn parses_minimal_config() {
		let mut f = tempfile::NamedTempFile::new().unwrap();
		writeln!(
			f,
			r#"
            [server]
            bind_addr = "0.0.0.0:50051"
            peer_addr = "10.0.0.2:50051"
            peer_node_id = "aa00"
            rpc_secret = "bb00"
            role = "primary"
            storage_file = "/tmp/blocks.img"
            "#
		)
		.unwrap();

		let config = read_config(f.path()).unwrap();
		assert_eq!(config.server.role, Role::Primary);
		assert_eq!(config.server.storage_size_mb, 64);
		assert_eq!(config.server.heartbeat_interval_ms, 1000);
		assert_eq!(config.log.level, "info");
	}

	#[test]
	fn missing_file_is_io_error() {
		let err = read_config(Path::new("/nonexistent/path/config.toml"));
		assert!(matches!(err, Err(Error::Io(_))));
	}
}
