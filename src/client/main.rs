//! `repl-client`: a thin failover-aware REPL for exercising a running
//! primary/backup pair (SPEC_FULL.md §6). Implements exactly the client
//! policy of spec.md §7: on `ABORTED` or a transport failure, flip to the
//! other node and retry, looping until one of them succeeds.

mod cli;

use std::io::{self, BufRead, Write as _};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use structopt::StructOpt;

use netapp::{NetApp, NodeID};
use sodiumoxide::crypto::sign::ed25519;

use repl_rpc::{NetappTransport, ReplRpcHandler, ReplTransport};
use repl_util::{Address, Block, Error};

use cli::Opt;

/// The client never receives calls back on its endpoint; this handler only
/// exists to satisfy `NetappTransport`'s type parameter.
struct Unreachable;

#[async_trait::async_trait]
impl ReplRpcHandler for Unreachable {
	async fn ping(self: &Arc<Self>) -> Result<(), Error> {
		Err(Error::InvalidTarget)
	}
	async fn heartbeat(self: &Arc<Self>) -> Result<(), Error> {
		Err(Error::InvalidTarget)
	}
	async fn read(self: &Arc<Self>, _addr: Address) -> Result<Block, Error> {
		Err(Error::InvalidTarget)
	}
	async fn write(self: &Arc<Self>, _addr: Address, _data: Block) -> Result<(), Error> {
		Err(Error::InvalidTarget)
	}
	async fn backup_write(self: &Arc<Self>, _addr: Address, _data: Block) -> Result<(), Error> {
		Err(Error::InvalidTarget)
	}
	async fn trigger_sync(self: &Arc<Self>, _sync_id: i32) -> Result<(), Error> {
		Err(Error::InvalidTarget)
	}
	async fn sync_block(self: &Arc<Self>, _sync_id: i32, _addr: Address, _data: Block) -> Result<(), Error> {
		Err(Error::InvalidTarget)
	}
	async fn finish_sync(self: &Arc<Self>, _sync_id: i32, _total_blocks: u64) -> Result<(), Error> {
		Err(Error::InvalidTarget)
	}
}

fn decode_node_id(hex_str: &str) -> NodeID {
	let bytes = hex::decode(hex_str).expect("invalid node id hex");
	NodeID::from_slice(&bytes).expect("invalid node id")
}

fn decode_network_key(hex_str: &str) -> [u8; 32] {
	let bytes = hex::decode(hex_str).expect("invalid rpc secret hex");
	bytes.try_into().expect("rpc secret must be 32 bytes")
}

/// Holds both endpoints and the index of whichever one we believe is
/// currently serving (spec §7: the client has no independent way to know
/// which node is primary right now, it just tries one and flips on failure).
struct FailoverClient {
	nodes: [Arc<dyn ReplTransport>; 2],
	current: AtomicUsize,
}

impl FailoverClient {
	fn flip(&self) -> usize {
		self.current.fetch_xor(1, Ordering::SeqCst) ^ 1
	}

	async fn read(&self, addr: Address) -> Block {
		loop {
			let idx = self.current.load(Ordering::SeqCst);
			match self.nodes[idx].read(addr).await {
				Ok(block) => return block,
				Err(e) => {
					tracing::warn!(error = %e, node = idx, "read failed, trying other node");
					self.flip();
				}
			}
		}
	}

	async fn write(&self, addr: Address, data: Block) {
		loop {
			let idx = self.current.load(Ordering::SeqCst);
			match self.nodes[idx].write(addr, data.clone()).await {
				Ok(()) => return,
				Err(e) => {
					tracing::warn!(error = %e, node = idx, "write failed, trying other node");
					self.flip();
				}
			}
		}
	}
}

async fn connect(netapp: &Arc<NetApp>, addr: SocketAddr, node_id: NodeID) -> Arc<dyn ReplTransport> {
	netapp
		.clone()
		.try_connect(addr, node_id)
		.await
		.expect("could not connect to node");
	NetappTransport::<Unreachable>::new(netapp.clone(), "repl/v1", node_id)
}

#[tokio::main]
async fn main() {
	repl_util::logging::init_tracing("info");

	let opt = Opt::from_args();

	let network_key = decode_network_key(&opt.rpc_secret);
	let (_pubkey, privkey) = ed25519::gen_keypair();
	let netapp = NetApp::new(network_key, privkey);

	let netapp_listen = netapp.clone();
	tokio::spawn(async move {
		netapp_listen.listen("0.0.0.0:0".parse().unwrap(), None).await;
	});

	let primary_id = decode_node_id(&opt.primary_node_id);
	let backup_id = decode_node_id(&opt.backup_node_id);

	let primary = connect(&netapp, opt.primary_address, primary_id).await;
	let backup = connect(&netapp, opt.backup_address, backup_id).await;

	let client = FailoverClient {
		nodes: [primary, backup],
		current: AtomicUsize::new(0),
	};

	println!("connected. commands: `read <addr>`, `write <addr> <byte>`, `quit`");
	let stdin = io::stdin();
	for line in stdin.lock().lines() {
		let line = match line {
			Ok(l) => l,
			Err(_) => break,
		};
		let parts: Vec<&str> = line.trim().split_whitespace().collect();
		match parts.as_slice() {
			["read", addr] => match addr.parse::<Address>() {
				Ok(addr) => {
					let block = client.read(addr).await;
					println!("{}", hex::encode(&block.into_vec()[..16]));
				}
				Err(_) => eprintln!("bad address"),
			},
			["write", addr, byte] => match (addr.parse::<Address>(), byte.parse::<u8>()) {
				(Ok(addr), Ok(byte)) => {
					let data = vec![byte; repl_util::BLOCK_SIZE];
					client.write(addr, Block::from_slice(&data).unwrap()).await;
					println!("ok");
				}
				_ => eprintln!("bad arguments"),
			},
			["quit"] => break,
			_ => eprintln!("unrecognized command"),
		}
		io::stdout().flush().ok();
	}
}
