//! NetApp wiring: a fixed two-node pair has no need for netapp's membership/
//! peering-strategy machinery (`garage_rpc::system::System`'s job in
//! `garage`), so this talks to `netapp::NetApp` directly — generate this
//! process's identity, start listening, and connect to the one configured
//! peer.

use std::net::SocketAddr;
use std::sync::Arc;

use netapp::{NetApp, NodeID};
use sodiumoxide::crypto::sign::ed25519;

use repl_util::Error;

pub struct NetAppHandle {
	pub netapp: Arc<NetApp>,
	pub node_id: NodeID,
}

fn decode_node_id(hex_str: &str) -> Result<NodeID, Error> {
	let bytes = hex::decode(hex_str)
		.map_err(|e| Error::InvalidArgument(format!("invalid peer_node_id hex: {}", e)))?;
	NodeID::from_slice(&bytes)
		.ok_or_else(|| Error::InvalidArgument("peer_node_id is not a valid NodeID".into()))
}

fn decode_network_key(hex_str: &str) -> Result<[u8; 32], Error> {
	let bytes = hex::decode(hex_str)
		.map_err(|e| Error::InvalidArgument(format!("invalid rpc_secret hex: {}", e)))?;
	bytes
		.try_into()
		.map_err(|_| Error::InvalidArgument("rpc_secret must be 32 bytes".into()))
}

/// Generates a fresh identity keypair for this process (see DESIGN.md: node
/// identity is ephemeral rather than persisted to a `node_key` file, since
/// this system's membership is exactly two fixed, manually-paired nodes) and
/// starts the netapp listener.
pub async fn start(bind_addr: SocketAddr, rpc_secret_hex: &str) -> Result<NetAppHandle, Error> {
	let network_key = decode_network_key(rpc_secret_hex)?;
	let (_pubkey, privkey) = ed25519::gen_keypair();

	let netapp = NetApp::new(network_key, privkey);
	tracing::info!(node_id = %hex::encode(netapp.id), "this node's identity");

	let netapp_listen = netapp.clone();
	tokio::spawn(async move {
		netapp_listen.listen(bind_addr, None).await;
	});

	Ok(NetAppHandle {
		node_id: netapp.id,
		netapp,
	})
}

/// Resolve the configured peer's `NodeID` and open a connection to it.
pub async fn connect_peer(netapp: &Arc<NetApp>, peer_addr: SocketAddr, peer_node_id_hex: &str) -> Result<NodeID, Error> {
	let peer_id = decode_node_id(peer_node_id_hex)?;
	netapp
		.clone()
		.try_connect(peer_addr, peer_id)
		.await
		.map_err(|e| Error::Transport(format!("could not connect to peer: {}", e)))?;
	Ok(peer_id)
}
