//! Fixed-size block type shared by every layer of the replicated store.

/// Size in bytes of the unit of client-visible storage.
pub const BLOCK_SIZE: usize = 4096;

/// A 64-bit byte offset into the backing region. Alignment to `BLOCK_SIZE`
/// is a client contract, not something enforced here (see spec Open Questions).
pub type Address = u64;

/// One fixed-size block of data.
///
/// Boxed internally so that `Block` values can be moved and cloned cheaply
/// without blowing the stack, the way a 4KiB buffer shouldn't live inline.
#[derive(Clone)]
pub struct Block(Box<[u8; BLOCK_SIZE]>);

impl Block {
	pub fn zeroed() -> Self {
		Block(Box::new([0u8; BLOCK_SIZE]))
	}

	/// Build a block from a byte slice, failing if the length doesn't match
	/// `BLOCK_SIZE` exactly (the req-level sanity check every handler does).
	pub fn from_slice(data: &[u8]) -> Result<Self, crate::error::Error> {
		if data.len() != BLOCK_SIZE {
			return Err(crate::error::Error::InvalidArgument(format!(
				"Block size should be {} (was {})",
				BLOCK_SIZE,
				data.len()
			)));
		}
		let mut buf = [0u8; BLOCK_SIZE];
		buf.copy_from_slice(data);
		Ok(Block(Box::new(buf)))
	}

	pub fn as_bytes(&self) -> &[u8; BLOCK_SIZE] {
		&self.0
	}

	pub fn into_vec(self) -> Vec<u8> {
		self.0.to_vec()
	}
}

impl std::fmt::Debug for Block {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "Block({} bytes)", BLOCK_SIZE)
	}
}

impl PartialEq for Block {
	fn eq(&self, other: &Self) -> bool {
		self.0[..] == other.0[..]
	}
}
