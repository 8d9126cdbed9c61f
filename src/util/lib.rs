pub mod block;
pub mod config;
pub mod error;
pub mod logging;

pub use block::{Address, Block, BLOCK_SIZE};
pub use error::Error;
