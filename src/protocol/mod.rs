//! Wire protocol codec: pure encode/decode of the line-oriented framing.
//! No socket I/O lives here — see [`crate::broker`] for the connection that
//! drives actual reads and writes.

pub mod codec;
pub mod types;

pub use codec::{MsgHeader, Verb};
pub use types::{ConnectOpts, ServerInfo};
