//! A native client for a text-line publish/subscribe broker (the
//! NATS-family wire protocol) plus the order-lifecycle state machine built
//! on top of it.
//!
//! - [`protocol`] — pure encode/decode of the wire framing, no I/O.
//! - [`broker`] — the TCP connection, its subscription table, and the
//!   public `Client` API.
//! - [`events`] — the event envelope and subject router.
//! - [`domain`] — the order entity and pre-trade validation.
//! - [`statemachine`] — the pure order-transition function.
//! - [`oms`] — the service shell wiring all of the above together.

pub mod broker;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod ids;
pub mod oms;
pub mod protocol;
pub mod statemachine;

pub use broker::Client;
pub use config::Config;
pub use error::{OmsError, Result};
