//! The TCP session (`connection`), its subscription table (`subscription`),
//! and the public client API (`client`) layered on top.

pub mod client;
pub mod connection;
pub mod subscription;

pub use client::Client;
pub use connection::{Connection, ConnectionState, ErrorReceiver};
pub use subscription::{callback, Callback, Message, SubscriptionTable};
