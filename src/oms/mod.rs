//! The OMS service shell: an in-memory order book, dispatch on inbound
//! broker subjects, and publication of the resulting event batch.
//!
//! A single `tokio::select!` loop owns the order book and the per-account
//! rules cache; every inbound subscription callback only ever forwards a
//! parsed request onto the service's own dispatch channel.

pub mod inbound;
pub mod service;

pub use service::OmsService;
