//! Pure order-transition function: `(Order, Event) -> Result<(Order, [Effect]), TransitionError>`.
//!
//! A transition never mutates the order in place and never talks to a
//! broker — it returns the new order plus the effects the caller must
//! carry out once the transition is committed, so the whole table is
//! testable with nothing but plain values.

pub mod effect;
pub mod transition;

pub use effect::Effect;
pub use transition::{transition, Event, TransitionError};
