//! Order entity, status variants, and the pre-trade validation pipeline.

pub mod order;
pub mod validation;

pub use order::{Order, OrderStatus, OrderType, Side};
pub use validation::{ValidationError, ValidationRules};
