//! A piece of work the service must perform after a transition commits.

use crate::events::EventPayload;

/// The only effect kind a transition currently produces is "publish this
/// payload" — position deltas and every other side effect are themselves
/// just another [`EventPayload`] variant to publish.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Publish(EventPayload),
}
