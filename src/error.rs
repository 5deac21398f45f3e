//! Error taxonomy for the stack and the protocol.
//!
//! Domain errors are violated preconditions on the stack or barrier and
//! are unrecoverable for a run: there is no retry, the protocol has no
//! notion of "try again later". Sync faults are infrastructure failures
//! (a poisoned lock, a panicked worker thread) and are equally fatal.

use thiserror::Error;

/// Errors raised by operations on a [`BlockStack`](crate::stack::BlockStack).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackError {
    #[error("the stack is empty")]
    Empty,
    #[error("the stack is full")]
    Full,
    #[error("index {index} is outside the stack (capacity {capacity})")]
    OutOfBounds { index: usize, capacity: usize },
    #[error("capacity {requested} is outside the supported range 2..=28")]
    InvalidCapacity { requested: usize },
}

/// Errors surfaced by the protocol as a whole.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    #[error(transparent)]
    Stack(#[from] StackError),
    #[error("a barrier needs at least one participant")]
    InvalidParticipantCount,
    /// A lock was poisoned or a worker thread died. Not a domain error:
    /// the shared state can no longer be trusted.
    #[error("synchronization fault: {0}")]
    Sync(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_errors_render_their_context() {
        let error = StackError::OutOfBounds { index: 9, capacity: 6 };
        assert_eq!(error.to_string(), "index 9 is outside the stack (capacity 6)");
    }

    #[test]
    fn stack_errors_pass_through_protocol_errors() {
        let error = ProtocolError::from(StackError::Empty);
        assert_eq!(error.to_string(), "the stack is empty");
        assert_eq!(error, ProtocolError::Stack(StackError::Empty));
    }
}
