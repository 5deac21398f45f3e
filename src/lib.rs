//! Two-phase barrier protocol over a bounded block stack.
//!
//! A fixed population of workers (ten in the stock run) contends over one
//! fixed-capacity stack of character blocks. Each worker runs an unordered,
//! mutually exclusive Phase A against the stack, arrives at a counting
//! barrier, and, once every worker has arrived, takes its strictly
//! creation-ordered turn through a reporting Phase B.
//!
//! The synchronization protocol in [`barrier`] is the point of the crate;
//! the stack in [`stack`] is a deliberately simple contention target. The
//! stack does no locking of its own: serializing access is the protocol's
//! job, not the container's.
//!
//! Run the demo with: `cargo run`

pub mod barrier;
pub mod coordinator;
pub mod error;
pub mod stack;
pub mod worker;

pub use barrier::PhaseBarrier;
pub use coordinator::{Coordinator, Population, RunReport};
pub use error::{ProtocolError, StackError};
pub use stack::BlockStack;
pub use worker::{Worker, WorkerReport, WorkerRole, WorkerState};
