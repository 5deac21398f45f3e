//! Workers: the three behavioral variants that contend over the shared
//! stack through the two-phase protocol.
//!
//! Every worker runs the same skeleton (Phase-A body under the exclusion
//! token, arrive, wait for the barrier, wait for its turn, Phase-B body)
//! and differs only in what its Phase-A body does to the stack. Phase B is
//! reporting only; the stack is off limits there.

use std::fmt::Write as _;
use std::process;
use std::sync::{Mutex, MutexGuard};

use crossbeam::channel::Sender;

use crate::barrier::PhaseBarrier;
use crate::error::{ProtocolError, StackError};
use crate::stack::{signed_top, BlockStack, BASE_BLOCK};

/// How many full scans an observer makes during its Phase-A body.
pub const SCAN_ROUNDS: usize = 5;

/// What a worker does with the stack during Phase A.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerRole {
    /// Pops one block. Demand outrunning supply is fatal for the run.
    Acquire,
    /// Pushes the successor of the current top (or the base block into an
    /// empty stack). An already-full stack is fatal.
    Release,
    /// Scans and renders every slot, without mutating anything.
    Observe,
}

impl WorkerRole {
    pub fn tag(self) -> &'static str {
        match self {
            WorkerRole::Acquire => "acquirer",
            WorkerRole::Release => "releaser",
            WorkerRole::Observe => "observer",
        }
    }
}

/// Lifecycle of a worker. Transitions only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Created,
    RunningPhaseA,
    ArrivedAtBarrier,
    RunningPhaseB,
    Terminated,
}

/// Sent to the coordinator during Phase B. Reports travel over a channel,
/// so the order they are received in *is* the Phase-B turn order.
#[derive(Debug, Clone)]
pub struct WorkerReport {
    pub id: usize,
    pub role: WorkerRole,
    /// Counted stack operations this worker performed.
    pub ops: u64,
    /// The block an acquirer popped, or a releaser pushed.
    pub block: Option<char>,
}

/// One participant in the protocol. The registration index handed out by
/// [`PhaseBarrier::register`] doubles as the worker's id.
pub struct Worker {
    id: usize,
    role: WorkerRole,
    state: WorkerState,
    scan_rounds: usize,
    ops: u64,
    block: Option<char>,
}

impl Worker {
    pub fn new(id: usize, role: WorkerRole) -> Self {
        Self {
            id,
            role,
            state: WorkerState::Created,
            scan_rounds: SCAN_ROUNDS,
            ops: 0,
            block: None,
        }
    }

    /// Overrides the observer scan count (the stock run uses
    /// [`SCAN_ROUNDS`]).
    pub fn with_scan_rounds(mut self, rounds: usize) -> Self {
        self.scan_rounds = rounds;
        self
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn role(&self) -> WorkerRole {
        self.role
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Drives the full protocol and exits the process on failure.
    ///
    /// A domain error inside a phase body means the shared stack's
    /// invariants can no longer be trusted under concurrent mutation, so
    /// the whole run is abandoned immediately: the error goes to stderr
    /// and the process exits with code 1. First error wins; siblings are
    /// not given a chance to finish.
    pub fn run(
        mut self,
        stack: &Mutex<BlockStack>,
        barrier: &PhaseBarrier,
        reports: &Sender<WorkerReport>,
    ) {
        if let Err(error) = self.try_run(stack, barrier, reports) {
            eprintln!("{} [{}] fatal: {}", self.role.tag(), self.id, error);
            process::exit(1);
        }
    }

    /// The protocol skeleton. No exclusion token is ever held across the
    /// two blocking points (`wait_for_release` and the turn wait).
    fn try_run(
        &mut self,
        stack: &Mutex<BlockStack>,
        barrier: &PhaseBarrier,
        reports: &Sender<WorkerReport>,
    ) -> Result<(), ProtocolError> {
        println!("{} [{}] starts.", self.role.tag(), self.id);

        self.state = WorkerState::RunningPhaseA;
        {
            let _token = barrier.enter_phase_a()?;
            let mut blocks = lock_stack(stack)?;
            self.phase_a_body(&mut blocks)?;
        }

        self.state = WorkerState::ArrivedAtBarrier;
        if barrier.arrive()? {
            println!(
                "ready for phase B: all {} workers have finished phase A.",
                barrier.participants()
            );
        }
        barrier.wait_for_release()?;

        let turn = barrier.enter_phase_b(self.id)?;
        self.state = WorkerState::RunningPhaseB;
        self.phase_b_body(reports)?;
        drop(turn);

        self.state = WorkerState::Terminated;
        println!("{} [{}] terminates.", self.role.tag(), self.id);
        Ok(())
    }

    fn phase_a_body(&mut self, blocks: &mut BlockStack) -> Result<(), StackError> {
        match self.role {
            WorkerRole::Acquire => self.acquire(blocks),
            WorkerRole::Release => self.release(blocks),
            WorkerRole::Observe => self.observe(blocks),
        }
    }

    /// Pops one block and reports the new top.
    fn acquire(&mut self, blocks: &mut BlockStack) -> Result<(), StackError> {
        let block = blocks.pop()?;
        self.ops += 1;
        self.block = Some(block);
        println!(
            "acquirer [{}] obtained block '{}'; top is now {}.",
            self.id,
            block,
            signed_top(blocks.top_index())
        );
        if !blocks.is_empty() {
            let top = blocks.peek()?;
            self.ops += 1;
            println!("acquirer [{}] sees block '{}' on top.", self.id, top);
        }
        Ok(())
    }

    /// Pushes the successor of the current top. An empty stack takes the
    /// base block instead (and the stack normalizes the push to the base
    /// block anyway).
    fn release(&mut self, blocks: &mut BlockStack) -> Result<(), StackError> {
        let candidate = if blocks.is_empty() {
            BASE_BLOCK
        } else {
            let top = blocks.peek()?;
            self.ops += 1;
            next_block(top)
        };
        blocks.push(candidate)?;
        self.ops += 1;
        self.block = Some(candidate);
        println!(
            "releaser [{}] returned block '{}'; top is now {}.",
            self.id,
            candidate,
            signed_top(blocks.top_index())
        );
        Ok(())
    }

    /// Renders the whole buffer a fixed number of times, marking the top
    /// slot. `read_at` failing here would mean the stack's own invariant
    /// broke, which is structurally impossible and treated as fatal.
    fn observe(&mut self, blocks: &mut BlockStack) -> Result<(), StackError> {
        for _ in 0..self.scan_rounds {
            let mut rendering = String::new();
            for index in 0..blocks.capacity() {
                let block = blocks.read_at(index)?;
                self.ops += 1;
                if Some(index) == blocks.top_index() {
                    let _ = write!(rendering, "({})", block);
                } else {
                    let _ = write!(rendering, "[{}]", block);
                }
            }
            println!("observer [{}] stack state: {}.", self.id, rendering);
        }
        Ok(())
    }

    /// Reporting only: announces the turn and ships the report to the
    /// coordinator. No stack access in Phase B.
    fn phase_b_body(&self, reports: &Sender<WorkerReport>) -> Result<(), ProtocolError> {
        println!("{} [{}] takes turn {}.", self.role.tag(), self.id, self.id);
        reports
            .send(WorkerReport {
                id: self.id,
                role: self.role,
                ops: self.ops,
                block: self.block,
            })
            .map_err(|_| ProtocolError::Sync("report channel closed"))
    }
}

/// Successor block in the alphabet ladder.
fn next_block(block: char) -> char {
    ((block as u8) + 1) as char
}

pub(crate) fn lock_stack(
    stack: &Mutex<BlockStack>,
) -> Result<MutexGuard<'_, BlockStack>, ProtocolError> {
    stack.lock().map_err(|_| ProtocolError::Sync("stack lock poisoned"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::unbounded;

    fn drained(mut stack: BlockStack) -> BlockStack {
        while !stack.is_empty() {
            stack.pop().unwrap();
        }
        stack
    }

    #[test]
    fn acquire_pops_and_reports_the_new_top() {
        // Scenario A through a worker body.
        let mut blocks = BlockStack::new();
        let mut worker = Worker::new(0, WorkerRole::Acquire);
        worker.phase_a_body(&mut blocks).unwrap();
        assert_eq!(worker.block, Some('d'));
        assert_eq!(blocks.top_index(), Some(2));
        // One pop plus the follow-up peek on a non-empty stack.
        assert_eq!(worker.ops, 2);
        assert_eq!(blocks.access_count(), 2);
    }

    #[test]
    fn acquire_on_an_empty_stack_is_a_domain_error() {
        // Scenario D: the run cannot continue; main maps this to exit 1.
        let mut blocks = drained(BlockStack::new());
        let mut worker = Worker::new(0, WorkerRole::Acquire);
        assert_eq!(worker.phase_a_body(&mut blocks), Err(StackError::Empty));
        assert_eq!(worker.ops, 0);
    }

    #[test]
    fn release_pushes_the_successor_of_the_top() {
        // Scenario B through a worker body.
        let mut blocks = BlockStack::new();
        let mut worker = Worker::new(0, WorkerRole::Release);
        worker.phase_a_body(&mut blocks).unwrap();
        assert_eq!(worker.block, Some('e'));
        assert_eq!(blocks.top_index(), Some(4));
        assert_eq!(blocks.read_at(4).unwrap(), 'e');
        assert_eq!(worker.ops, 2);
    }

    #[test]
    fn release_into_an_empty_stack_yields_the_base_block() {
        // Scenario C: no peek happens, and the stack normalizes anyway.
        let mut blocks = drained(BlockStack::new());
        let mut worker = Worker::new(0, WorkerRole::Release);
        worker.phase_a_body(&mut blocks).unwrap();
        assert_eq!(worker.block, Some(BASE_BLOCK));
        assert_eq!(blocks.top_index(), Some(0));
        assert_eq!(worker.ops, 1);
    }

    #[test]
    fn release_onto_a_full_stack_is_a_domain_error() {
        let mut blocks = BlockStack::new();
        blocks.push('e').unwrap();
        blocks.push('f').unwrap();
        let mut worker = Worker::new(0, WorkerRole::Release);
        assert_eq!(worker.phase_a_body(&mut blocks), Err(StackError::Full));
    }

    #[test]
    fn observe_scans_without_mutating() {
        let mut blocks = BlockStack::new();
        let before = blocks.clone();
        let mut worker = Worker::new(0, WorkerRole::Observe).with_scan_rounds(2);
        worker.phase_a_body(&mut blocks).unwrap();
        // Two full scans of six slots, all counted, nothing changed.
        assert_eq!(worker.ops, 12);
        assert_eq!(blocks.access_count(), 12);
        assert_eq!(blocks.top_index(), before.top_index());
        assert_eq!(blocks.to_string(), before.to_string());
    }

    #[test]
    fn a_lone_worker_walks_the_whole_state_machine() {
        let stack = Mutex::new(BlockStack::new());
        let barrier = PhaseBarrier::new(1).unwrap();
        let (report_tx, report_rx) = unbounded();

        let mut worker = Worker::new(barrier.register(), WorkerRole::Observe);
        assert_eq!(worker.state(), WorkerState::Created);
        worker.try_run(&stack, &barrier, &report_tx).unwrap();
        assert_eq!(worker.state(), WorkerState::Terminated);

        let report = report_rx.recv().unwrap();
        assert_eq!(report.id, 0);
        assert_eq!(report.ops, (SCAN_ROUNDS * 6) as u64);
    }

    #[test]
    fn successor_blocks_climb_the_alphabet() {
        assert_eq!(next_block('a'), 'b');
        assert_eq!(next_block('d'), 'e');
    }
}
