//! The coordinator: fixes the worker population, wires up the shared
//! stack and barrier, runs the workers to completion and reports the
//! final stack state.
//!
//! All shared state is owned here and handed to workers behind `Arc`s;
//! there are no ambient globals. Workers are *created* (and registered
//! with the barrier) in a fixed order, then *started* in a deliberately
//! scrambled order: Phase-B turns follow creation order, never scheduling
//! order.

use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam::channel::unbounded;
use rand::seq::SliceRandom;
use rand::thread_rng;

use crate::barrier::PhaseBarrier;
use crate::error::ProtocolError;
use crate::stack::BlockStack;
use crate::worker::{lock_stack, Worker, WorkerRole};

/// How many workers of each role take part in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Population {
    pub acquirers: usize,
    pub releasers: usize,
    pub observers: usize,
}

impl Default for Population {
    /// The stock 3 + 3 + 4 = 10 population.
    fn default() -> Self {
        Self {
            acquirers: 3,
            releasers: 3,
            observers: 4,
        }
    }
}

impl Population {
    pub fn total(&self) -> usize {
        self.acquirers + self.releasers + self.observers
    }

    /// Roles in creation order: acquirers, then releasers, then
    /// observers. Creation order fixes the Phase-B turn order.
    fn roles(&self) -> impl Iterator<Item = WorkerRole> {
        use std::iter::repeat;
        repeat(WorkerRole::Acquire)
            .take(self.acquirers)
            .chain(repeat(WorkerRole::Release).take(self.releasers))
            .chain(repeat(WorkerRole::Observe).take(self.observers))
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub population: Population,
    /// Worker ids in the order their Phase-B reports arrived. The
    /// protocol guarantees this is ascending registration order.
    pub phase_b_order: Vec<usize>,
    /// Sum of the counted stack operations the workers performed.
    pub worker_ops: u64,
    /// The stack's access counter, snapshotted before the coordinator's
    /// own final-state reads. Equals `worker_ops` on a clean run.
    pub access_count: u64,
    pub top_index: Option<usize>,
    pub top_block: char,
    /// Block just below the top; `None` when the top sits at slot 0.
    pub below_top_block: Option<char>,
}

/// Creates the population, runs the protocol, reads the final state.
pub struct Coordinator {
    population: Population,
    stack: BlockStack,
}

impl Coordinator {
    pub fn new(population: Population) -> Self {
        Self {
            population,
            stack: BlockStack::new(),
        }
    }

    /// Runs the protocol over a caller-supplied starting stack.
    pub fn with_stack(population: Population, stack: BlockStack) -> Self {
        Self { population, stack }
    }

    pub fn run(self) -> Result<RunReport, ProtocolError> {
        let population = self.population;
        let total = population.total();
        let barrier = Arc::new(PhaseBarrier::new(total)?);
        let stack = Arc::new(Mutex::new(self.stack));
        let (report_tx, report_rx) = unbounded();

        // Creation order assigns registration indices 0..total.
        let mut workers: Vec<Worker> = population
            .roles()
            .map(|role| Worker::new(barrier.register(), role))
            .collect();
        println!(
            "coordinator: created {} workers ({} acquirers, {} releasers, {} observers).",
            total, population.acquirers, population.releasers, population.observers
        );

        // Scramble the start order; turn order must not depend on it.
        workers.shuffle(&mut thread_rng());

        let mut handles = Vec::with_capacity(total);
        for worker in workers {
            let stack = Arc::clone(&stack);
            let barrier = Arc::clone(&barrier);
            let report_tx = report_tx.clone();
            handles.push(thread::spawn(move || {
                worker.run(&stack, &barrier, &report_tx)
            }));
        }
        drop(report_tx);

        // Reports are sent inside Phase-B critical sections, so they
        // arrive in turn order. The channel closes once every worker has
        // finished and dropped its sender.
        let mut phase_b_order = Vec::with_capacity(total);
        let mut worker_ops = 0;
        for report in report_rx {
            phase_b_order.push(report.id);
            worker_ops += report.ops;
        }

        for handle in handles {
            handle
                .join()
                .map_err(|_| ProtocolError::Sync("a worker thread panicked"))?;
        }
        println!("coordinator: all {} workers terminated.", total);

        let mut blocks = lock_stack(&stack)?;
        let access_count = blocks.access_count();
        let top_index = blocks.top_index();
        let top_block = blocks.peek()?;
        let below_top_block = match top_index.and_then(|top| top.checked_sub(1)) {
            Some(index) => Some(blocks.read_at(index)?),
            None => None,
        };

        Ok(RunReport {
            population,
            phase_b_order,
            worker_ops,
            access_count,
            top_index,
            top_block,
            below_top_block,
        })
    }
}
