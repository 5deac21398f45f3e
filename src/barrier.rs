//! The two-phase gate.
//!
//! Workers first run Phase A one at a time under a shared exclusion token
//! (in whatever order the scheduler picks), then block on a counting
//! barrier until every registered worker has arrived, then run Phase B one
//! at a time in strict registration order. The barrier supports exactly
//! one such cycle.
//!
//! The arrival count and the turn cursor are each a `Mutex` + `Condvar`
//! pair: no negative-initialized semaphore tricks and no busy-polling for
//! turns, waiters sleep until the state they care about actually changes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};

use crate::error::ProtocolError;

/// Two-phase barrier for a fixed population of workers.
pub struct PhaseBarrier {
    participants: usize,
    /// Next registration index to hand out.
    registered: AtomicUsize,
    /// Exclusion token for Phase-A critical sections.
    phase_a: Mutex<()>,
    /// How many workers have completed Phase A.
    arrivals: Mutex<usize>,
    barrier_open: Condvar,
    /// Exclusion token for Phase-B critical sections.
    phase_b: Mutex<()>,
    /// Registration index of the worker whose Phase-B turn it is.
    turn: Mutex<usize>,
    turn_changed: Condvar,
}

/// Held for the duration of a Phase-A critical section. Dropping it
/// releases the token.
pub struct PhaseAGuard<'a> {
    _token: MutexGuard<'a, ()>,
}

/// Held for the duration of a Phase-B critical section. Dropping it
/// advances the turn cursor to the next registration index and wakes the
/// waiters, then releases the token.
pub struct PhaseBGuard<'a> {
    barrier: &'a PhaseBarrier,
    _token: MutexGuard<'a, ()>,
}

impl Drop for PhaseBGuard<'_> {
    fn drop(&mut self) {
        // Advance even through a poisoned cursor lock: leaving the cursor
        // stuck would deadlock every worker still waiting for its turn.
        let mut turn = match self.barrier.turn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *turn += 1;
        self.barrier.turn_changed.notify_all();
    }
}

impl PhaseBarrier {
    /// A barrier for `participants` workers. At least one is required.
    pub fn new(participants: usize) -> Result<Self, ProtocolError> {
        if participants == 0 {
            return Err(ProtocolError::InvalidParticipantCount);
        }
        Ok(Self {
            participants,
            registered: AtomicUsize::new(0),
            phase_a: Mutex::new(()),
            arrivals: Mutex::new(0),
            barrier_open: Condvar::new(),
            phase_b: Mutex::new(()),
            turn: Mutex::new(0),
            turn_changed: Condvar::new(),
        })
    }

    pub fn participants(&self) -> usize {
        self.participants
    }

    /// Hands out registration indices in call order. A worker's index is
    /// its Phase-B turn, fixed at creation time regardless of when the
    /// worker actually gets scheduled.
    pub fn register(&self) -> usize {
        let index = self.registered.fetch_add(1, Ordering::SeqCst);
        assert!(
            index < self.participants,
            "more registrations than participants"
        );
        index
    }

    /// Takes the Phase-A exclusion token. At most one worker runs its
    /// Phase-A body at any instant.
    pub fn enter_phase_a(&self) -> Result<PhaseAGuard<'_>, ProtocolError> {
        let token = self
            .phase_a
            .lock()
            .map_err(|_| ProtocolError::Sync("phase A token poisoned"))?;
        Ok(PhaseAGuard { _token: token })
    }

    /// Counts one Phase-A completion. Call once per worker, after the
    /// Phase-A token has been dropped. Returns `true` exactly once, for
    /// the arrival that opens the barrier.
    pub fn arrive(&self) -> Result<bool, ProtocolError> {
        let mut arrivals = self
            .arrivals
            .lock()
            .map_err(|_| ProtocolError::Sync("arrival counter poisoned"))?;
        *arrivals += 1;
        let open = *arrivals == self.participants;
        if open {
            self.barrier_open.notify_all();
        }
        Ok(open)
    }

    /// Blocks until every participant has arrived. The wait loop re-checks
    /// the count, so spurious wakeups are harmless.
    pub fn wait_for_release(&self) -> Result<(), ProtocolError> {
        let mut arrivals = self
            .arrivals
            .lock()
            .map_err(|_| ProtocolError::Sync("arrival counter poisoned"))?;
        while *arrivals < self.participants {
            arrivals = self
                .barrier_open
                .wait(arrivals)
                .map_err(|_| ProtocolError::Sync("arrival counter poisoned"))?;
        }
        Ok(())
    }

    /// Blocks until the turn cursor reaches `index`, then takes the
    /// Phase-B exclusion token. Only one worker can match the cursor, so
    /// no two can both observe "my turn".
    pub fn enter_phase_b(&self, index: usize) -> Result<PhaseBGuard<'_>, ProtocolError> {
        let mut turn = self
            .turn
            .lock()
            .map_err(|_| ProtocolError::Sync("turn cursor poisoned"))?;
        while *turn != index {
            turn = self
                .turn_changed
                .wait(turn)
                .map_err(|_| ProtocolError::Sync("turn cursor poisoned"))?;
        }
        drop(turn);
        let token = self
            .phase_b
            .lock()
            .map_err(|_| ProtocolError::Sync("phase B token poisoned"))?;
        Ok(PhaseBGuard {
            barrier: self,
            _token: token,
        })
    }
}
