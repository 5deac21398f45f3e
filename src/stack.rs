//! `BlockStack`: a fixed-capacity LIFO of character blocks.
//!
//! The stack performs no locking of its own; mutual exclusion is the
//! two-phase protocol's job (see [`crate::barrier`]). Callers sharing a
//! stack must hold the Phase-A token before calling anything that mutates
//! or counts.
//!
//! Every successful `push`/`pop`/`peek`/`read_at` bumps the access counter
//! by exactly one. The pure queries (`is_empty`, `is_full`, `capacity`,
//! `top_index`, `access_count`) never touch it and never fail.

use std::fmt;

use crate::error::StackError;

/// Letters of the alphabet plus the two sentinel slots.
pub const MAX_CAPACITY: usize = 28;

/// Capacity used by the stock run.
pub const DEFAULT_CAPACITY: usize = 6;

/// Initialization always reserves two free sentinel slots.
const MIN_CAPACITY: usize = 2;

/// Pushing onto an *empty* stack always stores this block, whatever the
/// caller handed in. See [`BlockStack::push`].
pub const BASE_BLOCK: char = 'a';

/// Marks a slot holding no live block, so emptiness shows up in a dump.
pub const SENTINEL: char = '*';

/// Bounded stack of character blocks with an access counter.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockStack {
    blocks: Vec<char>,
    top: Option<usize>,
    access_count: u64,
}

impl Default for BlockStack {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockStack {
    /// Stack of [`DEFAULT_CAPACITY`], pre-populated `a b c d * *` with the
    /// top resting on `'d'`.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY).expect("the default capacity is valid")
    }

    /// Stack of the given capacity, pre-populated with `capacity - 2`
    /// letters followed by two sentinel slots. Capacities outside
    /// `2..=MAX_CAPACITY` are rejected.
    pub fn with_capacity(capacity: usize) -> Result<Self, StackError> {
        if !(MIN_CAPACITY..=MAX_CAPACITY).contains(&capacity) {
            return Err(StackError::InvalidCapacity { requested: capacity });
        }
        let mut blocks = vec![SENTINEL; capacity];
        for (i, slot) in blocks.iter_mut().take(capacity - 2).enumerate() {
            *slot = (b'a' + i as u8) as char;
        }
        // Top sits on the last populated letter; a capacity-2 stack
        // starts empty.
        let top = (capacity > MIN_CAPACITY).then(|| capacity - 3);
        Ok(Self {
            blocks,
            top,
            access_count: 0,
        })
    }

    /// Pushes a block onto the stack. Pushing onto an empty stack stores
    /// [`BASE_BLOCK`] regardless of the argument: releasing into an empty
    /// pool always yields the base block.
    pub fn push(&mut self, block: char) -> Result<(), StackError> {
        if self.is_full() {
            return Err(StackError::Full);
        }
        let next = self.top.map_or(0, |top| top + 1);
        self.blocks[next] = if self.top.is_none() { BASE_BLOCK } else { block };
        self.top = Some(next);
        self.access_count += 1;
        Ok(())
    }

    /// Pops the top block, resetting the vacated slot to [`SENTINEL`].
    pub fn pop(&mut self) -> Result<char, StackError> {
        let top = self.top.ok_or(StackError::Empty)?;
        let block = self.blocks[top];
        self.blocks[top] = SENTINEL;
        self.top = top.checked_sub(1);
        self.access_count += 1;
        Ok(block)
    }

    /// Reads the top block without removing it. A counted access, hence
    /// `&mut self`.
    pub fn peek(&mut self) -> Result<char, StackError> {
        let top = self.top.ok_or(StackError::Empty)?;
        self.access_count += 1;
        Ok(self.blocks[top])
    }

    /// Reads the raw slot at `index`. Sentinel slots are readable; only
    /// indices past the capacity are rejected. A counted access.
    pub fn read_at(&mut self, index: usize) -> Result<char, StackError> {
        if index >= self.blocks.len() {
            return Err(StackError::OutOfBounds {
                index,
                capacity: self.blocks.len(),
            });
        }
        self.access_count += 1;
        Ok(self.blocks[index])
    }

    pub fn is_empty(&self) -> bool {
        self.top.is_none()
    }

    pub fn is_full(&self) -> bool {
        self.top == Some(self.blocks.len() - 1)
    }

    pub fn capacity(&self) -> usize {
        self.blocks.len()
    }

    /// Index of the current top block; `None` when empty (the run report
    /// prints this as `-1`).
    pub fn top_index(&self) -> Option<usize> {
        self.top
    }

    pub fn access_count(&self) -> u64 {
        self.access_count
    }
}

/// Original-style signed rendering of a top index: `-1` when empty.
pub(crate) fn signed_top(top: Option<usize>) -> i64 {
    top.map_or(-1, |index| index as i64)
}

impl fmt::Display for BlockStack {
    /// Renders the backing buffer as `[a][b](c)[*]`, parenthesizing the
    /// top slot. Formatting reads the buffer directly and is not a
    /// counted stack access.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, block) in self.blocks.iter().enumerate() {
            if Some(index) == self.top {
                write!(f, "({})", block)?;
            } else {
                write!(f, "[{}]", block)?;
            }
        }
        Ok(())
    }
}
