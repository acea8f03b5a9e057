//! Resumable per-entity-type scan state
//!
//! Every step takes a [`ScanState`] value and returns the next one; the
//! driver owns it in between.
//!
//! ```text
//! Unstarted ──(no candidates)──────────────► Done
//!     │                                       ▲
//!     └──(candidates)──► InProgress ──(queue empty)
//!                          │    ▲
//!                          └────┘ one page per step
//! ```

use refscan_host::EntityId;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Fraction of a type's candidates handled, in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Progress(f64);

impl Progress {
    /// Nothing handled yet
    pub const ZERO: Self = Self(0.0);

    /// Every candidate handled
    pub const DONE: Self = Self(1.0);

    /// Largest value reported while candidates remain
    const CEILING: f64 = 1.0 - f64::EPSILON;

    /// Progress of an unfinished scan, always strictly below [`Self::DONE`]
    #[must_use]
    pub fn partial(handled: usize, total: usize) -> Self {
        if total == 0 {
            return Self::ZERO;
        }
        Self((handled as f64 / total as f64).min(Self::CEILING))
    }

    /// Fraction value
    #[inline]
    #[must_use]
    pub fn fraction(self) -> f64 {
        self.0
    }

    /// Exactly done
    #[inline]
    #[must_use]
    pub fn is_done(self) -> bool {
        self.0 >= 1.0
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}%", self.0 * 100.0)
    }
}

/// Counts of a finished scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanTally {
    /// Candidates loaded and checked
    pub processed: usize,
    /// Candidates that failed to load
    pub skipped: usize,
    /// Candidates found by the initial query
    pub total: usize,
}

/// Paging position inside a type's candidate list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanCursor {
    processed: usize,
    skipped: usize,
    total: usize,
    remaining: VecDeque<EntityId>,
}

impl ScanCursor {
    /// Cursor over the full candidate list; total is fixed here
    #[must_use]
    pub fn new(candidates: impl IntoIterator<Item = EntityId>) -> Self {
        let remaining: VecDeque<EntityId> = candidates.into_iter().collect();
        Self {
            processed: 0,
            skipped: 0,
            total: remaining.len(),
            remaining,
        }
    }

    /// Candidates loaded and checked so far
    #[inline]
    #[must_use]
    pub fn processed(&self) -> usize {
        self.processed
    }

    /// Candidates that failed to load so far
    #[inline]
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Candidates found by the initial query
    #[inline]
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Candidates attempted so far, loaded or not
    #[inline]
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.processed + self.skipped
    }

    /// IDs still queued, front first
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> &VecDeque<EntityId> {
        &self.remaining
    }

    /// Queue emptied
    #[inline]
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.remaining.is_empty()
    }

    /// Pop up to `size` IDs from the front
    pub(crate) fn take_page(&mut self, size: usize) -> Vec<EntityId> {
        let size = size.min(self.remaining.len());
        self.remaining.drain(..size).collect()
    }

    /// Put a page back at the front, undoing [`Self::take_page`]
    pub(crate) fn restore_page(&mut self, page: Vec<EntityId>) {
        for id in page.into_iter().rev() {
            self.remaining.push_front(id);
        }
    }

    /// Account for a page of `attempted` IDs of which `loaded` loaded
    pub(crate) fn advance(&mut self, loaded: usize, attempted: usize) {
        let loaded = loaded.min(attempted);
        self.processed += loaded;
        self.skipped += attempted - loaded;
    }

    /// Progress; exactly done once the queue is empty
    #[must_use]
    pub fn progress(&self) -> Progress {
        if self.is_exhausted() {
            Progress::DONE
        } else {
            Progress::partial(self.attempted(), self.total)
        }
    }

    fn tally(&self) -> ScanTally {
        ScanTally {
            processed: self.processed,
            skipped: self.skipped,
            total: self.total,
        }
    }

    /// Next state: done when the queue is empty, otherwise still in progress
    pub(crate) fn into_state(self) -> ScanState {
        if self.is_exhausted() {
            ScanState::Done(self.tally())
        } else {
            ScanState::InProgress(self)
        }
    }
}

/// Scan state of one entity type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanState {
    /// No step has run yet
    #[default]
    Unstarted,

    /// Candidates remain
    InProgress(ScanCursor),

    /// Every candidate handled
    Done(ScanTally),
}

impl ScanState {
    /// Progress of this state
    #[must_use]
    pub fn progress(&self) -> Progress {
        match self {
            Self::Unstarted => Progress::ZERO,
            Self::InProgress(cursor) => cursor.progress(),
            Self::Done(_) => Progress::DONE,
        }
    }

    /// Terminal state reached
    #[inline]
    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }

    /// Entities loaded and checked so far
    #[must_use]
    pub fn processed(&self) -> usize {
        match self {
            Self::Unstarted => 0,
            Self::InProgress(cursor) => cursor.processed(),
            Self::Done(tally) => tally.processed,
        }
    }
}
