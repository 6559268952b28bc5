//! The merge operator.
//!
//! After computing a successor state, the exploration framework calls
//! [`MergeOperator::merge`] once for every reached state at the same program
//! location. The operator returns either the reached state (nothing to
//! combine, or the new state is already covered) or a joined state that
//! replaces both.
//!
//! Joining is expensive and only pays off once lists have been abstracted,
//! so pairs of states without list segments are never joined.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use log::debug;

use crate::error::Result;
use crate::interrupt::InterruptFlag;
use crate::join::join;
use crate::state::{SmgPrecision, SmgState, StateId};
use crate::status::MergeStatus;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct MergeOptions {
    /// With merging disabled, `merge` always returns the reached state.
    pub enabled: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Counters updated by the merge operator. Purely observational.
#[derive(Debug, Default)]
pub struct MergeStatistics {
    attempts: AtomicU64,
    successes: AtomicU64,
    elapsed_nanos: AtomicU64,
}

impl MergeStatistics {
    /// Number of joins attempted.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Number of joins that produced a new state.
    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    /// Total time spent joining.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_nanos.load(Ordering::Relaxed))
    }

    fn record_time(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.elapsed_nanos.fetch_add(nanos, Ordering::Relaxed);
    }
}

#[derive(Debug, Default)]
pub struct MergeOperator {
    options: MergeOptions,
    statistics: MergeStatistics,
    /// `(covered, covering)` pairs found while merging.
    subsumptions: Mutex<Vec<(StateId, StateId)>>,
    interrupt: InterruptFlag,
}

impl MergeOperator {
    pub fn new(options: MergeOptions, interrupt: InterruptFlag) -> Self {
        Self {
            options,
            statistics: MergeStatistics::default(),
            subsumptions: Mutex::new(Vec::new()),
            interrupt,
        }
    }

    pub fn statistics(&self) -> &MergeStatistics {
        &self.statistics
    }

    /// Subsumption relations recorded since the last
    /// [`take_subsumptions`](Self::take_subsumptions), as `(covered, covering)`.
    pub fn subsumptions(&self) -> Vec<(StateId, StateId)> {
        self.subsumptions.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Hand the recorded subsumption relations to the caller and forget them.
    ///
    /// The exploration framework calls this after each merge round to feed
    /// its stop check.
    pub fn take_subsumptions(&self) -> Vec<(StateId, StateId)> {
        std::mem::take(&mut *self.subsumptions.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn record_subsumption(&self, covered: StateId, covering: StateId) {
        debug!("{} is covered by {}", covered, covering);
        self.subsumptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((covered, covering));
    }

    /// Combine a freshly computed state with a reached one.
    pub fn merge(&self, new: &SmgState, reached: &SmgState, precision: &SmgPrecision) -> Result<SmgState> {
        if !self.options.enabled || !precision.merge_allowed(new, reached) {
            return Ok(reached.clone());
        }
        if !new.has_abstracted_objects() && !reached.has_abstracted_objects() {
            return Ok(reached.clone());
        }

        self.statistics.attempts.fetch_add(1, Ordering::Relaxed);
        let start = Instant::now();
        let joined = join(new.configuration(), reached.configuration(), &self.interrupt);
        self.statistics.record_time(start.elapsed());

        let Some(result) = joined? else {
            debug!("{} and {} stay apart", new.id(), reached.id());
            return Ok(reached.clone());
        };
        match result.status {
            MergeStatus::Equal | MergeStatus::LeftEntail => {
                self.record_subsumption(new.id(), reached.id());
                Ok(reached.clone())
            }
            MergeStatus::RightEntail | MergeStatus::Incomparable => {
                let merged = SmgState::new(result.configuration).with_block_end(new.block_end() && reached.block_end());
                self.record_subsumption(new.id(), merged.id());
                self.record_subsumption(reached.id(), merged.id());
                self.statistics.successes.fetch_add(1, Ordering::Relaxed);
                debug!("merged {} and {} into {} ({})", new.id(), reached.id(), merged, result.status);
                Ok(merged)
            }
        }
    }
}
