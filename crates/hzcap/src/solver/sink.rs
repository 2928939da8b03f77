//! Progress sinks for `Solver::estimate_with`.
//!
//! The solver itself does no I/O; every accepted update is handed to a sink.

use super::types::IterationRecord;

pub trait ProgressSink {
    fn record(&mut self, rec: &IterationRecord);
}

/// Discards records.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    #[inline]
    fn record(&mut self, _rec: &IterationRecord) {}
}

/// Emits one INFO event per record.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn record(&mut self, rec: &IterationRecord) {
        tracing::info!(
            iteration = rec.iteration,
            action = rec.action,
            quotient = rec.quotient,
            step = rec.step,
            scale = rec.scale,
            backtracks = rec.backtracks,
            violation = rec.violation,
            "hz_iteration"
        );
    }
}

impl ProgressSink for Vec<IterationRecord> {
    #[inline]
    fn record(&mut self, rec: &IterationRecord) {
        self.push(*rec);
    }
}

impl<F: FnMut(&IterationRecord)> ProgressSink for F {
    #[inline]
    fn record(&mut self, rec: &IterationRecord) {
        self(rec)
    }
}
