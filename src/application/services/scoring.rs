//! Conservation scoring strategies
//!
//! No scoring formula is built in. A scorer receives a completed bucket and
//! returns a copy carrying its score; [`NoopScorer`] leaves the score unset.

use crate::domain::MultiSpeciesCall;

/// Assigns a conservation score to a completed multi-species call.
pub trait ConservationScorer: Send + Sync {
    /// Return `call` with its conservation score populated.
    fn score(&self, call: MultiSpeciesCall) -> MultiSpeciesCall;
}

/// Identity scorer: the score stays absent.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopScorer;

impl ConservationScorer for NoopScorer {
    fn score(&self, call: MultiSpeciesCall) -> MultiSpeciesCall {
        call
    }
}

/// Scorer backed by a closure over the bucket.
///
/// The closure sees the taxon, groups and accumulated evidence through the
/// call's accessors and returns the score, or None to leave it unset.
pub struct FnScorer<F> {
    f: F,
}

impl<F> FnScorer<F>
where
    F: Fn(&MultiSpeciesCall) -> Option<f64> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> ConservationScorer for FnScorer<F>
where
    F: Fn(&MultiSpeciesCall) -> Option<f64> + Send + Sync,
{
    fn score(&self, call: MultiSpeciesCall) -> MultiSpeciesCall {
        let score = (self.f)(&call);
        call.with_conservation_score(score)
    }
}
