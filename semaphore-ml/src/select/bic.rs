//! Bayesian information criterion.
//!
//! `BIC = -2 logL + p ln N`, where `N` is the number of frames and `p`
//! approximates the free parameters of a diagonal Gaussian HMM as
//! `n_states * (2 * n_features + 1)`. Lower is better.

use semaphore_core::Result;

use super::{keep_best, ModelSearch, ModelSelector};
use crate::fit::SequenceFitter;

/// BIC of a model with `log_l` on `n_frames` frames of `n_features` features.
pub fn bic_score(log_l: f64, n_states: usize, n_features: usize, n_frames: usize) -> f64 {
    let p = n_states as f64 * (2.0 * n_features as f64 + 1.0);
    -2.0 * log_l + p * (n_frames as f64).ln()
}

/// Keeps the candidate with the lowest BIC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectorBic;

impl ModelSelector for SelectorBic {
    fn select<F: SequenceFitter>(&self, search: &ModelSearch<'_, F>) -> Result<Option<F::Model>> {
        let data = search.xlengths();
        let mut best = None;

        for n_states in search.config().candidate_states() {
            let Some(model) = search.base_model(n_states) else {
                continue;
            };
            let Some(log_l) = search.score(&model, data) else {
                continue;
            };
            let bic = bic_score(log_l, n_states, data.n_features(), data.n_frames());
            keep_best(&mut best, bic, model, |new, old| new < old);
        }

        Ok(best.map(|(_, model)| model))
    }
}
