//! Cross-validated log-likelihood.
//!
//! For each state count the word's recordings are split into
//! [`CV_FOLDS`] contiguous folds; a model is fitted on the training part of
//! each fold and scored on the held-out part. The running mean of held-out
//! scores is tracked and the fold model that achieved the highest running
//! mean is returned.
//!
//! Words with fewer recordings than folds cannot be split and fall back to
//! fitting and scoring the full collection.

use semaphore_core::Result;

use super::{keep_best, ModelSearch, ModelSelector};
use crate::cross_validation::{KFold, RunningMean};
use crate::data::combine_sequences;
use crate::fit::SequenceFitter;

/// Number of folds used by [`SelectorCv`].
pub const CV_FOLDS: usize = 3;

/// Keeps the candidate with the highest mean held-out log-likelihood.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectorCv;

impl ModelSelector for SelectorCv {
    fn select<F: SequenceFitter>(&self, search: &ModelSearch<'_, F>) -> Result<Option<F::Model>> {
        let sequences = search.sequences();
        let folds = if sequences.len() >= CV_FOLDS {
            Some(KFold::new(CV_FOLDS)?.split(sequences.len())?)
        } else {
            if search.config().verbose {
                tracing::info!(
                    word = search.word(),
                    n_sequences = sequences.len(),
                    "too few sequences to split, scoring on training data"
                );
            }
            None
        };
        let mut best = None;

        for n_states in search.config().candidate_states() {
            let Some(folds) = &folds else {
                let Some(model) = search.base_model(n_states) else {
                    continue;
                };
                if let Some(score) = search.score(&model, search.xlengths()) {
                    keep_best(&mut best, score, model, |new, old| new > old);
                }
                continue;
            };

            let mut mean = RunningMean::default();
            for fold in folds {
                let train = combine_sequences(&fold.train, sequences)?;
                let test = combine_sequences(&fold.test, sequences)?;
                let Some(model) = search.base_model_on(n_states, &train) else {
                    continue;
                };
                let Some(score) = search.score(&model, &test) else {
                    continue;
                };
                let running = mean.push(score);
                keep_best(&mut best, running, model, |new, old| new > old);
            }
        }

        Ok(best.map(|(_, model)| model))
    }
}
