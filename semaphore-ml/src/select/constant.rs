//! Baseline strategy: a fixed number of hidden states.

use semaphore_core::Result;

use super::{ModelSearch, ModelSelector};
use crate::fit::SequenceFitter;

/// Fits exactly `n_constant` states to the word's full training data.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectorConstant;

impl ModelSelector for SelectorConstant {
    fn select<F: SequenceFitter>(&self, search: &ModelSearch<'_, F>) -> Result<Option<F::Model>> {
        Ok(search.base_model(search.config().n_constant))
    }
}
