//! The fitting seam between model selection and the HMM engine.
//!
//! Selection strategies only need two capabilities: fit a model with a given
//! number of hidden states to a [`Flattened`] collection, and score any
//! collection with a fitted model. Both report problems as
//! [`SemaphoreError`](semaphore_core::SemaphoreError) values so callers can
//! skip the offending candidate.

use semaphore_core::Result;

use crate::data::Flattened;
use crate::hmm::{GaussianHmm, GaussianHmmConfig};

/// A trained model that can score observation data.
pub trait FittedModel {
    /// Number of hidden states.
    fn n_states(&self) -> usize;

    /// Total log-likelihood of every sequence in `data`.
    fn score(&self, data: &Flattened) -> Result<f64>;
}

/// Produces a [`FittedModel`] with a requested number of hidden states.
pub trait SequenceFitter {
    type Model: FittedModel;

    /// Fit `n_states` hidden states to `data`, reproducibly for `seed`.
    fn fit(&self, n_states: usize, data: &Flattened, seed: u64) -> Result<Self::Model>;
}

/// Diagonal-covariance Gaussian HMM trained with Baum-Welch.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GaussianHmmFitter {
    pub config: GaussianHmmConfig,
}

impl GaussianHmmFitter {
    pub fn new(config: GaussianHmmConfig) -> Self {
        Self { config }
    }
}

impl SequenceFitter for GaussianHmmFitter {
    type Model = GaussianHmm;

    fn fit(&self, n_states: usize, data: &Flattened, seed: u64) -> Result<GaussianHmm> {
        GaussianHmm::fit(n_states, data, &self.config, seed)
    }
}

impl FittedModel for GaussianHmm {
    fn n_states(&self) -> usize {
        GaussianHmm::n_states(self)
    }

    fn score(&self, data: &Flattened) -> Result<f64> {
        GaussianHmm::score(self, data)
    }
}
