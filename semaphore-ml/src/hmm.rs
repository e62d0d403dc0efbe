//! Gaussian Hidden Markov Models with diagonal covariance.
//!
//! Each hidden state emits frames from an axis-aligned Gaussian. Parameters
//! are stored in probability space; the forward and backward passes run in
//! log-space so long recordings do not underflow.
//!
//! Training uses Baum-Welch over several independent sequences at once: the
//! sufficient statistics of every sequence are pooled before each M-step.
//!
//! # Quick start
//!
//! ```
//! use semaphore_ml::data::Flattened;
//! use semaphore_ml::hmm::GaussianHmm;
//!
//! let model = GaussianHmm::new(
//!     2,
//!     1,
//!     vec![0.5, 0.5],
//!     vec![0.9, 0.1, 0.1, 0.9],
//!     vec![0.0, 5.0],
//!     vec![1.0, 1.0],
//! )
//! .unwrap();
//! let data = Flattened::new(vec![0.1, -0.2, 4.9, 5.1], 1, vec![2, 2]).unwrap();
//! let ll = model.score(&data).unwrap();
//! assert!(ll.is_finite() && ll < 0.0);
//! ```

use semaphore_core::{Result, SemaphoreError, Summarizable};

use crate::cluster::{kmeans, KMeansConfig};
use crate::data::Flattened;

const LN_2PI: f64 = 1.837_877_066_409_345_5;

// ---------------------------------------------------------------------------
// Log-space helpers
// ---------------------------------------------------------------------------

/// Numerically stable computation of `log(exp(a) + exp(b))`.
fn log_sum_exp(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let max = a.max(b);
    max + ((a - max).exp() + (b - max).exp()).ln()
}

/// Log-sum-exp over a slice.
fn log_sum_exp_slice(xs: &[f64]) -> f64 {
    let max = xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    let sum: f64 = xs.iter().map(|&x| (x - max).exp()).sum();
    max + sum.ln()
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Training settings for [`GaussianHmm::fit`].
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GaussianHmmConfig {
    /// Maximum number of Baum-Welch iterations.
    pub n_iter: usize,
    /// Stop once an iteration improves the log-likelihood by less than this.
    pub tolerance: f64,
    /// Floor added to every variance after re-estimation.
    pub min_covar: f64,
}

impl Default for GaussianHmmConfig {
    fn default() -> Self {
        Self {
            n_iter: 1000,
            tolerance: 1e-2,
            min_covar: 1e-3,
        }
    }
}

// ---------------------------------------------------------------------------
// GaussianHmm
// ---------------------------------------------------------------------------

/// A continuous HMM with one diagonal Gaussian per hidden state.
#[derive(Debug, Clone)]
pub struct GaussianHmm {
    n_states: usize,
    n_features: usize,
    /// Initial state probabilities (length `n_states`).
    startprob: Vec<f64>,
    /// Row-major `n_states * n_states` transition matrix.
    transmat: Vec<f64>,
    /// Row-major `n_states * n_features` emission means.
    means: Vec<f64>,
    /// Row-major `n_states * n_features` emission variances.
    variances: Vec<f64>,
    n_iter: usize,
    converged: bool,
}

impl GaussianHmm {
    /// Create a model from explicit parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if a dimension is zero or inconsistent, a probability
    /// row does not sum to ~1.0, or a variance is not strictly positive.
    pub fn new(
        n_states: usize,
        n_features: usize,
        startprob: Vec<f64>,
        transmat: Vec<f64>,
        means: Vec<f64>,
        variances: Vec<f64>,
    ) -> Result<Self> {
        if n_states == 0 || n_features == 0 {
            return Err(SemaphoreError::InvalidInput(
                "n_states and n_features must be > 0".into(),
            ));
        }
        if startprob.len() != n_states {
            return Err(SemaphoreError::InvalidInput(format!(
                "startprob length {} != n_states {n_states}",
                startprob.len()
            )));
        }
        if transmat.len() != n_states * n_states {
            return Err(SemaphoreError::InvalidInput(format!(
                "transmat length {} != n_states*n_states {}",
                transmat.len(),
                n_states * n_states
            )));
        }
        if means.len() != n_states * n_features || variances.len() != n_states * n_features {
            return Err(SemaphoreError::InvalidInput(format!(
                "means/variances must have n_states*n_features = {} values",
                n_states * n_features
            )));
        }

        let tol = 1e-6;
        let pi_sum: f64 = startprob.iter().sum();
        if (pi_sum - 1.0).abs() > tol {
            return Err(SemaphoreError::InvalidInput(format!(
                "startprob sums to {pi_sum}, expected ~1.0"
            )));
        }
        for (i, row) in transmat.chunks_exact(n_states).enumerate() {
            let row_sum: f64 = row.iter().sum();
            if (row_sum - 1.0).abs() > tol {
                return Err(SemaphoreError::InvalidInput(format!(
                    "transmat row {i} sums to {row_sum}, expected ~1.0"
                )));
            }
        }
        if variances.iter().any(|&v| v <= 0.0 || !v.is_finite()) {
            return Err(SemaphoreError::InvalidInput(
                "variances must be finite and > 0".into(),
            ));
        }

        Ok(Self {
            n_states,
            n_features,
            startprob,
            transmat,
            means,
            variances,
            n_iter: 0,
            converged: false,
        })
    }

    /// Fit a model with `n_states` hidden states to `data`.
    ///
    /// Means start at seeded k-means centroids, variances at the pooled
    /// per-feature variance, and start/transition probabilities uniform.
    ///
    /// # Errors
    ///
    /// Returns an error if there are fewer frames than states, or training
    /// runs into degenerate numerics.
    pub fn fit(
        n_states: usize,
        data: &Flattened,
        config: &GaussianHmmConfig,
        seed: u64,
    ) -> Result<Self> {
        if n_states == 0 {
            return Err(SemaphoreError::InvalidInput(
                "n_states must be > 0".into(),
            ));
        }
        let d = data.n_features();
        let n_frames = data.n_frames();
        if n_frames < n_states {
            return Err(SemaphoreError::Fit(format!(
                "{n_frames} frames cannot support {n_states} states"
            )));
        }

        let clusters = kmeans(
            data.data(),
            d,
            &KMeansConfig {
                n_clusters: n_states,
                seed,
                ..KMeansConfig::default()
            },
        )?;

        let mut mean = vec![0.0; d];
        for t in 0..n_frames {
            for (m, x) in mean.iter_mut().zip(data.frame(t)) {
                *m += x;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n_frames as f64);
        let mut var = vec![0.0; d];
        for t in 0..n_frames {
            for ((v, m), x) in var.iter_mut().zip(&mean).zip(data.frame(t)) {
                *v += (x - m) * (x - m);
            }
        }
        let variances: Vec<f64> = (0..n_states)
            .flat_map(|_| var.iter().map(|v| v / n_frames as f64 + config.min_covar))
            .collect();

        let uniform = 1.0 / n_states as f64;
        let mut model = Self::new(
            n_states,
            d,
            vec![uniform; n_states],
            vec![uniform; n_states * n_states],
            clusters.centroids,
            variances,
        )?;
        model.baum_welch(data, config.n_iter, config.tolerance, config.min_covar)?;
        Ok(model)
    }

    /// Number of hidden states.
    pub fn n_states(&self) -> usize {
        self.n_states
    }

    /// Feature dimensionality of the emissions.
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Initial state probabilities.
    pub fn startprob(&self) -> &[f64] {
        &self.startprob
    }

    /// Row-major transition matrix.
    pub fn transmat(&self) -> &[f64] {
        &self.transmat
    }

    /// Row-major emission means.
    pub fn means(&self) -> &[f64] {
        &self.means
    }

    /// Row-major emission variances.
    pub fn variances(&self) -> &[f64] {
        &self.variances
    }

    /// Baum-Welch iterations performed by the last training run.
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Whether the last training run stopped on the tolerance.
    pub fn converged(&self) -> bool {
        self.converged
    }

    // -----------------------------------------------------------------------
    // Emission densities
    // -----------------------------------------------------------------------

    /// Log emission density of every frame under every state, `t_len * n_states`.
    fn log_emissions(&self, seq: &[f64]) -> Vec<f64> {
        let n = self.n_states;
        let d = self.n_features;
        let norms: Vec<f64> = self
            .variances
            .chunks_exact(d)
            .map(|v| v.iter().map(|s| LN_2PI + s.ln()).sum::<f64>())
            .collect();
        let mut out = Vec::with_capacity(seq.len() / d * n);
        for x in seq.chunks_exact(d) {
            for i in 0..n {
                let mu = &self.means[i * d..(i + 1) * d];
                let var = &self.variances[i * d..(i + 1) * d];
                let maha: f64 = x
                    .iter()
                    .zip(mu)
                    .zip(var)
                    .map(|((x, m), v)| (x - m) * (x - m) / v)
                    .sum();
                out.push(-0.5 * (norms[i] + maha));
            }
        }
        out
    }

    fn log_params(&self) -> (Vec<f64>, Vec<f64>) {
        (
            self.startprob.iter().map(|p| p.ln()).collect(),
            self.transmat.iter().map(|p| p.ln()).collect(),
        )
    }

    // -----------------------------------------------------------------------
    // Forward / backward
    // -----------------------------------------------------------------------

    fn forward_log(&self, logb: &[f64], log_start: &[f64], log_trans: &[f64]) -> (Vec<f64>, f64) {
        let n = self.n_states;
        let t_len = logb.len() / n;
        let mut alpha = vec![f64::NEG_INFINITY; t_len * n];
        for i in 0..n {
            alpha[i] = log_start[i] + logb[i];
        }
        for t in 1..t_len {
            for j in 0..n {
                let mut acc = f64::NEG_INFINITY;
                for i in 0..n {
                    acc = log_sum_exp(acc, alpha[(t - 1) * n + i] + log_trans[i * n + j]);
                }
                alpha[t * n + j] = acc + logb[t * n + j];
            }
        }
        let ll = log_sum_exp_slice(&alpha[(t_len - 1) * n..]);
        (alpha, ll)
    }

    fn backward_log(&self, logb: &[f64], log_trans: &[f64]) -> Vec<f64> {
        let n = self.n_states;
        let t_len = logb.len() / n;
        let mut beta = vec![0.0; t_len * n];
        for t in (0..t_len - 1).rev() {
            for i in 0..n {
                let mut acc = f64::NEG_INFINITY;
                for j in 0..n {
                    acc = log_sum_exp(
                        acc,
                        log_trans[i * n + j] + logb[(t + 1) * n + j] + beta[(t + 1) * n + j],
                    );
                }
                beta[t * n + i] = acc;
            }
        }
        beta
    }

    fn check_sequence(&self, seq: &[f64]) -> Result<()> {
        if seq.is_empty() {
            return Err(SemaphoreError::Score("sequence is empty".into()));
        }
        if seq.len() % self.n_features != 0 {
            return Err(SemaphoreError::Score(format!(
                "sequence length {} is not a multiple of n_features {}",
                seq.len(),
                self.n_features
            )));
        }
        Ok(())
    }

    /// Forward pass over one flat row-major sequence.
    ///
    /// Returns `(alpha, log_likelihood)` with `alpha` flat `t_len * n_states`.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty or ragged sequence.
    pub fn forward(&self, seq: &[f64]) -> Result<(Vec<f64>, f64)> {
        self.check_sequence(seq)?;
        let (log_start, log_trans) = self.log_params();
        Ok(self.forward_log(&self.log_emissions(seq), &log_start, &log_trans))
    }

    /// Backward pass over one flat row-major sequence.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty or ragged sequence.
    pub fn backward(&self, seq: &[f64]) -> Result<Vec<f64>> {
        self.check_sequence(seq)?;
        let (_, log_trans) = self.log_params();
        Ok(self.backward_log(&self.log_emissions(seq), &log_trans))
    }

    /// Log-likelihood of a single flat sequence.
    pub fn log_likelihood(&self, seq: &[f64]) -> Result<f64> {
        self.forward(seq).map(|(_, ll)| ll)
    }

    /// Total log-likelihood of every sequence in `data`.
    ///
    /// # Errors
    ///
    /// Returns [`SemaphoreError::Score`] on a feature-dimension mismatch and
    /// [`SemaphoreError::Numerical`] if the result is not finite.
    pub fn score(&self, data: &Flattened) -> Result<f64> {
        if data.n_features() != self.n_features {
            return Err(SemaphoreError::Score(format!(
                "data has {} features, model expects {}",
                data.n_features(),
                self.n_features
            )));
        }
        let (log_start, log_trans) = self.log_params();
        let mut total = 0.0;
        for seq in data.sequences() {
            let (_, ll) = self.forward_log(&self.log_emissions(seq), &log_start, &log_trans);
            total += ll;
        }
        if !total.is_finite() {
            return Err(SemaphoreError::Numerical(format!(
                "log-likelihood is {total}"
            )));
        }
        Ok(total)
    }

    // -----------------------------------------------------------------------
    // Baum-Welch (EM) training
    // -----------------------------------------------------------------------

    /// Re-estimate all parameters from `data` with Baum-Welch.
    ///
    /// Runs at most `max_iter` iterations and stops once the log-likelihood
    /// improves by less than `tolerance`. Returns the log-likelihood of the
    /// last E-step.
    ///
    /// # Errors
    ///
    /// Returns [`SemaphoreError::Numerical`] if a sequence has non-finite
    /// likelihood or a state receives no posterior mass.
    pub fn baum_welch(
        &mut self,
        data: &Flattened,
        max_iter: usize,
        tolerance: f64,
        min_covar: f64,
    ) -> Result<f64> {
        if data.n_features() != self.n_features {
            return Err(SemaphoreError::Fit(format!(
                "data has {} features, model expects {}",
                data.n_features(),
                self.n_features
            )));
        }
        let n = self.n_states;
        let d = self.n_features;
        let mut prev_ll = f64::NEG_INFINITY;
        let mut ll = f64::NEG_INFINITY;
        self.n_iter = 0;
        self.converged = false;

        for iter in 0..max_iter {
            let (log_start, log_trans) = self.log_params();
            let mut start_acc = vec![0.0; n];
            let mut trans_acc = vec![0.0; n * n];
            let mut gamma_sum = vec![0.0; n];
            let mut x_sum = vec![0.0; n * d];
            let mut x2_sum = vec![0.0; n * d];
            ll = 0.0;

            // E-step, pooled over sequences
            for seq in data.sequences() {
                let t_len = seq.len() / d;
                let logb = self.log_emissions(seq);
                let (alpha, seq_ll) = self.forward_log(&logb, &log_start, &log_trans);
                if !seq_ll.is_finite() {
                    return Err(SemaphoreError::Numerical(format!(
                        "sequence log-likelihood is {seq_ll}"
                    )));
                }
                let beta = self.backward_log(&logb, &log_trans);
                ll += seq_ll;

                for t in 0..t_len {
                    let x = &seq[t * d..(t + 1) * d];
                    for i in 0..n {
                        let g = (alpha[t * n + i] + beta[t * n + i] - seq_ll).exp();
                        if t == 0 {
                            start_acc[i] += g;
                        }
                        gamma_sum[i] += g;
                        for (k, &xk) in x.iter().enumerate() {
                            x_sum[i * d + k] += g * xk;
                            x2_sum[i * d + k] += g * xk * xk;
                        }
                    }
                }
                for t in 0..t_len.saturating_sub(1) {
                    for i in 0..n {
                        for j in 0..n {
                            trans_acc[i * n + j] += (alpha[t * n + i]
                                + log_trans[i * n + j]
                                + logb[(t + 1) * n + j]
                                + beta[(t + 1) * n + j]
                                - seq_ll)
                                .exp();
                        }
                    }
                }
            }

            // M-step
            if let Some(i) = gamma_sum.iter().position(|&g| g <= 0.0 || !g.is_finite()) {
                return Err(SemaphoreError::Numerical(format!(
                    "state {i} received no posterior mass"
                )));
            }
            let start_total: f64 = start_acc.iter().sum();
            for (p, a) in self.startprob.iter_mut().zip(&start_acc) {
                *p = a / start_total;
            }
            for i in 0..n {
                let row = &trans_acc[i * n..(i + 1) * n];
                let row_sum: f64 = row.iter().sum();
                // a state seen only on final frames keeps its old row
                if row_sum > 0.0 {
                    for j in 0..n {
                        self.transmat[i * n + j] = row[j] / row_sum;
                    }
                }
                for k in 0..d {
                    let mu = x_sum[i * d + k] / gamma_sum[i];
                    let var = (x2_sum[i * d + k] / gamma_sum[i] - mu * mu).max(0.0);
                    self.means[i * d + k] = mu;
                    self.variances[i * d + k] = var + min_covar;
                }
            }
            self.n_iter = iter + 1;

            let improvement = ll - prev_ll;
            tracing::trace!(iter = iter + 1, log_likelihood = ll, "baum-welch iteration");
            if improvement < tolerance {
                self.converged = true;
                break;
            }
            prev_ll = ll;
        }

        if self.variances.iter().any(|v| !v.is_finite()) || self.means.iter().any(|m| !m.is_finite()) {
            return Err(SemaphoreError::Numerical(
                "training produced non-finite parameters".into(),
            ));
        }
        Ok(ll)
    }
}

impl Summarizable for GaussianHmm {
    fn summary(&self) -> String {
        format!(
            "GaussianHmm: {} states, {} features, {} iterations{}",
            self.n_states,
            self.n_features,
            self.n_iter,
            if self.converged { " (converged)" } else { "" },
        )
    }
}

// ===========================================================================
// Tests
// ===========================================================================
