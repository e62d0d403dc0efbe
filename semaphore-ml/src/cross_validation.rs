//! Deterministic k-fold splitting.
//!
//! Folds are contiguous blocks of indices in their original order; no
//! shuffling takes place, so the same sample count always yields the same
//! partition. When `n_samples` is not divisible by `k`, the first
//! `n_samples % k` folds hold one extra sample.

use semaphore_core::{Result, SemaphoreError};

/// One train/held-out partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    /// Fold number (0-indexed).
    pub fold: usize,
    /// Indices used for fitting.
    pub train: Vec<usize>,
    /// Held-out indices.
    pub test: Vec<usize>,
}

/// Non-shuffled k-fold splitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KFold {
    pub n_splits: usize,
}

impl KFold {
    /// Create a splitter with `n_splits` folds.
    ///
    /// # Errors
    ///
    /// Returns an error if `n_splits < 2`.
    pub fn new(n_splits: usize) -> Result<Self> {
        if n_splits < 2 {
            return Err(SemaphoreError::InvalidInput(
                "k must be at least 2".into(),
            ));
        }
        Ok(Self { n_splits })
    }

    /// Partition `0..n_samples` into folds.
    ///
    /// # Errors
    ///
    /// Returns an error if there are fewer samples than folds.
    pub fn split(&self, n_samples: usize) -> Result<Vec<Fold>> {
        let k = self.n_splits;
        if k > n_samples {
            return Err(SemaphoreError::InvalidInput(format!(
                "k ({k}) > n_samples ({n_samples})"
            )));
        }

        let base_size = n_samples / k;
        let remainder = n_samples % k;
        let mut folds = Vec::with_capacity(k);
        let mut start = 0;
        for fold in 0..k {
            let size = base_size + usize::from(fold < remainder);
            let end = start + size;
            folds.push(Fold {
                fold,
                train: (0..start).chain(end..n_samples).collect(),
                test: (start..end).collect(),
            });
            start = end;
        }
        Ok(folds)
    }
}

/// Incremental arithmetic mean of fold scores.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunningMean {
    sum: f64,
    count: usize,
}

impl RunningMean {
    /// Add a score and return the mean of all scores so far.
    pub fn push(&mut self, score: f64) -> f64 {
        self.sum += score;
        self.count += 1;
        self.mean()
    }

    /// Mean of the scores pushed so far, `NaN` if there are none.
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            f64::NAN
        } else {
            self.sum / self.count as f64
        }
    }

    /// Number of scores pushed.
    pub fn count(&self) -> usize {
        self.count
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uneven_split_front_loads_remainder() {
        // 7 samples, 3 folds → sizes 3, 2, 2
        let folds = KFold::new(3).unwrap().split(7).unwrap();
        let sizes: Vec<usize> = folds.iter().map(|f| f.test.len()).collect();
        assert_eq!(sizes, vec![3, 2, 2]);
        assert_eq!(folds[0].test, vec![0, 1, 2]);
        assert_eq!(folds[1].train, vec![0, 1, 2, 5, 6]);
    }

    #[test]
    fn three_samples_three_folds_is_leave_one_out() {
        let folds = KFold::new(3).unwrap().split(3).unwrap();
        for (i, f) in folds.iter().enumerate() {
            assert_eq!(f.test, vec![i]);
            assert_eq!(f.train.len(), 2);
        }
    }

    #[test]
    fn split_is_deterministic() {
        let kf = KFold::new(3).unwrap();
        assert_eq!(kf.split(11).unwrap(), kf.split(11).unwrap());
    }

    #[test]
    fn errors() {
        assert!(KFold::new(1).is_err());
        assert!(KFold::new(3).unwrap().split(2).is_err());
    }

    #[test]
    fn running_mean_tracks_prefix() {
        let mut m = RunningMean::default();
        assert!(m.mean().is_nan());
        assert_eq!(m.push(-10.0), -10.0);
        assert_eq!(m.push(-20.0), -15.0);
        assert_eq!(m.count(), 2);
    }
}
