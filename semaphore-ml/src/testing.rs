//! Shared fixtures for unit tests: synthetic recordings and a scripted fitter.

use std::collections::BTreeMap;
use std::sync::Mutex;

use semaphore_core::{Result, SemaphoreError};

use crate::data::{Flattened, Sequence, SequenceCollection, WordsData};
use crate::fit::{FittedModel, SequenceFitter};

/// Deterministic uniform noise in `[-0.3, 0.3]`.
pub(crate) struct Noise(u64);

impl Noise {
    pub(crate) fn new(seed: u64) -> Self {
        Self(seed.wrapping_add(0x9E37_79B9_7F4A_7C15))
    }

    pub(crate) fn next(&mut self) -> f64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        let u = (self.0 >> 11) as f64 / (1u64 << 53) as f64;
        (u - 0.5) * 0.6
    }
}

/// `len` two-feature frames: the first half near `lo`, the rest near `hi`.
pub(crate) fn two_phase_sequence(lo: f64, hi: f64, len: usize, seed: u64) -> Sequence {
    let mut noise = Noise::new(seed);
    (0..len)
        .map(|t| {
            let level = if t < len / 2 { lo } else { hi };
            vec![level + noise.next(), level + noise.next()]
        })
        .collect()
}

/// `n_seqs` two-phase recordings of 8 to 10 frames each.
pub(crate) fn two_phase_collection(lo: f64, hi: f64, n_seqs: usize, seed: u64) -> SequenceCollection {
    let raw = (0..n_seqs)
        .map(|i| two_phase_sequence(lo, hi, 8 + i % 3, seed * 31 + i as u64))
        .collect();
    SequenceCollection::new(raw).unwrap()
}

/// Vocabulary of `(word, level, n_sequences)` two-phase words.
pub(crate) fn vocabulary(entries: &[(&str, f64, usize)]) -> WordsData {
    WordsData::new(entries.iter().enumerate().map(|(i, &(word, level, n))| {
        (
            word,
            two_phase_collection(level, level + 3.0, n, i as u64 + 1)
                .sequences()
                .to_vec(),
        )
    }))
    .unwrap()
}

/// Score of data under a [`ScriptedModel`] with the given centre and spread.
pub(crate) fn scripted_score(data: &Flattened, center: f64, spread: f64) -> f64 {
    (0..data.n_frames())
        .map(|t| {
            let x = data.frame(t)[0];
            -(x - center) * (x - center) / spread - spread.ln()
        })
        .sum()
}

/// Fitted model whose likelihood is a fixed function of the first feature.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ScriptedModel {
    pub n_states: usize,
    pub center: f64,
    pub spread: f64,
    pub unscorable: bool,
}

impl FittedModel for ScriptedModel {
    fn n_states(&self) -> usize {
        self.n_states
    }

    fn score(&self, data: &Flattened) -> Result<f64> {
        if self.unscorable {
            return Err(SemaphoreError::Score("scripted failure".into()));
        }
        Ok(scripted_score(data, self.center, self.spread))
    }
}

/// Fitter with per-state-count behaviour fixed in advance.
///
/// A state count with no spread entry, or with fewer frames than states,
/// fails to fit. Every attempt is recorded as `(n_states, n_sequences)`.
pub(crate) struct ScriptedFitter {
    spreads: BTreeMap<usize, f64>,
    unscorable: Vec<usize>,
    attempts: Mutex<Vec<(usize, usize)>>,
}

impl ScriptedFitter {
    pub(crate) fn new(spreads: &[(usize, f64)]) -> Self {
        Self {
            spreads: spreads.iter().copied().collect(),
            unscorable: Vec::new(),
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn unscorable(mut self, states: &[usize]) -> Self {
        self.unscorable = states.to_vec();
        self
    }

    pub(crate) fn attempts(&self) -> Vec<(usize, usize)> {
        self.attempts.lock().unwrap().clone()
    }

    /// The model `fit` would return, computed without recording an attempt.
    pub(crate) fn expected(&self, n_states: usize, data: &Flattened) -> Option<ScriptedModel> {
        let spread = *self.spreads.get(&n_states)?;
        if data.n_frames() < n_states {
            return None;
        }
        let center = (0..data.n_frames()).map(|t| data.frame(t)[0]).sum::<f64>()
            / data.n_frames() as f64;
        Some(ScriptedModel {
            n_states,
            center,
            spread,
            unscorable: self.unscorable.contains(&n_states),
        })
    }
}

impl SequenceFitter for ScriptedFitter {
    type Model = ScriptedModel;

    fn fit(&self, n_states: usize, data: &Flattened, _seed: u64) -> Result<ScriptedModel> {
        self.attempts
            .lock()
            .unwrap()
            .push((n_states, data.n_sequences()));
        self.expected(n_states, data)
            .ok_or_else(|| SemaphoreError::Fit(format!("no script for {n_states} states")))
    }
}
