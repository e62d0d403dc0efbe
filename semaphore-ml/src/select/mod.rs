//! Per-word HMM topology selection.
//!
//! Every strategy searches the same bounded range of hidden-state counts,
//! fits one candidate per count, scores it by its own criterion and keeps the
//! single best model:
//!
//! | Strategy            | Criterion                                   | Best    |
//! |---------------------|---------------------------------------------|---------|
//! | [`SelectorConstant`]| none, fits `n_constant` states              | n/a     |
//! | [`SelectorBic`]     | `-2 logL + p ln N`                          | lowest  |
//! | [`SelectorDic`]     | `logL(own) - mean logL(other words)`        | highest |
//! | [`SelectorCv`]      | mean held-out logL over 3 folds             | highest |
//!
//! A candidate that fails to fit or score is skipped; a word for which every
//! candidate fails yields `Ok(None)`. `Err` is reserved for violated
//! preconditions detected before the search starts.
//!
//! # Example
//!
//! ```
//! use semaphore_ml::data::WordsData;
//! use semaphore_ml::fit::GaussianHmmFitter;
//! use semaphore_ml::select::{ModelSearch, ModelSelector, SelectorConfig, SelectorConstant};
//!
//! let recording = |lo: f64| -> Vec<Vec<f64>> {
//!     (0..8).map(|t| vec![lo + (t % 4) as f64 * 0.1]).collect()
//! };
//! let words = WordsData::new(vec![
//!     ("BOOK", vec![recording(0.0), recording(0.2)]),
//!     ("JOHN", vec![recording(5.0), recording(5.2)]),
//! ])
//! .unwrap();
//! let config = SelectorConfig { n_constant: 2, ..Default::default() };
//! let fitter = GaussianHmmFitter::default();
//! let search = ModelSearch::new(&fitter, &words, "BOOK", &config).unwrap();
//! let model = SelectorConstant.select(&search).unwrap();
//! assert_eq!(model.map(|m| m.n_states()), Some(2));
//! ```

mod bic;
mod constant;
mod cv;
mod dic;

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use semaphore_core::{Annotated, Result, SemaphoreError};

use crate::data::{Flattened, SequenceCollection, WordData, WordsData};
use crate::fit::{FittedModel, SequenceFitter};

pub use bic::{bic_score, SelectorBic};
pub use constant::SelectorConstant;
pub use cv::{SelectorCv, CV_FOLDS};
pub use dic::{dic_score, SelectorDic};

/// Word → selected model, iterated in lexicographic word order.
pub type ModelMapping<M> = BTreeMap<String, M>;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Search settings shared by every strategy.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SelectorConfig {
    /// Smallest state count tried (inclusive).
    pub min_n_components: usize,
    /// Largest state count bound (exclusive).
    pub max_n_components: usize,
    /// State count used by [`SelectorConstant`].
    pub n_constant: usize,
    /// Seed handed to every fit.
    pub random_seed: u64,
    /// Log every fit attempt.
    pub verbose: bool,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            min_n_components: 2,
            max_n_components: 10,
            n_constant: 3,
            random_seed: 14,
            verbose: false,
        }
    }
}

impl SelectorConfig {
    /// Check that the search range and constant are usable.
    pub fn validate(&self) -> Result<()> {
        if self.min_n_components == 0 {
            return Err(SemaphoreError::InvalidInput(
                "min_n_components must be > 0".into(),
            ));
        }
        if self.min_n_components >= self.max_n_components {
            return Err(SemaphoreError::InvalidInput(format!(
                "empty state range [{}, {})",
                self.min_n_components, self.max_n_components
            )));
        }
        if self.n_constant == 0 {
            return Err(SemaphoreError::InvalidInput(
                "n_constant must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Candidate state counts, `min_n_components..max_n_components`.
    pub fn candidate_states(&self) -> Range<usize> {
        self.min_n_components..self.max_n_components
    }
}

// ---------------------------------------------------------------------------
// Search context
// ---------------------------------------------------------------------------

/// Everything a strategy may read while selecting a model for one word.
pub struct ModelSearch<'a, F> {
    fitter: &'a F,
    words: &'a WordsData,
    word: &'a str,
    this: &'a WordData,
    config: &'a SelectorConfig,
}

impl<'a, F: SequenceFitter> ModelSearch<'a, F> {
    /// Prepare a search for `word`.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid or `word` is not in `words`.
    pub fn new(
        fitter: &'a F,
        words: &'a WordsData,
        word: &'a str,
        config: &'a SelectorConfig,
    ) -> Result<Self> {
        config.validate()?;
        let this = words.get(word)?;
        Ok(Self {
            fitter,
            words,
            word,
            this,
            config,
        })
    }

    /// The word being modelled.
    pub fn word(&self) -> &'a str {
        self.word
    }

    /// The whole vocabulary.
    pub fn words(&self) -> &'a WordsData {
        self.words
    }

    /// Search settings.
    pub fn config(&self) -> &'a SelectorConfig {
        self.config
    }

    /// Training sequences of this word.
    pub fn sequences(&self) -> &'a SequenceCollection {
        self.this.sequences()
    }

    /// Flattened training data of this word.
    pub fn xlengths(&self) -> &'a Flattened {
        self.this.xlengths()
    }

    /// Fit `n_states` states to this word's full training data.
    pub fn base_model(&self, n_states: usize) -> Option<F::Model> {
        self.base_model_on(n_states, self.xlengths())
    }

    /// Fit `n_states` states to `data`; a failed fit yields `None`.
    pub fn base_model_on(&self, n_states: usize, data: &Flattened) -> Option<F::Model> {
        match self.fitter.fit(n_states, data, self.config.random_seed) {
            Ok(model) => {
                if self.config.verbose {
                    tracing::info!(word = self.word, n_states, "model created");
                }
                Some(model)
            }
            Err(err) => {
                if self.config.verbose {
                    tracing::info!(word = self.word, n_states, error = %err, "fit failed");
                }
                None
            }
        }
    }

    /// Score `data` with `model`; failures and non-finite values yield `None`.
    pub fn score(&self, model: &F::Model, data: &Flattened) -> Option<f64> {
        match model.score(data) {
            Ok(value) if value.is_finite() => Some(value),
            Ok(value) => {
                if self.config.verbose {
                    tracing::info!(word = self.word, n_states = model.n_states(), value, "non-finite score");
                }
                None
            }
            Err(err) => {
                if self.config.verbose {
                    tracing::info!(word = self.word, n_states = model.n_states(), error = %err, "scoring failed");
                }
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Strategy trait
// ---------------------------------------------------------------------------

/// A model selection strategy.
pub trait ModelSelector {
    /// Verify vocabulary-wide preconditions of this strategy.
    fn check(&self, _words: &WordsData) -> Result<()> {
        Ok(())
    }

    /// Select the best model for the word of `search`.
    ///
    /// Returns `Ok(None)` when no candidate could be fitted and scored.
    fn select<F: SequenceFitter>(&self, search: &ModelSearch<'_, F>) -> Result<Option<F::Model>>;
}

/// Keep `candidate` if it beats the current best under `better`.
pub(crate) fn keep_best<M>(
    best: &mut Option<(f64, M)>,
    score: f64,
    model: M,
    better: impl Fn(f64, f64) -> bool,
) {
    if best.as_ref().map_or(true, |(current, _)| better(score, *current)) {
        *best = Some((score, model));
    }
}

// ---------------------------------------------------------------------------
// Strategy dispatch
// ---------------------------------------------------------------------------

/// Run-time choice among the four strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SelectorKind {
    Constant,
    Bic,
    Dic,
    Cv,
}

impl SelectorKind {
    /// All strategies in a fixed order.
    pub const ALL: [SelectorKind; 4] = [Self::Constant, Self::Bic, Self::Dic, Self::Cv];
}

impl ModelSelector for SelectorKind {
    fn check(&self, words: &WordsData) -> Result<()> {
        match self {
            Self::Constant => SelectorConstant.check(words),
            Self::Bic => SelectorBic.check(words),
            Self::Dic => SelectorDic.check(words),
            Self::Cv => SelectorCv.check(words),
        }
    }

    fn select<F: SequenceFitter>(&self, search: &ModelSearch<'_, F>) -> Result<Option<F::Model>> {
        match self {
            Self::Constant => SelectorConstant.select(search),
            Self::Bic => SelectorBic.select(search),
            Self::Dic => SelectorDic.select(search),
            Self::Cv => SelectorCv.select(search),
        }
    }
}

impl Annotated for SelectorKind {
    fn name(&self) -> &str {
        match self {
            Self::Constant => "constant",
            Self::Bic => "bic",
            Self::Dic => "dic",
            Self::Cv => "cv",
        }
    }

    fn description(&self) -> Option<&str> {
        Some(match self {
            Self::Constant => "fixed number of hidden states",
            Self::Bic => "lowest Bayesian information criterion",
            Self::Dic => "highest discriminative information criterion",
            Self::Cv => "highest mean held-out log-likelihood",
        })
    }
}

impl fmt::Display for SelectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SelectorKind {
    type Err = SemaphoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "constant" => Ok(Self::Constant),
            "bic" => Ok(Self::Bic),
            "dic" => Ok(Self::Dic),
            "cv" => Ok(Self::Cv),
            other => Err(SemaphoreError::InvalidInput(format!(
                "unknown selector '{other}' (expected constant, bic, dic or cv)"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Batch training
// ---------------------------------------------------------------------------

/// Select a model for every word and assemble the [`ModelMapping`].
///
/// Words with no viable model are left out of the mapping. With the
/// `parallel` feature the words are searched concurrently; the result is
/// identical either way.
///
/// # Errors
///
/// Returns an error only if `config` is invalid or the strategy's
/// vocabulary-wide precondition fails, before any fitting happens.
pub fn train_all_words<F, S>(
    words: &WordsData,
    fitter: &F,
    selector: &S,
    config: &SelectorConfig,
) -> Result<ModelMapping<F::Model>>
where
    F: SequenceFitter + Sync,
    F::Model: Send,
    S: ModelSelector + Sync,
{
    config.validate()?;
    selector.check(words)?;

    let vocabulary: Vec<&str> = words.words().collect();
    let select_word = |word: &str| {
        ModelSearch::new(fitter, words, word, config).and_then(|search| selector.select(&search))
    };

    #[cfg(feature = "parallel")]
    let selected: Vec<Result<Option<F::Model>>> = {
        use rayon::prelude::*;
        vocabulary.par_iter().map(|&w| select_word(w)).collect()
    };

    #[cfg(not(feature = "parallel"))]
    let selected: Vec<Result<Option<F::Model>>> =
        vocabulary.iter().map(|&w| select_word(w)).collect();

    let mut models = ModelMapping::new();
    for (word, outcome) in vocabulary.into_iter().zip(selected) {
        match outcome {
            Ok(Some(model)) => {
                models.insert(word.to_string(), model);
            }
            Ok(None) => tracing::warn!(word, "no viable model"),
            Err(err) => tracing::warn!(word, error = %err, "selection skipped"),
        }
    }
    Ok(models)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
