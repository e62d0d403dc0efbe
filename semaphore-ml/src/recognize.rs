//! Maximum-likelihood word recognition.
//!
//! Every test item is scored against every word model; the word whose model
//! assigns the highest log-likelihood is the guess. A model that cannot
//! score an item records `-inf` for that word instead of aborting the item.
//!
//! Words are visited in lexicographic order and the first maximum wins, so
//! guesses are reproducible even when scores tie.

use std::collections::BTreeMap;

use semaphore_core::{Result, SemaphoreError, Summarizable};

use crate::data::{Flattened, SinglesData};
use crate::fit::FittedModel;
use crate::select::ModelMapping;

/// Word → log-likelihood of one test item.
pub type ScoreRecord = BTreeMap<String, f64>;

/// Per-item scores and best guesses, both in test-set order.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Recognition {
    pub probabilities: Vec<ScoreRecord>,
    pub guesses: Vec<String>,
}

impl Recognition {
    /// Number of recognized items.
    pub fn len(&self) -> usize {
        self.guesses.len()
    }

    /// Whether no items were recognized.
    pub fn is_empty(&self) -> bool {
        self.guesses.is_empty()
    }

    /// Fraction of guesses equal to the true words.
    ///
    /// # Errors
    ///
    /// Returns an error if `wordlist` has a different length or is empty.
    pub fn accuracy(&self, wordlist: &[String]) -> Result<f64> {
        if wordlist.len() != self.guesses.len() {
            return Err(SemaphoreError::InvalidInput(format!(
                "wordlist length {} != number of guesses {}",
                wordlist.len(),
                self.guesses.len()
            )));
        }
        if wordlist.is_empty() {
            return Err(SemaphoreError::InvalidInput(
                "nothing to compare".into(),
            ));
        }
        let correct = self
            .guesses
            .iter()
            .zip(wordlist)
            .filter(|(guess, truth)| guess == truth)
            .count();
        Ok(correct as f64 / wordlist.len() as f64)
    }
}

impl Summarizable for Recognition {
    fn summary(&self) -> String {
        let words = self.probabilities.first().map_or(0, BTreeMap::len);
        format!("{} items recognized against {} word models", self.len(), words)
    }
}

/// Score one item against every model and pick the best word.
fn recognize_item<M: FittedModel>(
    models: &ModelMapping<M>,
    item: &Flattened,
) -> (ScoreRecord, String) {
    let mut record = ScoreRecord::new();
    let mut guess: Option<(&str, f64)> = None;
    for (word, model) in models {
        let ll = match model.score(item) {
            Ok(v) if !v.is_nan() => v,
            Ok(_) => f64::NEG_INFINITY,
            Err(err) => {
                tracing::debug!(word = word.as_str(), error = %err, "scoring failed");
                f64::NEG_INFINITY
            }
        };
        if guess.map_or(true, |(_, best)| ll > best) {
            guess = Some((word.as_str(), ll));
        }
        record.insert(word.clone(), ll);
    }
    let guess = guess.map(|(w, _)| w.to_string()).unwrap_or_default();
    (record, guess)
}

/// Recognize every item of `test_set` with the word models in `models`.
///
/// With the `parallel` feature items are scored concurrently; output order
/// and guesses are unchanged.
///
/// # Errors
///
/// Returns an error if `models` is empty.
pub fn recognize<M>(models: &ModelMapping<M>, test_set: &SinglesData) -> Result<Recognition>
where
    M: FittedModel + Sync,
{
    if models.is_empty() {
        return Err(SemaphoreError::InvalidInput(
            "no word models to recognize with".into(),
        ));
    }

    #[cfg(feature = "parallel")]
    let scored: Vec<(ScoreRecord, String)> = {
        use rayon::prelude::*;
        test_set
            .items()
            .par_iter()
            .map(|item| recognize_item(models, item))
            .collect()
    };

    #[cfg(not(feature = "parallel"))]
    let scored: Vec<(ScoreRecord, String)> = test_set
        .items()
        .iter()
        .map(|item| recognize_item(models, item))
        .collect();

    let (probabilities, guesses) = scored.into_iter().unzip();
    Ok(Recognition {
        probabilities,
        guesses,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::GaussianHmmFitter;
    use crate::select::{train_all_words, SelectorConfig, SelectorKind};
    use crate::testing::{two_phase_collection, vocabulary};

    /// Model that looks up its score by the first value of the item.
    #[derive(Debug)]
    struct LookupModel(Vec<Option<f64>>);

    impl FittedModel for LookupModel {
        fn n_states(&self) -> usize {
            1
        }

        fn score(&self, data: &Flattened) -> Result<f64> {
            self.0
                .get(data.frame(0)[0] as usize)
                .copied()
                .flatten()
                .ok_or_else(|| SemaphoreError::Score("no entry".into()))
        }
    }

    /// Test set whose item `i` is a single frame holding `i`.
    fn indexed_items(n: usize) -> SinglesData {
        SinglesData::new(
            (0..n)
                .map(|i| Flattened::new(vec![i as f64], 1, vec![1]).unwrap())
                .collect(),
        )
    }

    fn mapping(entries: Vec<(&str, Vec<Option<f64>>)>) -> ModelMapping<LookupModel> {
        entries
            .into_iter()
            .map(|(w, s)| (w.to_string(), LookupModel(s)))
            .collect()
    }

    #[test]
    fn picks_highest_log_likelihood() {
        let models = mapping(vec![
            ("A", vec![Some(-50.0), Some(-90.0)]),
            ("B", vec![Some(-75.0), Some(-10.0)]),
        ]);
        let result = recognize(&models, &indexed_items(2)).unwrap();
        assert_eq!(result.guesses, vec!["A", "B"]);
        assert_eq!(result.probabilities[0]["A"], -50.0);
        assert_eq!(result.probabilities[0]["B"], -75.0);
        assert_eq!(result.probabilities[0].len(), 2);
    }

    #[test]
    fn failed_score_is_negative_infinity() {
        let models = mapping(vec![
            ("A", vec![None, Some(-5.0)]),
            ("B", vec![Some(-1000.0), None]),
        ]);
        let result = recognize(&models, &indexed_items(2)).unwrap();
        assert_eq!(result.probabilities[0]["A"], f64::NEG_INFINITY);
        assert_eq!(result.guesses[0], "B");
        assert_eq!(result.probabilities[1]["B"], f64::NEG_INFINITY);
        assert_eq!(result.guesses[1], "A");
    }

    #[test]
    fn all_failures_fall_back_to_first_word() {
        let models = mapping(vec![("B", vec![None]), ("A", vec![None])]);
        let result = recognize(&models, &indexed_items(1)).unwrap();
        assert_eq!(result.guesses, vec!["A"]);
        assert!(result.probabilities[0].values().all(|v| *v == f64::NEG_INFINITY));
    }

    #[test]
    fn ties_go_to_lexicographically_first_word() {
        let models = mapping(vec![
            ("ZEBRA", vec![Some(-3.0)]),
            ("APPLE", vec![Some(-3.0)]),
            ("MANGO", vec![Some(-3.0)]),
        ]);
        let result = recognize(&models, &indexed_items(1)).unwrap();
        assert_eq!(result.guesses, vec!["APPLE"]);
    }

    #[test]
    fn empty_inputs() {
        let none: ModelMapping<LookupModel> = ModelMapping::new();
        assert!(recognize(&none, &indexed_items(1)).is_err());

        let models = mapping(vec![("A", vec![Some(-1.0)])]);
        let result = recognize(&models, &SinglesData::default()).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn accuracy_against_wordlist() {
        let result = Recognition {
            probabilities: vec![ScoreRecord::new(); 4],
            guesses: vec!["A".into(), "B".into(), "B".into(), "C".into()],
        };
        let truth: Vec<String> = ["A", "B", "C", "C"].iter().map(|s| s.to_string()).collect();
        assert!((result.accuracy(&truth).unwrap() - 0.75).abs() < 1e-12);
        assert!(result.accuracy(&truth[..2]).is_err());
    }

    #[test]
    fn trained_models_recognize_their_words() {
        let words = vocabulary(&[("BOOK", 0.0, 5), ("JOHN", 8.0, 5)]);
        let fitter = GaussianHmmFitter::default();
        let config = SelectorConfig {
            n_constant: 2,
            ..Default::default()
        };
        let models = train_all_words(&words, &fitter, &SelectorKind::Constant, &config).unwrap();
        assert_eq!(models.len(), 2);

        let book = two_phase_collection(0.0, 3.0, 1, 99).flatten();
        let john = two_phase_collection(8.0, 11.0, 1, 77).flatten();
        let test = SinglesData::new(vec![john, book])
            .with_wordlist(vec!["JOHN".into(), "BOOK".into()])
            .unwrap();
        let result = recognize(&models, &test).unwrap();
        assert_eq!(result.guesses, vec!["JOHN", "BOOK"]);
        assert_eq!(result.accuracy(test.wordlist().unwrap()).unwrap(), 1.0);
        assert!(result.summary().starts_with("2 items"));

        // a model with the wrong dimensionality cannot score: -inf, not a panic
        let odd = Flattened::new(vec![0.0; 3], 3, vec![1]).unwrap();
        let result = recognize(&models, &SinglesData::new(vec![odd])).unwrap();
        assert!(result.probabilities[0].values().all(|v| v.is_infinite()));
    }
}
