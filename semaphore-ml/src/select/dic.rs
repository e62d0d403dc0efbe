//! Discriminative information criterion.
//!
//! `DIC = logL(X_i) - 1/(M-1) * sum_{j != i} logL(X_j)`: how much better the
//! candidate explains its own word than the other `M - 1` words of the
//! vocabulary. Higher is better.
//!
//! Biem, "A model selection criterion for classification: application to
//! HMM topology optimization", ICDAR 2003.

use semaphore_core::{Result, SemaphoreError};

use super::{keep_best, ModelSearch, ModelSelector};
use crate::data::{Flattened, WordsData};
use crate::fit::SequenceFitter;

/// DIC from the own-word score and the competing words' scores.
///
/// Returns `None` when there are no competitors.
pub fn dic_score(own: f64, competitors: &[f64]) -> Option<f64> {
    if competitors.is_empty() {
        return None;
    }
    let mean = competitors.iter().sum::<f64>() / competitors.len() as f64;
    Some(own - mean)
}

/// Keeps the candidate with the highest DIC.
///
/// Needs a vocabulary of at least two words. A candidate whose own score or
/// any competitor score fails is skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectorDic;

impl ModelSelector for SelectorDic {
    fn check(&self, words: &WordsData) -> Result<()> {
        if words.len() < 2 {
            return Err(SemaphoreError::InvalidInput(format!(
                "discriminative selection needs at least 2 words, vocabulary has {}",
                words.len()
            )));
        }
        Ok(())
    }

    fn select<F: SequenceFitter>(&self, search: &ModelSearch<'_, F>) -> Result<Option<F::Model>> {
        self.check(search.words())?;

        let own_data = search.xlengths();
        let competitors: Vec<&Flattened> = search
            .words()
            .iter()
            .filter(|(word, _)| *word != search.word())
            .map(|(_, data)| data.xlengths())
            .collect();
        let mut best = None;

        for n_states in search.config().candidate_states() {
            let Some(model) = search.base_model(n_states) else {
                continue;
            };
            let Some(own) = search.score(&model, own_data) else {
                continue;
            };
            let Some(others) = competitors
                .iter()
                .map(|data| search.score(&model, data))
                .collect::<Option<Vec<f64>>>()
            else {
                continue;
            };
            let Some(dic) = dic_score(own, &others) else {
                continue;
            };
            if search.config().verbose {
                tracing::info!(word = search.word(), n_states, dic, "dic candidate");
            }
            keep_best(&mut best, dic, model, |new, old| new > old);
        }

        Ok(best.map(|(_, model)| model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::select::SelectorConfig;
    use crate::testing::{scripted_score, vocabulary, ScriptedFitter};

    #[test]
    fn dic_formula() {
        assert_eq!(dic_score(-10.0, &[-30.0, -50.0]), Some(30.0));
        assert_eq!(dic_score(-10.0, &[]), None);
    }

    #[test]
    fn singleton_vocabulary_is_a_precondition_error() {
        let words = vocabulary(&[("A", 0.0, 3)]);
        let fitter = ScriptedFitter::new(&[(2, 1.0)]);
        let config = SelectorConfig::default();
        let search = ModelSearch::new(&fitter, &words, "A", &config).unwrap();
        assert!(matches!(
            SelectorDic.select(&search),
            Err(SemaphoreError::InvalidInput(_))
        ));
        assert!(fitter.attempts().is_empty());
    }

    #[test]
    fn returns_model_with_maximum_dic() {
        let words = vocabulary(&[("A", 0.0, 4), ("B", 3.0, 3), ("C", 8.0, 3)]);
        let fitter = ScriptedFitter::new(&[(2, 4.0), (3, 1.0), (4, 0.25)]);
        let config = SelectorConfig {
            max_n_components: 5,
            ..Default::default()
        };
        let search = ModelSearch::new(&fitter, &words, "A", &config).unwrap();
        let chosen = SelectorDic.select(&search).unwrap().unwrap();

        let own = words.get_word_xlengths("A").unwrap();
        let others = [
            words.get_word_xlengths("B").unwrap(),
            words.get_word_xlengths("C").unwrap(),
        ];
        let expected = (2..5)
            .map(|k| {
                let m = fitter.expected(k, own).unwrap();
                let scores: Vec<f64> = others
                    .iter()
                    .map(|d| scripted_score(d, m.center, m.spread))
                    .collect();
                let dic = dic_score(scripted_score(own, m.center, m.spread), &scores).unwrap();
                (k, dic)
            })
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
            .unwrap();
        assert_eq!(chosen.n_states, expected.0);
    }

    #[test]
    fn best_model_not_last_model() {
        // with competitors far away, the tightest spread discriminates most;
        // the widest spread comes last and must not win by position
        let words = vocabulary(&[("A", 0.0, 4), ("B", 20.0, 3)]);
        let fitter = ScriptedFitter::new(&[(2, 0.5), (3, 50.0)]);
        let config = SelectorConfig {
            max_n_components: 4,
            ..Default::default()
        };
        let search = ModelSearch::new(&fitter, &words, "A", &config).unwrap();
        assert_eq!(SelectorDic.select(&search).unwrap().unwrap().n_states, 2);
    }

    #[test]
    fn unscorable_candidate_is_skipped() {
        let words = vocabulary(&[("A", 0.0, 4), ("B", 20.0, 3)]);
        let fitter = ScriptedFitter::new(&[(2, 0.5), (3, 50.0)]).unscorable(&[2]);
        let config = SelectorConfig {
            max_n_components: 4,
            ..Default::default()
        };
        let search = ModelSearch::new(&fitter, &words, "A", &config).unwrap();
        assert_eq!(SelectorDic.select(&search).unwrap().unwrap().n_states, 3);
    }
}
