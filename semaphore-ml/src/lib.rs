//! HMM topology selection and word recognition for the Semaphore sign-language
//! toolkit.
//!
//! - **Data**: per-word training recordings and flattened test items
//! - **HMM**: diagonal Gaussian hidden Markov models trained with Baum-Welch
//! - **Selection**: constant, BIC, DIC and cross-validated choice of state count
//! - **Recognition**: maximum-likelihood guesses over a trained vocabulary

pub mod cluster;
pub mod cross_validation;
pub mod data;
pub mod fit;
pub mod hmm;
pub mod recognize;
pub mod select;

#[cfg(test)]
mod testing;

pub use data::{Flattened, SinglesData, WordsData};
pub use fit::{FittedModel, GaussianHmmFitter, SequenceFitter};
pub use hmm::{GaussianHmm, GaussianHmmConfig};
pub use recognize::{recognize, Recognition, ScoreRecord};
pub use select::{
    train_all_words, ModelMapping, ModelSearch, ModelSelector, SelectorBic, SelectorConfig,
    SelectorConstant, SelectorCv, SelectorDic, SelectorKind,
};
