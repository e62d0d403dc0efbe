//! In-memory carriers for per-word training data and unlabeled test items.
//!
//! Each vocabulary word owns a [`SequenceCollection`]: variable-length
//! recordings, each an ordered list of fixed-width feature frames. Fitting and
//! scoring operate on the [`Flattened`] form instead, a flat row-major frame
//! matrix plus the per-sequence lengths that mark recording boundaries.
//!
//! # Example
//!
//! ```
//! use semaphore_ml::data::SequenceCollection;
//!
//! let collection = SequenceCollection::new(vec![
//!     vec![vec![0.0, 1.0], vec![0.5, 1.5]],
//!     vec![vec![2.0, 3.0]],
//! ])
//! .unwrap();
//! let flat = collection.flatten();
//! assert_eq!(flat.lengths(), &[2, 1]);
//! assert_eq!(flat.n_frames(), 3);
//! assert_eq!(flat.frame(2), &[2.0, 3.0]);
//! ```

use std::collections::BTreeMap;

use semaphore_core::{Result, SemaphoreError};

/// One observation: a fixed-width feature vector.
pub type Frame = Vec<f64>;

/// One recording of a word: an ordered list of frames.
pub type Sequence = Vec<Frame>;

// ---------------------------------------------------------------------------
// Flattened representation
// ---------------------------------------------------------------------------

/// Concatenated frames of one or more sequences plus their boundaries.
///
/// `data` is flat row-major with `n_features` columns; `lengths` sums to the
/// number of rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Flattened {
    data: Vec<f64>,
    n_features: usize,
    lengths: Vec<usize>,
}

impl Flattened {
    /// Build from raw parts after validating the shape.
    ///
    /// # Errors
    ///
    /// Returns an error if `n_features` is zero, there are no sequences, a
    /// sequence has length zero, or `data.len()` disagrees with the lengths.
    pub fn new(data: Vec<f64>, n_features: usize, lengths: Vec<usize>) -> Result<Self> {
        if n_features == 0 {
            return Err(SemaphoreError::InvalidInput(
                "n_features must be > 0".into(),
            ));
        }
        if lengths.is_empty() {
            return Err(SemaphoreError::InvalidInput(
                "at least one sequence is required".into(),
            ));
        }
        if let Some(i) = lengths.iter().position(|&l| l == 0) {
            return Err(SemaphoreError::InvalidInput(format!(
                "sequence {i} is empty"
            )));
        }
        let n_frames: usize = lengths.iter().sum();
        if n_frames * n_features != data.len() {
            return Err(SemaphoreError::InvalidInput(format!(
                "data length {} != n_frames {} * n_features {}",
                data.len(),
                n_frames,
                n_features
            )));
        }
        Ok(Self {
            data,
            n_features,
            lengths,
        })
    }

    /// Flat row-major frame matrix.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Feature dimensionality.
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Per-sequence frame counts.
    pub fn lengths(&self) -> &[usize] {
        &self.lengths
    }

    /// Number of sequences.
    pub fn n_sequences(&self) -> usize {
        self.lengths.len()
    }

    /// Total number of frames across all sequences.
    pub fn n_frames(&self) -> usize {
        self.data.len() / self.n_features
    }

    /// Frame `t` of the concatenated matrix.
    ///
    /// # Panics
    ///
    /// Panics if `t >= self.n_frames()`.
    pub fn frame(&self, t: usize) -> &[f64] {
        &self.data[t * self.n_features..(t + 1) * self.n_features]
    }

    /// Iterate over the sequences as flat row-major slices.
    pub fn sequences(&self) -> impl Iterator<Item = &[f64]> + '_ {
        let d = self.n_features;
        self.lengths.iter().scan(0usize, move |start, &len| {
            let begin = *start;
            *start += len * d;
            Some(&self.data[begin..begin + len * d])
        })
    }
}

// ---------------------------------------------------------------------------
// Sequence collection
// ---------------------------------------------------------------------------

/// All training recordings of a single word.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceCollection {
    sequences: Vec<Sequence>,
    n_features: usize,
}

impl SequenceCollection {
    /// Validate and wrap a list of sequences.
    ///
    /// # Errors
    ///
    /// Returns an error if the list is empty, any sequence is empty, or the
    /// frames do not share a single non-zero dimensionality.
    pub fn new(sequences: Vec<Sequence>) -> Result<Self> {
        let n_features = sequences
            .first()
            .and_then(|s| s.first())
            .map(|f| f.len())
            .ok_or_else(|| {
                SemaphoreError::InvalidInput("collection has no frames".into())
            })?;
        if n_features == 0 {
            return Err(SemaphoreError::InvalidInput(
                "zero-dimensional frames".into(),
            ));
        }
        for (i, seq) in sequences.iter().enumerate() {
            if seq.is_empty() {
                return Err(SemaphoreError::InvalidInput(format!(
                    "sequence {i} is empty"
                )));
            }
            if let Some((t, frame)) = seq.iter().enumerate().find(|(_, f)| f.len() != n_features) {
                return Err(SemaphoreError::InvalidInput(format!(
                    "sequence {i} frame {t} has dimension {}, expected {n_features}",
                    frame.len()
                )));
            }
        }
        Ok(Self {
            sequences,
            n_features,
        })
    }

    /// Number of sequences.
    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    /// Always false for a validated collection.
    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// Feature dimensionality shared by every frame.
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Total number of frames.
    pub fn n_frames(&self) -> usize {
        self.sequences.iter().map(Vec::len).sum()
    }

    /// The underlying sequences.
    pub fn sequences(&self) -> &[Sequence] {
        &self.sequences
    }

    /// Concatenate every sequence in order.
    pub fn flatten(&self) -> Flattened {
        let mut data = Vec::with_capacity(self.n_frames() * self.n_features);
        let mut lengths = Vec::with_capacity(self.sequences.len());
        for seq in &self.sequences {
            for frame in seq {
                data.extend_from_slice(frame);
            }
            lengths.push(seq.len());
        }
        Flattened {
            data,
            n_features: self.n_features,
            lengths,
        }
    }
}

/// Concatenate the sequences at `indices` (in the given order).
///
/// # Errors
///
/// Returns an error if `indices` is empty or any index is out of range.
pub fn combine_sequences(indices: &[usize], sequences: &SequenceCollection) -> Result<Flattened> {
    if indices.is_empty() {
        return Err(SemaphoreError::InvalidInput(
            "no sequences selected".into(),
        ));
    }
    let d = sequences.n_features();
    let mut data = Vec::new();
    let mut lengths = Vec::with_capacity(indices.len());
    for &i in indices {
        let seq = sequences.sequences.get(i).ok_or_else(|| {
            SemaphoreError::InvalidInput(format!(
                "sequence index {i} out of range ({} sequences)",
                sequences.len()
            ))
        })?;
        data.reserve(seq.len() * d);
        for frame in seq {
            data.extend_from_slice(frame);
        }
        lengths.push(seq.len());
    }
    Ok(Flattened {
        data,
        n_features: d,
        lengths,
    })
}

// ---------------------------------------------------------------------------
// Per-word training data
// ---------------------------------------------------------------------------

/// Training data of one word in both nested and flattened form.
#[derive(Debug, Clone)]
pub struct WordData {
    sequences: SequenceCollection,
    xlengths: Flattened,
}

impl WordData {
    /// The nested sequences.
    pub fn sequences(&self) -> &SequenceCollection {
        &self.sequences
    }

    /// The flattened frames and lengths.
    pub fn xlengths(&self) -> &Flattened {
        &self.xlengths
    }
}

/// Training data for the whole vocabulary, keyed by word in sorted order.
#[derive(Debug, Clone, Default)]
pub struct WordsData {
    words: BTreeMap<String, WordData>,
}

impl WordsData {
    /// Build from `(word, sequences)` pairs.
    ///
    /// # Errors
    ///
    /// Returns an error if a word appears twice, any collection is invalid,
    /// or words disagree on feature dimensionality.
    pub fn new<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Vec<Sequence>)>,
        S: Into<String>,
    {
        let mut words = BTreeMap::new();
        let mut n_features: Option<usize> = None;
        for (word, raw) in entries {
            let word = word.into();
            let sequences = SequenceCollection::new(raw).map_err(|e| {
                SemaphoreError::InvalidInput(format!("word {word}: {e}"))
            })?;
            match n_features {
                Some(d) if d != sequences.n_features() => {
                    return Err(SemaphoreError::InvalidInput(format!(
                        "word {word} has {} features, expected {d}",
                        sequences.n_features()
                    )));
                }
                _ => n_features = Some(sequences.n_features()),
            }
            let xlengths = sequences.flatten();
            if words
                .insert(word.clone(), WordData { sequences, xlengths })
                .is_some()
            {
                return Err(SemaphoreError::InvalidInput(format!(
                    "duplicate word {word}"
                )));
            }
        }
        Ok(Self { words })
    }

    /// Vocabulary size.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Whether the vocabulary is empty.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Words in lexicographic order.
    pub fn words(&self) -> impl Iterator<Item = &str> + '_ {
        self.words.keys().map(String::as_str)
    }

    /// Whether `word` is in the vocabulary.
    pub fn contains(&self, word: &str) -> bool {
        self.words.contains_key(word)
    }

    /// Full training data of `word`.
    pub fn get(&self, word: &str) -> Result<&WordData> {
        self.words
            .get(word)
            .ok_or_else(|| SemaphoreError::UnknownWord(word.to_string()))
    }

    /// Nested sequences of `word`.
    pub fn get_word_sequences(&self, word: &str) -> Result<&SequenceCollection> {
        self.get(word).map(WordData::sequences)
    }

    /// Flattened frames and lengths of `word`.
    pub fn get_word_xlengths(&self, word: &str) -> Result<&Flattened> {
        self.get(word).map(WordData::xlengths)
    }

    /// `(word, data)` pairs in lexicographic order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &WordData)> + '_ {
        self.words.iter().map(|(w, d)| (w.as_str(), d))
    }
}

// ---------------------------------------------------------------------------
// Test items
// ---------------------------------------------------------------------------

/// Indexed collection of unlabeled test items.
///
/// The index of an item is its position; recognition output follows it.
/// Known labels may be attached for scoring the recognizer afterwards.
#[derive(Debug, Clone, Default)]
pub struct SinglesData {
    items: Vec<Flattened>,
    wordlist: Option<Vec<String>>,
}

impl SinglesData {
    /// Wrap already-flattened test items.
    pub fn new(items: Vec<Flattened>) -> Self {
        Self {
            items,
            wordlist: None,
        }
    }

    /// Build one test item per sequence collection.
    ///
    /// # Errors
    ///
    /// Returns an error if any collection is invalid.
    pub fn from_sequences(items: Vec<Vec<Sequence>>) -> Result<Self> {
        let items = items
            .into_iter()
            .map(|seqs| SequenceCollection::new(seqs).map(|c| c.flatten()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(items))
    }

    /// Attach the true word of every item.
    ///
    /// # Errors
    ///
    /// Returns an error if `wordlist` and the items differ in length.
    pub fn with_wordlist(mut self, wordlist: Vec<String>) -> Result<Self> {
        if wordlist.len() != self.items.len() {
            return Err(SemaphoreError::InvalidInput(format!(
                "wordlist length {} != number of items {}",
                wordlist.len(),
                self.items.len()
            )));
        }
        self.wordlist = Some(wordlist);
        Ok(self)
    }

    /// Number of test items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether there are no test items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Frames and lengths of item `index`.
    pub fn get_item_xlengths(&self, index: usize) -> Result<&Flattened> {
        self.items.get(index).ok_or_else(|| {
            SemaphoreError::InvalidInput(format!(
                "test item {index} out of range ({} items)",
                self.items.len()
            ))
        })
    }

    /// All items in index order.
    pub fn items(&self) -> &[Flattened] {
        &self.items
    }

    /// True words, if attached.
    pub fn wordlist(&self) -> Option<&[String]> {
        self.wordlist.as_deref()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(rows: &[[f64; 2]]) -> Sequence {
        rows.iter().map(|r| r.to_vec()).collect()
    }

    #[test]
    fn flatten_preserves_order_and_lengths() {
        let c = SequenceCollection::new(vec![
            seq(&[[1.0, 2.0], [3.0, 4.0]]),
            seq(&[[5.0, 6.0]]),
            seq(&[[7.0, 8.0], [9.0, 10.0], [11.0, 12.0]]),
        ])
        .unwrap();
        let flat = c.flatten();
        assert_eq!(flat.lengths(), &[2, 1, 3]);
        assert_eq!(flat.n_frames(), 6);
        assert_eq!(flat.n_features(), 2);
        assert_eq!(flat.frame(3), &[7.0, 8.0]);
        let parts: Vec<&[f64]> = flat.sequences().collect();
        assert_eq!(parts[1], &[5.0, 6.0]);
        assert_eq!(parts[2].len(), 6);
    }

    #[test]
    fn collection_rejects_ragged_frames() {
        let bad = vec![vec![vec![1.0, 2.0]], vec![vec![1.0]]];
        assert!(SequenceCollection::new(bad).is_err());
        assert!(SequenceCollection::new(vec![]).is_err());
        assert!(SequenceCollection::new(vec![seq(&[[1.0, 1.0]]), vec![]]).is_err());
    }

    #[test]
    fn single_sequence_collection_is_valid() {
        let c = SequenceCollection::new(vec![seq(&[[0.0, 0.0]])]).unwrap();
        assert_eq!(c.len(), 1);
        assert_eq!(c.flatten().n_sequences(), 1);
    }

    #[test]
    fn combine_selects_subset() {
        let c = SequenceCollection::new(vec![
            seq(&[[0.0, 0.0]]),
            seq(&[[1.0, 1.0], [1.5, 1.5]]),
            seq(&[[2.0, 2.0]]),
        ])
        .unwrap();
        let flat = combine_sequences(&[2, 0], &c).unwrap();
        assert_eq!(flat.lengths(), &[1, 1]);
        assert_eq!(flat.data(), &[2.0, 2.0, 0.0, 0.0]);
        assert!(combine_sequences(&[], &c).is_err());
        assert!(combine_sequences(&[3], &c).is_err());
    }

    #[test]
    fn flattened_new_validates_shape() {
        assert!(Flattened::new(vec![0.0; 6], 2, vec![1, 2]).is_ok());
        assert!(Flattened::new(vec![0.0; 5], 2, vec![1, 2]).is_err());
        assert!(Flattened::new(vec![], 2, vec![]).is_err());
        assert!(Flattened::new(vec![0.0; 2], 2, vec![1, 0]).is_err());
        assert!(Flattened::new(vec![0.0; 2], 0, vec![1]).is_err());
    }

    #[test]
    fn words_data_sorted_and_checked() {
        let words = WordsData::new(vec![
            ("JOHN", vec![seq(&[[0.0, 0.0]])]),
            ("BOOK", vec![seq(&[[1.0, 1.0]]), seq(&[[2.0, 2.0]])]),
        ])
        .unwrap();
        assert_eq!(words.words().collect::<Vec<_>>(), vec!["BOOK", "JOHN"]);
        assert_eq!(words.get_word_sequences("BOOK").unwrap().len(), 2);
        assert_eq!(words.get_word_xlengths("BOOK").unwrap().lengths(), &[1, 1]);
        assert!(matches!(
            words.get("MARY"),
            Err(SemaphoreError::UnknownWord(_))
        ));
    }

    #[test]
    fn words_data_rejects_mixed_dimensions_and_duplicates() {
        let mixed = WordsData::new(vec![
            ("A", vec![vec![vec![0.0, 0.0]]]),
            ("B", vec![vec![vec![0.0]]]),
        ]);
        assert!(mixed.is_err());

        let dup = WordsData::new(vec![
            ("A", vec![vec![vec![0.0]]]),
            ("A", vec![vec![vec![1.0]]]),
        ]);
        assert!(dup.is_err());
    }

    #[test]
    fn singles_index_and_wordlist() {
        let test = SinglesData::from_sequences(vec![
            vec![seq(&[[0.0, 0.0]])],
            vec![seq(&[[1.0, 1.0], [2.0, 2.0]])],
        ])
        .unwrap();
        assert_eq!(test.len(), 2);
        assert_eq!(test.get_item_xlengths(1).unwrap().n_frames(), 2);
        assert!(test.get_item_xlengths(2).is_err());
        assert!(test.clone().with_wordlist(vec!["A".into()]).is_err());
        let labelled = test.with_wordlist(vec!["A".into(), "B".into()]).unwrap();
        assert_eq!(labelled.wordlist().unwrap()[1], "B");
    }
}
