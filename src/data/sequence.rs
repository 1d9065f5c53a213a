//! Variable-length sequence data stored over one flat token array.

use std::ops::Range;

use ndarray::{s, Array2, ArrayView2};

use crate::error::InputError;

use super::{check_aligned, LabelSet, ProbabilityMatrix, DEFAULT_ROW_SUM_TOLERANCE};

/// Offset bookkeeping mapping flat token indices to `(sequence, position)`.
///
/// `offsets` has one entry per sequence plus a trailing total, and
/// `token_sequence` records the owning sequence of every token so both
/// directions of the mapping are O(1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceLayout {
    offsets: Vec<usize>,
    token_sequence: Vec<usize>,
}

impl SequenceLayout {
    /// Builds a layout from per-sequence lengths.
    ///
    /// # Errors
    ///
    /// `InputError::Empty` when there are no sequences and
    /// `InputError::EmptySequence` for any zero-length sequence.
    pub fn from_lengths(lengths: &[usize]) -> Result<Self, InputError> {
        if lengths.is_empty() {
            return Err(InputError::Empty("sequences".to_string()));
        }

        let total: usize = lengths.iter().sum();
        let mut offsets = Vec::with_capacity(lengths.len() + 1);
        let mut token_sequence = Vec::with_capacity(total);
        offsets.push(0);

        for (sequence, &len) in lengths.iter().enumerate() {
            if len == 0 {
                return Err(InputError::EmptySequence(sequence));
            }
            token_sequence.extend(std::iter::repeat_n(sequence, len));
            offsets.push(token_sequence.len());
        }

        Ok(Self {
            offsets,
            token_sequence,
        })
    }

    pub fn num_sequences(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn num_tokens(&self) -> usize {
        self.token_sequence.len()
    }

    /// Flat token range of `sequence`.
    pub fn range(&self, sequence: usize) -> Range<usize> {
        self.offsets[sequence]..self.offsets[sequence + 1]
    }

    pub fn sequence_len(&self, sequence: usize) -> usize {
        self.offsets[sequence + 1] - self.offsets[sequence]
    }

    /// Maps a flat token index to `(sequence, position)`.
    pub fn flat_to_pair(&self, flat: usize) -> Option<(usize, usize)> {
        let sequence = *self.token_sequence.get(flat)?;
        Some((sequence, flat - self.offsets[sequence]))
    }

    /// Maps `(sequence, position)` back to a flat token index.
    pub fn pair_to_flat(&self, sequence: usize, position: usize) -> Option<usize> {
        if sequence >= self.num_sequences() || position >= self.sequence_len(sequence) {
            return None;
        }
        Some(self.offsets[sequence] + position)
    }
}

/// Token-labelled sequences with one flat label store and one flat
/// probability matrix.
#[derive(Debug, Clone)]
pub struct SequenceDataset {
    labels: LabelSet,
    probs: ProbabilityMatrix,
    layout: SequenceLayout,
}

impl SequenceDataset {
    /// Builds a dataset from per-sequence labels and probability matrices.
    ///
    /// All sequences must share one class count; the class count of the
    /// dataset is the column count of the probability matrices.
    pub fn new(
        labels_per_sequence: Vec<Vec<usize>>,
        probs_per_sequence: Vec<Array2<f64>>,
    ) -> Result<Self, InputError> {
        Self::with_tolerance(
            labels_per_sequence,
            probs_per_sequence,
            DEFAULT_ROW_SUM_TOLERANCE,
        )
    }

    pub fn with_tolerance(
        labels_per_sequence: Vec<Vec<usize>>,
        probs_per_sequence: Vec<Array2<f64>>,
        tolerance: f64,
    ) -> Result<Self, InputError> {
        if labels_per_sequence.len() != probs_per_sequence.len() {
            return Err(InputError::LengthMismatch {
                labels: labels_per_sequence.len(),
                rows: probs_per_sequence.len(),
            });
        }
        let num_classes = probs_per_sequence
            .first()
            .map(|p| p.ncols())
            .ok_or_else(|| InputError::Empty("sequences".to_string()))?;

        let mut lengths = Vec::with_capacity(labels_per_sequence.len());
        for (sequence, (labels, probs)) in labels_per_sequence
            .iter()
            .zip(probs_per_sequence.iter())
            .enumerate()
        {
            if labels.len() != probs.nrows() {
                return Err(InputError::SequenceLengthMismatch {
                    sequence,
                    labels: labels.len(),
                    rows: probs.nrows(),
                });
            }
            if probs.ncols() != num_classes {
                return Err(InputError::RaggedRow {
                    row: sequence,
                    expected: num_classes,
                    found: probs.ncols(),
                });
            }
            lengths.push(labels.len());
        }
        let layout = SequenceLayout::from_lengths(&lengths)?;

        let flat_labels: Vec<usize> = labels_per_sequence.into_iter().flatten().collect();
        let mut flat_probs = Array2::zeros((layout.num_tokens(), num_classes));
        for (sequence, probs) in probs_per_sequence.iter().enumerate() {
            flat_probs
                .slice_mut(s![layout.range(sequence), ..])
                .assign(probs);
        }

        Self::from_flat(
            LabelSet::new(flat_labels, num_classes)?,
            ProbabilityMatrix::with_tolerance(flat_probs, tolerance)?,
            layout,
        )
    }

    /// Wraps already-flat token data with an explicit layout.
    pub fn from_flat(
        labels: LabelSet,
        probs: ProbabilityMatrix,
        layout: SequenceLayout,
    ) -> Result<Self, InputError> {
        check_aligned(&labels, &probs)?;
        if layout.num_tokens() != labels.len() {
            return Err(InputError::LengthMismatch {
                labels: labels.len(),
                rows: layout.num_tokens(),
            });
        }
        Ok(Self {
            labels,
            probs,
            layout,
        })
    }

    /// Flat token labels.
    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    /// Flat token probabilities.
    pub fn probs(&self) -> &ProbabilityMatrix {
        &self.probs
    }

    pub fn layout(&self) -> &SequenceLayout {
        &self.layout
    }

    pub fn num_sequences(&self) -> usize {
        self.layout.num_sequences()
    }

    pub fn sequence_labels(&self, sequence: usize) -> &[usize] {
        &self.labels.as_slice()[self.layout.range(sequence)]
    }

    pub fn sequence_probs(&self, sequence: usize) -> ArrayView2<'_, f64> {
        self.probs.view().slice_move(s![self.layout.range(sequence), ..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn two_sequences() -> SequenceDataset {
        SequenceDataset::new(
            vec![vec![0, 1], vec![1, 1, 0]],
            vec![
                array![[0.9, 0.1], [0.2, 0.8]],
                array![[0.3, 0.7], [0.4, 0.6], [0.6, 0.4]],
            ],
        )
        .expect("valid dataset")
    }

    #[test]
    fn test_layout_mapping_roundtrip_points() {
        let layout = SequenceLayout::from_lengths(&[2, 3, 1]).expect("layout");
        assert_eq!(layout.num_tokens(), 6);
        assert_eq!(layout.flat_to_pair(0), Some((0, 0)));
        assert_eq!(layout.flat_to_pair(2), Some((1, 0)));
        assert_eq!(layout.flat_to_pair(5), Some((2, 0)));
        assert_eq!(layout.flat_to_pair(6), None);
        assert_eq!(layout.pair_to_flat(1, 2), Some(4));
        assert_eq!(layout.pair_to_flat(1, 3), None);
        assert_eq!(layout.pair_to_flat(3, 0), None);
    }

    #[test]
    fn test_layout_rejects_empty_sequence() {
        assert_eq!(
            SequenceLayout::from_lengths(&[2, 0]),
            Err(InputError::EmptySequence(1))
        );
    }

    #[test]
    fn test_dataset_flattens_in_order() {
        let dataset = two_sequences();
        assert_eq!(dataset.num_sequences(), 2);
        assert_eq!(dataset.labels().as_slice(), &[0, 1, 1, 1, 0]);
        assert_eq!(dataset.sequence_labels(1), &[1, 1, 0]);
        assert_eq!(dataset.sequence_probs(1)[[2, 0]], 0.6);
    }

    #[test]
    fn test_dataset_rejects_mismatched_sequence() {
        let err = SequenceDataset::new(vec![vec![0, 1]], vec![array![[0.9, 0.1]]]).unwrap_err();
        assert!(matches!(
            err,
            InputError::SequenceLengthMismatch { sequence: 0, .. }
        ));
    }

    #[test]
    fn test_dataset_rejects_differing_class_counts() {
        let err = SequenceDataset::new(
            vec![vec![0], vec![1]],
            vec![array![[0.9, 0.1]], array![[0.2, 0.3, 0.5]]],
        )
        .unwrap_err();
        assert!(matches!(err, InputError::RaggedRow { row: 1, .. }));
    }
}
