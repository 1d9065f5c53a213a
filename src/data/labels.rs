//! Given-label storage.

use crate::error::InputError;

/// Ordered given labels in `[0, K)`, one per example.
///
/// The per-class counts are computed once at construction. Classes with zero
/// examples are allowed here; operations that need per-class statistics
/// reject them when they compute those statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    labels: Vec<usize>,
    num_classes: usize,
    class_counts: Vec<usize>,
}

impl LabelSet {
    /// Creates a label set with an explicit class count.
    ///
    /// # Errors
    ///
    /// Returns `InputError::Empty` for an empty label list or `num_classes == 0`,
    /// and `InputError::LabelOutOfRange` for any label `>= num_classes`.
    pub fn new(labels: Vec<usize>, num_classes: usize) -> Result<Self, InputError> {
        if labels.is_empty() {
            return Err(InputError::Empty("labels".to_string()));
        }
        if num_classes == 0 {
            return Err(InputError::Empty("classes".to_string()));
        }

        let mut class_counts = vec![0usize; num_classes];
        for (index, &label) in labels.iter().enumerate() {
            if label >= num_classes {
                return Err(InputError::LabelOutOfRange {
                    index,
                    label,
                    num_classes,
                });
            }
            class_counts[label] += 1;
        }

        Ok(Self {
            labels,
            num_classes,
            class_counts,
        })
    }

    /// Creates a label set whose class count is `max(label) + 1`.
    pub fn from_labels(labels: Vec<usize>) -> Result<Self, InputError> {
        let num_classes = labels
            .iter()
            .max()
            .map(|m| m + 1)
            .ok_or_else(|| InputError::Empty("labels".to_string()))?;
        Self::new(labels, num_classes)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.labels
    }

    pub fn get(&self, index: usize) -> Option<usize> {
        self.labels.get(index).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.labels.iter().copied()
    }

    /// Number of examples carrying each given label.
    pub fn class_counts(&self) -> &[usize] {
        &self.class_counts
    }

    /// Returns the first class that has no examples, if any.
    pub fn first_missing_class(&self) -> Option<usize> {
        self.class_counts.iter().position(|&c| c == 0)
    }

    /// Indices of examples whose given label is `class`.
    pub fn indices_of(&self, class: usize) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, &label)| label == class)
            .map(|(i, _)| i)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_counts_classes() {
        let labels = LabelSet::new(vec![0, 1, 1, 2], 3).expect("valid labels");
        assert_eq!(labels.len(), 4);
        assert_eq!(labels.class_counts(), &[1, 2, 1]);
        assert_eq!(labels.first_missing_class(), None);
    }

    #[test]
    fn test_new_rejects_out_of_range() {
        let err = LabelSet::new(vec![0, 3], 3).unwrap_err();
        assert_eq!(
            err,
            InputError::LabelOutOfRange {
                index: 1,
                label: 3,
                num_classes: 3
            }
        );
    }

    #[test]
    fn test_new_rejects_empty() {
        assert!(matches!(
            LabelSet::new(vec![], 2),
            Err(InputError::Empty(_))
        ));
        assert!(matches!(
            LabelSet::new(vec![0], 0),
            Err(InputError::Empty(_))
        ));
    }

    #[test]
    fn test_from_labels_infers_classes() {
        let labels = LabelSet::from_labels(vec![2, 0, 2]).expect("valid labels");
        assert_eq!(labels.num_classes(), 3);
        assert_eq!(labels.first_missing_class(), Some(1));
        assert_eq!(labels.indices_of(2), vec![0, 2]);
    }
}
