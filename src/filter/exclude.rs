//! Unordered class pairs whose confusions are never reported.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Set of unordered class pairs.
///
/// `(a, b)` and `(b, a)` are the same entry, so excluding one ordering
/// suppresses both directions of confusion between the two classes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<(usize, usize)>", into = "Vec<(usize, usize)>")]
pub struct ExcludePairs {
    pairs: BTreeSet<(usize, usize)>,
}

impl ExcludePairs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the unordered pair `{a, b}`.
    pub fn insert(&mut self, a: usize, b: usize) {
        self.pairs.insert(normalize(a, b));
    }

    pub fn with_pair(mut self, a: usize, b: usize) -> Self {
        self.insert(a, b);
        self
    }

    /// Whether `{a, b}` is excluded, in either order.
    pub fn contains(&self, a: usize, b: usize) -> bool {
        !self.pairs.is_empty() && self.pairs.contains(&normalize(a, b))
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.pairs.iter().copied()
    }
}

impl FromIterator<(usize, usize)> for ExcludePairs {
    fn from_iter<I: IntoIterator<Item = (usize, usize)>>(iter: I) -> Self {
        Self {
            pairs: iter.into_iter().map(|(a, b)| normalize(a, b)).collect(),
        }
    }
}

impl From<Vec<(usize, usize)>> for ExcludePairs {
    fn from(pairs: Vec<(usize, usize)>) -> Self {
        pairs.into_iter().collect()
    }
}

impl From<ExcludePairs> for Vec<(usize, usize)> {
    fn from(exclude: ExcludePairs) -> Self {
        exclude.pairs.into_iter().collect()
    }
}

fn normalize(a: usize, b: usize) -> (usize, usize) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_orderings_match() {
        let exclude = ExcludePairs::new().with_pair(2, 0);
        assert!(exclude.contains(0, 2));
        assert!(exclude.contains(2, 0));
        assert!(!exclude.contains(0, 1));
    }

    #[test]
    fn test_duplicate_orderings_collapse() {
        let exclude: ExcludePairs = vec![(0, 1), (1, 0)].into();
        assert_eq!(exclude.len(), 1);
    }

    #[test]
    fn test_serde_as_list_of_pairs() {
        let exclude: ExcludePairs = serde_json::from_str("[[1, 0], [2, 3]]").expect("parse");
        assert!(exclude.contains(0, 1));
        assert_eq!(
            serde_json::to_string(&exclude).expect("serialize"),
            "[[0,1],[2,3]]"
        );
    }
}
