//! Validated input containers.
//!
//! Every analysis in this crate consumes the same three shapes of data:
//!
//! 1. **`LabelSet`** - given (possibly noisy) labels in `[0, K)`
//! 2. **`ProbabilityMatrix`** - out-of-sample predicted probabilities, N×K
//! 3. **`SequenceDataset`** - token-level labels and probabilities grouped
//!    into variable-length sequences over one flat store
//!
//! Containers validate on construction and are read-only afterwards.

mod labels;
mod probs;
mod sequence;

pub use labels::LabelSet;
pub use probs::{argmax_row, ProbabilityMatrix, DEFAULT_ROW_SUM_TOLERANCE};
pub use sequence::{SequenceDataset, SequenceLayout};

pub(crate) use probs::{check_probability_row, rows_to_array};

use crate::error::InputError;

/// Checks that labels and probabilities describe the same examples and classes.
pub fn check_aligned(labels: &LabelSet, probs: &ProbabilityMatrix) -> Result<(), InputError> {
    if labels.len() != probs.len() {
        return Err(InputError::LengthMismatch {
            labels: labels.len(),
            rows: probs.len(),
        });
    }
    if labels.num_classes() != probs.num_classes() {
        return Err(InputError::ClassCountMismatch {
            labels: labels.num_classes(),
            probs: probs.num_classes(),
        });
    }
    Ok(())
}
