//! Confident-joint noise estimation.
//!
//! This module estimates how given labels relate to (unobserved) true labels
//! from out-of-sample predicted probabilities.
//!
//! # Overview
//!
//! 1. **Confident joint** - per-class thresholds (mean self-confidence) decide
//!    which class each example is confidently assigned to; assignments are
//!    counted per (given label, assigned class) pair.
//! 2. **Calibration** - counts are rescaled so each row matches the observed
//!    given-label frequency, producing a joint distribution over
//!    (given, true) pairs and integer issue counts.
//! 3. **Latent estimates** - true-label prior, noise matrices, label health
//!    and overlapping classes derived from the calibrated joint.
//!
//! # Usage
//!
//! ```rust,ignore
//! use label_audit::joint::{calibrate_joint, estimate_confident_joint};
//!
//! let cj = estimate_confident_joint(&labels, &probs)?;
//! let calibrated = calibrate_joint(&cj, &labels)?;
//! println!("~{} label issues", calibrated.num_label_issues());
//! ```

mod calibrate;
mod confident;
mod latent;

pub use calibrate::{calibrate_joint, CalibratedJoint};
pub use confident::{class_thresholds, confident_class, estimate_confident_joint, ConfidentJoint};
pub use latent::ClassOverlap;

pub(crate) use calibrate::round_preserving_row_totals;

use crate::data::{LabelSet, ProbabilityMatrix};
use crate::error::Result;

/// Estimates the number of label issues without flagging individual examples.
pub fn estimate_num_label_issues(labels: &LabelSet, probs: &ProbabilityMatrix) -> Result<usize> {
    let cj = estimate_confident_joint(labels, probs)?;
    Ok(calibrate_joint(&cj, labels)?.num_label_issues())
}
