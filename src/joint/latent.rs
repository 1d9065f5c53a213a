//! Latent quantities derived from a calibrated joint.
//!
//! The calibrated joint `Q[given][true]` determines the true-label prior,
//! the noise matrix `P(given | true)` and its inverse `P(true | given)`.
//! It also ranks class pairs whose examples are frequently confused.

use ndarray::Array2;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use super::calibrate::CalibratedJoint;

/// Two classes whose examples the joint frequently exchanges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassOverlap {
    pub class_a: usize,
    pub class_b: usize,
    /// Joint probability mass shared between the two classes (both directions).
    pub joint_probability: f64,
    /// Implied number of examples involved.
    pub num_examples: f64,
}

impl CalibratedJoint {
    /// Estimated prior over true classes: column sums of the joint.
    pub fn true_label_prior(&self) -> Vec<f64> {
        self.joint()
            .columns()
            .into_iter()
            .map(|col| col.sum())
            .collect()
    }

    /// `P(given = i | true = j)`; each column sums to 1.
    ///
    /// A true class with no mass gets an identity column.
    pub fn noise_matrix(&self) -> Array2<f64> {
        let joint = self.joint();
        let k = self.num_classes();
        let mut noise = Array2::<f64>::zeros((k, k));
        for true_class in 0..k {
            let column_sum = joint.column(true_class).sum();
            if column_sum <= 0.0 {
                noise[[true_class, true_class]] = 1.0;
                continue;
            }
            for given in 0..k {
                noise[[given, true_class]] = joint[[given, true_class]] / column_sum;
            }
        }
        noise
    }

    /// `P(true = j | given = i)`, stored with rows indexing the given label.
    pub fn inverse_noise_matrix(&self) -> Array2<f64> {
        let joint = self.joint();
        let k = self.num_classes();
        let mut inverse = Array2::<f64>::zeros((k, k));
        for given in 0..k {
            let row_sum = joint.row(given).sum();
            if row_sum <= 0.0 {
                inverse[[given, given]] = 1.0;
                continue;
            }
            for true_class in 0..k {
                inverse[[given, true_class]] = joint[[given, true_class]] / row_sum;
            }
        }
        inverse
    }

    /// Fraction of examples estimated to be correctly labelled.
    pub fn label_health_score(&self) -> f64 {
        if self.num_examples() == 0 {
            return 1.0;
        }
        1.0 - self.num_label_issues() as f64 / self.num_examples() as f64
    }

    /// Class pairs ordered by shared joint mass, largest first.
    ///
    /// Pairs with no shared mass are omitted. Ties keep `(class_a, class_b)` order.
    pub fn overlapping_classes(&self) -> Vec<ClassOverlap> {
        let joint = self.joint();
        let k = self.num_classes();
        let n = self.num_examples() as f64;

        let mut overlaps: Vec<ClassOverlap> = (0..k)
            .flat_map(|a| ((a + 1)..k).map(move |b| (a, b)))
            .filter_map(|(a, b)| {
                let mass = joint[[a, b]] + joint[[b, a]];
                (mass > 0.0).then_some(ClassOverlap {
                    class_a: a,
                    class_b: b,
                    joint_probability: mass,
                    num_examples: mass * n,
                })
            })
            .collect();

        overlaps.sort_by_key(|o| std::cmp::Reverse(OrderedFloat(o.joint_probability)));
        overlaps
    }
}
