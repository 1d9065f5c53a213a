//! Label issue filtering and ranking.
//!
//! Decides which examples are flagged as likely label errors and in what
//! order they should be reviewed.
//!
//! # Policies
//!
//! - **Count-based** - the calibrated joint estimates how many examples of
//!   each (given, true) class pair are mislabelled; that many lowest-scoring
//!   confident candidates are flagged per pair.
//! - **Score-based** - every example scoring below a percentile or absolute
//!   threshold is flagged, independent of the joint.
//! - **Confident off-diagonal** - every example confidently assigned to a
//!   class other than its label.
//! - **Predicted != given** - every example whose argmax differs from its label.
//!
//! Examples the model already predicts as their given label are never
//! flagged, and `exclude` suppresses confusions between chosen class pairs.
//!
//! # Usage
//!
//! ```rust,ignore
//! use label_audit::filter::{FilterPolicy, IssueFinder};
//! use label_audit::scoring::ScoringMethod;
//!
//! let finder = IssueFinder::builder()
//!     .policy(FilterPolicy::CountBased)
//!     .rank_by(ScoringMethod::SelfConfidence)
//!     .build()?;
//! let ranked = finder.find(&labels, &probs)?.indices();
//! ```

mod exclude;
mod issues;
mod policy;

pub use exclude::ExcludePairs;
pub use issues::{find_label_issues, IssueFinder, IssueFinderBuilder};
pub use policy::{percentile, rank_by_score, FilterPolicy, LabelIssues, ScoreThreshold};
