mod active;
mod charts;
mod launcher;
mod metrics;
mod parser;
mod recoder;
mod runloops;
mod schedule;
pub use active::run as run_learn;
pub use launcher::run as run_compare;
pub use parser::{Cli, Command};
pub use recoder::build_log_config;
pub use runloops::run as run_train;

/// Binary classifier over flat feature rows.
pub trait Classifier {
    fn fit(&mut self, features: &[&[f32]], labels: &[u8]) -> anyhow::Result<()>;

    /// Probability of label 1.
    fn predict_proba(&self, features: &[f32]) -> f64;
}

/// Scores unlabeled candidates against the current model; the round loop
/// keeps the top or bottom scores depending on its polarity.
pub trait SelectionPolicy {
    fn score(&mut self, candidate: &[f32], model: &dyn Classifier) -> f64;
}
