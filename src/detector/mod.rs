pub mod classifier;
pub mod evaluator;

pub use evaluator::{DealEvaluator, Evaluation};
