mod evaluator;
pub mod scores;
pub mod visualize;

use std::path::PathBuf;

use thiserror::Error;

use crate::{dataset::DatasetError, model::CheckpointError};

pub use evaluator::{EvaluationReport, evaluate, run_evaluation};
pub use scores::{ClassificationScores, ScoreError, ScoreRecord, write_scores};
pub use visualize::{prediction_image, save_triptych, triptych};

#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error("Failed to load model: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Score(#[from] ScoreError),

    #[error("Model output is {found:?} (channels, height, width), expected {expected:?}")]
    OutputShape {
        expected: [usize; 3],
        found: [usize; 3],
    },

    #[error("Prediction for {name} does not match its image size")]
    PredictionShape { name: String },

    #[error("Failed to read prediction: {0}")]
    Tensor(String),

    #[error("Failed to create {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to save {path:?}: {source}")]
    Save {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Failed to write scores {path:?}: {source}")]
    Scores { path: PathBuf, source: csv::Error },
}
