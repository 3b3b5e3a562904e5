pub mod config;
pub mod model;

#[cfg(feature = "dataset")]
pub mod dataset;

#[cfg(feature = "training")]
pub mod training;

#[cfg(feature = "evaluation")]
pub mod evaluation;

pub use config::{CallbackConfig, EvaluationConfig, PipelineConfig, TrainingConfig};
pub use model::{
    Architecture, FromArtifact, ModelArtifact, SegNet, SegNetConfig, SegmentationModel,
    SymbolRegistry, UNet, UNetConfig,
};

#[cfg(feature = "dataset")]
pub use dataset::{DatasetError, SamplePair, SegmentationBatcher, SegmentationDataset};

#[cfg(feature = "training")]
pub use training::{SegmentationOutput, TrainingError, TrainingSummary, train};

#[cfg(feature = "evaluation")]
pub use evaluation::{EvaluationError, EvaluationReport, evaluate, run_evaluation};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
