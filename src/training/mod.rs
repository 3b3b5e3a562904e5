pub mod callbacks;
pub mod learner;
pub mod metrics;

pub use callbacks::{
    BestCheckpoint, CsvLogger, EarlyStopping, EarlyStoppingAction, EpochLog, ReduceLrOnPlateau,
};
pub use learner::{SegmentationOutput, TrainingError, TrainingSummary, train};
pub use metrics::{ConfusionCounts, EpochMetrics, MetricAccumulator};
