//! Run configuration, saved and loaded as JSON.
//!
//! Defaults reproduce the reference setup: 512x512 inputs under `new_data/`,
//! outputs under `files/`.

use std::path::PathBuf;

use burn::prelude::*;

use crate::model::{
    Architecture, ModelArtifact,
    objective::{DICE_COEF, DICE_LOSS, IOU},
};

/// Settings shared by training and evaluation.
#[derive(Config, Debug)]
pub struct PipelineConfig {
    #[config(default = "String::from(\"new_data\")")]
    pub dataset_root: String,

    #[config(default = "String::from(\"files\")")]
    pub output_dir: String,

    #[config(default = 512)]
    pub image_height: usize,

    #[config(default = 512)]
    pub image_width: usize,

    #[config(default = 42)]
    pub seed: u64,
}

impl PipelineConfig {
    pub fn image_size(&self) -> [usize; 2] {
        [self.image_height, self.image_width]
    }

    pub fn split_dir(&self, split: &str) -> PathBuf {
        PathBuf::from(&self.dataset_root).join(split)
    }

    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(&self.output_dir)
    }
}

/// Policies applied at the end of every epoch, all monitoring `val_loss`.
#[derive(Config, Debug)]
pub struct CallbackConfig {
    /// Multiplier applied to the learning rate on a plateau.
    #[config(default = 0.1)]
    pub lr_factor: f64,

    #[config(default = 5)]
    pub lr_patience: usize,

    #[config(default = 1e-6)]
    pub min_lr: f64,

    /// Smallest decrease of `val_loss` counted as an improvement by the
    /// plateau policy.
    #[config(default = 1e-4)]
    pub lr_min_delta: f64,

    #[config(default = 10)]
    pub early_stopping_patience: usize,

    /// Smallest decrease of `val_loss` that resets early stopping.
    #[config(default = 0.0)]
    pub early_stopping_min_delta: f64,

    #[config(default = true)]
    pub restore_best_weights: bool,
}

#[derive(Config, Debug)]
pub struct TrainingConfig {
    #[config(default = "PipelineConfig::new()")]
    pub pipeline: PipelineConfig,

    #[config(default = "CallbackConfig::new()")]
    pub callbacks: CallbackConfig,

    #[config(default = "Architecture::UNet")]
    pub architecture: Architecture,

    #[config(default = 64)]
    pub base_channels: usize,

    #[config(default = 2)]
    pub batch_size: usize,

    #[config(default = 1e-4)]
    pub learning_rate: f64,

    #[config(default = 100)]
    pub num_epochs: usize,

    /// Loader threads decoding batches ahead of the training loop.
    #[config(default = 4)]
    pub num_workers: usize,

    #[config(default = "String::from(\"train\")")]
    pub train_split: String,

    #[config(default = "String::from(\"test\")")]
    pub valid_split: String,

    /// Checkpoint file stem under the output directory.
    #[config(default = "String::from(\"unet_model_v2\")")]
    pub model_name: String,

    /// Per-epoch CSV log file stem under the output directory.
    #[config(default = "String::from(\"unet_data_train\")")]
    pub log_name: String,

    #[config(default = "String::from(DICE_LOSS)")]
    pub loss: String,

    #[config(default = "vec![String::from(DICE_COEF), String::from(IOU)]")]
    pub metrics: Vec<String>,
}

impl TrainingConfig {
    pub fn artifact(&self) -> ModelArtifact {
        ModelArtifact::new(
            self.architecture.clone(),
            self.pipeline.image_size(),
            self.loss.clone(),
            self.metrics.clone(),
        )
        .with_base_channels(self.base_channels)
    }

    pub fn log_path(&self) -> PathBuf {
        self.pipeline
            .output_dir()
            .join(format!("{}.csv", self.log_name))
    }

    pub fn validate(&self) -> Result<(), String> {
        let divisor = self.architecture.size_divisor();
        let [height, width] = self.pipeline.image_size();
        if height == 0 || width == 0 || height % divisor != 0 || width % divisor != 0 {
            return Err(format!(
                "{:?} needs an image size divisible by {divisor}, got {height}x{width}",
                self.architecture
            ));
        }
        if self.batch_size == 0 {
            return Err("batch_size must be at least 1".to_string());
        }
        if self.learning_rate <= 0.0 {
            return Err(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            ));
        }
        if !(0.0..1.0).contains(&self.callbacks.lr_factor) {
            return Err(format!(
                "lr_factor must be in [0, 1), got {}",
                self.callbacks.lr_factor
            ));
        }
        Ok(())
    }
}

#[derive(Config, Debug)]
pub struct EvaluationConfig {
    #[config(default = "PipelineConfig::new()")]
    pub pipeline: PipelineConfig,

    #[config(default = "Architecture::SegNet")]
    pub architecture: Architecture,

    #[config(default = "String::from(\"segnet_model\")")]
    pub model_name: String,

    #[config(default = "String::from(\"test\")")]
    pub split: String,

    /// Directory receiving one triptych per evaluated image.
    #[config(default = "String::from(\"segnet_results\")")]
    pub results_dir: String,

    /// Score table file stem under the output directory.
    #[config(default = "String::from(\"segnet_scores\")")]
    pub scores_name: String,

    #[config(default = 0.5)]
    pub threshold: f32,

    /// Width in pixels of the white separators in each triptych.
    #[config(default = 10)]
    pub gutter_width: u32,
}

impl EvaluationConfig {
    pub fn scores_path(&self) -> PathBuf {
        self.pipeline
            .output_dir()
            .join(format!("{}.csv", self.scores_name))
    }

    pub fn results_dir(&self) -> PathBuf {
        PathBuf::from(&self.results_dir)
    }
}
