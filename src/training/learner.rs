use std::{path::PathBuf, sync::Arc};

use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use derive_new::new;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{
    callbacks::{
        BestCheckpoint, CsvLogger, EarlyStopping, EarlyStoppingAction, EpochLog,
        ReduceLrOnPlateau,
    },
    metrics::{EpochMetrics, MetricAccumulator},
};
use crate::{
    config::TrainingConfig,
    dataset::{
        DatasetError, SegmentationBatch, SegmentationBatcher, SegmentationDataset, load_split,
        shuffle_pairs, steps_per_epoch,
    },
    model::{
        CheckpointError, FromArtifact, Objective, RegistryError, SegmentationModel,
        SymbolRegistry, save_checkpoint,
    },
};

const CONFIG_FILE: &str = "training_config.json";

#[derive(new)]
pub struct SegmentationOutput<B: Backend> {
    pub loss: Tensor<B, 1>,
    pub output: Tensor<B, 4>,
    pub targets: Tensor<B, 4>,
}

#[derive(Error, Debug)]
pub enum TrainingError {
    #[error("Invalid training configuration: {0}")]
    Config(String),

    #[error("Split `{split}` has no samples under {path:?}")]
    EmptySplit { split: String, path: PathBuf },

    #[error("Failed to write {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write training log {path:?}: {source}")]
    Log { path: PathBuf, source: csv::Error },

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSummary {
    pub epochs_run: usize,
    pub best_epoch: Option<usize>,
    pub best_val_loss: Option<f64>,
    pub stopped_early: bool,
    pub final_learning_rate: f64,
}

/// Fits a freshly initialized model on the train split, validating on the
/// valid split after every epoch.
///
/// The best model by validation loss is written to
/// `<output_dir>/<model_name>.mpk` with its `.json` artifact, and every epoch
/// is appended to `<output_dir>/<log_name>.csv`.
pub fn train<B, M>(
    config: &TrainingConfig,
    device: &B::Device,
) -> Result<(M, TrainingSummary), TrainingError>
where
    B: AutodiffBackend,
    M: FromArtifact<B> + AutodiffModule<B>,
    M::InnerModule: SegmentationModel<B::InnerBackend>,
{
    config.validate().map_err(TrainingError::Config)?;

    let pipeline = &config.pipeline;
    let output_dir = pipeline.output_dir();
    std::fs::create_dir_all(&output_dir).map_err(|source| TrainingError::Io {
        path: output_dir.clone(),
        source,
    })?;
    let config_path = output_dir.join(CONFIG_FILE);
    config
        .save(&config_path)
        .map_err(|source| TrainingError::Io {
            path: config_path,
            source,
        })?;

    B::seed(pipeline.seed);

    let mut train_pairs = load_split(pipeline.split_dir(&config.train_split))?;
    shuffle_pairs(&mut train_pairs, pipeline.seed);
    let valid_pairs = load_split(pipeline.split_dir(&config.valid_split))?;

    info!("train: {} pairs", train_pairs.len());
    info!("valid: {} pairs", valid_pairs.len());

    for (split, pairs) in [
        (&config.train_split, &train_pairs),
        (&config.valid_split, &valid_pairs),
    ] {
        if pairs.is_empty() {
            return Err(TrainingError::EmptySplit {
                split: split.clone(),
                path: pipeline.split_dir(split),
            });
        }
    }

    let train_steps = steps_per_epoch(train_pairs.len(), config.batch_size);
    let valid_steps = steps_per_epoch(valid_pairs.len(), config.batch_size);
    info!("Steps per epoch: {train_steps} train, {valid_steps} valid");

    let train_dataset = SegmentationDataset::new(train_pairs, pipeline.image_size());
    let valid_dataset = SegmentationDataset::new(valid_pairs, pipeline.image_size());

    let dataloader_train = build_dataloader::<B>(&train_dataset, device, config);
    let dataloader_valid = build_dataloader::<B::InnerBackend>(&valid_dataset, device, config);

    let objective_train = Objective::compile(
        &SymbolRegistry::<B>::default(),
        &config.loss,
        &config.metrics,
    )?;
    let objective_valid = Objective::compile(
        &SymbolRegistry::<B::InnerBackend>::default(),
        &config.loss,
        &config.metrics,
    )?;

    let artifact = config.artifact();
    let mut model = M::from_artifact(&artifact, device);
    info!(
        "Created {:?} model with {} parameters",
        config.architecture,
        model.num_params()
    );

    let mut optim = AdamConfig::new().init::<B, M>();
    let mut learning_rate = config.learning_rate;

    let mut checkpoint = BestCheckpoint::default();
    let mut plateau = ReduceLrOnPlateau::new(&config.callbacks);
    let mut early_stopping = EarlyStopping::new(&config.callbacks);
    let log_path = config.log_path();
    let mut logger = CsvLogger::create(&log_path).map_err(|source| TrainingError::Log {
        path: log_path.clone(),
        source,
    })?;

    let mut best_model = None;
    let mut epochs_run = 0;
    let mut stopped_early = false;

    for epoch in 0..config.num_epochs {
        info!("Epoch {}/{}", epoch + 1, config.num_epochs);

        let (trained, train_metrics) = train_epoch(
            model,
            &mut optim,
            learning_rate,
            dataloader_train.as_ref(),
            &train_dataset,
            &objective_train,
        )?;
        model = trained;

        let valid_metrics = valid_epoch(
            &model.valid(),
            dataloader_valid.as_ref(),
            &valid_dataset,
            &objective_valid,
        )?;
        epochs_run += 1;

        let val_loss = valid_metrics.loss;
        let epoch_log = EpochLog {
            epoch,
            learning_rate,
            train: train_metrics,
            valid: valid_metrics,
        };
        info!(
            "{}",
            epoch_log
                .entries()
                .iter()
                .map(|(key, value)| format!("{key}: {value:.4}"))
                .collect::<Vec<_>>()
                .join(" - ")
        );

        if checkpoint.improved(val_loss) {
            info!(
                "val_loss improved to {val_loss:.5}, saving model to {:?}",
                output_dir.join(&config.model_name)
            );
            save_checkpoint::<B, M>(&model, &artifact, &output_dir, &config.model_name)?;
        } else {
            info!(
                "val_loss did not improve from {:.5}",
                checkpoint.best().unwrap_or(val_loss)
            );
        }

        let next_learning_rate = plateau.step(val_loss, learning_rate);
        if next_learning_rate < learning_rate {
            info!("Reducing learning rate to {next_learning_rate:e}");
        }

        logger
            .log(&epoch_log)
            .map_err(|source| TrainingError::Log {
                path: log_path.clone(),
                source,
            })?;

        learning_rate = next_learning_rate;

        match early_stopping.step(epoch, val_loss) {
            EarlyStoppingAction::Improved => {
                if config.callbacks.restore_best_weights {
                    best_model = Some(model.clone());
                }
            }
            EarlyStoppingAction::Continue => {}
            EarlyStoppingAction::Stop => {
                info!("Early stopping at epoch {}", epoch + 1);
                if let Some(best) = best_model.take() {
                    info!(
                        "Restoring weights from epoch {}",
                        early_stopping.best_epoch().map_or(0, |e| e + 1)
                    );
                    model = best;
                }
                stopped_early = true;
                break;
            }
        }
    }

    let summary = TrainingSummary {
        epochs_run,
        best_epoch: early_stopping.best_epoch(),
        best_val_loss: checkpoint.best(),
        stopped_early,
        final_learning_rate: learning_rate,
    };
    info!("Training finished: {summary:?}");

    Ok((model, summary))
}

/// Loader over `dataset` in its current order; `num_workers` threads decode
/// batches ahead of the consumer.
fn build_dataloader<B: Backend>(
    dataset: &SegmentationDataset,
    device: &B::Device,
    config: &TrainingConfig,
) -> Arc<dyn DataLoader<SegmentationBatch<B>>> {
    let mut builder = DataLoaderBuilder::new(SegmentationBatcher::<B>::new(device.clone()))
        .batch_size(config.batch_size);
    if config.num_workers > 0 {
        builder = builder.num_workers(config.num_workers);
    }

    builder.build(dataset.clone())
}

fn train_epoch<B, M, O>(
    mut model: M,
    optim: &mut O,
    learning_rate: f64,
    dataloader: &dyn DataLoader<SegmentationBatch<B>>,
    dataset: &SegmentationDataset,
    objective: &Objective<B>,
) -> Result<(M, EpochMetrics), TrainingError>
where
    B: AutodiffBackend,
    M: SegmentationModel<B> + AutodiffModule<B>,
    O: Optimizer<M, B>,
{
    let mut accumulator = MetricAccumulator::new(objective);

    for (step, batch) in dataloader.iter().enumerate() {
        debug!("train step {}", step + 1);

        let output = model.forward(batch.images);
        let loss = (objective.loss)(output.clone(), batch.masks.clone());
        let grads = GradientsParams::from_grads(loss.backward(), &model);

        let item = SegmentationOutput::new(loss, output, batch.masks);
        accumulator.update(&item, objective);

        model = optim.step(learning_rate, model, grads);
    }
    dataset.finish_epoch(accumulator.samples())?;

    Ok((model, accumulator.finish()))
}

fn valid_epoch<B, M>(
    model: &M,
    dataloader: &dyn DataLoader<SegmentationBatch<B>>,
    dataset: &SegmentationDataset,
    objective: &Objective<B>,
) -> Result<EpochMetrics, TrainingError>
where
    B: Backend,
    M: SegmentationModel<B>,
{
    let mut accumulator = MetricAccumulator::new(objective);

    for batch in dataloader.iter() {
        let output = model.forward(batch.images);
        let loss = (objective.loss)(output.clone(), batch.masks.clone());

        accumulator.update(&SegmentationOutput::new(loss, output, batch.masks), objective);
    }
    dataset.finish_epoch(accumulator.samples())?;

    let metrics = accumulator.finish();
    if !metrics.loss.is_finite() {
        warn!("Validation loss is not finite: {}", metrics.loss);
    }

    Ok(metrics)
}
