mod common;

use burn::{
    backend::{Autodiff, NdArray},
    data::dataloader::batcher::Batcher,
    module::AutodiffModule,
    prelude::*,
};
use burn_segmentation::{
    Architecture, CallbackConfig, PipelineConfig, SegNet, SegmentationBatcher,
    SegmentationDataset, TrainingConfig, TrainingError, UNet,
    dataset::load_split,
    model::{CheckpointError, SymbolRegistry, load_checkpoint, objective::dice_loss},
    train,
};
use common::{csv_column, path_string, write_half_sample, write_split};

type Backend = NdArray<f32>;
type TrainBackend = Autodiff<Backend>;

fn tiny_config(dataset_root: &std::path::Path, output_dir: &std::path::Path) -> TrainingConfig {
    TrainingConfig::new()
        .with_pipeline(
            PipelineConfig::new()
                .with_dataset_root(path_string(dataset_root))
                .with_output_dir(path_string(output_dir))
                .with_image_height(16)
                .with_image_width(16),
        )
        .with_base_channels(2)
        .with_batch_size(2)
        .with_num_epochs(2)
        .with_model_name("tiny_unet".to_string())
        .with_log_name("tiny_log".to_string())
}

#[test]
fn trains_logs_and_checkpoints_a_tiny_unet() {
    let data = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_split(data.path(), "train", 3, 16);
    write_split(data.path(), "test", 2, 16);
    let config = tiny_config(data.path(), output.path());
    let device = Default::default();

    let (_model, summary) =
        train::<TrainBackend, UNet<TrainBackend>>(&config, &device).unwrap();

    assert_eq!(summary.epochs_run, 2);
    assert!(!summary.stopped_early);
    assert!(summary.best_epoch.is_some());
    assert!(summary.best_val_loss.is_some());
    assert_eq!(summary.final_learning_rate, config.learning_rate);

    assert!(output.path().join("tiny_unet.mpk").exists());
    assert!(output.path().join("tiny_unet.json").exists());
    assert!(output.path().join("training_config.json").exists());

    let log = std::fs::read_to_string(output.path().join("tiny_log.csv")).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(
        lines[0],
        "epoch,dice_coef,iou,learning_rate,loss,precision,recall,\
         val_dice_coef,val_iou,val_loss,val_precision,val_recall"
    );
    assert!(lines[1].starts_with("0,"));
    assert!(lines[2].starts_with("1,"));
}

#[test]
fn checkpoint_restores_only_its_own_architecture() {
    let data = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_split(data.path(), "train", 2, 16);
    write_split(data.path(), "test", 2, 16);
    let config = tiny_config(data.path(), output.path()).with_num_epochs(1);
    let device = Default::default();

    train::<TrainBackend, UNet<TrainBackend>>(&config, &device).unwrap();

    let registry = SymbolRegistry::<Backend>::default();
    let (_model, artifact, objective) =
        load_checkpoint::<Backend, UNet<Backend>>(output.path(), "tiny_unet", &registry, &device)
            .unwrap();
    assert_eq!(artifact.architecture, Architecture::UNet);
    assert_eq!(artifact.input_size, [16, 16]);
    assert_eq!(artifact.base_channels, 2);
    assert_eq!(objective.metrics.len(), 2);

    let err =
        load_checkpoint::<Backend, SegNet<Backend>>(output.path(), "tiny_unet", &registry, &device)
            .err()
            .unwrap();
    assert!(matches!(
        err,
        CheckpointError::Architecture {
            expected: Architecture::SegNet,
            found: Architecture::UNet,
        }
    ));
}

#[test]
fn empty_split_fails_before_training() {
    let data = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_split(data.path(), "train", 2, 16);
    let config = tiny_config(data.path(), output.path());
    let device = Default::default();

    let err = train::<TrainBackend, UNet<TrainBackend>>(&config, &device)
        .err()
        .unwrap();

    assert!(matches!(err, TrainingError::EmptySplit { ref split, .. } if split == "test"));
    assert!(!output.path().join("tiny_unet.mpk").exists());
}

#[test]
fn mismatched_sizes_are_a_dataset_error() {
    let data = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_split(data.path(), "train", 2, 32);
    write_split(data.path(), "test", 2, 32);
    let config = tiny_config(data.path(), output.path());
    let device = Default::default();

    let err = train::<TrainBackend, UNet<TrainBackend>>(&config, &device)
        .err()
        .unwrap();

    assert!(matches!(err, TrainingError::Dataset(_)));
}

#[test]
fn early_stop_returns_the_best_epoch_weights() {
    let data = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_split(data.path(), "train", 2, 16);
    write_split(data.path(), "test", 1, 16);
    // after epoch 0 nothing can beat the best loss by 10
    let config = tiny_config(data.path(), output.path())
        .with_num_epochs(5)
        .with_callbacks(
            CallbackConfig::new()
                .with_early_stopping_patience(1)
                .with_early_stopping_min_delta(10.0),
        );
    let device = Default::default();

    let (model, summary) = train::<TrainBackend, UNet<TrainBackend>>(&config, &device).unwrap();

    assert!(summary.stopped_early);
    assert_eq!(summary.epochs_run, 2);
    assert_eq!(summary.best_epoch, Some(0));

    let logged = csv_column(&output.path().join("tiny_log.csv"), "val_loss");
    assert_eq!(logged.len(), 2);

    let pairs = load_split(data.path().join("test")).unwrap();
    let item = SegmentationDataset::new(pairs, [16, 16]).load(0).unwrap();
    let batch = SegmentationBatcher::<Backend>::new(device).batch(vec![item]);
    let loss = dice_loss(model.valid().forward(batch.images), batch.masks)
        .into_scalar()
        .elem::<f64>();

    assert!(
        (loss - logged[0]).abs() < 1e-6,
        "restored model scores {loss}, epoch 0 logged {}",
        logged[0]
    );
}

#[test]
fn single_identical_pair_is_learned() {
    let data = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_half_sample(data.path(), "train", "only", 16);
    write_half_sample(data.path(), "test", "only", 16);
    let config = tiny_config(data.path(), output.path())
        .with_base_channels(4)
        .with_batch_size(1)
        .with_learning_rate(1e-2)
        .with_num_epochs(80)
        .with_callbacks(
            CallbackConfig::new()
                .with_lr_patience(80)
                .with_early_stopping_patience(80),
        );
    let device = Default::default();

    train::<TrainBackend, UNet<TrainBackend>>(&config, &device).unwrap();

    let losses = csv_column(&output.path().join("tiny_log.csv"), "loss");
    let first = losses[0];
    let last = losses[losses.len() - 1];
    assert!(last < first, "loss went from {first} to {last}");
    assert!(last < 0.3, "dice loss still {last} after {} epochs", losses.len());
}

#[test]
fn size_the_model_cannot_pool_is_a_config_error() {
    let data = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_split(data.path(), "train", 2, 24);
    write_split(data.path(), "test", 2, 24);
    let mut config = tiny_config(data.path(), output.path());
    config.pipeline.image_height = 24;
    config.pipeline.image_width = 24;
    let device = Default::default();

    let err = train::<TrainBackend, UNet<TrainBackend>>(&config, &device)
        .err()
        .unwrap();

    assert!(matches!(err, TrainingError::Config(_)));
    assert!(!output.path().join("training_config.json").exists());
}
