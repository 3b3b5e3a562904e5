mod common;

use burn::backend::NdArray;
use burn_segmentation::{
    Architecture, EvaluationConfig, EvaluationError, ModelArtifact, PipelineConfig, UNet,
    UNetConfig, dataset::load_split, evaluate,
    model::{
        objective::{DICE_COEF, DICE_LOSS, IOU},
        save_checkpoint,
    },
    run_evaluation,
};
use common::{BackgroundModel, path_string, write_blank_sample, write_split};
use image::Rgb;

type Backend = NdArray<f32>;

fn config(
    dataset_root: &std::path::Path,
    output_dir: &std::path::Path,
    size: usize,
) -> EvaluationConfig {
    EvaluationConfig::new()
        .with_pipeline(
            PipelineConfig::new()
                .with_dataset_root(path_string(dataset_root))
                .with_output_dir(path_string(output_dir))
                .with_image_height(size)
                .with_image_width(size),
        )
        .with_results_dir(path_string(&output_dir.join("results")))
}

#[test]
fn blank_image_with_blank_prediction_scores_one() {
    let data = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_blank_sample(data.path(), "test", "blank", 32);
    let config = config(data.path(), output.path(), 32);
    let pairs = load_split(data.path().join("test")).unwrap();

    let report = evaluate::<Backend, _>(&BackgroundModel, &pairs, &config, &Default::default())
        .unwrap();

    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].name, "blank");
    assert_eq!(report.records[0].scores.values(), [1.0; 5]);
    assert_eq!(report.mean.unwrap().values(), [1.0; 5]);

    let triptych = image::open(output.path().join("results").join("blank.png"))
        .unwrap()
        .into_rgb8();
    assert_eq!(triptych.dimensions(), (32 * 3 + 2 * 10, 32));
    assert_eq!(triptych.get_pixel(36, 5), &Rgb([255, 255, 255]));
    assert_eq!(triptych.get_pixel(78, 5), &Rgb([255, 255, 255]));
    assert_eq!(triptych.get_pixel(100, 5), &Rgb([0, 0, 0]));

    let scores = std::fs::read_to_string(config.scores_path()).unwrap();
    let lines: Vec<&str> = scores.lines().collect();
    assert_eq!(lines, [",Image,Acc,F1,Jaccard,Recall,Precision", "0,blank,1,1,1,1,1"]);
}

#[test]
fn evaluates_a_restored_checkpoint() {
    let data = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_split(data.path(), "test", 3, 16);
    let device = Default::default();

    let artifact = ModelArtifact::new(
        Architecture::UNet,
        [16, 16],
        DICE_LOSS.to_string(),
        vec![DICE_COEF.to_string(), IOU.to_string()],
    )
    .with_base_channels(2);
    let model: UNet<Backend> = UNetConfig::new([16, 16])
        .with_base_channels(2)
        .init(&device);
    save_checkpoint::<Backend, _>(&model, &artifact, output.path(), "tiny_unet").unwrap();

    let config = config(data.path(), output.path(), 16)
        .with_architecture(Architecture::UNet)
        .with_model_name("tiny_unet".to_string());

    let report = run_evaluation::<Backend, UNet<Backend>>(&config, &device).unwrap();

    assert_eq!(report.records.len(), 3);
    for record in &report.records {
        assert!(record.scores.values().iter().all(|v| (0.0..=1.0).contains(v)));
        assert!(config.results_dir().join(format!("{}.png", record.name)).exists());
    }
    let scores = std::fs::read_to_string(config.scores_path()).unwrap();
    assert_eq!(scores.lines().count(), 4);
}

#[test]
fn missing_checkpoint_is_a_load_error() {
    let data = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let config = config(data.path(), output.path(), 16).with_model_name("absent".to_string());

    let err = run_evaluation::<Backend, UNet<Backend>>(&config, &Default::default())
        .err()
        .unwrap();

    assert!(matches!(err, EvaluationError::Checkpoint(_)));
    assert!(!config.scores_path().exists());
}
