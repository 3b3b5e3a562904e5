use std::path::Path;

use burn::prelude::*;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use super::{
    EvaluationError,
    scores::{ClassificationScores, ScoreRecord, write_scores},
    visualize::{prediction_image, save_triptych},
};
use crate::{
    config::EvaluationConfig,
    dataset::{
        SamplePair, load_split,
        preprocessing::{read_eval_mask, read_image, threshold},
    },
    model::{FromArtifact, SegmentationModel, SymbolRegistry, load_checkpoint},
};

#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub records: Vec<ScoreRecord>,
    pub mean: Option<ClassificationScores>,
}

/// Restores `<output_dir>/<model_name>` and evaluates it on the configured
/// split.
pub fn run_evaluation<B, M>(
    config: &EvaluationConfig,
    device: &B::Device,
) -> Result<EvaluationReport, EvaluationError>
where
    B: Backend,
    M: FromArtifact<B>,
{
    let (model, artifact, _objective) = load_checkpoint::<B, M>(
        &config.pipeline.output_dir(),
        &config.model_name,
        &SymbolRegistry::default(),
        device,
    )?;
    info!("Model loaded successfully ({:?})", artifact.architecture);

    let pairs = load_split(config.pipeline.split_dir(&config.split))?;

    evaluate(&model, &pairs, config, device)
}

/// Predicts every pair one image at a time, writes a triptych per image to
/// the results directory and the score table once all images are scored.
pub fn evaluate<B, M>(
    model: &M,
    pairs: &[SamplePair],
    config: &EvaluationConfig,
    device: &B::Device,
) -> Result<EvaluationReport, EvaluationError>
where
    B: Backend,
    M: SegmentationModel<B>,
{
    let size = config.pipeline.image_size();
    let results_dir = config.results_dir();
    create_dir(&results_dir)?;

    let progress = ProgressBar::new(pairs.len() as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
    {
        progress.set_style(style.progress_chars("#>-"));
    }

    let mut records = Vec::with_capacity(pairs.len());

    for pair in pairs {
        let name = pair.name();

        let image = read_image(&pair.image_path, size)?;
        let mask = read_eval_mask(&pair.mask_path, size)?;

        let probabilities = predict(model, image.pixels, size, device)?;
        let labels = threshold(&probabilities, config.threshold);

        let (width, height) = image.original.dimensions();
        let prediction = prediction_image(&labels, width, height)
            .ok_or(EvaluationError::PredictionShape { name: name.clone() })?;
        let result_path = results_dir.join(format!("{name}.png"));
        save_triptych(
            &result_path,
            &image.original,
            &mask.original,
            &prediction,
            config.gutter_width,
        )
        .map_err(|source| EvaluationError::Save {
            path: result_path,
            source,
        })?;

        let scores = ClassificationScores::compute(&mask.labels, &labels)?;
        records.push(ScoreRecord { name, scores });
        progress.inc(1);
    }
    progress.finish();

    let mean = ClassificationScores::mean(records.iter().map(|record| &record.scores));
    if let Some(mean) = &mean {
        info!("Accuracy: {:.5}", mean.accuracy);
        info!("F1: {:.5}", mean.f1);
        info!("Jaccard: {:.5}", mean.jaccard);
        info!("Recall: {:.5}", mean.recall);
        info!("Precision: {:.5}", mean.precision);
    }

    let scores_path = config.scores_path();
    if let Some(parent) = scores_path.parent() {
        create_dir(parent)?;
    }
    write_scores(&scores_path, &records).map_err(|source| EvaluationError::Scores {
        path: scores_path,
        source,
    })?;

    Ok(EvaluationReport { records, mean })
}

/// Single-sample forward pass returning row-major `height * width`
/// probabilities.
fn predict<B, M>(
    model: &M,
    pixels: Vec<f32>,
    [height, width]: [usize; 2],
    device: &B::Device,
) -> Result<Vec<f32>, EvaluationError>
where
    B: Backend,
    M: SegmentationModel<B>,
{
    let image = Tensor::<B, 3>::from_data(
        TensorData::new(pixels, Shape::new([height, width, 3])).convert::<B::FloatElem>(),
        device,
    )
    .permute([2, 0, 1])
    .unsqueeze::<4>();

    let output = model.forward(image);
    let [_, channels, out_height, out_width] = output.dims();
    if [channels, out_height, out_width] != [1, height, width] {
        return Err(EvaluationError::OutputShape {
            expected: [1, height, width],
            found: [channels, out_height, out_width],
        });
    }

    output
        .reshape([height * width])
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| EvaluationError::Tensor(format!("{e:?}")))
}

fn create_dir(path: &Path) -> Result<(), EvaluationError> {
    std::fs::create_dir_all(path).map_err(|source| EvaluationError::Io {
        path: path.to_path_buf(),
        source,
    })
}
