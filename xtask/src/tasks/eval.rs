use std::path::PathBuf;

use anyhow::Result;
use burn_segmentation::{
    Architecture, EvaluationConfig, EvaluationError, SegNet, UNet, run_evaluation,
};
use clap::Args;
use tracing::{error, info};

use super::{ArchitectureArg, Backend, PipelineArgs, load_config};

#[derive(Args, Debug)]
pub struct EvalArgs {
    /// JSON evaluation config; flags below override its values.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(short, long, value_enum)]
    pub architecture: Option<ArchitectureArg>,

    #[command(flatten)]
    pub pipeline: PipelineArgs,

    #[arg(long)]
    pub model_name: Option<String>,

    #[arg(long)]
    pub split: Option<String>,

    #[arg(long)]
    pub results_dir: Option<String>,

    #[arg(long)]
    pub scores_name: Option<String>,
}

impl EvalArgs {
    fn to_config(&self) -> Result<EvaluationConfig> {
        let mut config = load_config::<EvaluationConfig>(self.config.as_deref())?
            .unwrap_or_else(EvaluationConfig::new);

        self.pipeline.apply(&mut config.pipeline);
        if let Some(architecture) = self.architecture {
            config.architecture = architecture.into();
        }
        if let Some(name) = &self.model_name {
            config.model_name = name.clone();
        }
        if let Some(split) = &self.split {
            config.split = split.clone();
        }
        if let Some(dir) = &self.results_dir {
            config.results_dir = dir.clone();
        }
        if let Some(name) = &self.scores_name {
            config.scores_name = name.clone();
        }

        Ok(config)
    }
}

pub fn run(args: &EvalArgs) -> Result<()> {
    let config = args.to_config()?;
    let device = Default::default();

    let result = match config.architecture {
        Architecture::UNet => run_evaluation::<Backend, UNet<Backend>>(&config, &device),
        Architecture::SegNet => run_evaluation::<Backend, SegNet<Backend>>(&config, &device),
    };

    let report = match result {
        Ok(report) => report,
        Err(EvaluationError::Checkpoint(e)) => {
            error!("Error loading model: {e}");
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    info!(
        "Scored {} images, results in {:?}, scores in {:?}",
        report.records.len(),
        config.results_dir(),
        config.scores_path()
    );

    Ok(())
}
