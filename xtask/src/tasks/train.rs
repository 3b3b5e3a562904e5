use std::path::PathBuf;

use anyhow::Result;
use burn::backend::Autodiff;
use burn_segmentation::{Architecture, SegNet, TrainingConfig, UNet, train};
use clap::Args;
use tracing::info;

use super::{ArchitectureArg, Backend, PipelineArgs, load_config};

type TrainBackend = Autodiff<Backend>;

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// JSON training config; flags below override its values.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(short, long, value_enum)]
    pub architecture: Option<ArchitectureArg>,

    #[command(flatten)]
    pub pipeline: PipelineArgs,

    #[arg(short, long)]
    pub epochs: Option<usize>,

    #[arg(short, long)]
    pub batch_size: Option<usize>,

    #[arg(short, long)]
    pub lr: Option<f64>,

    #[arg(long)]
    pub base_channels: Option<usize>,

    #[arg(long)]
    pub model_name: Option<String>,

    #[arg(long)]
    pub log_name: Option<String>,
}

impl TrainArgs {
    fn to_config(&self) -> Result<TrainingConfig> {
        let mut config = load_config::<TrainingConfig>(self.config.as_deref())?
            .unwrap_or_else(TrainingConfig::new);

        self.pipeline.apply(&mut config.pipeline);
        if let Some(architecture) = self.architecture {
            config.architecture = architecture.into();
        }
        if let Some(epochs) = self.epochs {
            config.num_epochs = epochs;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(lr) = self.lr {
            config.learning_rate = lr;
        }
        if let Some(base_channels) = self.base_channels {
            config.base_channels = base_channels;
        }
        if let Some(name) = &self.model_name {
            config.model_name = name.clone();
        }
        if let Some(name) = &self.log_name {
            config.log_name = name.clone();
        }

        Ok(config)
    }
}

pub fn run(args: &TrainArgs) -> Result<()> {
    let config = args.to_config()?;
    let device = Default::default();

    info!(
        "Training {:?} on {:?} for {} epochs",
        config.architecture,
        config.pipeline.dataset_root,
        config.num_epochs
    );

    let summary = match config.architecture {
        Architecture::UNet => train::<TrainBackend, UNet<TrainBackend>>(&config, &device)?.1,
        Architecture::SegNet => train::<TrainBackend, SegNet<TrainBackend>>(&config, &device)?.1,
    };

    match (summary.best_epoch, summary.best_val_loss) {
        (Some(epoch), Some(loss)) => info!(
            "Best val_loss {loss:.5} at epoch {}, {} epochs run",
            epoch + 1,
            summary.epochs_run
        ),
        _ => info!("No epoch was run"),
    }

    Ok(())
}
