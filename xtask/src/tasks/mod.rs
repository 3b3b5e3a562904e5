pub mod eval;
pub mod train;

use std::path::Path;

use anyhow::{Result, anyhow};
use burn::config::Config;
use burn_segmentation::{Architecture, PipelineConfig};
use clap::{Args, ValueEnum};

#[cfg(not(feature = "ndarray"))]
pub type Backend = burn::backend::Wgpu<f32, i32>;
#[cfg(feature = "ndarray")]
pub type Backend = burn::backend::NdArray<f32>;

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ArchitectureArg {
    Unet,
    Segnet,
}

impl From<ArchitectureArg> for Architecture {
    fn from(value: ArchitectureArg) -> Self {
        match value {
            ArchitectureArg::Unet => Architecture::UNet,
            ArchitectureArg::Segnet => Architecture::SegNet,
        }
    }
}

/// Overrides shared by every task.
#[derive(Args, Debug)]
pub struct PipelineArgs {
    /// Directory holding one sub-directory per split.
    #[arg(long)]
    pub dataset_root: Option<String>,

    #[arg(long)]
    pub output_dir: Option<String>,

    /// Square input size; every image and mask must already have it.
    #[arg(long)]
    pub image_size: Option<usize>,

    #[arg(long)]
    pub seed: Option<u64>,
}

impl PipelineArgs {
    pub fn apply(&self, config: &mut PipelineConfig) {
        if let Some(root) = &self.dataset_root {
            config.dataset_root = root.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(size) = self.image_size {
            config.image_height = size;
            config.image_width = size;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
    }
}

pub fn load_config<C: Config>(path: Option<&Path>) -> Result<Option<C>> {
    path.map(|path| C::load(path).map_err(|e| anyhow!("Failed to load config {path:?}: {e}")))
        .transpose()
}
