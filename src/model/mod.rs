mod blocks;
mod checkpoint;
pub mod objective;
mod segnet;
mod unet;

use burn::prelude::*;

pub use blocks::{
    ConvBlock, ConvBlockConfig, ConvBnRelu, ConvBnReluConfig, DownBlock, DownBlockConfig,
    PoolingStage, PoolingStageConfig, UpBlock, UpBlockConfig, UpsamplingStage,
    UpsamplingStageConfig,
};
pub use checkpoint::{CheckpointError, load_checkpoint, save_checkpoint};
pub use objective::{Objective, RegistryError, SymbolRegistry};
pub use segnet::{SegNet, SegNetConfig};
pub use unet::{UNet, UNetConfig};

#[derive(Config, Debug, PartialEq, Eq)]
pub enum Architecture {
    UNet,
    SegNet,
}

impl Architecture {
    /// Input height and width must be multiples of this, one halving per
    /// pooling level.
    pub fn size_divisor(&self) -> usize {
        match self {
            Architecture::UNet => 16,
            Architecture::SegNet => 32,
        }
    }
}

/// A network mapping `[batch, channels, height, width]` images to
/// `[batch, 1, height, width]` foreground probabilities.
pub trait SegmentationModel<B: Backend> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4>;
}

/// Everything needed to rebuild a trained network before its weights are
/// restored. Saved as JSON next to each checkpoint.
#[derive(Config, Debug)]
pub struct ModelArtifact {
    pub architecture: Architecture,
    pub input_size: [usize; 2],
    #[config(default = 3)]
    pub input_channels: usize,
    #[config(default = 64)]
    pub base_channels: usize,
    pub loss: String,
    pub metrics: Vec<String>,
}

/// Models that can be built from a [`ModelArtifact`].
pub trait FromArtifact<B: Backend>: Module<B> + SegmentationModel<B> + Sized {
    const ARCHITECTURE: Architecture;

    fn from_artifact(artifact: &ModelArtifact, device: &B::Device) -> Self;
}

impl<B: Backend> FromArtifact<B> for UNet<B> {
    const ARCHITECTURE: Architecture = Architecture::UNet;

    fn from_artifact(artifact: &ModelArtifact, device: &B::Device) -> Self {
        UNetConfig::new(artifact.input_size)
            .with_input_channels(artifact.input_channels)
            .with_base_channels(artifact.base_channels)
            .init(device)
    }
}

impl<B: Backend> FromArtifact<B> for SegNet<B> {
    const ARCHITECTURE: Architecture = Architecture::SegNet;

    fn from_artifact(artifact: &ModelArtifact, device: &B::Device) -> Self {
        SegNetConfig::new(artifact.input_size)
            .with_input_channels(artifact.input_channels)
            .with_base_channels(artifact.base_channels)
            .init(device)
    }
}
