use burn::{
    nn::conv::{Conv2d, Conv2dConfig},
    prelude::*,
    tensor::activation::sigmoid,
};

use super::{
    SegmentationModel,
    blocks::{PoolingStage, PoolingStageConfig, UpsamplingStage, UpsamplingStageConfig},
};

/// VGG-style encoder of five pooling stages mirrored by five upsampling
/// stages, without skip connections.
#[derive(Module, Debug)]
pub struct SegNet<B: Backend> {
    encoder: Vec<PoolingStage<B>>,
    decoder: Vec<UpsamplingStage<B>>,
    conv_1x1: Conv2d<B>,
}

/// Height and width must be divisible by 32.
#[derive(Config, Debug)]
pub struct SegNetConfig {
    input_size: [usize; 2],
    #[config(default = "3")]
    input_channels: usize,
    #[config(default = "64")]
    base_channels: usize,
}

impl SegNetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SegNet<B> {
        let [height, width] = self.input_size;
        assert!(
            height % 32 == 0 && width % 32 == 0,
            "SegNet input size must be divisible by 32. Got {}x{}",
            height,
            width
        );

        let c = self.base_channels;

        let encoder = [
            (self.input_channels, vec![c, c]),
            (c, vec![c * 2, c * 2]),
            (c * 2, vec![c * 4, c * 4, c * 4]),
            (c * 4, vec![c * 8, c * 8, c * 8]),
            (c * 8, vec![c * 8, c * 8, c * 8]),
        ];
        let decoder = [
            (c * 8, vec![c * 8, c * 8, c * 8]),
            (c * 8, vec![c * 8, c * 8, c * 4]),
            (c * 4, vec![c * 4, c * 4, c * 2]),
            (c * 2, vec![c * 2, c]),
            (c, vec![c]),
        ];

        SegNet {
            encoder: encoder
                .into_iter()
                .map(|(input, filters)| PoolingStageConfig::new(input, filters).init(device))
                .collect(),
            decoder: decoder
                .into_iter()
                .map(|(input, filters)| UpsamplingStageConfig::new(input, filters).init(device))
                .collect(),
            conv_1x1: Conv2dConfig::new([c, 1], [1, 1]).init(device),
        }
    }
}

impl<B: Backend> SegNet<B> {
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self
            .encoder
            .iter()
            .fold(images, |x, stage| stage.forward(x));
        let x = self.decoder.iter().fold(x, |x, stage| stage.forward(x));

        sigmoid(self.conv_1x1.forward(x))
    }
}

impl<B: Backend> SegmentationModel<B> for SegNet<B> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        SegNet::forward(self, images)
    }
}
