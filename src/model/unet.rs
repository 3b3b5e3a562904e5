use burn::{
    nn::conv::{Conv2d, Conv2dConfig},
    prelude::*,
    tensor::activation::sigmoid,
};

use super::{
    SegmentationModel,
    blocks::{ConvBlock, ConvBlockConfig, DownBlock, DownBlockConfig, UpBlock, UpBlockConfig},
};

/// Number of pooling levels; level `i` has `base_channels << i` filters.
const DEPTH: usize = 4;

#[derive(Module, Debug)]
pub struct UNet<B: Backend> {
    encoder: Vec<DownBlock<B>>,
    bottleneck: ConvBlock<B>,
    decoder: Vec<UpBlock<B>>,
    head: Conv2d<B>,
}

/// Four-level U-Net. Height and width must be divisible by 16.
#[derive(Config, Debug)]
pub struct UNetConfig {
    input_size: [usize; 2],
    #[config(default = "3")]
    input_channels: usize,
    #[config(default = "64")]
    base_channels: usize,
    #[config(default = "0.0")]
    dropout: f64,
}

impl UNetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> UNet<B> {
        let [height, width] = self.input_size;
        let divisor = 1 << DEPTH;
        assert!(
            height % divisor == 0 && width % divisor == 0,
            "U-Net input size must be divisible by {}. Got {}x{}",
            divisor,
            height,
            width
        );

        let widths: Vec<usize> = (0..DEPTH).map(|level| self.base_channels << level).collect();

        let mut channels = self.input_channels;
        let encoder = widths
            .iter()
            .map(|&filters| {
                let block = DownBlockConfig::new(channels, filters)
                    .with_dropout(self.dropout)
                    .init(device);
                channels = filters;
                block
            })
            .collect();

        let bottleneck = ConvBlockConfig::new(channels, channels * 2)
            .with_dropout(self.dropout)
            .init(device);

        let decoder = widths
            .iter()
            .rev()
            .map(|&filters| {
                UpBlockConfig::new(filters * 2, filters)
                    .with_dropout(self.dropout)
                    .init(device)
            })
            .collect();

        UNet {
            encoder,
            bottleneck,
            decoder,
            head: Conv2dConfig::new([self.base_channels, 1], [1, 1]).init(device),
        }
    }
}

impl<B: Backend> UNet<B> {
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut skips = Vec::with_capacity(self.encoder.len());

        let x = self.encoder.iter().fold(images, |x, block| {
            let (x, skip) = block.forward(x);
            skips.push(skip);
            x
        });

        let x = self.bottleneck.forward(x);

        let x = self
            .decoder
            .iter()
            .zip(skips.into_iter().rev())
            .fold(x, |x, (block, skip)| block.forward(x, skip));

        sigmoid(self.head.forward(x))
    }
}

impl<B: Backend> SegmentationModel<B> for UNet<B> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        UNet::forward(self, images)
    }
}
