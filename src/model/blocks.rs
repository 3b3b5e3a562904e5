use burn::{
    nn::{
        BatchNorm, BatchNormConfig, Dropout, DropoutConfig, PaddingConfig2d, Relu,
        conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig},
        interpolate::{Interpolate2d, Interpolate2dConfig, InterpolateMode},
        pool::{MaxPool2d, MaxPool2dConfig},
    },
    prelude::*,
};

/// 3x3 same-padded convolution followed by batch normalization and ReLU.
#[derive(Module, Debug)]
pub struct ConvBnRelu<B: Backend> {
    conv: Conv2d<B>,
    norm: BatchNorm<B, 2>,
    activation: Relu,
}

impl<B: Backend> ConvBnRelu<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.norm.forward(x);

        self.activation.forward(x)
    }
}

#[derive(Config, Debug)]
pub struct ConvBnReluConfig {
    input_channels: usize,
    num_filters: usize,
}

impl ConvBnReluConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ConvBnRelu<B> {
        ConvBnRelu {
            conv: Conv2dConfig::new([self.input_channels, self.num_filters], [3, 3])
                .with_padding(PaddingConfig2d::Same)
                .init(device),
            norm: BatchNormConfig::new(self.num_filters).init(device),
            activation: Relu::new(),
        }
    }
}

#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    conv1: ConvBnRelu<B>,
    conv2: ConvBnRelu<B>,
    dropout: Dropout,
}

impl<B: Backend> ConvBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv1.forward(x);
        let x = self.dropout.forward(x);

        self.conv2.forward(x)
    }
}

#[derive(Config, Debug)]
pub struct ConvBlockConfig {
    input_channels: usize,
    num_filters: usize,
    #[config(default = "0.0")]
    dropout: f64,
}

impl ConvBlockConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ConvBlock<B> {
        ConvBlock {
            conv1: ConvBnReluConfig::new(self.input_channels, self.num_filters).init(device),
            conv2: ConvBnReluConfig::new(self.num_filters, self.num_filters).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
        }
    }
}

/// Contracting U-Net level: the convolved features are returned as the skip
/// connection alongside their 2x2 max-pooled copy.
#[derive(Module, Debug)]
pub struct DownBlock<B: Backend> {
    features: ConvBlock<B>,
    pool: MaxPool2d,
}

impl<B: Backend> DownBlock<B> {
    /// Returns `(pooled, skip)`.
    pub fn forward(&self, x: Tensor<B, 4>) -> (Tensor<B, 4>, Tensor<B, 4>) {
        let skip = self.features.forward(x);

        (self.pool.forward(skip.clone()), skip)
    }
}

#[derive(Config, Debug)]
pub struct DownBlockConfig {
    input_channels: usize,
    num_filters: usize,
    #[config(default = "0.0")]
    dropout: f64,
}

impl DownBlockConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> DownBlock<B> {
        DownBlock {
            features: ConvBlockConfig::new(self.input_channels, self.num_filters)
                .with_dropout(self.dropout)
                .init(device),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
        }
    }
}

/// Expanding U-Net level: a stride-2 transposed convolution doubles the
/// resolution, the skip connection is concatenated on channels, then a
/// [`ConvBlock`] mixes both.
#[derive(Module, Debug)]
pub struct UpBlock<B: Backend> {
    upsample: ConvTranspose2d<B>,
    features: ConvBlock<B>,
}

impl<B: Backend> UpBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>, skip: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.upsample.forward(x);

        self.features.forward(Tensor::cat(vec![x, skip], 1))
    }
}

/// The skip connection is expected to carry `num_filters` channels.
#[derive(Config, Debug)]
pub struct UpBlockConfig {
    input_channels: usize,
    num_filters: usize,
    #[config(default = "0.0")]
    dropout: f64,
}

impl UpBlockConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> UpBlock<B> {
        UpBlock {
            upsample: ConvTranspose2dConfig::new([self.input_channels, self.num_filters], [2, 2])
                .with_stride([2, 2])
                .init(device),
            features: ConvBlockConfig::new(self.num_filters * 2, self.num_filters)
                .with_dropout(self.dropout)
                .init(device),
        }
    }
}

/// A run of [`ConvBnRelu`] layers closed by a 2x2 max pool.
#[derive(Module, Debug)]
pub struct PoolingStage<B: Backend> {
    convs: Vec<ConvBnRelu<B>>,
    max_pool: MaxPool2d,
}

impl<B: Backend> PoolingStage<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self
            .convs
            .iter()
            .fold(x, |x, conv| conv.forward(x));

        self.max_pool.forward(x)
    }
}

/// Channel widths are given per convolution: `filters[i]` is the output of
/// the i-th layer, the input of the first layer is `input_channels`.
#[derive(Config, Debug)]
pub struct PoolingStageConfig {
    input_channels: usize,
    filters: Vec<usize>,
}

impl PoolingStageConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> PoolingStage<B> {
        PoolingStage {
            convs: conv_stack(self.input_channels, &self.filters, device),
            max_pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
        }
    }
}

/// Nearest-neighbour 2x upsampling followed by a run of [`ConvBnRelu`] layers.
#[derive(Module, Debug)]
pub struct UpsamplingStage<B: Backend> {
    upsample: Interpolate2d,
    convs: Vec<ConvBnRelu<B>>,
}

impl<B: Backend> UpsamplingStage<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.upsample.forward(x);

        self.convs.iter().fold(x, |x, conv| conv.forward(x))
    }
}

#[derive(Config, Debug)]
pub struct UpsamplingStageConfig {
    input_channels: usize,
    filters: Vec<usize>,
}

impl UpsamplingStageConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> UpsamplingStage<B> {
        UpsamplingStage {
            upsample: Interpolate2dConfig::new()
                .with_scale_factor(Some([2.0, 2.0]))
                .with_mode(InterpolateMode::Nearest)
                .init(),
            convs: conv_stack(self.input_channels, &self.filters, device),
        }
    }
}

fn conv_stack<B: Backend>(
    input_channels: usize,
    filters: &[usize],
    device: &B::Device,
) -> Vec<ConvBnRelu<B>> {
    let mut channels = input_channels;

    filters
        .iter()
        .map(|&num_filters| {
            let conv = ConvBnReluConfig::new(channels, num_filters).init(device);
            channels = num_filters;
            conv
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn down_block_halves_and_keeps_the_skip() {
        let device = Default::default();
        let block = DownBlockConfig::new(3, 4).init::<TestBackend>(&device);

        let (pooled, skip) = block.forward(Tensor::ones([1, 3, 8, 6], &device));

        assert_eq!(pooled.dims(), [1, 4, 4, 3]);
        assert_eq!(skip.dims(), [1, 4, 8, 6]);
    }

    #[test]
    fn up_block_doubles_and_merges_the_skip() {
        let device = Default::default();
        let block = UpBlockConfig::new(8, 4).init::<TestBackend>(&device);

        let output = block.forward(
            Tensor::ones([2, 8, 4, 3], &device),
            Tensor::ones([2, 4, 8, 6], &device),
        );

        assert_eq!(output.dims(), [2, 4, 8, 6]);
    }

    #[test]
    fn stages_follow_their_filter_lists() {
        let device = Default::default();
        let down = PoolingStageConfig::new(3, vec![4, 4, 6]).init::<TestBackend>(&device);
        let up = UpsamplingStageConfig::new(6, vec![6, 2]).init::<TestBackend>(&device);

        let x = down.forward(Tensor::ones([1, 3, 8, 8], &device));
        assert_eq!(x.dims(), [1, 6, 4, 4]);

        assert_eq!(up.forward(x).dims(), [1, 2, 8, 8]);
    }
}
