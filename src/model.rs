/****************************************************************
 * $ID: model.rs  	Mon 12 Oct 2026 11:03:26+0800               *
 *                                                              *
 * Maintainer: 范美辉 (MeiHui FAN) <mhfan@ustc.edu>              *
 * Copyright (c) 2026 M.H.Fan, All rights reserved.             *
 ****************************************************************/

use burn::{config::Config, module::Module, tensor::{activation, backend::Backend, Tensor},
    nn::{self, conv::{Conv2d, Conv2dConfig}, pool::{MaxPool2d, MaxPool2dConfig},
        Initializer, PaddingConfig2d},
};

/// Filters of the three convolution blocks.
pub const CONV_FILTERS: [usize; 3] = [64, 64, 128];
pub const HIDDEN_SIZE: usize = 128;

// Keras' glorot_uniform default
const INITIALIZER: Initializer = Initializer::XavierUniform { gain: 1.0 };

#[derive(Config, Debug)] pub struct ModelConfig {
    pub num_classes: usize,
    /// Channel-first input shape, `[channels, height, width]`.
    pub input_shape: [usize; 3],
    #[config(default = 0.25)] pub conv_dropout: f64,
    #[config(default = 0.5)]  pub  fc_dropout: f64,
}

impl ModelConfig {
    /// Spatial size after the three 2x2 poolings, flooring like `Valid` pooling does.
    fn pooled(&self) -> [usize; 2] {
        let [_, height, width] = self.input_shape;
        [height / 8, width / 8]
    }

    fn flat_features(&self) -> usize {
        let [height, width] = self.pooled();     CONV_FILTERS[2] * height * width
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Model<B> {
        let channels = self.input_shape[0];
        Model {
            conv1: ConvBlock::new([channels, CONV_FILTERS[0]], self.conv_dropout, device),
            conv2: ConvBlock::new([CONV_FILTERS[0], CONV_FILTERS[1]], self.conv_dropout, device),
            conv3: ConvBlock::new([CONV_FILTERS[1], CONV_FILTERS[2]], self.conv_dropout, device),
            fc1: nn::LinearConfig::new(self.flat_features(), HIDDEN_SIZE)
                .with_initializer(INITIALIZER).init(device),
            fc2: nn::LinearConfig::new(HIDDEN_SIZE, self.num_classes)
                .with_initializer(INITIALIZER).init(device),
            dropout: nn::DropoutConfig::new(self.fc_dropout).init(),
            activation: nn::Relu::new(),
        }
    }

    /// Keras-like layer table: name, output shape and parameter count per layer.
    pub fn summary(&self) -> String {
        let [mut channels, mut height, mut width] = self.input_shape;
        let mut rows = Vec::new();
        let mut push = |name: &str, shape: String, params: usize|
            rows.push(format!("{name:<16}{shape:<20}{params:>10}"));

        for (i, filters) in CONV_FILTERS.into_iter().enumerate() {
            let params = channels * filters * 3 * 3 + filters;
            channels = filters;
            let shape = || format!("[{channels}, {height}, {width}]");
            push(&format!("conv2d_{}", i + 1), shape(), params);
            push(&format!("relu_{}",   i + 1), shape(), 0);
            (height, width) = (height / 2, width / 2);
            let shape = format!("[{channels}, {height}, {width}]");
            push(&format!("max_pool_{}", i + 1), shape.clone(), 0);
            push(&format!("dropout_{}",  i + 1), shape, 0);
        }

        let flat = self.flat_features();
        push("flatten", format!("[{flat}]"), 0);
        push("dense_1", format!("[{HIDDEN_SIZE}]"), flat * HIDDEN_SIZE + HIDDEN_SIZE);
        push("relu_4",  format!("[{HIDDEN_SIZE}]"), 0);
        push("dropout_4", format!("[{HIDDEN_SIZE}]"), 0);
        push("dense_2", format!("[{}]", self.num_classes),
            HIDDEN_SIZE * self.num_classes + self.num_classes);
        push("softmax", format!("[{}]", self.num_classes), 0);

        let header = format!("{:<16}{:<20}{:>10}", "Layer", "Output Shape", "Param #");
        let rule = "=".repeat(header.len());
        format!("{header}\n{rule}\n{}\n{rule}", rows.join("\n"))
    }
}

#[derive(Module, Debug)] pub struct Model<B: Backend> {
    conv1: ConvBlock<B>,
    conv2: ConvBlock<B>,
    conv3: ConvBlock<B>,
    fc1: nn::Linear<B>,
    fc2: nn::Linear<B>,
    dropout: nn::Dropout,
    activation: nn::Relu,
}

impl<B: Backend> Model<B> {
    /// # Shapes
    ///   - Images [batch_size, channels, height, width]
    ///   - Output [batch_size, num_classes], logits
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.conv1.forward(images);
        let x = self.conv2.forward(x);
        let x = self.conv3.forward(x);

        let x = x.flatten::<2>(1, 3);
        let x = self.fc1.forward(x);
        let x = self.activation.forward(x);
        let x = self.dropout.forward(x);

        self.fc2.forward(x)
    }

    /// Class probabilities, the final softmax layer.
    pub fn forward_softmax(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        activation::softmax(self.forward(images), 1)
    }
}

/// Conv 3x3 'same' -> ReLU -> MaxPool 2x2 -> Dropout
#[derive(Module, Debug)] pub struct ConvBlock<B: Backend> {
    conv: Conv2d<B>,
    pool: MaxPool2d,
    dropout: nn::Dropout,
    activation: nn::Relu,
}

impl<B: Backend> ConvBlock<B> {
    pub fn new(channels: [usize; 2], dropout: f64, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new(channels, [3, 3])
            .with_padding(PaddingConfig2d::Same).with_initializer(INITIALIZER).init(device);
        let pool = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();
        Self { conv, pool, dropout: nn::DropoutConfig::new(dropout).init(),
            activation: nn::Relu::new(), }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(input);
        let x = self.activation.forward(x);
        let x = self.pool.forward(x);
        self.dropout.forward(x)
    }
}

#[cfg(test)] mod tests {
    use super::*;
    use burn::{backend::NdArray, tensor::Distribution};

    #[test] fn forward_shapes() {
        let device = Default::default();
        let config = ModelConfig::new(2, [3, 32, 32]);
        let model = config.init::<NdArray>(&device);

        let images = Tensor::<NdArray, 4>::random([3, 3, 32, 32],
            Distribution::Uniform(0.0, 1.0), &device);
        assert_eq!(model.forward(images.clone()).dims(), [3, 2]);

        let sums = model.forward_softmax(images).sum_dim(1).into_data()
            .to_vec::<f32>().unwrap();
        assert!(sums.iter().all(|sum| (sum - 1.0).abs() < 1e-5), "{sums:?}");
    }

    #[test] fn odd_input_floors_pooling() {
        let config = ModelConfig::new(10, [1, 28, 20]);
        assert_eq!(config.pooled(), [3, 2]);
        let model = config.init::<NdArray>(&Default::default());
        let images = Tensor::<NdArray, 4>::zeros([1, 1, 28, 20], &Default::default());
        assert_eq!(model.forward(images).dims(), [1, 10]);
    }

    #[test] fn summary_counts_params() {
        let config = ModelConfig::new(2, [3, 32, 32]);
        let summary = config.summary();
        assert!(summary.contains("[128, 4, 4]"), "{summary}");
        assert!(summary.lines().any(|line|
            line.starts_with("dense_1") && line.ends_with("262272")), "{summary}");

        let model = config.init::<NdArray>(&Default::default());
        let total = ((3 * 64 + 64 * 64) * 9 + 64 * 128 * 9 + 2 * 64 + 128) +
            (2048 * 128 + 128) + (128 * 2 + 2);
        assert_eq!(model.num_params(), total);
    }
}
