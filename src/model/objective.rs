//! Loss and metric symbols shared by training and checkpoint loading.
//!
//! Every symbol takes `(predictions, targets)` as `[batch, 1, height, width]`
//! probability maps and returns a single-element tensor. The whole batch is
//! flattened before reduction.

use std::{collections::HashMap, marker::PhantomData};

use burn::prelude::*;
use thiserror::Error;

/// Smoothing term added to numerator and denominator of the overlap ratios.
pub const SMOOTH: f32 = 1e-15;

pub const DICE_LOSS: &str = "dice_loss";
pub const DICE_COEF: &str = "dice_coef";
pub const IOU: &str = "iou";

pub type SymbolFn<B> = fn(Tensor<B, 4>, Tensor<B, 4>) -> Tensor<B, 1>;

#[derive(Config, Debug)]
pub struct DiceLossConfig {
    #[config(default = 1e-15)]
    pub smooth: f32,
}

impl DiceLossConfig {
    pub fn init<B: Backend>(&self) -> DiceLoss<B> {
        self.assertions();
        DiceLoss {
            smooth: self.smooth,
            _b: PhantomData,
        }
    }

    fn assertions(&self) {
        assert!(
            self.smooth >= 0.,
            "Smoothing factor must be non-negative. Got {}",
            self.smooth
        );
    }
}

/// `1 - dice_coef`, rewarding overlap between the predicted and true masks.
#[derive(Module, Debug)]
pub struct DiceLoss<B: Backend> {
    pub smooth: f32,
    _b: PhantomData<B>,
}

impl<B: Backend> DiceLoss<B> {
    pub fn forward(&self, predictions: Tensor<B, 4>, targets: Tensor<B, 4>) -> Tensor<B, 1> {
        assertions(&predictions, &targets);

        let device = &predictions.device();
        let dice = dice_ratio(predictions, targets, self.smooth);

        Tensor::<B, 1>::ones([1], device) - dice
    }
}

pub fn dice_loss<B: Backend>(predictions: Tensor<B, 4>, targets: Tensor<B, 4>) -> Tensor<B, 1> {
    DiceLossConfig::new()
        .init::<B>()
        .forward(predictions, targets)
}

/// `(2 * |A ∩ B| + s) / (|A| + |B| + s)`
pub fn dice_coef<B: Backend>(predictions: Tensor<B, 4>, targets: Tensor<B, 4>) -> Tensor<B, 1> {
    assertions(&predictions, &targets);
    dice_ratio(predictions, targets, SMOOTH)
}

/// `(|A ∩ B| + s) / (|A ∪ B| + s)`
pub fn iou<B: Backend>(predictions: Tensor<B, 4>, targets: Tensor<B, 4>) -> Tensor<B, 1> {
    assertions(&predictions, &targets);

    let intersection = (predictions.clone() * targets.clone()).sum();
    let union = predictions.sum() + targets.sum() - intersection.clone();

    (intersection + SMOOTH) / (union + SMOOTH)
}

fn dice_ratio<B: Backend>(
    predictions: Tensor<B, 4>,
    targets: Tensor<B, 4>,
    smooth: f32,
) -> Tensor<B, 1> {
    let intersection = (predictions.clone() * targets.clone()).sum();
    let total = predictions.sum() + targets.sum();

    (intersection * 2.0 + smooth) / (total + smooth)
}

fn assertions<B: Backend>(predictions: &Tensor<B, 4>, targets: &Tensor<B, 4>) {
    let input_dims = predictions.dims();
    let target_dims = targets.dims();

    assert!(
        input_dims == target_dims,
        "Shape mismatch: predictions {:?} vs targets {:?}",
        input_dims,
        target_dims
    );
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Unknown loss or metric symbol: `{0}`")]
    UnknownSymbol(String),
}

/// Name to function table used to compile a model and to resolve the
/// symbols recorded in a checkpoint artifact.
#[derive(Debug, Clone)]
pub struct SymbolRegistry<B: Backend> {
    symbols: HashMap<String, SymbolFn<B>>,
}

impl<B: Backend> Default for SymbolRegistry<B> {
    fn default() -> Self {
        Self::empty()
            .register(DICE_LOSS, dice_loss::<B>)
            .register(DICE_COEF, dice_coef::<B>)
            .register(IOU, iou::<B>)
    }
}

impl<B: Backend> SymbolRegistry<B> {
    pub fn empty() -> Self {
        Self {
            symbols: HashMap::new(),
        }
    }

    pub fn register(mut self, name: impl Into<String>, symbol: SymbolFn<B>) -> Self {
        self.symbols.insert(name.into(), symbol);
        self
    }

    pub fn resolve(&self, name: &str) -> Result<SymbolFn<B>, RegistryError> {
        self.symbols
            .get(name)
            .copied()
            .ok_or_else(|| RegistryError::UnknownSymbol(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }
}

/// A loss plus the named metrics tracked alongside it.
#[derive(Clone)]
pub struct Objective<B: Backend> {
    pub loss: SymbolFn<B>,
    pub metrics: Vec<(String, SymbolFn<B>)>,
}

impl<B: Backend> Objective<B> {
    pub fn compile(
        registry: &SymbolRegistry<B>,
        loss: &str,
        metrics: &[String],
    ) -> Result<Self, RegistryError> {
        let loss = registry.resolve(loss)?;
        let metrics = metrics
            .iter()
            .map(|name| Ok((name.clone(), registry.resolve(name)?)))
            .collect::<Result<Vec<_>, RegistryError>>()?;

        Ok(Self { loss, metrics })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn mask(values: [f32; 4]) -> Tensor<TestBackend, 4> {
        Tensor::<TestBackend, 1>::from_floats(values, &Default::default()).reshape([1, 1, 2, 2])
    }

    fn scalar(tensor: Tensor<TestBackend, 1>) -> f64 {
        tensor.into_scalar().elem::<f64>()
    }

    #[test]
    fn dice_loss_vanishes_on_identical_masks() {
        let m = mask([1.0, 0.0, 1.0, 1.0]);
        let loss = scalar(dice_loss(m.clone(), m));

        assert!(loss.abs() < 1e-6, "loss = {loss}");
    }

    #[test]
    fn dice_and_iou_on_partial_overlap() {
        let predictions = mask([1.0, 1.0, 0.0, 0.0]);
        let targets = mask([1.0, 0.0, 1.0, 0.0]);

        let dice = scalar(dice_coef(predictions.clone(), targets.clone()));
        let iou = scalar(iou(predictions, targets));

        assert!((dice - 0.5).abs() < 1e-6);
        assert!((iou - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn empty_masks_count_as_perfect_overlap() {
        let empty = mask([0.0; 4]);

        assert!((scalar(dice_coef(empty.clone(), empty.clone())) - 1.0).abs() < 1e-6);
        assert!((scalar(iou(empty.clone(), empty)) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn registry_resolves_defaults_and_rejects_unknown_names() {
        let registry = SymbolRegistry::<TestBackend>::default();

        assert!(registry.contains(DICE_LOSS));
        assert!(registry.contains(DICE_COEF));
        assert!(registry.contains(IOU));
        assert_eq!(
            registry.resolve("focal_loss").err(),
            Some(RegistryError::UnknownSymbol("focal_loss".to_string()))
        );
    }

    #[test]
    fn compile_keeps_metric_order() {
        let registry = SymbolRegistry::<TestBackend>::default();
        let objective = Objective::compile(
            &registry,
            DICE_LOSS,
            &[IOU.to_string(), DICE_COEF.to_string()],
        )
        .unwrap();

        let names: Vec<_> = objective.metrics.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, [IOU, DICE_COEF]);
    }
}
